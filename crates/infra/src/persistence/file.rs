use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tether_core::CredentialPersistence;
use tether_domain::{Credential, Result, TetherError};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Stores the credential as a JSON document on disk
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write never leaves a truncated blob. On unix the file is
/// readable by its owner only.
#[derive(Debug, Clone)]
pub struct JsonFileCredentialPersistence {
    path: PathBuf,
}

impl JsonFileCredentialPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CredentialPersistence for JsonFileCredentialPersistence {
    async fn load(&self) -> Result<Option<Credential>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No credential file");
                return Ok(None);
            }
            Err(e) => {
                return Err(TetherError::Persistence(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };

        if contents.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| TetherError::Persistence(format!("Invalid credential file: {e}")))
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        let json = serde_json::to_vec_pretty(credential)
            .map_err(|e| TetherError::Persistence(format!("Failed to encode credential: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                TetherError::Persistence(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let temp = self.temp_path();
        write_private(&temp, &json)
            .await
            .map_err(|e| TetherError::Persistence(format!("Failed to write {}: {e}", temp.display())))?;
        tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
            TetherError::Persistence(format!("Failed to replace {}: {e}", self.path.display()))
        })?;

        debug!(path = %self.path.display(), "Credential saved");
        Ok(())
    }
}

/// Create `path` fresh with owner-only permissions and write `contents`
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    // A leftover temp file would keep its old mode
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}
