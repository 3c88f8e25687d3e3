use std::io::Write;

use async_trait::async_trait;
use tether_core::LoginNavigator;
use tether_domain::{Result, TetherError};

/// Prints the authorization URL for the user to open
#[derive(Debug, Default)]
pub struct ConsoleNavigator;

#[async_trait]
impl LoginNavigator for ConsoleNavigator {
    async fn open(&self, url: &str) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "Open this URL to log in:\n  {url}")
            .and_then(|()| writeln!(stdout, "Then paste the redirect: callback <redirect-url>"))
            .map_err(|e| TetherError::Internal(format!("cannot show login URL: {e}")))
    }
}
