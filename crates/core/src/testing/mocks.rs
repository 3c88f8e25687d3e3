//! Mock implementations of the lifecycle ports

#![allow(clippy::missing_errors_doc)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tether_domain::{Credential, ExchangeError, Result, TetherError};

use crate::ports::{
    ConnectivityListener, CredentialPersistence, LoginNavigator, ProfileLookup,
    ReachabilityProbe, TokenExchange,
};

type ExchangeResult = std::result::Result<Credential, ExchangeError>;

/// In-memory persistence with switchable failures
#[derive(Debug, Default)]
pub struct MemoryCredentialPersistence {
    stored: Mutex<Option<Credential>>,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryCredentialPersistence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a previously saved credential
    #[must_use]
    pub fn with_credential(credential: Credential) -> Self {
        let persistence = Self::default();
        *persistence.stored.lock() = Some(credential);
        persistence
    }

    /// Last successfully saved credential
    #[must_use]
    pub fn saved(&self) -> Option<Credential> {
        self.stored.lock().clone()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialPersistence for MemoryCredentialPersistence {
    async fn load(&self) -> Result<Option<Credential>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(TetherError::Persistence("load failed".to_string()));
        }
        Ok(self.stored.lock().clone())
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(TetherError::Persistence("save failed".to_string()));
        }
        *self.stored.lock() = Some(credential.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Scripted token endpoint
///
/// Queued results are returned first. Once the queue is empty, `refresh`
/// succeeds with `access-N` and keeps the caller's refresh token, and
/// `exchange_code` succeeds with `code-access`/`code-refresh`.
#[derive(Debug, Default)]
pub struct MockTokenExchange {
    refresh_results: Mutex<VecDeque<ExchangeResult>>,
    exchange_results: Mutex<VecDeque<ExchangeResult>>,
    refresh_delay: Mutex<Option<Duration>>,
    last_exchange: Mutex<Option<(String, String)>>,
    refresh_calls: AtomicUsize,
    exchange_calls: AtomicUsize,
    revoke_calls: AtomicUsize,
    fail_revoke: AtomicBool,
}

impl MockTokenExchange {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next unanswered `refresh`
    pub fn push_refresh(&self, result: ExchangeResult) {
        self.refresh_results.lock().push_back(result);
    }

    /// Queue the outcome of the next unanswered `exchange_code`
    pub fn push_exchange(&self, result: ExchangeResult) {
        self.exchange_results.lock().push_back(result);
    }

    /// Make every `refresh` take `delay` before answering
    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock() = Some(delay);
    }

    pub fn fail_revoke(&self, fail: bool) {
        self.fail_revoke.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn revoke_calls(&self) -> usize {
        self.revoke_calls.load(Ordering::SeqCst)
    }

    /// `(code, redirect_uri)` of the last code exchange
    #[must_use]
    pub fn last_exchange(&self) -> Option<(String, String)> {
        self.last_exchange.lock().clone()
    }
}

#[async_trait]
impl TokenExchange for MockTokenExchange {
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> ExchangeResult {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_exchange.lock() = Some((code.to_string(), redirect_uri.to_string()));

        match self.exchange_results.lock().pop_front() {
            Some(result) => result,
            None => Ok(Credential::new("code-access", "Bearer", 3600, "code-refresh")),
        }
    }

    async fn refresh(&self, current: &Credential) -> ExchangeResult {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = *self.refresh_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.refresh_results.lock().pop_front();
        match scripted {
            Some(Ok(mut credential)) => {
                if credential.refresh_token.is_empty() {
                    credential.refresh_token.clone_from(&current.refresh_token);
                }
                Ok(credential)
            }
            Some(Err(e)) => Err(e),
            None if current.refresh_token.is_empty() => Err(ExchangeError::MissingRefreshToken),
            None => Ok(Credential::new(
                format!("access-{call}"),
                "Bearer",
                3600,
                current.refresh_token.clone(),
            )),
        }
    }

    async fn revoke(&self, _current: &Credential) -> std::result::Result<(), ExchangeError> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_revoke.load(Ordering::SeqCst) {
            return Err(ExchangeError::Transport("revoke unreachable".to_string()));
        }
        Ok(())
    }
}

/// Reachability probe that replays a script
///
/// The last scripted value repeats once the script runs out.
#[derive(Debug)]
pub struct ScriptedProbe {
    script: Mutex<VecDeque<bool>>,
    last: Mutex<bool>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    #[must_use]
    pub fn new(script: Vec<bool>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(true),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Delay every answer, e.g. to exercise probe timeouts
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replace the remaining script with a constant answer
    pub fn set(&self, online: bool) {
        self.script.lock().clear();
        *self.last.lock() = online;
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for ScriptedProbe {
    async fn probe(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().pop_front();
        let mut last = self.last.lock();
        if let Some(online) = next {
            *last = online;
        }
        *last
    }
}

/// Navigator that records every opened URL
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    opened: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl LoginNavigator for RecordingNavigator {
    async fn open(&self, url: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TetherError::Internal("navigation refused".to_string()));
        }
        self.opened.lock().push(url.to_string());
        Ok(())
    }
}

/// Listener that records every delivered transition
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<bool>>,
}

impl RecordingListener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<bool> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl ConnectivityListener for RecordingListener {
    async fn on_connectivity_changed(&self, online: bool) {
        self.events.lock().push(online);
    }
}

/// Profile lookup answering with a fixed name
#[derive(Debug, Default)]
pub struct StaticProfileLookup {
    name: Option<String>,
    fail: bool,
    calls: AtomicUsize,
}

impl StaticProfileLookup {
    #[must_use]
    pub fn new(name: Option<&str>) -> Self {
        Self { name: name.map(str::to_string), fail: false, calls: AtomicUsize::new(0) }
    }

    /// Lookup that always errors
    #[must_use]
    pub fn failing() -> Self {
        Self { name: None, fail: true, calls: AtomicUsize::new(0) }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileLookup for StaticProfileLookup {
    async fn display_name(&self, _credential: &Credential) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TetherError::Transport("profile unreachable".to_string()));
        }
        Ok(self.name.clone())
    }
}
