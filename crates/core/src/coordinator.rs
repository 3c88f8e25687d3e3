//! Lifecycle coordinator
//!
//! Top-level entry point the host talks to. Wires the credential store,
//! refresh scheduler, authorization flow and connectivity monitor together
//! and owns the managed API session.

use std::sync::Arc;

use parking_lot::RwLock;
use tether_domain::{Result, TetherConfig};
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::authorization::AuthorizationFlow;
use crate::connectivity::{select_strategy, ConnectivityMonitor, ConnectivitySink, PlatformCapabilities};
use crate::ports::{
    CredentialPersistence, LoginNavigator, ProfileLookup, ReachabilityProbe, TokenExchange,
};
use crate::scheduler::{RefreshScheduler, RefreshState, RefreshStats};
use crate::store::CredentialStore;

/// External collaborators supplied by the host
#[derive(Clone)]
pub struct Collaborators {
    pub exchange: Arc<dyn TokenExchange>,
    pub persistence: Arc<dyn CredentialPersistence>,
    pub probe: Arc<dyn ReachabilityProbe>,
    pub navigator: Arc<dyn LoginNavigator>,
    pub profile: Arc<dyn ProfileLookup>,
}

/// Result of [`LifecycleCoordinator::login`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// A valid credential is already held; nothing was opened
    AlreadyAuthenticated,
    /// The host was asked to open `url`
    NavigationStarted { url: String },
}

/// API session rebuilt after every successful authentication
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedSession {
    display_name: Option<String>,
}

impl ManagedSession {
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}

/// Owns and drives every lifecycle component
pub struct LifecycleCoordinator {
    config: TetherConfig,
    store: Arc<CredentialStore>,
    exchange: Arc<dyn TokenExchange>,
    scheduler: RefreshScheduler,
    flow: AuthorizationFlow,
    monitor: Mutex<ConnectivityMonitor>,
    connectivity: ConnectivitySink,
    navigator: Arc<dyn LoginNavigator>,
    profile: Arc<dyn ProfileLookup>,
    session: RwLock<Option<ManagedSession>>,
    span: Span,
}

impl LifecycleCoordinator {
    /// Wire the components. Nothing runs until [`startup`](Self::startup).
    pub fn new(
        config: TetherConfig,
        collaborators: Collaborators,
        capabilities: PlatformCapabilities,
    ) -> Self {
        let span = info_span!("tether", manifest = %config.manifest_name());
        let Collaborators { exchange, persistence, probe, navigator, profile } = collaborators;

        let store = Arc::new(CredentialStore::new(persistence));
        let scheduler = RefreshScheduler::new(
            Arc::clone(&exchange),
            Arc::clone(&store),
            &config.refresh,
            span.clone(),
        );
        let flow = AuthorizationFlow::new(
            config.provider.clone(),
            config.login.state_ttl(),
            Arc::clone(&exchange),
            Arc::clone(&store),
            scheduler.clone(),
        );

        let strategy = select_strategy(&config.connectivity, capabilities, probe);
        let monitor = ConnectivityMonitor::new(strategy, Arc::new(scheduler.clone()));
        let connectivity = monitor.sink();

        Self {
            config,
            store,
            exchange,
            scheduler,
            flow,
            monitor: Mutex::new(monitor),
            connectivity,
            navigator,
            profile,
            session: RwLock::new(None),
            span,
        }
    }

    /// Load the persisted credential and resume the lifecycle
    ///
    /// # Errors
    /// - `Configuration` if the client id or secret is missing
    /// - `Persistence` if the stored credential cannot be read
    pub async fn startup(&self) -> Result<()> {
        self.startup_inner().instrument(self.span.clone()).await
    }

    /// Begin the authorization flow
    ///
    /// # Errors
    /// - `Configuration` if the client id or secret is missing
    /// - any navigator failure
    pub async fn login(&self) -> Result<LoginOutcome> {
        self.login_inner().instrument(self.span.clone()).await
    }

    /// Complete a login from the redirect callback
    ///
    /// # Errors
    /// `StateMismatch`, `AuthorizationExpired`, or the code exchange failure.
    pub async fn handle_callback(&self, code: &str, state: &str) -> Result<()> {
        self.handle_callback_inner(code, state).instrument(self.span.clone()).await
    }

    /// Log out locally and stop all background work
    ///
    /// Remote revocation is best-effort. Every step runs even if clearing
    /// the persisted credential fails.
    ///
    /// # Errors
    /// Returns the persistence error, if clearing failed.
    pub async fn logout(&self) -> Result<()> {
        self.logout_inner().instrument(self.span.clone()).await
    }

    /// Host-observed network transition
    pub async fn on_connectivity_change(&self, online: bool) {
        self.connectivity.report(online).instrument(self.span.clone()).await;
    }

    /// Display name of the signed-in account
    #[must_use]
    pub fn current_display_name(&self) -> Option<String> {
        self.session.read().as_ref().and_then(|s| s.display_name.clone())
    }

    /// Current access token, `None` when logged out
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        let credential = self.store.get();
        credential.is_authenticated().then_some(credential.access_token)
    }

    /// Last connectivity observed by the edge detector
    pub async fn is_online(&self) -> bool {
        self.connectivity.is_online().await
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    #[must_use]
    pub fn session(&self) -> Option<ManagedSession> {
        self.session.read().clone()
    }

    #[must_use]
    pub fn refresh_state(&self) -> RefreshState {
        self.scheduler.state()
    }

    #[must_use]
    pub fn refresh_stats(&self) -> RefreshStats {
        self.scheduler.stats()
    }

    #[must_use]
    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Stop every timer and background task
    pub async fn shutdown(&self) {
        async {
            self.scheduler.stop().await;
            self.monitor.lock().await.stop().await;
            info!("Cleaned up");
        }
        .instrument(self.span.clone())
        .await;
    }

    async fn startup_inner(&self) -> Result<()> {
        self.config.validate()?;

        if self.store.load().await? {
            info!("Resuming authenticated session");
            self.activate(true).await?;
        } else {
            info!("Not authenticated, waiting for login");
        }
        Ok(())
    }

    async fn handle_callback_inner(&self, code: &str, state: &str) -> Result<()> {
        self.flow.handle_callback(code, state).await?;
        self.activate(false).await
    }

    async fn login_inner(&self) -> Result<LoginOutcome> {
        self.config.validate()?;

        if self.store.is_authenticated() && !self.config.login.force_reauth {
            info!("Already authenticated");
            return Ok(LoginOutcome::AlreadyAuthenticated);
        }

        let (url, _state) = self.flow.build_login_url(&self.config.provider.client_id);
        info!("Opening login page");
        self.navigator.open(&url).await?;
        Ok(LoginOutcome::NavigationStarted { url })
    }

    async fn logout_inner(&self) -> Result<()> {
        let current = self.store.get();
        if current.is_authenticated() {
            if let Err(e) = self.exchange.revoke(&current).await {
                debug!(error = %e, "Remote revocation failed");
            }
        }

        let cleared = self.store.clear().await;
        self.scheduler.stop().await;
        self.monitor.lock().await.stop().await;
        self.flow.cancel_pending();
        *self.session.write() = None;

        info!("Logged out");
        cleared
    }

    /// Start connectivity monitoring and rebuild the session
    async fn activate(&self, start_scheduler: bool) -> Result<()> {
        {
            let mut monitor = self.monitor.lock().await;
            monitor.start()?;
            debug!(strategy = monitor.strategy_name(), "Connectivity monitoring active");
        }

        if start_scheduler {
            self.scheduler.start().await;
        }
        self.rebuild_session().await;
        Ok(())
    }

    async fn rebuild_session(&self) {
        let credential = self.store.get();
        let display_name = match self.profile.display_name(&credential).await {
            Ok(name) => name,
            Err(e) => {
                warn!(error = %e, "Profile lookup failed");
                None
            }
        };

        info!(display_name = display_name.as_deref().unwrap_or(""), "Session ready");
        *self.session.write() = Some(ManagedSession { display_name });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        MemoryCredentialPersistence, MockTokenExchange, RecordingNavigator, ScriptedProbe,
        StaticProfileLookup,
    };
    use tether_domain::{ConnectivityMode, Credential, TetherError};

    struct Harness {
        coordinator: LifecycleCoordinator,
        exchange: Arc<MockTokenExchange>,
        persistence: Arc<MemoryCredentialPersistence>,
        navigator: Arc<RecordingNavigator>,
    }

    fn config() -> TetherConfig {
        let mut config = TetherConfig::default();
        config.provider.client_id = "client".to_string();
        config.provider.client_secret = "secret".to_string();
        config.connectivity.mode = ConnectivityMode::Native;
        config
    }

    fn harness(config: TetherConfig, persistence: MemoryCredentialPersistence) -> Harness {
        let exchange = Arc::new(MockTokenExchange::new());
        let persistence = Arc::new(persistence);
        let navigator = Arc::new(RecordingNavigator::new());
        let coordinator = LifecycleCoordinator::new(
            config,
            Collaborators {
                exchange: exchange.clone(),
                persistence: persistence.clone(),
                probe: Arc::new(ScriptedProbe::new(vec![true])),
                navigator: navigator.clone(),
                profile: Arc::new(StaticProfileLookup::new(Some("Ada"))),
            },
            PlatformCapabilities::default(),
        );
        Harness { coordinator, exchange, persistence, navigator }
    }

    #[tokio::test]
    async fn startup_requires_client_credentials() {
        let mut config = config();
        config.provider.client_secret.clear();
        let h = harness(config, MemoryCredentialPersistence::new());

        let result = h.coordinator.startup().await;
        assert!(matches!(result, Err(TetherError::Configuration(_))));
        assert_eq!(h.coordinator.refresh_state(), RefreshState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn startup_resumes_persisted_session() {
        let stored = Credential::new("A", "Bearer", 3600, "R");
        let h = harness(config(), MemoryCredentialPersistence::with_credential(stored));

        h.coordinator.startup().await.unwrap();

        assert_eq!(h.coordinator.refresh_state(), RefreshState::Scheduled);
        assert_eq!(h.exchange.refresh_calls(), 1);
        assert_eq!(h.coordinator.current_display_name().as_deref(), Some("Ada"));
        h.coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn startup_without_credential_stays_idle() {
        let h = harness(config(), MemoryCredentialPersistence::new());

        h.coordinator.startup().await.unwrap();

        assert!(h.coordinator.session().is_none());
        assert!(h.coordinator.access_token().is_none());
        assert_eq!(h.exchange.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn connectivity_reports_reach_edge_detector() {
        let h = harness(config(), MemoryCredentialPersistence::new());
        assert!(h.coordinator.is_online().await);

        h.coordinator.on_connectivity_change(false).await;
        assert!(!h.coordinator.is_online().await);

        h.coordinator.on_connectivity_change(true).await;
        assert!(h.coordinator.is_online().await);
    }

    #[tokio::test]
    async fn login_opens_navigator() {
        let h = harness(config(), MemoryCredentialPersistence::new());

        let outcome = h.coordinator.login().await.unwrap();

        let LoginOutcome::NavigationStarted { url } = outcome else {
            panic!("expected navigation");
        };
        assert_eq!(h.navigator.opened(), vec![url]);
    }

    #[tokio::test(start_paused = true)]
    async fn login_when_authenticated_is_a_no_op() {
        let stored = Credential::new("A", "Bearer", 3600, "R");
        let h = harness(config(), MemoryCredentialPersistence::with_credential(stored));
        h.coordinator.startup().await.unwrap();

        assert_eq!(h.coordinator.login().await.unwrap(), LoginOutcome::AlreadyAuthenticated);
        assert!(h.navigator.opened().is_empty());
        h.coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn force_reauth_opens_navigator_anyway() {
        let mut config = config();
        config.login.force_reauth = true;
        let stored = Credential::new("A", "Bearer", 3600, "R");
        let h = harness(config, MemoryCredentialPersistence::with_credential(stored));
        h.coordinator.store().load().await.unwrap();

        let outcome = h.coordinator.login().await.unwrap();
        assert!(matches!(outcome, LoginOutcome::NavigationStarted { .. }));
    }

    #[tokio::test]
    async fn navigator_failure_is_reported() {
        let h = harness(config(), MemoryCredentialPersistence::new());
        h.navigator.fail(true);

        assert!(matches!(h.coordinator.login().await, Err(TetherError::Internal(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn logout_clears_everything() {
        let stored = Credential::new("A", "Bearer", 3600, "R");
        let h = harness(config(), MemoryCredentialPersistence::with_credential(stored));
        h.coordinator.startup().await.unwrap();
        h.exchange.fail_revoke(true);

        h.coordinator.logout().await.unwrap();

        assert_eq!(h.exchange.revoke_calls(), 1);
        assert!(!h.coordinator.is_authenticated());
        assert_eq!(h.persistence.saved(), Some(Credential::empty()));
        assert_eq!(h.coordinator.refresh_state(), RefreshState::Idle);
        assert!(h.coordinator.current_display_name().is_none());
        assert!(!h.coordinator.scheduler().timer_armed().await);
    }

    #[tokio::test(start_paused = true)]
    async fn logout_reports_persistence_failure_after_stopping() {
        let stored = Credential::new("A", "Bearer", 3600, "R");
        let h = harness(config(), MemoryCredentialPersistence::with_credential(stored));
        h.coordinator.startup().await.unwrap();
        h.persistence.fail_saves(true);

        let result = h.coordinator.logout().await;

        assert!(matches!(result, Err(TetherError::Persistence(_))));
        assert!(!h.coordinator.is_authenticated());
        assert_eq!(h.coordinator.refresh_state(), RefreshState::Idle);
    }
}
