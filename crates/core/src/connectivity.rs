//! Connectivity monitoring
//!
//! Produces a logical online/offline signal from one of two interchangeable
//! strategies:
//! - [`NativeConnectivity`]: the host forwards its own network events
//! - [`PollingConnectivity`]: a background worker probes a reachability
//!   endpoint and synthesizes transitions
//!
//! Both feed a single edge detector, so a repeated observation never reaches
//! the [`ConnectivityListener`]. The monitor knows nothing about tokens.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tether_domain::{ConnectivityConfig, ConnectivityMode, Result, TetherError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::ports::{ConnectivityListener, ReachabilityProbe};

/// Platform facts supplied by the host at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformCapabilities {
    /// The host's native online/offline events can be trusted
    pub native_events_reliable: bool,
}

/// Edge-triggered entry point shared by all strategies and host reports
#[derive(Clone)]
pub struct ConnectivitySink {
    last_known: Arc<Mutex<bool>>,
    listener: Arc<dyn ConnectivityListener>,
}

impl ConnectivitySink {
    fn new(listener: Arc<dyn ConnectivityListener>) -> Self {
        Self { last_known: Arc::new(Mutex::new(true)), listener }
    }

    /// Record an observation, notifying the listener only on a flip.
    ///
    /// Returns whether a transition was emitted. The lock is held across
    /// delivery so listeners see transitions in detection order.
    pub async fn report(&self, online: bool) -> bool {
        let mut last_known = self.last_known.lock().await;
        if *last_known == online {
            return false;
        }
        *last_known = online;

        if online {
            info!("Connectivity restored");
        } else {
            info!("Now offline");
        }
        self.listener.on_connectivity_changed(online).await;
        true
    }

    /// Last observed state
    pub async fn is_online(&self) -> bool {
        *self.last_known.lock().await
    }
}

/// Detection mechanism behind the monitor
#[async_trait]
pub trait ConnectivityStrategy: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Begin delivering observations into `sink`
    ///
    /// # Errors
    /// Returns error if the strategy is already running.
    fn start(&mut self, sink: ConnectivitySink) -> Result<()>;

    /// Stop delivering observations. Idempotent.
    async fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Relies on host-delivered events; no background work
#[derive(Debug, Default)]
pub struct NativeConnectivity {
    running: bool,
}

impl NativeConnectivity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectivityStrategy for NativeConnectivity {
    fn name(&self) -> &'static str {
        "native"
    }

    fn start(&mut self, _sink: ConnectivitySink) -> Result<()> {
        if self.running {
            return Err(TetherError::Internal("Connectivity monitor already running".to_string()));
        }
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// Probes a reachability endpoint on a fixed interval
pub struct PollingConnectivity {
    probe: Arc<dyn ReachabilityProbe>,
    interval: Duration,
    probe_timeout: Duration,
    task_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl PollingConnectivity {
    /// Create a poller
    ///
    /// # Arguments
    /// * `probe` - Reachability check run on every tick
    /// * `interval` - Time between probes (recommended: 1-2 seconds)
    /// * `probe_timeout` - Probes slower than this count as offline
    pub fn new(probe: Arc<dyn ReachabilityProbe>, interval: Duration, probe_timeout: Duration) -> Self {
        Self {
            probe,
            interval,
            probe_timeout,
            task_handle: None,
            cancellation: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl ConnectivityStrategy for PollingConnectivity {
    fn name(&self) -> &'static str {
        "polling"
    }

    fn start(&mut self, sink: ConnectivitySink) -> Result<()> {
        if self.is_running() {
            return Err(TetherError::Internal("Connectivity monitor already running".to_string()));
        }

        // Fresh token so the poller can be restarted after stop()
        self.cancellation = CancellationToken::new();
        let cancel = self.cancellation.clone();
        let probe = Arc::clone(&self.probe);
        let interval = self.interval;
        let probe_timeout = self.probe_timeout;

        info!(interval_ms = interval.as_millis() as u64, "Starting connectivity poller");

        let handle = tokio::spawn(
            polling_worker(probe, sink, interval, probe_timeout, cancel)
                .instrument(tracing::Span::current()),
        );
        self.task_handle = Some(handle);
        Ok(())
    }

    async fn stop(&mut self) {
        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(())) => debug!("Connectivity poller stopped"),
                Ok(Err(e)) => warn!(error = %e, "Connectivity poller task failed"),
                Err(_) => warn!("Connectivity poller shutdown timeout"),
            }
        }
    }

    fn is_running(&self) -> bool {
        self.task_handle.is_some() && !self.cancellation.is_cancelled()
    }
}

/// Background probe loop
///
/// - Probes every `interval`
/// - Treats probe timeouts as offline
/// - Stops promptly on cancellation, even mid-probe
async fn polling_worker(
    probe: Arc<dyn ReachabilityProbe>,
    sink: ConnectivitySink,
    interval: Duration,
    probe_timeout: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                debug!("Connectivity poller shutting down");
                break;
            }
            () = tokio::time::sleep(interval) => {
                let probed = tokio::select! {
                    () = cancel.cancelled() => None,
                    result = tokio::time::timeout(probe_timeout, probe.probe()) => {
                        Some(result.unwrap_or_else(|_| {
                            debug!("Reachability probe timed out");
                            false
                        }))
                    }
                };

                let Some(online) = probed else {
                    break;
                };
                sink.report(online).await;
            }
        }
    }
}

/// Pick the strategy for this platform
///
/// `Auto` uses native events only when the host vouches for them.
#[must_use]
pub fn select_strategy(
    config: &ConnectivityConfig,
    capabilities: PlatformCapabilities,
    probe: Arc<dyn ReachabilityProbe>,
) -> Box<dyn ConnectivityStrategy> {
    let use_native = match config.mode {
        ConnectivityMode::Native => true,
        ConnectivityMode::Polling => false,
        ConnectivityMode::Auto => capabilities.native_events_reliable,
    };

    if use_native {
        Box::new(NativeConnectivity::new())
    } else {
        Box::new(PollingConnectivity::new(probe, config.poll_interval(), config.probe_timeout()))
    }
}

/// Owns the active strategy and the edge detector
pub struct ConnectivityMonitor {
    strategy: Box<dyn ConnectivityStrategy>,
    sink: ConnectivitySink,
}

impl ConnectivityMonitor {
    /// Create a monitor that notifies `listener` on every transition
    pub fn new(
        strategy: Box<dyn ConnectivityStrategy>,
        listener: Arc<dyn ConnectivityListener>,
    ) -> Self {
        Self { strategy, sink: ConnectivitySink::new(listener) }
    }

    /// Start the strategy; a no-op when already running
    ///
    /// # Errors
    /// Returns error if the strategy fails to start.
    pub fn start(&mut self) -> Result<()> {
        if self.strategy.is_running() {
            debug!(strategy = self.strategy.name(), "Connectivity monitor already running");
            return Ok(());
        }
        self.strategy.start(self.sink.clone())?;
        info!(strategy = self.strategy.name(), "Connectivity monitor started");
        Ok(())
    }

    /// Stop the strategy. Idempotent.
    pub async fn stop(&mut self) {
        if self.strategy.is_running() {
            self.strategy.stop().await;
            info!(strategy = self.strategy.name(), "Connectivity monitor stopped");
        }
    }

    /// Feed a host-observed transition through the edge detector
    pub async fn report(&self, online: bool) -> bool {
        self.sink.report(online).await
    }

    /// Handle for delivering observations from outside the monitor
    #[must_use]
    pub fn sink(&self) -> ConnectivitySink {
        self.sink.clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.strategy.is_running()
    }

    #[must_use]
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }
}
