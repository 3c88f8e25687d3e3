//! Refresh scheduler
//!
//! Owns every refresh timer and decides when the access token is renewed.
//! A single state machine replaces independent periodic and reconnect
//! timers:
//!
//! ```text
//! Idle ──start──▶ Refreshing ──ok──▶ Scheduled ──tick──▶ Refreshing
//!                     │                  │
//!                 transport           offline
//!                     ▼                  ▼
//!            WaitingForConnectivity ◀────┘
//!                     │
//!          online + settle delay ──▶ Refreshing
//! ```
//!
//! Every schedule carries a generation number. `stop()` and `start()` bump it,
//! and a refresh result whose generation is stale is dropped without touching
//! the store or arming a timer. The check and the store write happen under
//! the same lock.
//!
//! A transport failure while connectivity is still reported online cannot
//! wait for an online edge, because the edge detector has nothing new to
//! report. The settle slot is reused as a retry timer instead, backing off
//! from the settle delay up to `MAX_TRANSPORT_RETRY_DELAY`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tether_domain::constants::MAX_TRANSPORT_RETRY_DELAY_MS;
use tether_domain::RefreshConfig;
use tokio::sync::{watch, Mutex};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument, Span};

use crate::ports::{ConnectivityListener, TokenExchange};
use crate::store::CredentialStore;

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// No schedule; logged out or stopped
    Idle,
    /// Periodic timer armed
    Scheduled,
    /// A refresh request is in flight
    Refreshing,
    /// Offline or last refresh could not reach the provider
    WaitingForConnectivity,
}

/// Counters for refresh activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub attempts: u64,
    pub successes: u64,
    pub transport_failures: u64,
    pub provider_failures: u64,
    /// Results dropped because the schedule was stopped or restarted
    pub discarded: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Transport,
    Provider,
    Stale,
}

#[derive(Debug, Default)]
struct Counters {
    attempts: AtomicU64,
    successes: AtomicU64,
    transport_failures: AtomicU64,
    provider_failures: AtomicU64,
    discarded: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RefreshStats {
        RefreshStats {
            attempts: self.attempts.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            provider_failures: self.provider_failures.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

struct Inner {
    state: RefreshState,
    generation: u64,
    timer: Option<CancellationToken>,
    settle: Option<CancellationToken>,
    in_flight: bool,
    /// Last connectivity reported to the scheduler
    online: bool,
    /// Consecutive transport failures while reported online
    transport_retries: u32,
}

struct Shared {
    exchange: Arc<dyn TokenExchange>,
    store: Arc<CredentialStore>,
    period: Duration,
    settle_delay: Duration,
    max_retry_delay: Duration,
    span: Span,
    /// Also held across the store write of a refresh result, so connectivity
    /// events queue behind a slow persistence backend.
    inner: Mutex<Inner>,
    state_tx: watch::Sender<RefreshState>,
    counters: Counters,
}

/// Handle to the refresh state machine
///
/// Cloning is cheap; all clones drive the same schedule.
#[derive(Clone)]
pub struct RefreshScheduler {
    shared: Arc<Shared>,
}

impl RefreshScheduler {
    /// Create an idle scheduler
    ///
    /// # Arguments
    /// * `exchange` - Token endpoint used for every refresh
    /// * `store` - Receives refreshed credentials
    /// * `config` - Period and settle delay
    /// * `span` - Span attached to the scheduler's background tasks
    pub fn new(
        exchange: Arc<dyn TokenExchange>,
        store: Arc<CredentialStore>,
        config: &RefreshConfig,
        span: Span,
    ) -> Self {
        let (state_tx, _) = watch::channel(RefreshState::Idle);
        Self {
            shared: Arc::new(Shared {
                exchange,
                store,
                period: config.period(),
                settle_delay: config.settle_delay(),
                max_retry_delay: Duration::from_millis(MAX_TRANSPORT_RETRY_DELAY_MS),
                span,
                inner: Mutex::new(Inner {
                    state: RefreshState::Idle,
                    generation: 0,
                    timer: None,
                    settle: None,
                    in_flight: false,
                    online: true,
                    transport_retries: 0,
                }),
                state_tx,
                counters: Counters::default(),
            }),
        }
    }

    /// Begin a fresh schedule with an immediate refresh
    ///
    /// Any previous schedule is stopped first. Returns the state reached
    /// once the initial refresh resolves.
    pub async fn start(&self) -> RefreshState {
        let generation = {
            let mut inner = self.shared.inner.lock().await;
            self.reset(&mut inner);
            self.set_state(&mut inner, RefreshState::Refreshing);
            inner.in_flight = true;
            inner.generation
        };

        info!(generation, "Starting refresh schedule");
        self.refresh_once(generation).await;
        self.state()
    }

    /// Cancel all timers and return to `Idle`. Idempotent.
    ///
    /// A request already in flight is left to finish; its result is
    /// discarded.
    pub async fn stop(&self) {
        let mut inner = self.shared.inner.lock().await;
        let was = inner.state;
        self.reset(&mut inner);
        self.set_state(&mut inner, RefreshState::Idle);

        if was != RefreshState::Idle {
            info!("Refresh schedule stopped");
        }
    }

    /// Connectivity lost
    pub async fn on_offline(&self) {
        let mut inner = self.shared.inner.lock().await;
        inner.online = false;

        match inner.state {
            RefreshState::Scheduled | RefreshState::Refreshing => {
                cancel(&mut inner.timer);
                self.set_state(&mut inner, RefreshState::WaitingForConnectivity);
                info!("Now offline, refresh suspended");
            }
            RefreshState::WaitingForConnectivity => {
                if cancel(&mut inner.settle) {
                    debug!("Offline again, catch-up refresh cancelled");
                }
            }
            RefreshState::Idle => {}
        }
    }

    /// Connectivity restored
    pub async fn on_online(&self) {
        let mut inner = self.shared.inner.lock().await;
        inner.online = true;
        inner.transport_retries = 0;

        if inner.state != RefreshState::WaitingForConnectivity {
            return;
        }
        if inner.settle.is_some() {
            debug!("Catch-up refresh already pending");
            return;
        }

        info!(
            settle_delay_ms = self.shared.settle_delay.as_millis() as u64,
            "Refreshing after online"
        );
        let delay = self.shared.settle_delay;
        self.arm_settle(&mut inner, delay);
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> RefreshState {
        *self.shared.state_tx.borrow()
    }

    /// Receive every future state transition
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<RefreshState> {
        self.shared.state_tx.subscribe()
    }

    /// Whether the periodic timer is armed
    pub async fn timer_armed(&self) -> bool {
        self.shared.inner.lock().await.timer.is_some()
    }

    /// Whether a catch-up refresh is waiting out the settle delay
    pub async fn settle_pending(&self) -> bool {
        self.shared.inner.lock().await.settle.is_some()
    }

    #[must_use]
    pub fn stats(&self) -> RefreshStats {
        self.shared.counters.snapshot()
    }

    fn reset(&self, inner: &mut Inner) {
        cancel(&mut inner.timer);
        cancel(&mut inner.settle);
        inner.generation += 1;
        inner.in_flight = false;
        inner.transport_retries = 0;
    }

    fn set_state(&self, inner: &mut Inner, state: RefreshState) {
        if inner.state != state {
            debug!(from = ?inner.state, to = ?state, "Refresh state changed");
        }
        inner.state = state;
        self.shared.state_tx.send_replace(state);
    }

    /// Run one refresh for `generation` and apply its outcome
    ///
    /// Caller marks the request in flight before calling.
    async fn refresh_once(&self, generation: u64) -> Outcome {
        let counters = &self.shared.counters;
        let current = self.shared.store.get();

        Counters::bump(&counters.attempts);
        let result = self.shared.exchange.refresh(&current).await;

        let mut inner = self.shared.inner.lock().await;
        if inner.generation != generation {
            Counters::bump(&counters.discarded);
            debug!(generation, current = inner.generation, "Discarding stale refresh result");
            return Outcome::Stale;
        }

        let outcome = match result {
            Ok(credential) => {
                let expires_in = credential.expires_in;
                if let Err(e) = self.shared.store.replace(credential).await {
                    warn!(error = %e, "Refreshed credential kept in memory only");
                }
                Counters::bump(&counters.successes);
                info!(expires_in, "Token refreshed");
                Outcome::Success
            }
            Err(e) if e.is_transport() => {
                Counters::bump(&counters.transport_failures);
                warn!(error = %e, "Token endpoint unreachable, waiting for connectivity");
                Outcome::Transport
            }
            Err(e) => {
                Counters::bump(&counters.provider_failures);
                error!(error = %e, "Token refresh rejected");
                Outcome::Provider
            }
        };

        self.apply_outcome(&mut inner, outcome);
        outcome
    }

    fn apply_outcome(&self, inner: &mut Inner, outcome: Outcome) {
        inner.in_flight = false;

        match outcome {
            Outcome::Transport => {
                cancel(&mut inner.timer);
                self.set_state(inner, RefreshState::WaitingForConnectivity);

                // No online edge will follow; retry on our own
                if inner.online && inner.settle.is_none() {
                    inner.transport_retries = inner.transport_retries.saturating_add(1);
                    let delay = self.retry_delay(inner.transport_retries);
                    info!(
                        retry_in_ms = delay.as_millis() as u64,
                        attempt = inner.transport_retries,
                        "Connectivity reported online, retrying refresh"
                    );
                    self.arm_settle(inner, delay);
                }
            }
            Outcome::Success | Outcome::Provider if inner.online => {
                inner.transport_retries = 0;
                cancel(&mut inner.settle);
                if inner.timer.is_none() {
                    self.arm_timer(inner);
                }
                self.set_state(inner, RefreshState::Scheduled);
            }
            // Went offline while the request was in flight
            Outcome::Success | Outcome::Provider => {
                self.set_state(inner, RefreshState::WaitingForConnectivity);
            }
            Outcome::Stale => {}
        }
    }

    fn arm_timer(&self, inner: &mut Inner) {
        let token = CancellationToken::new();
        inner.timer = Some(token.clone());

        let generation = inner.generation;
        let period = self.shared.period;
        let this = self.clone();

        tokio::spawn(
            async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        () = token.cancelled() => break,
                        _ = ticker.tick() => this.on_tick(generation).await,
                    }
                }
                debug!(generation, "Refresh timer finished");
            }
            .instrument(self.shared.span.clone()),
        );
    }

    /// Settle delay doubled per consecutive failure, capped
    fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.shared.settle_delay.saturating_mul(factor).min(self.shared.max_retry_delay)
    }

    fn arm_settle(&self, inner: &mut Inner, delay: Duration) {
        let token = CancellationToken::new();
        inner.settle = Some(token.clone());

        let generation = inner.generation;
        let this = self.clone();

        tokio::spawn(
            async move {
                tokio::select! {
                    () = token.cancelled() => {}
                    () = tokio::time::sleep(delay) => this.on_settle(generation, &token).await,
                }
            }
            .instrument(self.shared.span.clone()),
        );
    }

    async fn on_tick(&self, generation: u64) {
        {
            let mut inner = self.shared.inner.lock().await;
            if inner.generation != generation
                || inner.state != RefreshState::Scheduled
                || inner.in_flight
            {
                return;
            }
            self.set_state(&mut inner, RefreshState::Refreshing);
            inner.in_flight = true;
        }

        debug!("Scheduled refresh due");
        self.refresh_once(generation).await;
    }

    async fn on_settle(&self, generation: u64, token: &CancellationToken) {
        {
            let mut inner = self.shared.inner.lock().await;
            // Cancelled between the delay elapsing and taking the lock
            if inner.generation != generation || token.is_cancelled() {
                return;
            }
            inner.settle = None;

            if inner.state != RefreshState::WaitingForConnectivity {
                return;
            }
            if inner.in_flight {
                debug!("Earlier refresh still in flight, skipping catch-up");
                return;
            }
            self.set_state(&mut inner, RefreshState::Refreshing);
            inner.in_flight = true;
        }

        self.refresh_once(generation).await;
    }
}

#[async_trait]
impl ConnectivityListener for RefreshScheduler {
    async fn on_connectivity_changed(&self, online: bool) {
        if online {
            self.on_online().await;
        } else {
            self.on_offline().await;
        }
    }
}

/// Cancel and clear a task slot, returning whether one was armed
fn cancel(slot: &mut Option<CancellationToken>) -> bool {
    match slot.take() {
        Some(token) => {
            token.cancel();
            true
        }
        None => false,
    }
}
