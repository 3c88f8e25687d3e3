//! Tether host shell
//!
//! Stands in for the embedding application: loads configuration, wires the
//! HTTP and persistence adapters into the lifecycle coordinator, and turns
//! stdin lines into host events.

mod commands;
mod logging;
mod navigator;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tether_core::{
    Collaborators, CredentialPersistence, LifecycleCoordinator, LoginOutcome, PlatformCapabilities,
};
use tether_domain::{Credential, TetherConfig};
use tether_infra::{
    config, HttpClient, HttpProfileClient, HttpReachabilityProbe, HttpTokenClient,
    JsonFileCredentialPersistence, KeyringCredentialPersistence,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::commands::Command;
use crate::navigator::ConsoleNavigator;

const DEFAULT_CREDENTIAL_PATH: &str = "tether-credential.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match dotenvy::dotenv() {
        Ok(path) => eprintln!("Loaded .env from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => eprintln!("Could not load .env file: {e}"),
    }
    logging::init();

    let config = config::load().context("failed to load configuration")?;
    let coordinator = build_coordinator(&config)?;

    watch_credential(coordinator.store().subscribe());
    coordinator.startup().await.context("startup failed")?;
    info!(authenticated = coordinator.is_authenticated(), "Tether host ready");

    let result = run_shell(&coordinator).await;
    coordinator.shutdown().await;
    result
}

fn build_coordinator(config: &TetherConfig) -> anyhow::Result<LifecycleCoordinator> {
    let http = HttpClient::builder()
        .timeout(config.refresh.request_timeout())
        .user_agent(concat!("tether/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let probe_http = HttpClient::builder()
        .timeout(config.connectivity.probe_timeout())
        .user_agent(concat!("tether/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let persistence: Arc<dyn CredentialPersistence> =
        match std::env::var("TETHER_CREDENTIAL_STORE").as_deref() {
            Ok("keychain") => {
                Arc::new(KeyringCredentialPersistence::new(config.manifest_name(), "credential"))
            }
            _ => {
                let path = std::env::var("TETHER_CREDENTIAL_PATH")
                    .map_or_else(|_| PathBuf::from(DEFAULT_CREDENTIAL_PATH), PathBuf::from);
                Arc::new(JsonFileCredentialPersistence::new(path))
            }
        };

    let collaborators = Collaborators {
        exchange: Arc::new(HttpTokenClient::with_client(http.clone(), &config.provider)),
        persistence,
        probe: Arc::new(HttpReachabilityProbe::new(probe_http, config.connectivity.probe_url.clone())),
        navigator: Arc::new(ConsoleNavigator),
        profile: Arc::new(HttpProfileClient::new(http, config.provider.profile_url())),
    };

    // A terminal has no OS network notifications; Auto falls back to polling
    let capabilities = PlatformCapabilities { native_events_reliable: false };

    Ok(LifecycleCoordinator::new(config.clone(), collaborators, capabilities))
}

/// Log every credential the store publishes
fn watch_credential(mut changes: watch::Receiver<Credential>) {
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let credential = changes.borrow_and_update().clone();
            if credential.is_authenticated() {
                info!(expires_in_secs = ?credential.seconds_until_expiry(), "Access token updated");
            } else {
                info!("Credential cleared");
            }
        }
    });
}

async fn run_shell(coordinator: &LifecycleCoordinator) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                info!("Interrupted");
                break;
            }
        };

        let Some(line) = line else {
            info!("Input closed");
            break;
        };

        match commands::parse(&line) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => execute(coordinator, command).await,
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring input"),
        }
    }

    Ok(())
}

async fn execute(coordinator: &LifecycleCoordinator, command: Command) {
    match command {
        Command::Login => match coordinator.login().await {
            Ok(LoginOutcome::AlreadyAuthenticated) => info!("Already logged in"),
            Ok(LoginOutcome::NavigationStarted { .. }) => {}
            Err(e) => error!(error = %e, "Login failed"),
        },
        Command::Callback { code, state } => {
            if let Err(e) = coordinator.handle_callback(&code, &state).await {
                error!(error = %e, "Authorization failed");
            }
        }
        Command::Online => coordinator.on_connectivity_change(true).await,
        Command::Offline => coordinator.on_connectivity_change(false).await,
        Command::Status => {
            let stats = coordinator.refresh_stats();
            let expires_in_secs = coordinator.store().get().seconds_until_expiry();
            let online = coordinator.is_online().await;
            info!(
                authenticated = coordinator.is_authenticated(),
                online,
                expires_in_secs = ?expires_in_secs,
                display_name = %coordinator.current_display_name().unwrap_or_default(),
                state = ?coordinator.refresh_state(),
                attempts = stats.attempts,
                successes = stats.successes,
                transport_failures = stats.transport_failures,
                provider_failures = stats.provider_failures,
                "Status"
            );
        }
        Command::Logout => {
            if let Err(e) = coordinator.logout().await {
                warn!(error = %e, "Logged out, but the cleared credential was not persisted");
            }
        }
        Command::Quit => {}
    }
}
