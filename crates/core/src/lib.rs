//! # Tether Core
//!
//! OAuth2 credential lifecycle logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces for the token endpoint, persistence, reachability and
//!   host navigation
//! - The credential store, refresh scheduler and authorization flow
//! - Connectivity monitoring strategies
//! - The lifecycle coordinator the host talks to
//!
//! ## Architecture Principles
//! - Only depends on `tether-domain`
//! - No HTTP, keychain, or filesystem code
//! - All external collaborators via traits

pub mod authorization;
pub mod connectivity;
pub mod coordinator;
pub mod ports;
pub mod scheduler;
pub mod store;

// Test doubles, also used by the infra and host integration tests
pub mod testing;

pub use authorization::AuthorizationFlow;
pub use connectivity::{
    select_strategy, ConnectivityMonitor, ConnectivitySink, ConnectivityStrategy,
    NativeConnectivity, PlatformCapabilities, PollingConnectivity,
};
pub use coordinator::{Collaborators, LifecycleCoordinator, LoginOutcome, ManagedSession};
pub use ports::{
    ConnectivityListener, CredentialPersistence, LoginNavigator, ProfileLookup,
    ReachabilityProbe, TokenExchange,
};
pub use scheduler::{RefreshScheduler, RefreshState, RefreshStats};
pub use store::CredentialStore;
