//! # Tether Infrastructure
//!
//! Adapters implementing the `tether-core` ports:
//! - HTTP token endpoint client, reachability probe and profile lookup
//! - Credential persistence in a JSON file or the OS keychain
//! - Configuration loading from the environment and config files

pub mod config;
pub mod errors;
pub mod http;
pub mod persistence;

pub use errors::InfraError;
pub use http::{HttpClient, HttpProfileClient, HttpReachabilityProbe, HttpTokenClient};
pub use persistence::{JsonFileCredentialPersistence, KeyringCredentialPersistence};
