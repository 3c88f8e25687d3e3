//! HTTP adapters

pub mod client;
pub mod probe;
pub mod profile;
pub mod token_client;

pub use client::{HttpClient, HttpClientBuilder};
pub use probe::HttpReachabilityProbe;
pub use profile::HttpProfileClient;
pub use token_client::HttpTokenClient;
