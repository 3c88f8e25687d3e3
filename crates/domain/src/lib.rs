//! # Tether Domain
//!
//! Business domain types and models for Tether.
//!
//! This crate contains:
//! - The OAuth credential model and provider token response
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants (endpoints, scopes, timing defaults)
//!
//! ## Architecture
//! - No dependencies on other Tether crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
