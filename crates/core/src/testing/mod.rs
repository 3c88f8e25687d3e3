//! Test doubles for the lifecycle ports
//!
//! Compiled unconditionally so integration tests and downstream crates can
//! drive the coordinator without network access.

pub mod mocks;

pub use mocks::{
    MemoryCredentialPersistence, MockTokenExchange, RecordingListener, RecordingNavigator,
    ScriptedProbe, StaticProfileLookup,
};
