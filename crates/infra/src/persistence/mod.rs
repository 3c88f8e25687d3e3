//! Credential persistence adapters

pub mod file;
pub mod keychain;

pub use file::JsonFileCredentialPersistence;
pub use keychain::KeyringCredentialPersistence;
