//! Secret envelope for renewal files.
//! Uses AES-GCM with keys sourced from the OS keyring (or test doubles).

pub mod envelope;
pub mod key_provider;
