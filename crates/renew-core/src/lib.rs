//! Core types for renewal persistence: the renewal model, plugin options registry,
//! document codec, and the secret field contract.
//! Storage backends and the store itself live in sibling crates.

pub mod codec;
pub mod plugins;
pub mod renewal;
pub mod secret;

pub use codec::{CodecError, RenewalCodec, RenewalDocument};
pub use plugins::{OptionsBlock, OptionsSchema, PluginCategory, PluginRegistry};
pub use renewal::{RenewResult, Renewal};
pub use secret::{ProtectedString, SecretError, SecretProtector};
