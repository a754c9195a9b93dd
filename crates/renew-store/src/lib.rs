//! Renewal store: loads renewal files into a cache and reconciles changes back to disk.
//!
//! Each renewal is one JSON document, `<dir>/<id>.renewal.json`. Reads go through the
//! [`load`] pipeline, writes through [`persist`]; [`RenewalStore`] ties both to a cache.

pub mod entry;
pub mod error;
pub mod layout;
pub mod load;
pub mod persist;
pub mod store;

#[cfg(test)]
mod test_support;

pub use entry::{EntryState, Tracked};
pub use error::{LoadError, StoreError};
pub use layout::{RenewalLayout, RENEWAL_SUFFIX};
pub use load::Scan;
pub use store::{Change, ChangeSet, RenewalStore};
