use std::{io, path::PathBuf};

use renew_core::{CodecError, PluginCategory};
use thiserror::Error;

/// Why a renewal file was left out of the cache.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read file: {0}")]
    Read(#[from] io::Error),
    #[error(transparent)]
    Decode(#[from] CodecError),
    #[error("document has no Id")]
    MissingId,
    #[error("Id `{id}` cannot be used as a file name")]
    InvalidId { id: String },
    #[error("Id `{id}` does not match file name `{stem}`")]
    IdMismatch { id: String, stem: String },
    #[error("document has no Date")]
    MissingDate,
    #[error("missing {0} options")]
    MissingOptions(PluginCategory),
    #[error("missing csr options, required by target plugin `{target}`")]
    MissingCsr { target: String },
}

/// Failures surfaced to callers of mutating store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid renewal id `{id}`")]
    InvalidId { id: String },
    #[error("failed to encode renewal {id}: {source}")]
    Encode {
        id: String,
        #[source]
        source: CodecError,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to delete {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("renewal cache lock poisoned")]
    Poisoned,
}
