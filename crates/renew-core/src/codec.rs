//! JSON encoding of renewal documents.
//!
//! Configuration blocks are resolved through the [`PluginRegistry`]; secret fields go
//! through the [`SecretProtector`] in both directions. Decoding is lenient about missing
//! fields: the result is a [`RenewalDocument`] that callers validate before use.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    plugins::{OptionsBlock, PluginCategory, PluginRegistry},
    renewal::{RenewResult, Renewal},
    secret::{self, with_protector, ProtectedString, SecretError, SecretProtector},
};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid renewal JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{category} options must be a JSON object")]
    NotAnObject { category: PluginCategory },
    #[error("{category} options have no `Plugin` discriminator")]
    MissingDiscriminator { category: PluginCategory },
    #[error("unknown {category} plugin `{plugin}`")]
    UnknownPlugin {
        category: PluginCategory,
        plugin: String,
    },
    #[error("invalid options for {category} plugin `{plugin}`: {source}")]
    Schema {
        category: PluginCategory,
        plugin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("secret field: {0}")]
    Secret(#[source] SecretError),
    #[error("{plugin} is a {actual} plugin but was stored as {expected} options")]
    CategoryMismatch {
        plugin: String,
        expected: PluginCategory,
        actual: PluginCategory,
    },
}

/// A decoded document before validation; every field may be missing.
#[derive(Debug, Clone, Default)]
pub struct RenewalDocument {
    pub id: Option<String>,
    pub friendly_name: Option<String>,
    pub last_friendly_name: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub history: Option<Vec<RenewResult>>,
    pub target: Option<OptionsBlock>,
    pub validation: Option<OptionsBlock>,
    pub csr: Option<OptionsBlock>,
    pub store: Option<OptionsBlock>,
    pub installation: Option<OptionsBlock>,
    pub pfx_password: Option<ProtectedString>,
}

impl RenewalDocument {
    pub fn block(&self, category: PluginCategory) -> Option<&OptionsBlock> {
        match category {
            PluginCategory::Target => self.target.as_ref(),
            PluginCategory::Validation => self.validation.as_ref(),
            PluginCategory::Csr => self.csr.as_ref(),
            PluginCategory::Store => self.store.as_ref(),
            PluginCategory::Installation => self.installation.as_ref(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    friendly_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_friendly_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<DateTime<Utc>>,
    #[serde(default)]
    history: Option<Vec<RenewResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_options: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    validation_options: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    csr_options: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    store_options: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    installation_options: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pfx_password: Option<ProtectedString>,
}

/// Encodes and decodes renewal documents.
#[derive(Clone)]
pub struct RenewalCodec {
    registry: Arc<PluginRegistry>,
    protector: Arc<dyn SecretProtector>,
}

impl RenewalCodec {
    pub fn new(registry: Arc<PluginRegistry>, protector: Arc<dyn SecretProtector>) -> Self {
        Self {
            registry,
            protector,
        }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn decode(&self, text: &str) -> Result<RenewalDocument, CodecError> {
        with_protector(self.protector.clone(), || -> Result<_, CodecError> {
            let raw: RawDocument = serde_json::from_str(text)?;
            let block = |category: PluginCategory, value: Option<Value>| {
                value
                    .filter(|v| !v.is_null())
                    .map(|v| self.registry.decode(category, v))
                    .transpose()
            };
            Ok(RenewalDocument {
                target: block(PluginCategory::Target, raw.target_options)?,
                validation: block(PluginCategory::Validation, raw.validation_options)?,
                csr: block(PluginCategory::Csr, raw.csr_options)?,
                store: block(PluginCategory::Store, raw.store_options)?,
                installation: block(PluginCategory::Installation, raw.installation_options)?,
                id: raw.id,
                friendly_name: raw.friendly_name,
                last_friendly_name: raw.last_friendly_name,
                date: raw.date,
                history: raw.history,
                pfx_password: raw.pfx_password,
            })
        })
        .map_err(with_secret_cause)
    }

    /// Pretty-printed JSON with absent fields omitted.
    pub fn encode(&self, renewal: &Renewal) -> Result<String, CodecError> {
        with_protector(self.protector.clone(), || -> Result<_, CodecError> {
            let raw = RawDocument {
                id: Some(renewal.id.clone()),
                friendly_name: renewal.friendly_name.clone(),
                last_friendly_name: renewal.last_friendly_name.clone(),
                date: Some(renewal.date),
                history: Some(renewal.history.clone()),
                target_options: Some(encode_block(PluginCategory::Target, &renewal.target)?),
                validation_options: Some(encode_block(
                    PluginCategory::Validation,
                    &renewal.validation,
                )?),
                csr_options: renewal
                    .csr
                    .as_ref()
                    .map(|csr| encode_block(PluginCategory::Csr, csr))
                    .transpose()?,
                store_options: Some(encode_block(PluginCategory::Store, &renewal.store)?),
                installation_options: Some(encode_block(
                    PluginCategory::Installation,
                    &renewal.installation,
                )?),
                pfx_password: renewal.pfx_password.clone(),
            };
            Ok(serde_json::to_string_pretty(&raw)?)
        })
        .map_err(with_secret_cause)
    }
}

/// Report a failed secret conversion as such rather than as the serde error wrapping it.
fn with_secret_cause(err: CodecError) -> CodecError {
    match secret::take_failure() {
        Some(source) => CodecError::Secret(source),
        None => err,
    }
}

fn encode_block(expected: PluginCategory, block: &OptionsBlock) -> Result<Value, CodecError> {
    if block.category() != expected {
        return Err(CodecError::CategoryMismatch {
            plugin: block.plugin().to_string(),
            expected,
            actual: block.category(),
        });
    }
    block.to_tagged_json()
}
