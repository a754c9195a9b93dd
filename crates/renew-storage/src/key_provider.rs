use std::{
    fmt,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Id given to keys stored before key ids were recorded.
const LEGACY_KEY_ID: &str = "default";

/// Separates keys in the stored key list.
const KEY_SEPARATOR: &str = ",";

/// Key material used for secret envelopes.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Identifier written into every envelope (never log key bytes).
    pub id: String,
    /// 256-bit symmetric key.
    pub bytes: [u8; 32],
}

impl KeyMaterial {
    /// Fresh random key with a new id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        KeyMaterial {
            id: Uuid::new_v4().simple().to_string(),
            bytes,
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("id", &self.id)
            .field("bytes", &"***")
            .finish()
    }
}

/// The key new envelopes are sealed with, plus retired keys still needed to open old ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySet {
    pub current: KeyMaterial,
    /// Most recently retired first.
    pub previous: Vec<KeyMaterial>,
}

impl KeySet {
    pub fn new(current: KeyMaterial) -> Self {
        Self {
            current,
            previous: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("keyring error: {0}")]
    Keyring(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("generation error: {0}")]
    Generation(String),
}

/// Provides access to the envelope keys (OS keychain in production; memory in tests).
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Stored keys, creating a first key when none exists.
    async fn get_or_create(&self) -> Result<KeySet, KeyError>;

    /// Persist `keys` as the stored key set.
    async fn save(&self, keys: &KeySet) -> Result<(), KeyError>;

    /// Make `next` the current key; the old current key stays stored as a previous key.
    async fn rotate(&self, next: KeyMaterial) -> Result<KeySet, KeyError> {
        let mut keys = self.get_or_create().await?;
        let retired = std::mem::replace(&mut keys.current, next);
        keys.previous.insert(0, retired);
        self.save(&keys).await?;
        Ok(keys)
    }

    /// Forget previous keys once nothing on disk is sealed with them.
    async fn retire_previous(&self) -> Result<(), KeyError> {
        let keys = self.get_or_create().await?;
        if keys.previous.is_empty() {
            return Ok(());
        }
        self.save(&KeySet::new(keys.current)).await
    }
}

/// OS keyring-backed provider. Uses the `keyring` crate to store the key list.
pub struct KeyringProvider {
    service: String,
    account: String,
}

impl KeyringProvider {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, KeyError> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|err| KeyError::Keyring(err.to_string()))
    }
}

#[async_trait]
impl KeyProvider for KeyringProvider {
    async fn get_or_create(&self) -> Result<KeySet, KeyError> {
        // Keyring operations are synchronous; wrap in async for trait compatibility.
        let entry = self.entry()?;
        match stored_keys(entry.get_password())? {
            Some(keys) => {
                debug!(service = %self.service, key_id = %keys.current.id, "loaded secret key");
                Ok(keys)
            }
            None => {
                let keys = KeySet::new(KeyMaterial::generate());
                entry
                    .set_password(&encode_keys(&keys))
                    .map_err(|e| KeyError::Keyring(e.to_string()))?;
                info!(service = %self.service, key_id = %keys.current.id, "generated secret key");
                Ok(keys)
            }
        }
    }

    async fn save(&self, keys: &KeySet) -> Result<(), KeyError> {
        self.entry()?
            .set_password(&encode_keys(keys))
            .map_err(|e| KeyError::Keyring(e.to_string()))?;
        info!(
            service = %self.service,
            key_id = %keys.current.id,
            previous = keys.previous.len(),
            "stored secret keys"
        );
        Ok(())
    }
}

/// In-memory key provider for tests and ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct InMemoryKeyProvider {
    inner: Arc<Mutex<Option<KeySet>>>,
}

impl InMemoryKeyProvider {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<KeySet>>, KeyError> {
        self.inner
            .lock()
            .map_err(|err| KeyError::Generation(format!("lock poisoned: {err}")))
    }
}

#[async_trait]
impl KeyProvider for InMemoryKeyProvider {
    async fn get_or_create(&self) -> Result<KeySet, KeyError> {
        let mut guard = self.lock()?;

        if let Some(existing) = guard.clone() {
            return Ok(existing);
        }

        let keys = KeySet::new(KeyMaterial::generate());
        *guard = Some(keys.clone());
        Ok(keys)
    }

    async fn save(&self, keys: &KeySet) -> Result<(), KeyError> {
        *self.lock()? = Some(keys.clone());
        Ok(())
    }
}

/// Only a missing entry means "no key yet"; any other failure must not lead to a new key.
fn stored_keys(read: keyring::Result<String>) -> Result<Option<KeySet>, KeyError> {
    match read {
        Ok(secret) => decode_keys(&secret).map(Some),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(KeyError::Keyring(e.to_string())),
    }
}

/// Keyring form: `<id>:<base64 key>` per key, current key first, comma separated.
fn encode_keys(keys: &KeySet) -> String {
    std::iter::once(&keys.current)
        .chain(&keys.previous)
        .map(encode_key)
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

fn decode_keys(secret: &str) -> Result<KeySet, KeyError> {
    let mut keys = secret.split(KEY_SEPARATOR).map(decode_key);
    let current = keys
        .next()
        .ok_or_else(|| KeyError::Decode("empty key list".to_string()))??;
    Ok(KeySet {
        current,
        previous: keys.collect::<Result<_, _>>()?,
    })
}

fn encode_key(material: &KeyMaterial) -> String {
    format!(
        "{}:{}",
        material.id,
        general_purpose::STANDARD.encode(material.bytes)
    )
}

fn decode_key(secret: &str) -> Result<KeyMaterial, KeyError> {
    let (id, encoded) = secret.split_once(':').unwrap_or((LEGACY_KEY_ID, secret));
    if id.is_empty() {
        return Err(KeyError::Decode("empty key id".to_string()));
    }

    let bytes = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| KeyError::Decode(e.to_string()))?;

    if bytes.len() != 32 {
        return Err(KeyError::Decode(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }

    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(KeyMaterial {
        id: id.to_string(),
        bytes: out,
    })
}
