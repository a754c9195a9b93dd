use std::collections::HashMap;

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use renew_core::secret::{SecretError, SecretProtector};

use crate::key_provider::{KeyMaterial, KeySet};

/// Prefix of a sealed value: `enc:v1:<key id>:<nonce>:<ciphertext>`.
const ENVELOPE_PREFIX: &str = "enc:v1:";

/// AES-GCM secret envelope implementing the shared `SecretProtector` contract.
///
/// Seals with the primary key. Envelopes written under older keys open through the
/// fallback keys, so re-encrypting every record with a new primary rotates the key.
/// Values without the envelope prefix are read back as plaintext.
pub struct AesGcmProtector {
    primary: KeyMaterial,
    keys: HashMap<String, Aes256Gcm>,
    seal: bool,
}

impl AesGcmProtector {
    pub fn new(primary: KeyMaterial) -> Self {
        let mut keys = HashMap::new();
        keys.insert(primary.id.clone(), build_cipher(&primary));
        Self {
            primary,
            keys,
            seal: true,
        }
    }

    /// Seal with the current key; open envelopes sealed with any key in the set.
    pub fn from_keys(keys: KeySet) -> Self {
        keys.previous
            .into_iter()
            .fold(Self::new(keys.current), Self::with_fallback)
    }

    /// Accept envelopes sealed with `material` when reading.
    pub fn with_fallback(mut self, material: KeyMaterial) -> Self {
        self.keys
            .entry(material.id.clone())
            .or_insert_with(|| build_cipher(&material));
        self
    }

    /// When `false`, secrets are written in clear; existing envelopes still open.
    pub fn sealing(mut self, seal: bool) -> Self {
        self.seal = seal;
        self
    }

    pub fn primary_key_id(&self) -> &str {
        &self.primary.id
    }
}

impl SecretProtector for AesGcmProtector {
    fn protect(&self, plaintext: &str) -> Result<String, SecretError> {
        if !self.seal {
            return Ok(plaintext.to_string());
        }

        let cipher = self
            .keys
            .get(&self.primary.id)
            .ok_or_else(|| protect_err("primary key missing"))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| protect_err(format!("encrypt failed: {e}")))?;

        Ok(format!(
            "{ENVELOPE_PREFIX}{}:{}:{}",
            self.primary.id,
            URL_SAFE_NO_PAD.encode(nonce.as_slice()),
            URL_SAFE_NO_PAD.encode(ciphertext)
        ))
    }

    fn unprotect(&self, stored: &str) -> Result<String, SecretError> {
        let Some(envelope) = stored.strip_prefix(ENVELOPE_PREFIX) else {
            return Ok(stored.to_string());
        };

        let mut parts = envelope.splitn(3, ':');
        let (Some(key_id), Some(nonce), Some(ciphertext)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(unprotect_err("truncated envelope"));
        };

        let cipher = self
            .keys
            .get(key_id)
            .ok_or_else(|| unprotect_err(format!("unknown key id `{key_id}`")))?;

        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(nonce)
            .map_err(|e| unprotect_err(format!("nonce decode failed: {e}")))?;
        if nonce_bytes.len() != 12 {
            return Err(unprotect_err(format!(
                "expected 12 byte nonce, got {}",
                nonce_bytes.len()
            )));
        }
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = URL_SAFE_NO_PAD
            .decode(ciphertext)
            .map_err(|e| unprotect_err(format!("ciphertext decode failed: {e}")))?;

        let plaintext = cipher
            .decrypt(nonce, ciphertext.as_ref())
            .map_err(|e| unprotect_err(format!("decrypt failed: {e}")))?;
        String::from_utf8(plaintext).map_err(|e| unprotect_err(e.to_string()))
    }
}

fn build_cipher(material: &KeyMaterial) -> Aes256Gcm {
    Aes256Gcm::new(&material.bytes.into())
}

fn protect_err(reason: impl Into<String>) -> SecretError {
    SecretError::Protect {
        reason: reason.into(),
    }
}

fn unprotect_err(reason: impl Into<String>) -> SecretError {
    SecretError::Unprotect {
        reason: reason.into(),
    }
}
