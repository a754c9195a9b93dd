use std::{cell::RefCell, fmt, sync::Arc};

use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors produced while sealing or opening secret fields.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecretError {
    /// A `ProtectedString` crossed the serialization boundary outside a protector scope.
    #[error("no secret protector in scope")]
    NoProtector,
    /// The protector could not produce a stored form.
    #[error("failed to protect secret: {reason}")]
    Protect { reason: String },
    /// The stored form could not be turned back into plaintext.
    #[error("failed to unprotect secret: {reason}")]
    Unprotect { reason: String },
}

/// Converts secret strings between their in-memory and at-rest forms.
///
/// `protect` is applied when a record is written, `unprotect` when it is read.
/// Implementations decide the envelope format; values they do not recognise as an
/// envelope are expected to be passed through as plaintext so older files stay readable.
pub trait SecretProtector: Send + Sync {
    fn protect(&self, plaintext: &str) -> Result<String, SecretError>;

    fn unprotect(&self, stored: &str) -> Result<String, SecretError>;
}

thread_local! {
    static ACTIVE: RefCell<Option<Arc<dyn SecretProtector>>> = const { RefCell::new(None) };
    static LAST_FAILURE: RefCell<Option<SecretError>> = const { RefCell::new(None) };
}

/// Run `f` with `protector` handling every `ProtectedString` (de)serialized on this thread.
///
/// Scopes nest; the previous protector is restored when `f` returns or unwinds.
pub fn with_protector<R>(protector: Arc<dyn SecretProtector>, f: impl FnOnce() -> R) -> R {
    let previous = ACTIVE.with(|slot| slot.replace(Some(protector)));
    LAST_FAILURE.with(|slot| slot.take());
    let _restore = RestoreOnDrop(previous);
    f()
}

/// The secret failure behind the last serde error raised on this thread, if any.
///
/// serde only carries a message; this keeps the typed error for the caller.
pub(crate) fn take_failure() -> Option<SecretError> {
    LAST_FAILURE.with(|slot| slot.take())
}

fn record(err: SecretError) -> SecretError {
    LAST_FAILURE.with(|slot| *slot.borrow_mut() = Some(err.clone()));
    err
}

struct RestoreOnDrop(Option<Arc<dyn SecretProtector>>);

impl Drop for RestoreOnDrop {
    fn drop(&mut self) {
        let previous = self.0.take();
        ACTIVE.with(|slot| *slot.borrow_mut() = previous);
    }
}

fn active() -> Result<Arc<dyn SecretProtector>, SecretError> {
    ACTIVE
        .with(|slot| slot.borrow().clone())
        .ok_or(SecretError::NoProtector)
}

/// A sensitive string that is only ever written to disk through a [`SecretProtector`].
///
/// Holds plaintext in memory; `Debug` never prints it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProtectedString(String);

impl ProtectedString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Plaintext for use by the caller.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ProtectedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProtectedString(***)")
    }
}

impl From<&str> for ProtectedString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for ProtectedString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let stored = active()
            .and_then(|protector| protector.protect(&self.0))
            .map_err(|err| ser::Error::custom(record(err)))?;
        serializer.serialize_str(&stored)
    }
}

impl<'de> Deserialize<'de> for ProtectedString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let stored = String::deserialize(deserializer)?;
        active()
            .and_then(|protector| protector.unprotect(&stored))
            .map(ProtectedString)
            .map_err(|err| de::Error::custom(record(err)))
    }
}

/// Reversible masking protector for tests and smoke runs.
/// This is not cryptographically secure; production code uses the AES-GCM envelope.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaskingProtector;

const MASK_PREFIX: &str = "mask:";
const MASK_BYTE: u8 = 0xA5;

impl SecretProtector for MaskingProtector {
    fn protect(&self, plaintext: &str) -> Result<String, SecretError> {
        let masked: String = plaintext
            .bytes()
            .map(|b| format!("{:02x}", b ^ MASK_BYTE))
            .collect();
        Ok(format!("{MASK_PREFIX}{masked}"))
    }

    fn unprotect(&self, stored: &str) -> Result<String, SecretError> {
        let Some(hex) = stored.strip_prefix(MASK_PREFIX) else {
            return Ok(stored.to_string());
        };
        if hex.len() % 2 != 0 {
            return Err(SecretError::Unprotect {
                reason: "odd-length mask payload".to_string(),
            });
        }
        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&hex[i..i + 2], 16)
                    .map(|b| b ^ MASK_BYTE)
                    .map_err(|e| SecretError::Unprotect {
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<u8>, _>>()?;
        String::from_utf8(bytes).map_err(|e| SecretError::Unprotect {
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    struct Credentials {
        user: String,
        password: ProtectedString,
    }

    #[test]
    fn masking_round_trips_and_hides_plaintext() {
        let protector = MaskingProtector;
        let stored = protector.protect("hunter2").expect("protect");
        assert!(stored.starts_with(MASK_PREFIX));
        assert!(!stored.contains("hunter2"));
        assert_eq!(protector.unprotect(&stored).expect("unprotect"), "hunter2");
    }

    #[test]
    fn masking_passes_plaintext_through() {
        let plain = MaskingProtector.unprotect("legacy").expect("unprotect");
        assert_eq!(plain, "legacy");
    }

    #[test]
    fn fields_are_converted_inside_scope() {
        let creds = Credentials {
            user: "admin".into(),
            password: ProtectedString::new("s3cret"),
        };
        let json = with_protector(Arc::new(MaskingProtector), || {
            serde_json::to_string(&creds).expect("serialize")
        });
        assert!(json.contains("\"user\":\"admin\""));
        assert!(!json.contains("s3cret"));

        let back: Credentials = with_protector(Arc::new(MaskingProtector), || {
            serde_json::from_str(&json).expect("deserialize")
        });
        assert_eq!(back.password.expose(), "s3cret");
    }

    #[test]
    fn serializing_without_scope_fails() {
        let err = serde_json::to_string(&ProtectedString::new("x")).expect_err("no scope");
        assert!(err.to_string().contains("no secret protector in scope"));
    }

    #[test]
    fn scope_is_restored_after_nested_call() {
        with_protector(Arc::new(MaskingProtector), || {
            with_protector(Arc::new(MaskingProtector), || {});
            assert!(active().is_ok());
        });
        assert_eq!(active().err(), Some(SecretError::NoProtector));
    }

    #[test]
    fn failures_are_kept_for_the_caller() {
        let result: Result<Credentials, _> = with_protector(Arc::new(MaskingProtector), || {
            serde_json::from_str(r#"{ "user": "admin", "password": "mask:abc" }"#)
        });
        assert!(result.is_err());
        assert!(matches!(take_failure(), Some(SecretError::Unprotect { .. })));
        assert_eq!(take_failure(), None, "failure is taken once");
    }

    #[test]
    fn debug_is_redacted() {
        let rendered = format!("{:?}", ProtectedString::new("token"));
        assert_eq!(rendered, "ProtectedString(***)");
    }
}
