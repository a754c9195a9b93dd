use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{plugins::OptionsBlock, secret::ProtectedString};

/// Outcome of one execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct RenewResult {
    pub success: bool,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbprint: Option<String>,
}

impl RenewResult {
    pub fn success(thumbprint: Option<String>) -> Self {
        Self {
            success: true,
            date: Utc::now(),
            error_messages: Vec::new(),
            thumbprint,
        }
    }

    pub fn failure(error_messages: Vec<String>) -> Self {
        Self {
            success: false,
            date: Utc::now(),
            error_messages,
            thumbprint: None,
        }
    }
}

/// A scheduled, recurring renewal and its plugin configuration.
#[derive(Debug, Clone)]
pub struct Renewal {
    /// Identity key; also the base name of the backing file.
    pub id: String,
    pub friendly_name: Option<String>,
    pub last_friendly_name: Option<String>,
    /// Next due date.
    pub date: DateTime<Utc>,
    /// Execution outcomes, oldest first.
    pub history: Vec<RenewResult>,
    pub target: OptionsBlock,
    pub validation: OptionsBlock,
    /// Absent only when the target supplies its own certificate request.
    pub csr: Option<OptionsBlock>,
    pub store: OptionsBlock,
    pub installation: OptionsBlock,
    pub pfx_password: Option<ProtectedString>,
}

impl Renewal {
    pub fn new(
        id: impl Into<String>,
        target: OptionsBlock,
        validation: OptionsBlock,
        store: OptionsBlock,
        installation: OptionsBlock,
    ) -> Self {
        Self {
            id: id.into(),
            friendly_name: None,
            last_friendly_name: None,
            date: Utc::now(),
            history: Vec::new(),
            target,
            validation,
            csr: None,
            store,
            installation,
            pfx_password: None,
        }
    }

    pub fn with_csr(mut self, csr: OptionsBlock) -> Self {
        self.csr = Some(csr);
        self
    }

    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.last_friendly_name = Some(name.clone());
        self.friendly_name = Some(name);
        self
    }

    pub fn due_at(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    /// Name shown to users: the last known friendly name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.last_friendly_name
            .as_deref()
            .or(self.friendly_name.as_deref())
            .unwrap_or(&self.id)
    }

    pub fn last_result(&self) -> Option<&RenewResult> {
        self.history.last()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::plugins::{OptionsSchema, PluginCategory};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Noop;

    impl OptionsSchema for Noop {
        const CATEGORY: PluginCategory = PluginCategory::Installation;
        const NAME: &'static str = "noop";
    }

    fn renewal() -> Renewal {
        Renewal::new(
            "r1",
            OptionsBlock::new(Noop),
            OptionsBlock::new(Noop),
            OptionsBlock::new(Noop),
            OptionsBlock::new(Noop),
        )
    }

    #[test]
    fn display_name_prefers_last_friendly_name() {
        let mut r = renewal();
        assert_eq!(r.display_name(), "r1");

        r = r.with_friendly_name("example.com");
        assert_eq!(r.display_name(), "example.com");

        r.last_friendly_name = Some("www.example.com".into());
        assert_eq!(r.display_name(), "www.example.com");
    }

    #[test]
    fn last_result_is_newest_entry() {
        let mut r = renewal();
        assert!(r.last_result().is_none());
        r.history.push(RenewResult::failure(vec!["timeout".into()]));
        r.history.push(RenewResult::success(Some("AB12".into())));
        assert!(r.last_result().expect("result").success);
    }

    #[test]
    fn result_omits_empty_fields() {
        let result = RenewResult::success(None);
        let value = serde_json::to_value(&result).expect("serialize");
        assert_eq!(value["Success"], json!(true));
        assert!(value.get("ErrorMessages").is_none());
        assert!(value.get("Thumbprint").is_none());
    }
}
