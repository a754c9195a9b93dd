//! Option schemas and helpers shared by the unit tests.

use std::path::Path;

use renew_core::{OptionsBlock, OptionsSchema, PluginCategory, PluginRegistry, ProtectedString, Renewal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Manual {
    pub hosts: Vec<String>,
}

impl OptionsSchema for Manual {
    const CATEGORY: PluginCategory = PluginCategory::Target;
    const NAME: &'static str = "manual";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CsrFile {
    pub csr_path: String,
}

impl OptionsSchema for CsrFile {
    const CATEGORY: PluginCategory = PluginCategory::Target;
    const NAME: &'static str = "csr-file";
    const SKIPS_CSR: bool = true;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Http01 {}

impl OptionsSchema for Http01 {
    const CATEGORY: PluginCategory = PluginCategory::Validation;
    const NAME: &'static str = "http-01";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rsa {}

impl OptionsSchema for Rsa {
    const CATEGORY: PluginCategory = PluginCategory::Csr;
    const NAME: &'static str = "rsa";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PemFiles {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<ProtectedString>,
}

impl OptionsSchema for PemFiles {
    const CATEGORY: PluginCategory = PluginCategory::Store;
    const NAME: &'static str = "pem-files";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoInstallation {}

impl OptionsSchema for NoInstallation {
    const CATEGORY: PluginCategory = PluginCategory::Installation;
    const NAME: &'static str = "none";
}

pub fn registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry
        .register::<Manual>()
        .register::<CsrFile>()
        .register::<Http01>()
        .register::<Rsa>()
        .register::<PemFiles>()
        .register::<NoInstallation>();
    registry
}

/// Valid renewal for `<id>.example.com` with a secret store password.
pub fn renewal(id: &str) -> Renewal {
    Renewal::new(
        id,
        OptionsBlock::new(Manual {
            hosts: vec![format!("{id}.example.com")],
        }),
        OptionsBlock::new(Http01 {}),
        OptionsBlock::new(PemFiles {
            path: "/certs".into(),
            password: Some(ProtectedString::new("pem-password")),
        }),
        OptionsBlock::new(NoInstallation {}),
    )
    .with_csr(OptionsBlock::new(Rsa {}))
    .with_friendly_name(format!("{id}.example.com"))
}

/// Write a raw document as `<dir>/<stem>.renewal.json`.
pub fn write_raw(dir: &Path, stem: &str, document: &serde_json::Value) {
    let text = serde_json::to_string_pretty(document).expect("serialize");
    std::fs::write(dir.join(format!("{stem}.renewal.json")), text).expect("write");
}
