//! Option schemas shipped with the CLI.
//!
//! Only the persisted shape lives here; executing a plugin is somebody else's job.

use std::path::PathBuf;

use renew_core::{OptionsSchema, PluginCategory, PluginRegistry, ProtectedString};
use serde::{Deserialize, Serialize};

/// Hosts entered by hand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ManualTarget {
    pub hosts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_name: Option<String>,
}

impl OptionsSchema for ManualTarget {
    const CATEGORY: PluginCategory = PluginCategory::Target;
    const NAME: &'static str = "manual";
}

/// Certificate request supplied as a file, so no request generation is configured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CsrTarget {
    pub csr_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pk_file: Option<PathBuf>,
}

impl OptionsSchema for CsrTarget {
    const CATEGORY: PluginCategory = PluginCategory::Target;
    const NAME: &'static str = "csr";
    const SKIPS_CSR: bool = true;
}

/// HTTP challenge answered from a web root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct FileSystemValidation {
    pub path: PathBuf,
}

impl OptionsSchema for FileSystemValidation {
    const CATEGORY: PluginCategory = PluginCategory::Validation;
    const NAME: &'static str = "filesystem";
}

/// DNS challenge answered by an external script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScriptValidation {
    pub script: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_arguments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_arguments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<ProtectedString>,
}

impl OptionsSchema for ScriptValidation {
    const CATEGORY: PluginCategory = PluginCategory::Validation;
    const NAME: &'static str = "script";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct RsaCsr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_size: Option<u32>,
}

impl OptionsSchema for RsaCsr {
    const CATEGORY: PluginCategory = PluginCategory::Csr;
    const NAME: &'static str = "rsa";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct EcCsr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
}

impl OptionsSchema for EcCsr {
    const CATEGORY: PluginCategory = PluginCategory::Csr;
    const NAME: &'static str = "ec";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PemFilesStore {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<ProtectedString>,
}

impl OptionsSchema for PemFilesStore {
    const CATEGORY: PluginCategory = PluginCategory::Store;
    const NAME: &'static str = "pem-files";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CertificateStore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
}

impl OptionsSchema for CertificateStore {
    const CATEGORY: PluginCategory = PluginCategory::Store;
    const NAME: &'static str = "certificate-store";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NoInstallation {}

impl OptionsSchema for NoInstallation {
    const CATEGORY: PluginCategory = PluginCategory::Installation;
    const NAME: &'static str = "none";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ScriptInstallation {
    pub script: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl OptionsSchema for ScriptInstallation {
    const CATEGORY: PluginCategory = PluginCategory::Installation;
    const NAME: &'static str = "script";
}

/// Registry with every schema above.
pub fn builtin_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry
        .register::<ManualTarget>()
        .register::<CsrTarget>()
        .register::<FileSystemValidation>()
        .register::<ScriptValidation>()
        .register::<RsaCsr>()
        .register::<EcCsr>()
        .register::<PemFilesStore>()
        .register::<CertificateStore>()
        .register::<NoInstallation>()
        .register::<ScriptInstallation>();
    registry
}
