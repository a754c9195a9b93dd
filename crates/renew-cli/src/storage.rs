use std::{path::PathBuf, sync::Arc};

use crate::{config::Config, plugins::builtin_registry};
use color_eyre::Result;
use dirs::data_dir;
use renew_storage::{
    envelope::AesGcmProtector,
    key_provider::{KeyProvider, KeySet, KeyringProvider},
};
use renew_store::RenewalStore;
use tracing::debug;

/// Resolve the default renewal directory.
pub fn default_renewals_dir() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("renew").join("renewals"))
}

pub fn renewals_dir(config: &Config) -> Result<PathBuf> {
    match &config.renewals_dir {
        Some(dir) => Ok(dir.clone()),
        None => default_renewals_dir(),
    }
}

/// Key provider backed by the OS keychain, named by config.
pub fn key_provider(config: &Config) -> KeyringProvider {
    KeyringProvider::new(
        config.secrets.keyring_service(),
        config.secrets.keyring_account(),
    )
}

/// Envelope sealing with the current key, honouring the config's encrypt switch.
pub fn protector(config: &Config, keys: KeySet) -> AesGcmProtector {
    AesGcmProtector::from_keys(keys).sealing(config.secrets.encrypt())
}

pub fn store_with_protector(config: &Config, protector: AesGcmProtector) -> Result<RenewalStore> {
    let root = renewals_dir(config)?;
    debug!(?root, "opening renewal store");
    Ok(RenewalStore::new(
        root,
        Arc::new(builtin_registry()),
        Arc::new(protector),
    ))
}

/// Build a store whose secrets use the provider's stored keys.
pub async fn open_store<P: KeyProvider>(config: &Config, provider: &P) -> Result<RenewalStore> {
    let keys = provider
        .get_or_create()
        .await
        .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))?;
    store_with_protector(config, protector(config, keys))
}

/// Config rooted at a temp dir, for tests.
#[cfg(test)]
pub fn test_config(root: impl Into<PathBuf>) -> Config {
    Config {
        renewals_dir: Some(root.into()),
        ..Config::default()
    }
}
