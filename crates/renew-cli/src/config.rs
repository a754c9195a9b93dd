use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};

/// User-level configuration loaded from `~/.config/renew/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Override for the directory holding `*.renewal.json` files.
    pub renewals_dir: Option<PathBuf>,
    /// How secret fields are protected at rest.
    #[serde(default)]
    pub secrets: SecretsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SecretsConfig {
    /// Seal secrets in an encrypted envelope (default). When false they are written in clear.
    pub encrypt: Option<bool>,
    pub keyring_service: Option<String>,
    pub keyring_account: Option<String>,
}

impl SecretsConfig {
    pub fn encrypt(&self) -> bool {
        self.encrypt.unwrap_or(true)
    }

    pub fn keyring_service(&self) -> &str {
        self.keyring_service.as_deref().unwrap_or("renew-cli")
    }

    pub fn keyring_account(&self) -> &str {
        self.keyring_account.as_deref().unwrap_or("secret-key")
    }
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<Config> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("renew").join("config.toml"))
}

/// Write the given config to the default path unless a file is already there.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    write_if_missing(config, &default_path()?)
}

fn write_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_default_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_from_path(dir.path().join("config.toml")).expect("load");
        assert_eq!(cfg, Config::default());
        assert!(cfg.secrets.encrypt());
        assert_eq!(cfg.secrets.keyring_service(), "renew-cli");
    }

    #[test]
    fn parses_custom_config() {
        let contents = r#"
            renewals_dir = "/srv/renewals"
            [secrets]
            encrypt = false
            keyring_service = "acme"
            keyring_account = "renewals"
        "#;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).expect("write temp config");

        let cfg = load_from_path(&path).expect("load");
        assert_eq!(
            cfg,
            Config {
                renewals_dir: Some(PathBuf::from("/srv/renewals")),
                secrets: SecretsConfig {
                    encrypt: Some(false),
                    keyring_service: Some("acme".into()),
                    keyring_account: Some("renewals".into()),
                },
            }
        );
        assert!(!cfg.secrets.encrypt());
    }

    #[test]
    fn empty_file_is_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "  \n").expect("write");
        assert_eq!(load_from_path(&path).expect("load"), Config::default());
    }

    #[test]
    fn write_creates_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            renewals_dir: Some(PathBuf::from("/srv/renewals")),
            secrets: SecretsConfig::default(),
        };

        write_if_missing(&cfg, &path).expect("write should succeed");
        let other = Config::default();
        let second = write_if_missing(&other, &path).expect("second write ok");
        assert_eq!(second, path);
        let loaded = load_from_path(&path).expect("load");
        assert_eq!(loaded, cfg, "existing file must not be clobbered");
    }
}
