use std::{fs, path::Path};

use color_eyre::Result;
use renew_core::{PluginCategory, Renewal};
use renew_storage::key_provider::{KeyMaterial, KeyProvider};
use renew_store::RenewalStore;
use tracing::{info, warn};

use crate::{config::Config, storage};

fn eyre(err: impl ToString) -> color_eyre::Report {
    color_eyre::eyre::eyre!(err.to_string())
}

pub fn list(store: &RenewalStore, id: Option<&str>, name: Option<&str>) -> Result<()> {
    let renewals = store.list(id, name).map_err(eyre)?;
    if renewals.is_empty() {
        println!("No renewals found in {}.", store.layout().dir().display());
        return Ok(());
    }
    for renewal in &renewals {
        println!("{}", summary_line(renewal));
    }
    Ok(())
}

fn summary_line(renewal: &Renewal) -> String {
    let status = match renewal.last_result() {
        Some(result) if result.success => "ok",
        Some(_) => "failed",
        None => "never run",
    };
    format!(
        "{} [due {}] {} ({}, {} runs)",
        renewal.id,
        renewal.date.format("%Y-%m-%d"),
        renewal.display_name(),
        status,
        renewal.history.len()
    )
}

pub fn import(store: &RenewalStore, path: &Path) -> Result<()> {
    let text = fs::read_to_string(path)?;
    let renewal = store.read_renewal(&text).map_err(eyre)?;
    let id = renewal.id.clone();
    store.import(renewal).map_err(eyre)?;
    println!("Imported renewal {id}.");
    Ok(())
}

pub fn cancel(store: &RenewalStore, id: &str) -> Result<()> {
    let matches = store.list(Some(id), None).map_err(eyre)?;
    if matches.is_empty() {
        println!("No renewal with id {id}.");
        return Ok(());
    }
    for renewal in &matches {
        store.cancel(renewal).map_err(eyre)?;
        println!("Cancelled {}.", renewal.display_name());
    }
    Ok(())
}

pub fn clear(store: &RenewalStore, confirmed: bool) -> Result<()> {
    let count = store.list(None, None).map_err(eyre)?.len();
    if !confirmed {
        println!("This would cancel {count} renewals. Re-run with --yes to proceed.");
        return Ok(());
    }
    store.clear_all().map_err(eyre)?;
    println!("Cancelled {count} renewals.");
    Ok(())
}

/// Rewrite every renewal; with `rotate_key`, under a freshly generated key.
///
/// The new key is stored before the first file is written and older keys stay stored
/// until a pass rewrites every file, so an interrupted run can simply be repeated.
pub async fn encrypt<P: KeyProvider>(config: &Config, provider: &P, rotate_key: bool) -> Result<()> {
    if rotate_key {
        let keys = provider
            .rotate(KeyMaterial::generate())
            .await
            .map_err(eyre)?;
        info!(key_id = %keys.current.id, previous = keys.previous.len(), "rotated secret key");
    }
    let store = storage::open_store(config, provider).await?;
    rewrite_all(&store, provider).await
}

async fn rewrite_all<P: KeyProvider>(store: &RenewalStore, provider: &P) -> Result<()> {
    let count = store.list(None, None).map_err(eyre)?.len();
    store.encrypt().map_err(eyre)?;
    println!("Rewrote {count} renewals.");

    let skipped = store.skipped().map_err(eyre)?;
    if skipped.is_empty() {
        provider.retire_previous().await.map_err(eyre)?;
        return Ok(());
    }
    for path in &skipped {
        warn!(file = %path.display(), "renewal did not load; keeping previous keys");
    }
    println!(
        "{} files did not load and were not rewritten; previous keys are kept.",
        skipped.len()
    );
    Ok(())
}

pub fn plugins(store: &RenewalStore) {
    let registry = store.registry();
    for category in PluginCategory::ALL {
        let names: Vec<_> = registry.plugins(category).collect();
        println!("{category:<13} {}", names.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use renew_core::{OptionsBlock, ProtectedString, RenewResult};
    use renew_storage::key_provider::InMemoryKeyProvider;

    use super::*;
    use crate::plugins::{FileSystemValidation, ManualTarget, NoInstallation, PemFilesStore, RsaCsr};

    fn sample(id: &str) -> Renewal {
        Renewal::new(
            id,
            OptionsBlock::new(ManualTarget {
                hosts: vec!["example.com".into()],
                common_name: None,
            }),
            OptionsBlock::new(FileSystemValidation {
                path: "/var/www".into(),
            }),
            OptionsBlock::new(PemFilesStore {
                path: "/etc/certs".into(),
                password: Some(ProtectedString::new("pem-secret")),
            }),
            OptionsBlock::new(NoInstallation {}),
        )
        .with_csr(OptionsBlock::new(RsaCsr { key_size: Some(3072) }))
        .with_friendly_name("example.com")
    }

    #[test]
    fn summary_reports_last_result() {
        let mut renewal = sample("abc");
        assert!(summary_line(&renewal).contains("never run"));
        renewal.history.push(RenewResult::failure(vec!["boom".into()]));
        let line = summary_line(&renewal);
        assert!(line.starts_with("abc [due "));
        assert!(line.contains("example.com (failed, 1 runs)"));
    }

    #[tokio::test]
    async fn import_cancel_and_clear_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = storage::test_config(dir.path().join("renewals"));
        let provider = InMemoryKeyProvider::default();
        let store = storage::open_store(&config, &provider).await.expect("store");

        store.import(sample("one")).expect("seed");
        let exported = dir.path().join("two.json");
        let text = fs::read_to_string(store.layout().path_for("one"))
            .expect("read")
            .replace("\"one\"", "\"two\"");
        fs::write(&exported, text).expect("write");

        import(&store, &exported).expect("import");
        assert_eq!(store.list(None, None).expect("list").len(), 2);

        cancel(&store, "ONE").expect("cancel");
        assert!(!store.layout().path_for("one").exists());

        clear(&store, false).expect("dry run");
        assert_eq!(store.list(None, None).expect("list").len(), 1);
        clear(&store, true).expect("clear");
        assert!(store.list(None, None).expect("list").is_empty());
    }

    fn pem_password(renewal: &Renewal) -> &str {
        renewal
            .store
            .downcast_ref::<PemFilesStore>()
            .and_then(|s| s.password.as_ref())
            .map(|p| p.expose())
            .expect("password")
    }

    #[tokio::test]
    async fn encrypt_with_rotation_switches_key_after_rewrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = storage::test_config(dir.path());
        let provider = InMemoryKeyProvider::default();
        let old = provider.get_or_create().await.expect("key").current;
        storage::open_store(&config, &provider)
            .await
            .expect("store")
            .import(sample("rotate"))
            .expect("import");

        encrypt(&config, &provider, true).await.expect("encrypt");

        let keys = provider.get_or_create().await.expect("key");
        assert_ne!(keys.current.id, old.id);
        assert!(keys.previous.is_empty(), "a complete pass retires the old key");
        let text = fs::read_to_string(dir.path().join("rotate.renewal.json")).expect("read");
        assert!(text.contains(&keys.current.id));
        assert!(!text.contains("pem-secret"));

        let reopened = storage::open_store(&config, &provider).await.expect("store");
        let renewal = reopened.list(Some("rotate"), None).expect("list").remove(0);
        assert_eq!(pem_password(&renewal), "pem-secret");
    }

    #[tokio::test]
    async fn interrupted_rotation_keeps_every_record_readable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = storage::test_config(dir.path());
        let provider = InMemoryKeyProvider::default();
        let seed = storage::open_store(&config, &provider).await.expect("store");
        let now = chrono::Utc::now();
        seed.import(sample("early").due_at(now + chrono::Duration::days(1)))
            .expect("import");
        seed.import(sample("late").due_at(now + chrono::Duration::days(30)))
            .expect("import");
        let nested = dir.path().join("nested");
        fs::create_dir_all(&nested).expect("mkdir");
        let late_file = nested.join("late.renewal.json");
        fs::rename(dir.path().join("late.renewal.json"), &late_file).expect("move");
        let late_text = fs::read_to_string(&late_file).expect("read");

        // Rotate, load, then make the second write fail.
        provider
            .rotate(KeyMaterial::generate())
            .await
            .expect("rotate");
        let store = storage::open_store(&config, &provider).await.expect("store");
        assert_eq!(store.list(None, None).expect("list").len(), 2);
        fs::remove_dir_all(&nested).expect("rmdir");
        fs::write(&nested, "not a directory").expect("block");

        rewrite_all(&store, &provider)
            .await
            .expect_err("second write fails");
        let keys = provider.get_or_create().await.expect("keys");
        assert_eq!(keys.previous.len(), 1, "old key must survive a failed pass");

        fs::remove_file(&nested).expect("unblock");
        fs::create_dir_all(&nested).expect("mkdir");
        fs::write(&late_file, late_text).expect("restore");
        let readable = storage::open_store(&config, &provider).await.expect("store");
        let renewals = readable.list(None, None).expect("list");
        assert_eq!(renewals.len(), 2, "records under either key still load");
        assert!(renewals.iter().all(|r| pem_password(r) == "pem-secret"));

        encrypt(&config, &provider, false).await.expect("resume");
        let keys = provider.get_or_create().await.expect("keys");
        assert!(keys.previous.is_empty());
        for path in [dir.path().join("early.renewal.json"), late_file] {
            let text = fs::read_to_string(path).expect("read");
            assert!(text.contains(&keys.current.id));
        }
    }

    #[tokio::test]
    async fn rotation_keeps_old_key_for_files_that_did_not_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = storage::test_config(dir.path());
        let provider = InMemoryKeyProvider::default();
        storage::open_store(&config, &provider)
            .await
            .expect("store")
            .import(sample("dup"))
            .expect("import");
        let shadow = dir.path().join("z").join("dup.renewal.json");
        fs::create_dir_all(dir.path().join("z")).expect("mkdir");
        fs::copy(dir.path().join("dup.renewal.json"), &shadow).expect("copy");

        encrypt(&config, &provider, true).await.expect("encrypt");

        let keys = provider.get_or_create().await.expect("keys");
        assert_eq!(keys.previous.len(), 1);

        fs::remove_file(dir.path().join("dup.renewal.json")).expect("remove");
        let store = storage::open_store(&config, &provider).await.expect("store");
        let renewal = store.list(Some("dup"), None).expect("list").remove(0);
        assert_eq!(pem_password(&renewal), "pem-secret");
        assert!(store.skipped().expect("skipped").is_empty());
    }

    #[tokio::test]
    async fn encrypt_without_sealing_writes_clear_secrets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = storage::test_config(dir.path());
        let provider = InMemoryKeyProvider::default();
        storage::open_store(&config, &provider)
            .await
            .expect("store")
            .import(sample("plain"))
            .expect("import");

        config.secrets.encrypt = Some(false);
        encrypt(&config, &provider, false).await.expect("encrypt");

        let text = fs::read_to_string(dir.path().join("plain.renewal.json")).expect("read");
        assert!(text.contains("pem-secret"));
        assert!(!text.contains("enc:v1:"));
    }
}
