use anyhow::Result;

use redoubt::config::{is_encrypted, Config, ConfigStore, RepoConfig};

const PASSWORD: &str = "test";

fn sample_config() -> Config {
    let mut config = Config::default();
    config.repositories.insert(
        "primary".into(),
        RepoConfig {
            url: "/tmp/redoubt-primary".into(),
            compression: "gzip".into(),
            encryption: "aes".into(),
            tolerance: 0,
        },
    );
    config
}

#[test]
fn save_and_load_encrypted_config() -> Result<()> {
    let td = tempfile::tempdir()?;
    let path = td.path().join("redoubt-crypto.conf");
    let url = format!("crypto://{}@{}", PASSWORD, path.display());

    let store = ConfigStore::open(&url)?;
    store.save(&sample_config())?;
    assert!(path.exists());
    assert!(is_encrypted(&path)?);

    let loaded = store.load()?;
    let repo = loaded
        .repositories
        .get("primary")
        .expect("repository 'primary' should exist");
    assert_eq!(repo.url, "/tmp/redoubt-primary");
    assert_eq!(repo.compression, "gzip");
    assert_eq!(repo.encryption, "aes");
    assert_eq!(repo.tolerance, 0);
    Ok(())
}

#[test]
fn wrong_password_surfaces_exact_cipher_error() -> Result<()> {
    let td = tempfile::tempdir()?;
    let path = td.path().join("redoubt-crypto.conf");

    let store = ConfigStore::open(&format!("crypto://{}@{}", PASSWORD, path.display()))?;
    store.save(&sample_config())?;

    let bad = ConfigStore::open(&format!("crypto://wrongpasswd@{}", path.display()))?;
    let err = bad.load().unwrap_err();
    assert_eq!(err.to_string(), "cipher: message authentication failed");
    Ok(())
}

#[test]
fn plain_store_roundtrips_without_header() -> Result<()> {
    let td = tempfile::tempdir()?;
    let path = td.path().join("redoubt.conf");

    let store = ConfigStore::open(path.to_str().unwrap())?;
    store.save(&sample_config())?;
    assert!(!is_encrypted(&path)?);

    let loaded = store.load()?;
    assert!(loaded.repositories.contains_key("primary"));
    Ok(())
}

#[test]
fn encrypted_file_is_not_loadable_as_plain_json() -> Result<()> {
    let td = tempfile::tempdir()?;
    let path = td.path().join("redoubt-crypto.conf");

    let store = ConfigStore::open(&format!("crypto://{}@{}", PASSWORD, path.display()))?;
    store.save(&sample_config())?;

    let plain = ConfigStore::open(path.to_str().unwrap())?;
    assert!(plain.load().is_err());
    Ok(())
}

#[test]
fn url_without_password_or_path_is_rejected() {
    assert!(ConfigStore::open("crypto://no-separator").is_err());
    assert!(ConfigStore::open("crypto://pass@").is_err());
}

#[test]
fn save_replaces_existing_file_atomically() -> Result<()> {
    let td = tempfile::tempdir()?;
    let path = td.path().join("redoubt-crypto.conf");
    let url = format!("crypto://{}@{}", PASSWORD, path.display());

    let store = ConfigStore::open(&url)?;
    store.save(&sample_config())?;

    let mut updated = sample_config();
    updated
        .repositories
        .get_mut("primary")
        .expect("primary repo")
        .tolerance = 2;
    store.save(&updated)?;

    let loaded = store.load()?;
    assert_eq!(loaded.repositories["primary"].tolerance, 2);
    // No temp file left behind.
    let leftovers: Vec<_> = std::fs::read_dir(td.path())?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}
