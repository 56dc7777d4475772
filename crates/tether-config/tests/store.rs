use tether_config::{ClientConfig, ConfigError, JsonServerStore, ServerProfile, ServerStore};

fn store_in(dir: &tempfile::TempDir) -> JsonServerStore {
    JsonServerStore::new(dir.path().join("nested").join("tether.json"))
}

#[tokio::test]
async fn missing_file_loads_defaults() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_in(&dir);
    assert_eq!(store.load().await?, ClientConfig::default());
    assert!(!store.path().exists());
    Ok(())
}

#[tokio::test]
async fn profiles_round_trip_through_the_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_in(&dir);

    let mut profile = ServerProfile::new("home", "nas.local");
    profile.username = Some("admin".into());
    profile.password = Some("secret".into());
    store.upsert(profile.clone()).await?;
    store.upsert(ServerProfile::new("seedbox", "seed.example")).await?;
    store.set_active(Some("home")).await?;

    let reloaded = JsonServerStore::new(store.path()).load().await?;
    assert_eq!(reloaded.servers.len(), 2);
    assert_eq!(reloaded.server("home"), Some(&profile));
    assert_eq!(reloaded.active_server.as_deref(), Some("home"));

    let raw = std::fs::read_to_string(store.path())?;
    assert!(raw.contains("\"active_server\": \"home\""));
    Ok(())
}

#[tokio::test]
async fn upsert_replaces_a_profile_in_place() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_in(&dir);
    store.upsert(ServerProfile::new("home", "nas.local")).await?;
    store.upsert(ServerProfile::new("seedbox", "seed.example")).await?;

    let mut moved = ServerProfile::new("home", "10.0.0.2");
    moved.port = 9092;
    let config = store.upsert(moved).await?;
    let names: Vec<_> = config.servers.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["home", "seedbox"]);
    assert_eq!(config.servers[0].host, "10.0.0.2");
    Ok(())
}

#[tokio::test]
async fn removing_the_active_profile_clears_the_selection() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_in(&dir);
    store.upsert(ServerProfile::new("home", "nas.local")).await?;
    store.set_active(Some("home")).await?;

    let config = store.remove("home").await?;
    assert!(config.servers.is_empty());
    assert!(config.active_server.is_none());
    assert!(matches!(
        store.remove("home").await,
        Err(ConfigError::UnknownServer { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn invalid_profiles_are_not_persisted() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = store_in(&dir);
    let mut broken = ServerProfile::new("home", "nas.local");
    broken.rpc_path = "rpc".into();
    assert!(matches!(
        store.upsert(broken).await,
        Err(ConfigError::InvalidField { .. })
    ));
    assert!(!store.path().exists());
    assert!(matches!(
        store.set_active(Some("office")).await,
        Err(ConfigError::UnknownServer { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn malformed_documents_report_their_path() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("tether.json");
    std::fs::write(&path, "{ not json")?;
    let result = JsonServerStore::new(&path).load().await;
    assert!(matches!(result, Err(ConfigError::Parse { path: reported, .. }) if reported == path));
    Ok(())
}
