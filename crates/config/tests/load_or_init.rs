use std::fs;

use anyhow::Result;
use llmserve_config::{AppConfig, ConfigOverrides, save_config};
use llmserve_core::PromptTemplate;

#[test]
fn missing_file_is_created_with_defaults() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("config.toml");

    let (cfg, descriptor) = AppConfig::load_or_init(Some(&path))?;

    assert!(descriptor.created);
    assert_eq!(descriptor.path, path);
    assert!(path.is_file());
    assert_eq!(cfg.models.active, "gemma-3-1b");

    let (reloaded, descriptor) = AppConfig::load_or_init(Some(&path))?;
    assert!(!descriptor.created);
    assert_eq!(reloaded.server.port, cfg.server.port);
    assert_eq!(reloaded.inference.decode, cfg.inference.decode);
    Ok(())
}

#[test]
fn partial_file_keeps_defaults_for_missing_keys() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[models]
active = "tiny"

[models.entries.tiny]
kind = "llama"
weights = "/opt/tiny.gguf"

[models.entries.tiny.defaults.inference]
template = "chatml"
max_new_tokens = 32

[inference]
temperature = 0.0
context_length = 512

[server]
port = 8080
"#,
    )?;

    let (cfg, _) = AppConfig::load_or_init(Some(&path))?;

    assert_eq!(cfg.models.active, "tiny");
    assert!(cfg.models.entries.contains_key("gemma-3-1b"));
    assert_eq!(cfg.inference.decode.temperature, 0.0);
    assert_eq!(cfg.inference.decode.top_k, Some(40));
    assert_eq!(cfg.inference.context_length, 512);
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.server.host, "0.0.0.0");

    let tiny = &cfg.models.entries["tiny"];
    assert_eq!(tiny.defaults.inference.template, Some(PromptTemplate::ChatMl));
    assert_eq!(tiny.defaults.inference.decode.max_new_tokens, Some(32));
    Ok(())
}

#[test]
fn invalid_toml_reports_the_path() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.toml");
    fs::write(&path, "[server\nport = ")?;

    let err = AppConfig::load_or_init(Some(&path)).unwrap_err();
    assert!(format!("{err:#}").contains("config.toml"));
    Ok(())
}

#[test]
fn load_with_overrides_applies_cli_selection() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.toml");
    let overrides = ConfigOverrides {
        config_path: Some(path.clone()),
        model_id: Some("other".to_string()),
        ..ConfigOverrides::default()
    };

    let (cfg, _) = AppConfig::load_with_overrides(&overrides)?;
    assert_eq!(cfg.models.active, "other");
    assert!(cfg.models.entries.contains_key("other"));
    Ok(())
}

#[test]
fn saved_config_round_trips_through_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.toml");
    let (mut cfg, descriptor) = AppConfig::load_or_init(Some(&path))?;

    cfg.server.queue_capacity = 7;
    cfg.server.warmup = None;
    cfg.inference.decode.top_k = None;
    cfg.inference.decode.top_p = None;
    save_config(&descriptor, &cfg)?;

    let (reloaded, _) = AppConfig::load_or_init(Some(&path))?;
    assert_eq!(reloaded.server.queue_capacity, 7);
    assert_eq!(reloaded.server.warmup, None);
    assert_eq!(reloaded.inference.decode.top_k, None);
    assert_eq!(reloaded.inference.decode.top_p, None);
    Ok(())
}

#[test]
fn empty_warmup_in_the_file_disables_warmup() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.toml");
    fs::write(&path, "[server]\nwarmup = \"\"\n\n[inference]\ntop_k = 0\n")?;

    let (cfg, _) = AppConfig::load_or_init(Some(&path))?;
    assert_eq!(cfg.server.warmup, None);
    assert_eq!(cfg.inference.decode.top_k, None);
    assert_eq!(cfg.inference.decode.top_p, Some(0.95));
    Ok(())
}
