//! Unit tests for configuration module
//!
//! Tests configuration parsing, validation, saving and defaulting of
//! missing sections.

use super::*;
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_default_configuration_is_valid() {
    let config = KansoConfig::default();

    assert_eq!(config.window.title, "kanso");
    assert_eq!(config.window.default_width, 1280);
    assert_eq!(config.window.default_height, 720);
    assert_eq!(config.buffers.count, 3);
    assert_eq!(config.render.step, 8);
    assert_eq!(config.input.speed, 5);
    assert!(config.validate().is_ok());
}

#[test]
fn test_configuration_from_file() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("kanso.toml");

    let test_config = r#"
[window]
title = "gradient"
default_width = 800
default_height = 600

[buffers]
count = 4

[render]
step = 2

[input]
speed = 9
"#;
    fs::write(&file_path, test_config)?;

    let config = KansoConfig::load(&file_path)?;
    assert_eq!(config.window.title, "gradient");
    assert_eq!(config.window.default_width, 800);
    assert_eq!(config.window.default_height, 600);
    assert_eq!(config.buffers.count, 4);
    assert_eq!(config.render.step, 2);
    assert_eq!(config.input.speed, 9);

    Ok(())
}

#[test]
fn test_missing_sections_take_defaults() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("partial.toml");
    fs::write(&file_path, "[window]\ntitle = \"partial\"\n")?;

    let config = KansoConfig::load(&file_path)?;
    assert_eq!(config.window.title, "partial");
    assert_eq!(config.window.default_width, STD_WIDTH);
    assert_eq!(config.buffers, BuffersConfig::default());
    assert_eq!(config.render, RenderConfig::default());
    assert_eq!(config.input, InputConfig::default());

    Ok(())
}

#[test]
fn test_empty_file_is_default_configuration() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("empty.toml");
    fs::write(&file_path, "")?;

    assert_eq!(KansoConfig::load(&file_path)?, KansoConfig::default());
    Ok(())
}

#[test]
fn test_malformed_toml_handling() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("broken.toml");
    fs::write(&file_path, "[window\ntitle = ").unwrap();

    let err = KansoConfig::load(&file_path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let err = KansoConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_configuration_validation() {
    let mut config = KansoConfig::default();
    config.buffers.count = 1;
    assert!(config.validate().is_err());

    let mut config = KansoConfig::default();
    config.buffers.count = 2;
    assert!(config.validate().is_ok());

    let mut config = KansoConfig::default();
    config.window.default_height = 0;
    assert!(config.validate().is_err());

    let mut config = KansoConfig::default();
    config.render.step = 0;
    assert!(config.validate().is_err());

    // Negative steps animate backwards and are fine.
    let mut config = KansoConfig::default();
    config.render.step = -4;
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_keeps_invalid_buffer_count_for_validation() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("single.toml");
    fs::write(&file_path, "[buffers]\ncount = 1\n")?;

    let config = KansoConfig::load(&file_path)?;
    assert_eq!(config.buffers.count, 1);
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("buffer count"));
    Ok(())
}

#[test]
fn test_save_then_load() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("saved.toml");

    let mut config = KansoConfig::default();
    config.window.title = "saved".to_string();
    config.buffers.count = 5;
    config.save(&file_path)?;

    let contents = fs::read_to_string(&file_path)?;
    assert!(contents.contains("[buffers]"));
    assert_eq!(KansoConfig::load(&file_path)?, config);
    Ok(())
}

#[test]
fn test_expand_home() -> Result<()> {
    let home = std::env::var("HOME")?;
    assert_eq!(
        expand_home("~/.config/kanso/kanso.toml")?,
        Path::new(&home).join(".config/kanso/kanso.toml")
    );
    assert_eq!(expand_home("/etc/kanso.toml")?, PathBuf::from("/etc/kanso.toml"));
    assert_eq!(expand_home("relative.toml")?, PathBuf::from("relative.toml"));
    Ok(())
}
