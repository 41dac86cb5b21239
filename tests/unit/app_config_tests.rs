/*!
 * Tests for application configuration
 */

use anyhow::Result;
use bisub::app_config::Config;
use tempfile::TempDir;

/// Test default configuration values
#[test]
fn test_default_config_shouldCarryPipelineDefaults() {
    let config = Config::default();

    assert_eq!(config.source_language, "en");
    assert_eq!(config.target_language, "zh-TW");
    assert_eq!(config.jobs.ttl_secs, 1800);
    assert_eq!(config.jobs.sweep_interval_secs, 300);
    assert_eq!(config.jobs.keepalive_secs, 30);
    assert_eq!(config.translation.batch_size, 10);
    assert!(config.jobs.work_root.is_none());
}

/// Test saving and reloading a configuration file
#[test]
fn test_config_save_and_load_shouldRoundTrip() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("conf.json");

    let mut config = Config::default();
    config.target_language = "de".to_string();
    config.jobs.ttl_secs = 120;
    config.translation.model = "test-model".to_string();
    config.save_to_file(&path)?;

    let loaded = Config::from_file(&path)?;
    assert_eq!(loaded.target_language, "de");
    assert_eq!(loaded.jobs.ttl_secs, 120);
    assert_eq!(loaded.translation.model, "test-model");

    Ok(())
}

/// Test that missing fields fall back to defaults when loading
#[test]
fn test_config_load_withPartialFile_shouldFillDefaults() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("conf.json");
    std::fs::write(&path, r#"{"target_language": "ja"}"#)?;

    let loaded = Config::from_file(&path)?;
    assert_eq!(loaded.target_language, "ja");
    assert_eq!(loaded.source_language, "en");
    assert_eq!(loaded.jobs.sweep_interval_secs, 300);

    Ok(())
}

/// Test validation of language codes
#[test]
fn test_config_validate_withBadLanguage_shouldFail() {
    let mut config = Config::default();
    config.source_language = "zz".to_string();
    assert!(config.validate().is_err());
}

/// Test validation of region-tagged language codes
#[test]
fn test_config_validate_withRegionTaggedLanguage_shouldSucceed() {
    let mut config = Config::default();
    config.target_language = "zh-TW".to_string();
    assert!(config.validate().is_ok());
}

/// Test validation of degenerate job settings
#[test]
fn test_config_validate_withZeroTtl_shouldFail() {
    let mut config = Config::default();
    config.jobs.ttl_secs = 0;
    assert!(config.validate().is_err());
}

/// Test validation of degenerate translation settings
#[test]
fn test_config_validate_withZeroBatchSize_shouldFail() {
    let mut config = Config::default();
    config.translation.batch_size = 0;
    assert!(config.validate().is_err());
}
