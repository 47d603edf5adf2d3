use mvextras::batch::BatchingMode;
use mvextras::config::{AppConfig, ConfigManager};
use mvextras::{OutputFormat, PairScope};
use std::fs;
use tempfile::TempDir;

// Helper to create a temporary config directory for testing
fn setup_test_config_dir() -> (TempDir, ConfigManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_manager = ConfigManager::with_dir(temp_dir.path().to_path_buf());
    (temp_dir, config_manager)
}

fn write_user_config(config_manager: &ConfigManager, content: &str) {
    config_manager.ensure_config_dir().unwrap();
    fs::write(config_manager.config_path("config.toml"), content).unwrap();
}

#[test]
fn test_default_config() {
    let config = AppConfig::default();

    assert_eq!(config.version, "0.1");

    // Statistics defaults
    assert_eq!(config.statistics.z_critical, 1.96);
    assert_eq!(config.statistics.min_complete_cases, 3);

    assert_eq!(config.pairwise.scope, PairScope::Collection);

    assert_eq!(config.batching.mode, BatchingMode::ByBatch);
    assert_eq!(config.batching.no_batch_label, "--");

    // Tagging defaults
    assert_eq!(config.tagging.attribute_name, "Tag");
    assert_eq!(config.tagging.group_a, "A");
    assert_eq!(config.tagging.group_b, "B");

    assert_eq!(config.output.output_format().unwrap(), OutputFormat::Text);
    assert_eq!(config.output.precision, 4);

    assert!(config.file_loading.delimiter.is_none());
    assert!(!config.debug.enabled);
    assert!(config.validate().is_ok());
}

#[test]
fn test_generate_default_config() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let template = config_manager.generate_default_config();

    for section in [
        "[file_loading]",
        "[statistics]",
        "[pairwise]",
        "[batching]",
        "[tagging]",
        "[output]",
        "[debug]",
    ] {
        assert!(template.contains(section), "missing {section}");
    }
    assert!(template.contains("version = \"0.1\""));
}

#[test]
fn test_default_template_parses_to_defaults() {
    let config: AppConfig =
        toml::from_str(&ConfigManager::with_dir("unused".into()).generate_default_config())
            .expect("template should parse");
    let default = AppConfig::default();

    assert_eq!(config.version, default.version);
    assert_eq!(config.statistics.z_critical, default.statistics.z_critical);
    assert_eq!(config.pairwise.scope, default.pairwise.scope);
    assert_eq!(config.batching.mode, default.batching.mode);
    assert_eq!(config.tagging.not_selected, default.tagging.not_selected);
    assert_eq!(config.output.format, default.output.format);
}

#[test]
fn test_write_default_config() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let config_path = config_manager
        .write_default_config(false)
        .expect("Failed to write config");

    assert!(config_path.exists());

    let content = fs::read_to_string(&config_path).expect("Failed to read config");
    assert!(content.contains("[statistics]"));
    assert!(content.contains("version = \"0.1\""));
}

#[test]
fn test_write_default_config_no_overwrite() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    config_manager
        .write_default_config(false)
        .expect("Failed to write config");

    let result = config_manager.write_default_config(false);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("already exists"));

    // With force it succeeds
    assert!(config_manager.write_default_config(true).is_ok());
}

#[test]
fn test_load_without_user_file() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    let config = AppConfig::load_from(&config_manager).unwrap();
    assert_eq!(config.statistics.z_critical, 1.96);
    assert_eq!(config.tagging.attribute_name, "Tag");
}

#[test]
fn test_load_user_config() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    write_user_config(
        &config_manager,
        r#"
version = "0.1"

[file_loading]
delimiter = 59
null_values = ["NA"]

[statistics]
z_critical = 2.576

[pairwise]
scope = "all"

[batching]
mode = "byLevel"

[tagging]
attribute_name = "Group"

[output]
format = "json"
"#,
    );

    let config = AppConfig::load_from(&config_manager).unwrap();
    assert_eq!(config.file_loading.delimiter, Some(b';'));
    assert_eq!(config.file_loading.null_values, Some(vec!["NA".to_string()]));
    assert_eq!(config.statistics.z_critical, 2.576);
    // Unset values keep their defaults
    assert_eq!(config.statistics.min_complete_cases, 3);
    assert_eq!(config.batching.no_batch_label, "--");
    assert_eq!(config.pairwise.scope, PairScope::All);
    assert_eq!(config.batching.mode, BatchingMode::ByLevel);
    assert_eq!(config.tagging.attribute_name, "Group");
    assert_eq!(config.tagging.group_a, "A");
    assert_eq!(config.output.output_format().unwrap(), OutputFormat::Json);

    let options = config.pairwise_options();
    assert_eq!(options.z_critical, 2.576);
    assert_eq!(options.scope, PairScope::All);
}

#[test]
fn test_merge_prefers_non_default_values() {
    let mut base = AppConfig::default();
    base.statistics.z_critical = 1.645;
    base.output.precision = 2;

    let mut other = AppConfig::default();
    other.output.precision = 6;
    other.debug.enabled = true;

    base.merge(other);
    // other left z_critical at its default, so base keeps its own value
    assert_eq!(base.statistics.z_critical, 1.645);
    assert_eq!(base.output.precision, 6);
    assert!(base.debug.enabled);
}

#[test]
fn test_invalid_user_config_is_rejected() {
    let cases = [
        "version = \"0.9\"",
        "[statistics]\nz_critical = -1.0",
        "[statistics]\nmin_complete_cases = 1",
        "[tagging]\nattribute_name = \"  \"",
        "[output]\nformat = \"xml\"",
    ];
    for content in cases {
        let (_temp_dir, config_manager) = setup_test_config_dir();
        write_user_config(&config_manager, content);
        assert!(
            AppConfig::load_from(&config_manager).is_err(),
            "accepted: {content}"
        );
    }
}

#[test]
fn test_malformed_toml_reports_path() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    write_user_config(&config_manager, "[statistics\nz_critical = ");

    let err = AppConfig::load_from(&config_manager).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Failed to parse config file"));
    assert!(message.contains("config.toml"));
}
