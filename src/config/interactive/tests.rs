use super::load_existing_config as load_existing_config_impl;
use tempfile::TempDir;

#[test]
fn load_existing_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = load_existing_config_impl(temp_dir.path()).expect("config loaded successfully");
    assert!(!config.ollama.host.is_empty());
    assert!(config.ollama.port > 0);
    assert!(!config.generation.model.is_empty());
    assert_eq!(config.base_dir, temp_dir.path());
}

#[test]
fn broken_config_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(temp_dir.path().join("config.toml"), "[ollama\n")
        .expect("should write broken config");

    let config = load_existing_config_impl(temp_dir.path()).expect("defaults are used");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.base_dir, temp_dir.path());
}
