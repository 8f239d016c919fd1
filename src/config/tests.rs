use super::*;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let original_config = Config {
            ollama: OllamaConfig {
                protocol: "https".to_string(),
                host: "test-host".to_string(),
                port: 8080,
                batch_size: 32,
                timeout_seconds: 10,
            },
            ..Config::default()
        };

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let content =
            fs::read_to_string(&config_path).expect("should read from config_path successfully");
        let loaded_config: Config = toml::from_str(&content).expect("should parse toml correctly");

        assert_eq!(original_config.ollama, loaded_config.ollama);
        assert_eq!(original_config.generation, loaded_config.generation);
    }

    #[test]
    fn explicit_config_dir_wins() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let dir = get_config_dir(Some(temp_dir.path())).expect("override is always accepted");
        assert_eq!(dir, temp_dir.path());
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [ollama
            host = "localhost"
            port = "invalid_port"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn partial_config_with_defaults() {
        let partial_toml = r#"
            [ollama]
            host = "custom-host"

            [corpora.travel]
            index_path = "/data/travel.bin"
            metadata_path = "/data/travel.jsonl"
            embedding_model = "bge-m3"
        "#;

        let config: Config = toml::from_str(partial_toml).expect("missing fields take defaults");
        assert_eq!(config.ollama.host, "custom-host");
        assert_eq!(config.ollama.port, 11434);
        assert_eq!(config.corpora.travel.embedding_model, "bge-m3");
        assert_eq!(config.corpora.general, CorporaConfig::default().general);
        assert_eq!(config.retrieval, RetrievalConfig::default());
    }

    #[test]
    fn complete_valid_config() {
        let valid_toml = r#"
            [ollama]
            protocol = "http"
            host = "localhost"
            port = 11434
            batch_size = 64
            timeout_seconds = 30

            [generation]
            model = "mistral:7b-instruct"
            max_new_tokens = 256
            timeout_seconds = 120

            [retrieval]
            top_k = 3
            micro_batch_size = 4

            [prompts]
            templates_path = "templates/prompts.json"
        "#;

        let config: Config = toml::from_str(valid_toml).expect("should parse toml successfully");
        assert_eq!(config.generation.max_new_tokens, 256);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.micro_batch_size, 4);
        assert_eq!(
            config.prompts.templates_path,
            std::path::PathBuf::from("templates/prompts.json")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_validation_edge_cases() {
        let config = Config {
            ollama: OllamaConfig {
                host: String::new(),
                ..OllamaConfig::default()
            },
            ..Config::default()
        };

        assert!(config.validate().is_err()); // empty host
    }

    #[test]
    fn port_boundary_validation() {
        let mut config = OllamaConfig::default();

        assert!(config.set_port(1).is_ok());
        assert!(config.set_port(65535).is_ok());
        assert!(config.set_port(0).is_err());
    }

    #[test]
    fn batch_size_boundary_validation() {
        let mut config = OllamaConfig::default();

        assert!(config.set_batch_size(1).is_ok());
        assert!(config.set_batch_size(1000).is_ok());
        assert!(config.set_batch_size(0).is_err());
        assert!(config.set_batch_size(1001).is_err());
    }

    #[test]
    fn ollama_url_generation_with_different_hosts() {
        let configs = vec![
            ("http", "localhost", 11434, "http://localhost:11434/"),
            ("http", "127.0.0.1", 8080, "http://127.0.0.1:8080/"),
            ("http", "example.com", 3000, "http://example.com:3000/"),
            (
                "https",
                "secure.example.com",
                443,
                "https://secure.example.com/",
            ),
        ];

        for (protocol, host, port, expected_url) in configs {
            let config = Config {
                ollama: OllamaConfig {
                    protocol: protocol.to_string(),
                    host: host.to_string(),
                    port,
                    ..OllamaConfig::default()
                },
                ..Config::default()
            };

            let url = config.ollama_url().expect("ollama_url is ok");
            assert_eq!(url.as_str(), expected_url);
        }
    }

    #[test]
    fn embedding_model_validation() {
        let mut corpus = CorporaConfig::default().general;

        assert!(corpus.set_embedding_model("nomic-embed-text".to_string()).is_ok());
        assert!(corpus.set_embedding_model(String::new()).is_err());
        assert!(corpus.set_embedding_model("   ".to_string()).is_err());
        assert_eq!(corpus.embedding_model, "nomic-embed-text");
    }

    #[test]
    fn error_display_messages() {
        let errors = vec![
            ConfigError::InvalidProtocol("ftp".to_string()),
            ConfigError::InvalidPort(0),
            ConfigError::InvalidBatchSize(0),
            ConfigError::InvalidModel(String::new()),
            ConfigError::InvalidUrl("invalid-url".to_string()),
            ConfigError::InvalidTopK(0),
        ];

        for error in errors {
            let message = format!("{error}");
            assert!(!message.is_empty());
            assert!(message.len() > 10);
        }
    }
}
