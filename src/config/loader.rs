//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::GateConfig;
use crate::config::validation::validate_config;
use crate::error::ConfigError;

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GateConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GateConfig, ConfigError> {
    let config: GateConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{Environment, HeaderProfile, LogFormat};
    use crate::policy::{RouteClass, TokenRefresh};
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.csrf.cookie_name, "csrf-token");
        assert_eq!(config.csrf.header_name, "x-csrf-token");
        assert_eq!(config.csrf.field_name, "csrfToken");
        assert_eq!(config.csrf.issue_path, "/api/csrf-token");
        assert!(config.routes.is_empty());
        assert!(!config.cookie_secure());
        assert_eq!(config.header_profile(), HeaderProfile::Development);
    }

    #[test]
    fn test_full_file() {
        let toml = r#"
            environment = "production"

            [listener]
            bind_address = "127.0.0.1:3000"

            [csrf]
            cookie_name = "__Host-csrf"
            max_age_secs = 3000

            [policies.api]
            max_requests = 120
            token_refresh = "rotate"

            [[routes]]
            class = "bypass"
            extensions = ["png", "svg"]

            [[routes]]
            class = "upload"
            pattern = "/api/properties/*/images"

            [observability]
            log_format = "json"
        "#;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();
        let config = load_config(file.path()).unwrap();

        assert!(config.is_production());
        assert!(config.cookie_secure());
        assert_eq!(config.header_profile(), HeaderProfile::Strict);
        assert_eq!(config.csrf.cookie_name, "__Host-csrf");
        assert_eq!(config.csrf.max_age_secs, 3000);
        assert_eq!(config.policies.api.max_requests, Some(120));
        assert_eq!(config.policies.api.token_refresh, Some(TokenRefresh::Rotate));
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[1].class, RouteClass::Upload);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("environment = \"staging\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error() {
        let err = parse_config("[csrf]\ntoken_bytes = 8\n").unwrap_err();
        match err {
            ConfigError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "csrf.token_bytes");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/request-gate.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
