//! Startup orchestration.
//!
//! Order: validate → probe the random source → build gate state. Any
//! failure aborts startup.

use std::path::Path;

use crate::config::loader::load_config;
use crate::config::validation::validate_config;
use crate::config::{Environment, GateConfig};
use crate::csrf::TokenCodec;
use crate::error::ConfigError;
use crate::gate::GateState;

/// Load the configuration file, or the defaults when no path is given, and
/// apply an environment override.
pub fn resolve_config(
    path: Option<&Path>,
    environment: Option<Environment>,
) -> Result<GateConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => GateConfig::default(),
    };
    if let Some(environment) = environment {
        config.environment = environment;
    }
    Ok(config)
}

/// Validate `config` and build the shared gate state.
pub fn prepare(config: &GateConfig) -> Result<GateState, ConfigError> {
    // The environment override may have invalidated a loaded file.
    validate_config(config).map_err(ConfigError::Validation)?;
    TokenCodec::probe_entropy()?;

    let state = GateState::from_config(config)?;

    tracing::info!(
        environment = ?config.environment,
        secure_cookie = state.store.is_secure(),
        cookie = state.store.cookie_name(),
        routes = state.classifier.len(),
        rate_limiting = config.rate_limit.enabled,
        "Gate configured"
    );
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_prepare() {
        let config = resolve_config(None, None).unwrap();
        let state = prepare(&config).unwrap();
        assert!(!state.store.is_secure());
    }

    #[test]
    fn test_environment_override_revalidates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[csrf]\nsecure = false\n").unwrap();

        let config = resolve_config(Some(file.path()), None).unwrap();
        assert!(prepare(&config).is_ok());

        let config = resolve_config(Some(file.path()), Some(Environment::Production)).unwrap();
        assert!(matches!(prepare(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_production_secures_cookie() {
        let config = resolve_config(None, Some(Environment::Production)).unwrap();
        let state = prepare(&config).unwrap();
        assert!(state.store.is_secure());
    }
}
