//! TLS configuration and certificate loading.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::schema::TlsConfig;
use crate::error::ConfigError;

/// Load the certificate chain and key named in `config`.
///
/// Missing files are reported by path before rustls gets to see them.
pub async fn load_tls_config(config: &TlsConfig) -> Result<RustlsConfig, ConfigError> {
    let cert_path = Path::new(&config.cert_path);
    let key_path = Path::new(&config.key_path);

    for (kind, path) in [("certificate", cert_path), ("private key", key_path)] {
        if !path.exists() {
            return Err(ConfigError::TlsMaterial(format!(
                "{} file not found: {}",
                kind,
                path.display()
            )));
        }
    }

    RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| ConfigError::TlsMaterial(format!("{}: {}", cert_path.display(), e)))
}
