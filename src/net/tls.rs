//! TLS configuration and certificate loading.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;
use thiserror::Error;

use crate::config::schema::TlsConfig;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("{kind} file not found: {path}")]
    Missing { kind: &'static str, path: String },

    #[error("failed to load certificate/key: {0}")]
    Load(#[from] std::io::Error),
}

/// Load the listener's certificate and key.
pub async fn load_tls_config(config: &TlsConfig) -> Result<RustlsConfig, TlsError> {
    check_exists("certificate", &config.cert_path)?;
    check_exists("private key", &config.key_path)?;

    let tls = RustlsConfig::from_pem_file(&config.cert_path, &config.key_path).await?;
    tracing::info!(cert = %config.cert_path, "TLS certificate loaded");
    Ok(tls)
}

fn check_exists(kind: &'static str, path: &str) -> Result<(), TlsError> {
    if Path::new(path).exists() {
        Ok(())
    } else {
        Err(TlsError::Missing {
            kind,
            path: path.to_string(),
        })
    }
}
