use crate::config::Config;
use crate::util::{RelayError, Result};
use rustls::{Certificate, PrivateKey, ServerConfig};
use rustls_pemfile::{certs, pkcs8_private_keys};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn tls_error(context: &str, detail: impl std::fmt::Display) -> RelayError {
    RelayError::TlsConfig(format!("{}: {}", context, detail))
}

fn load_cert_chain(path: &Path) -> Result<Vec<Certificate>> {
    let file = File::open(path).map_err(|e| tls_error("failed to open cert file", e))?;
    let chain = certs(&mut BufReader::new(file))
        .map_err(|e| tls_error("failed to parse certs", e))?
        .into_iter()
        .map(Certificate)
        .collect::<Vec<_>>();
    if chain.is_empty() {
        return Err(RelayError::TlsConfig(
            "no certificates found in cert file".to_string(),
        ));
    }
    Ok(chain)
}

fn load_private_key(path: &Path) -> Result<PrivateKey> {
    let file = File::open(path).map_err(|e| tls_error("failed to open key file", e))?;
    let mut keys = pkcs8_private_keys(&mut BufReader::new(file))
        .map_err(|e| tls_error("failed to parse private key", e))?;
    if keys.is_empty() {
        return Err(RelayError::TlsConfig(
            "no private keys found in key file".to_string(),
        ));
    }
    // use the first key; pkcs8 files normally hold exactly one
    Ok(PrivateKey(keys.remove(0)))
}

/// loads the rustls server configuration when both cert and key paths are
/// configured; returns None when tls is disabled
pub fn load_rustls_config(config: &Config) -> Result<Option<ServerConfig>> {
    let (cert_path, key_path) = match (
        config.tls_cert_path.as_ref(),
        config.tls_key_path.as_ref(),
    ) {
        (Some(cert), Some(key)) => (cert, key),
        _ => return Ok(None),
    };

    let server_config = ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(load_cert_chain(cert_path)?, load_private_key(key_path)?)
        .map_err(|e| tls_error("tls config error", e))?;

    Ok(Some(server_config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn tls_is_off_when_paths_are_absent() {
        let config = Config::parse_from(["imgrelay"]);
        assert!(load_rustls_config(&config).unwrap().is_none());
    }

    #[test]
    fn missing_cert_file_is_a_config_error() {
        let config = Config::parse_from([
            "imgrelay",
            "--tls-cert",
            "/nonexistent/cert.pem",
            "--tls-key",
            "/nonexistent/key.pem",
        ]);
        assert!(matches!(
            load_rustls_config(&config),
            Err(RelayError::TlsConfig(_))
        ));
    }
}
