//! Certificate and key loading utilities

use crate::error::{Result, TlsError};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use rustls_pemfile::{certs, private_key};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Load a certificate chain from a PEM file
pub fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).map_err(|e| TlsError::cert_load(path, e))?;

    let mut reader = BufReader::new(file);
    let certs = certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| TlsError::cert_load(path, e))?;

    if certs.is_empty() {
        return Err(TlsError::cert_load(path, "no certificates found"));
    }

    info!(
        path = %path.display(),
        count = certs.len(),
        "Loaded TLS certificates"
    );

    Ok(certs)
}

/// Load the first private key from a PEM file
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path).map_err(|e| TlsError::cert_load(path, e))?;

    let mut reader = BufReader::new(file);
    let key = private_key(&mut reader)
        .map_err(|e| TlsError::cert_load(path, e))?
        .ok_or_else(|| TlsError::cert_load(path, "no private key found"))?;

    info!(path = %path.display(), "Loaded TLS private key");

    Ok(key)
}

/// Load a certificate chain and its private key, checking that they belong together
pub fn load_certified_key(
    cert_path: &Path,
    key_path: &Path,
    provider: &CryptoProvider,
) -> Result<CertifiedKey> {
    let chain = load_certificates(cert_path)?;
    let key = load_private_key(key_path)?;

    let signing_key = provider
        .key_provider
        .load_private_key(key)
        .map_err(|e| TlsError::cert_load(key_path, e))?;

    let certified = CertifiedKey::new(chain, signing_key);

    // Keys whose public half the provider cannot expose are accepted unchecked
    match certified.keys_match() {
        Ok(()) | Err(rustls::Error::InconsistentKeys(rustls::InconsistentKeys::Unknown)) => {}
        Err(e) => return Err(TlsError::cert_load(key_path, e)),
    }

    Ok(certified)
}

/// Load the configured pair, if any.
///
/// Both paths absent means no certificate. Exactly one present is an error.
pub fn load_key_pair(
    cert_path: Option<&Path>,
    key_path: Option<&Path>,
    provider: &CryptoProvider,
) -> Result<Option<Arc<CertifiedKey>>> {
    match (cert_path, key_path) {
        (None, None) => Ok(None),
        (Some(cert_path), Some(key_path)) => {
            load_certified_key(cert_path, key_path, provider).map(|key| Some(Arc::new(key)))
        }
        _ => Err(TlsError::IncompleteCert),
    }
}
