//! CA pool construction and the platform trust store

use crate::error::{Result, TlsError};
use rustls::pki_types::CertificateDer;
use rustls::RootCertStore;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

/// Source of the platform's trusted roots, used when no CA bundle is configured.
///
/// Production code uses [`NativeTrustStore`]. Any
/// `Fn() -> io::Result<Vec<CertificateDer<'static>>>` also qualifies, which
/// lets tests substitute a failing or fixed store.
pub trait TrustStore: Send + Sync {
    /// Load every root certificate the platform trusts
    fn load(&self) -> io::Result<Vec<CertificateDer<'static>>>;
}

/// Trust store backed by the operating system's certificate store
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeTrustStore;

impl TrustStore for NativeTrustStore {
    fn load(&self) -> io::Result<Vec<CertificateDer<'static>>> {
        rustls_native_certs::load_native_certs()
    }
}

impl<F> TrustStore for F
where
    F: Fn() -> io::Result<Vec<CertificateDer<'static>>> + Send + Sync,
{
    fn load(&self) -> io::Result<Vec<CertificateDer<'static>>> {
        self()
    }
}

/// Build a CA pool from `path`, or from the trust store when no path is given
pub fn load_ca_pool(path: Option<&Path>, trust: &dyn TrustStore) -> Result<RootCertStore> {
    match path {
        Some(path) => load_ca_file(path),
        None => load_system_pool(trust),
    }
}

/// Build a CA pool from a PEM bundle on disk.
///
/// Fails when the file cannot be read, or when it holds no certificate the
/// pool accepts.
pub fn load_ca_file(path: &Path) -> Result<RootCertStore> {
    let pem = std::fs::read(path).map_err(|source| TlsError::CaLoad {
        path: path.to_path_buf(),
        source,
    })?;

    let certs = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            debug!(path = %path.display(), error = %e, "Malformed PEM in CA bundle");
            TlsError::CaParse {
                path: path.to_path_buf(),
            }
        })?;

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);

    if added == 0 {
        return Err(TlsError::CaParse {
            path: path.to_path_buf(),
        });
    }

    info!(
        path = %path.display(),
        count = added,
        ignored,
        "Loaded CA certificates"
    );

    Ok(roots)
}

fn load_system_pool(trust: &dyn TrustStore) -> Result<RootCertStore> {
    let certs = trust.load().map_err(TlsError::TrustStore)?;

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);

    if roots.is_empty() {
        warn!("System trust store holds no usable CA certificates");
    } else {
        info!(count = added, ignored, "Loaded system CA certificates");
    }

    Ok(roots)
}
