//! Error types for TLS configuration

use crate::version::{TlsVersion, UnknownVersion};
use std::path::PathBuf;

/// Result type alias using [`TlsError`]
pub type Result<T, E = TlsError> = std::result::Result<T, E>;

/// Boxed underlying cause carried by some variants
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced while turning [`Options`](crate::Options) into a handshake configuration
///
/// Every variant is a permanent configuration or environment problem. None of
/// them are worth retrying without changing the inputs.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    /// The platform trust store could not be read
    #[error("failed to load CA CertPool: failed to load system CA pool: {0}")]
    TrustStore(#[source] std::io::Error),

    /// A CA bundle could not be read from disk
    #[error("failed to load CA {}: {source}", .path.display())]
    CaLoad {
        /// Bundle path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A CA bundle was read but holds no usable PEM certificate
    #[error("failed to parse CA {}", .path.display())]
    CaParse {
        /// Bundle path
        path: PathBuf,
    },

    /// Only one of certificate and key was configured
    #[error(
        "for client auth via TLS, either both client certificate and key must be supplied, or neither"
    )]
    IncompleteCert,

    /// The certificate/key pair could not be loaded or does not match
    #[error("failed to load server TLS cert and key: {}: {source}", .path.display())]
    CertLoad {
        /// File that failed
        path: PathBuf,
        /// Underlying cause
        #[source]
        source: BoxError,
    },

    /// A configured cipher suite name is unknown to the TLS engine
    #[error(
        "failed to get cipher suite ids from cipher suite names: cipher suite {name} not supported or doesn't exist"
    )]
    UnsupportedCipher {
        /// Offending name, as configured
        name: String,
    },

    /// The minimum version string did not parse
    #[error("failed to get minimum tls version: {0}")]
    MinVersion(#[source] UnknownVersion),

    /// The maximum version string did not parse
    #[error("failed to get maximum tls version: {0}")]
    MaxVersion(#[source] UnknownVersion),

    /// Both bounds parsed but are inverted
    #[error("minimum tls version can't be greater than maximum tls version (min {min}, max {max})")]
    VersionRange {
        /// Configured minimum
        min: TlsVersion,
        /// Configured maximum
        max: TlsVersion,
    },

    /// The configured range excludes every version the TLS engine negotiates
    #[error("no supported tls version between {} and {}", display_bound(.min), display_bound(.max))]
    NoSupportedVersion {
        /// Configured minimum
        min: Option<TlsVersion>,
        /// Configured maximum
        max: Option<TlsVersion>,
    },

    /// A server configuration was requested without a certificate
    #[error("server TLS requires a certificate and key")]
    MissingCertificate,

    /// The certificate watcher could not be started
    #[error("failed to watch certificate files: {0}")]
    Watch(#[from] notify::Error),

    /// The TLS engine rejected the assembled parameters
    #[error("TLS engine error: {0}")]
    Rustls(#[from] rustls::Error),

    /// A peer certificate verifier could not be built
    #[error("failed to build certificate verifier: {0}")]
    Verifier(#[from] rustls::server::VerifierBuilderError),

    /// A configured server name is not a valid DNS name or IP address
    #[error("invalid server name {name:?}")]
    InvalidServerName {
        /// Name as configured
        name: String,
    },

    /// A client connection was attempted without a server name
    #[error("no server name configured for TLS client")]
    MissingServerName,

    /// A connection failed during the TLS handshake
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] std::io::Error),

    /// An options file could not be read or parsed
    #[error("failed to load TLS options: {0}")]
    Options(String),
}

fn display_bound(bound: &Option<TlsVersion>) -> String {
    bound.map_or_else(|| "unset".to_string(), |v| v.to_string())
}

impl TlsError {
    pub(crate) fn cert_load(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        TlsError::CertLoad {
            path: path.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cipher_error_names_suite() {
        let err = TlsError::UnsupportedCipher {
            name: "TLS_INVALID_CIPHER_SUITE".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to get cipher suite ids from cipher suite names: cipher suite TLS_INVALID_CIPHER_SUITE not supported or doesn't exist"
        );
    }

    #[test]
    fn test_trust_store_error_keeps_cause() {
        let err = TlsError::TrustStore(std::io::Error::other("fake system pool"));
        assert!(err.to_string().contains("fake system pool"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_no_supported_version_display() {
        let err = TlsError::NoSupportedVersion {
            min: None,
            max: Some(TlsVersion::Tls11),
        };
        assert_eq!(
            err.to_string(),
            "no supported tls version between unset and 1.1"
        );
    }
}
