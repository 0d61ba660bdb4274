//! Cipher suite name resolution

use crate::error::{Result, TlsError};
use rustls::crypto::ring::cipher_suite;
use rustls::SupportedCipherSuite;
use tracing::debug;

/// Accepted names and the engine suite each maps to.
///
/// Names follow IANA spelling. The TLS 1.2 ChaCha20 suites are also accepted
/// without the `_SHA256` suffix.
fn known_suites() -> [(&'static str, SupportedCipherSuite); 11] {
    [
        // TLS 1.3
        ("TLS_AES_128_GCM_SHA256", cipher_suite::TLS13_AES_128_GCM_SHA256),
        ("TLS_AES_256_GCM_SHA384", cipher_suite::TLS13_AES_256_GCM_SHA384),
        (
            "TLS_CHACHA20_POLY1305_SHA256",
            cipher_suite::TLS13_CHACHA20_POLY1305_SHA256,
        ),
        // TLS 1.2
        (
            "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256",
            cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
        ),
        (
            "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384",
            cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
        ),
        (
            "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256",
            cipher_suite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
        ),
        (
            "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305",
            cipher_suite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
        ),
        (
            "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
            cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
        ),
        (
            "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
            cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
        ),
        (
            "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256",
            cipher_suite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
        ),
        (
            "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305",
            cipher_suite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
        ),
    ]
}

/// Map configured names to engine suites, keeping their order.
///
/// An empty list resolves to an empty list, leaving the engine defaults in
/// place. The first unknown name aborts resolution.
pub fn resolve_cipher_suites<S: AsRef<str>>(names: &[S]) -> Result<Vec<SupportedCipherSuite>> {
    let suites = names
        .iter()
        .map(|name| lookup(name.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    if !suites.is_empty() {
        debug!(
            cipher_suites = ?suites.iter().map(|s| s.suite()).collect::<Vec<_>>(),
            "Resolved TLS cipher suites"
        );
    }

    Ok(suites)
}

/// IANA identifiers of the given suites, in order
pub fn cipher_suite_ids(suites: &[SupportedCipherSuite]) -> Vec<u16> {
    suites.iter().map(|s| u16::from(s.suite())).collect()
}

/// Every cipher suite name accepted by [`resolve_cipher_suites`]
pub fn supported_cipher_suite_names() -> Vec<&'static str> {
    known_suites().iter().map(|(name, _)| *name).collect()
}

fn lookup(name: &str) -> Result<SupportedCipherSuite> {
    known_suites()
        .into_iter()
        .find(|(known, _)| *known == name)
        .map(|(_, suite)| suite)
        .ok_or_else(|| TlsError::UnsupportedCipher {
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_is_valid() {
        let suites = resolve_cipher_suites::<String>(&[]).unwrap();
        assert!(suites.is_empty());
    }

    #[test]
    fn test_order_is_preserved() {
        let suites = resolve_cipher_suites(&[
            "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
            "TLS_AES_128_GCM_SHA256",
            "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
        ])
        .unwrap();

        assert_eq!(cipher_suite_ids(&suites), vec![0xc030, 0x1301, 0xc02f]);
    }

    #[test]
    fn test_short_chacha_alias() {
        let suites = resolve_cipher_suites(&["TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305"]).unwrap();
        assert_eq!(cipher_suite_ids(&suites), vec![0xcca8]);
    }

    #[test]
    fn test_unknown_suite_is_named() {
        let err = resolve_cipher_suites(&["TLS_AES_128_GCM_SHA256", "TLS_INVALID_CIPHER_SUITE"])
            .unwrap_err();
        assert!(matches!(
            &err,
            TlsError::UnsupportedCipher { name } if name == "TLS_INVALID_CIPHER_SUITE"
        ));
        assert!(err
            .to_string()
            .contains("cipher suite TLS_INVALID_CIPHER_SUITE not supported or doesn't exist"));
    }

    #[test]
    fn test_suites_missing_from_engine_are_unsupported() {
        // CBC suites exist in the registry but the engine never negotiates them
        let err = resolve_cipher_suites(&["TLS_RSA_WITH_AES_128_CBC_SHA"]).unwrap_err();
        assert!(matches!(err, TlsError::UnsupportedCipher { .. }));
    }

    #[test]
    fn test_every_listed_name_resolves() {
        let names = supported_cipher_suite_names();
        let suites = resolve_cipher_suites(names.as_slice()).unwrap();
        assert_eq!(suites.len(), names.len());
    }
}
