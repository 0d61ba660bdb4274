//! Assembled handshake configuration

use crate::cipher;
use crate::error::{Result, TlsError};
use crate::verifier::{ClientVerifier, ServerVerifier};
use crate::version::{TlsVersion, VersionRange};
use arc_swap::ArcSwap;
use rustls::client::{ResolvesClientCert, WebPkiServerVerifier};
use rustls::crypto::CryptoProvider;
use rustls::server::danger::ClientCertVerifier;
use rustls::server::{ClientHello, ResolvesServerCert, VerifierBuilderError, WebPkiClientVerifier};
use rustls::sign::CertifiedKey;
use rustls::{ClientConfig, RootCertStore, ServerConfig, SignatureScheme, SupportedCipherSuite};
use std::sync::Arc;

/// Pools, identity and the verifiers built from the pools.
///
/// Always replaced as a whole, never mutated in place.
#[derive(Debug)]
pub(crate) struct Material {
    pub(crate) roots: Arc<RootCertStore>,
    pub(crate) client_roots: Option<Arc<RootCertStore>>,
    pub(crate) certificate: Option<Arc<CertifiedKey>>,
    /// `None` when the root pool is empty
    pub(crate) server_verifier: Option<Arc<WebPkiServerVerifier>>,
    pub(crate) client_verifier: Option<Arc<dyn ClientCertVerifier>>,
}

impl Material {
    pub(crate) fn new(
        roots: Arc<RootCertStore>,
        client_roots: Option<Arc<RootCertStore>>,
        certificate: Option<Arc<CertifiedKey>>,
        provider: &Arc<CryptoProvider>,
    ) -> Result<Self> {
        let server_verifier = match WebPkiServerVerifier::builder_with_provider(
            Arc::clone(&roots),
            Arc::clone(provider),
        )
        .build()
        {
            Ok(verifier) => Some(verifier),
            Err(VerifierBuilderError::NoRootAnchors) => None,
            Err(e) => return Err(e.into()),
        };

        let client_verifier = client_roots
            .as_ref()
            .map(|client_roots| {
                WebPkiClientVerifier::builder_with_provider(
                    Arc::clone(client_roots),
                    Arc::clone(provider),
                )
                .build()
            })
            .transpose()?;

        Ok(Self {
            roots,
            client_roots,
            certificate,
            server_verifier,
            client_verifier,
        })
    }
}

/// Material shared between handshake configs and the certificate watcher
pub(crate) type SharedMaterial = Arc<ArcSwap<Material>>;

/// Hands the configured certificate to every handshake.
///
/// The same identity is returned regardless of SNI or the peer's hints.
#[derive(Debug, Clone)]
pub struct CertificateResolver {
    material: SharedMaterial,
}

impl CertificateResolver {
    /// Current certificate, if one is configured
    pub fn certificate(&self) -> Option<Arc<CertifiedKey>> {
        self.material.load().certificate.clone()
    }
}

impl ResolvesServerCert for CertificateResolver {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        self.certificate()
    }
}

impl ResolvesClientCert for CertificateResolver {
    fn resolve(
        &self,
        _root_hint_subjects: &[&[u8]],
        _sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        self.certificate()
    }

    fn has_certs(&self) -> bool {
        self.material.load().certificate.is_some()
    }
}

/// Read-only bundle a listener or dialer uses to negotiate TLS.
///
/// Cloning is cheap and clones observe the same certificate material. When
/// hot reload is enabled that material follows the files on disk; otherwise
/// it is fixed at construction.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    material: SharedMaterial,
    provider: Arc<CryptoProvider>,
    cipher_suites: Vec<SupportedCipherSuite>,
    versions: VersionRange,
    server_name: Option<String>,
    skip_host_verify: bool,
}

impl HandshakeConfig {
    pub(crate) fn new(
        material: SharedMaterial,
        provider: Arc<CryptoProvider>,
        cipher_suites: Vec<SupportedCipherSuite>,
        versions: VersionRange,
        server_name: Option<String>,
        skip_host_verify: bool,
    ) -> Self {
        Self {
            material,
            provider,
            cipher_suites,
            versions,
            server_name,
            skip_host_verify,
        }
    }

    /// Certificate presented by servers. Handshake parameters play no part.
    pub fn get_certificate(&self) -> Option<Arc<CertifiedKey>> {
        self.certificate_resolver().certificate()
    }

    /// Certificate presented by clients. Handshake parameters play no part.
    pub fn get_client_certificate(&self) -> Option<Arc<CertifiedKey>> {
        self.certificate_resolver().certificate()
    }

    /// Resolver usable as both a server and a client certificate resolver
    pub fn certificate_resolver(&self) -> CertificateResolver {
        CertificateResolver {
            material: Arc::clone(&self.material),
        }
    }

    /// Trusted roots for verifying servers
    pub fn root_cert_store(&self) -> Arc<RootCertStore> {
        Arc::clone(&self.material.load().roots)
    }

    /// Trusted roots for verifying clients, present only for mutual TLS
    pub fn client_cert_store(&self) -> Option<Arc<RootCertStore>> {
        self.material.load().client_roots.clone()
    }

    /// Whether servers built from this config require and verify client certificates
    pub fn mutual_tls(&self) -> bool {
        self.material.load().client_roots.is_some()
    }

    /// Configured cipher suites in priority order. Empty means engine defaults.
    pub fn cipher_suites(&self) -> &[SupportedCipherSuite] {
        &self.cipher_suites
    }

    /// IANA identifiers of the configured cipher suites
    pub fn cipher_suite_ids(&self) -> Vec<u16> {
        cipher::cipher_suite_ids(&self.cipher_suites)
    }

    /// Lowest protocol version allowed, if bounded
    pub fn min_version(&self) -> Option<TlsVersion> {
        self.versions.min
    }

    /// Highest protocol version allowed, if bounded
    pub fn max_version(&self) -> Option<TlsVersion> {
        self.versions.max
    }

    /// Name expected in the peer's certificate
    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// Whether clients accept certificates issued for another name
    pub fn skip_host_verify(&self) -> bool {
        self.skip_host_verify
    }

    /// Crypto provider carrying the configured cipher suites
    pub fn crypto_provider(&self) -> &Arc<CryptoProvider> {
        &self.provider
    }

    /// Build a rustls server configuration.
    ///
    /// Requires a certificate. Client certificates are required and verified
    /// when a client CA pool is configured. Certificates and CA pools are read
    /// from the live material on every handshake, so a reload reaches servers
    /// built earlier.
    pub fn server_config(&self) -> Result<ServerConfig> {
        let material = self.material.load();
        if material.certificate.is_none() {
            return Err(TlsError::MissingCertificate);
        }

        let versions = self.versions.protocol_versions()?;
        let builder = ServerConfig::builder_with_provider(Arc::clone(&self.provider))
            .with_protocol_versions(&versions)?;

        let builder = if material.client_roots.is_some() {
            builder.with_client_cert_verifier(Arc::new(ClientVerifier::new(
                Arc::clone(&self.material),
                Arc::clone(&self.provider),
            )))
        } else {
            builder.with_no_client_auth()
        };

        Ok(builder.with_cert_resolver(Arc::new(self.certificate_resolver())))
    }

    /// Build a rustls client configuration.
    ///
    /// The configured certificate, if any, is offered when the server asks
    /// for one. Servers are verified against the live root pool.
    pub fn client_config(&self) -> Result<ClientConfig> {
        if self.material.load().server_verifier.is_none() {
            return Err(TlsError::Verifier(VerifierBuilderError::NoRootAnchors));
        }

        let versions = self.versions.protocol_versions()?;
        let builder = ClientConfig::builder_with_provider(Arc::clone(&self.provider))
            .with_protocol_versions(&versions)?;

        let verifier = ServerVerifier::new(
            Arc::clone(&self.material),
            Arc::clone(&self.provider),
            self.skip_host_verify,
        );

        Ok(builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_client_cert_resolver(Arc::new(self.certificate_resolver())))
    }
}
