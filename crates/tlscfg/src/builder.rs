//! Options to handshake configuration

use crate::cipher::resolve_cipher_suites;
use crate::config::{HandshakeConfig, Material};
use crate::error::Result;
use crate::loader::load_key_pair;
use crate::options::Options;
use crate::reloader::ReloadSources;
use crate::trust::{load_ca_file, load_ca_pool, NativeTrustStore, TrustStore};
use crate::version::VersionRange;
use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Turns [`Options`] into a [`HandshakeConfig`].
///
/// Steps run in a fixed order and the first failure is returned:
/// root CA pool, client CA pool, certificate/key pair, cipher suites,
/// protocol versions.
pub struct ConfigBuilder<'a> {
    options: &'a Options,
    trust: Arc<dyn TrustStore>,
}

impl<'a> ConfigBuilder<'a> {
    /// Create a builder backed by the system trust store
    pub fn new(options: &'a Options) -> Self {
        Self {
            options,
            trust: Arc::new(NativeTrustStore),
        }
    }

    /// Replace the trust store consulted when no CA bundle is configured
    pub fn with_trust_store<T: TrustStore + 'static>(mut self, trust: T) -> Self {
        self.trust = Arc::new(trust);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<HandshakeConfig> {
        let options = self.options;

        let roots = load_ca_pool(options.ca_file(), self.trust.as_ref())?;

        let client_roots = options.client_ca_file().map(load_ca_file).transpose()?;

        let mut provider = rustls::crypto::ring::default_provider();
        let certificate = load_key_pair(options.cert_file(), options.key_file(), &provider)?;

        let cipher_suites = resolve_cipher_suites(options.cipher_suites.as_slice())?;
        if !cipher_suites.is_empty() {
            provider.cipher_suites = cipher_suites.clone();
        }
        let provider = Arc::new(provider);

        let versions = VersionRange::resolve(
            options.min_version.as_deref(),
            options.max_version.as_deref(),
        )?;
        debug!(min = ?versions.min, max = ?versions.max, "Resolved TLS version range");

        let material = Material::new(
            Arc::new(roots),
            client_roots.map(Arc::new),
            certificate,
            &provider,
        )?;

        let material = if options.hot_reload {
            let sources = ReloadSources {
                ca_path: options.ca_file().map(Into::into),
                client_ca_path: options.client_ca_file().map(Into::into),
                cert_path: options.cert_file().map(Into::into),
                key_path: options.key_file().map(Into::into),
                provider: Arc::clone(&provider),
            };
            options.watch_handle.attach(sources, material)?
        } else {
            Arc::new(ArcSwap::from_pointee(material))
        };

        Ok(HandshakeConfig::new(
            material,
            provider,
            cipher_suites,
            versions,
            options.server_name().map(str::to_string),
            options.skip_host_verify,
        ))
    }
}

impl fmt::Debug for ConfigBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigBuilder")
            .field("options", self.options)
            .finish_non_exhaustive()
    }
}
