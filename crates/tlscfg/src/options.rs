//! User-facing TLS options

use crate::builder::ConfigBuilder;
use crate::config::HandshakeConfig;
use crate::error::{Result, TlsError};
use crate::reloader::WatchHandle;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Declarative TLS settings for a listener or dialer.
///
/// Set once, then turned into a [`HandshakeConfig`] with [`Options::config`]
/// as often as needed, from any number of threads. Empty paths and empty
/// version strings count as unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Whether TLS is active at all
    pub enabled: bool,

    /// PEM bundle of trusted roots. Unset means the system trust store.
    pub ca_path: Option<PathBuf>,

    /// Certificate presented to peers (PEM)
    pub cert_path: Option<PathBuf>,

    /// Private key for `cert_path` (PEM)
    pub key_path: Option<PathBuf>,

    /// PEM bundle used to verify client certificates. Setting it enables mutual TLS.
    pub client_ca_path: Option<PathBuf>,

    /// Name expected in the server's certificate
    pub server_name: Option<String>,

    /// Cipher suite names, highest priority first
    pub cipher_suites: Vec<String>,

    /// Lowest protocol version, e.g. `"1.2"`
    pub min_version: Option<String>,

    /// Highest protocol version, e.g. `"1.3"`
    pub max_version: Option<String>,

    /// Accept server certificates issued for another name
    pub skip_host_verify: bool,

    /// Reload certificate material when the files change on disk
    pub hot_reload: bool,

    #[serde(skip)]
    pub(crate) watch_handle: WatchHandle,
}

impl Options {
    /// Build a handshake configuration using the system trust store
    pub fn config(&self) -> Result<HandshakeConfig> {
        ConfigBuilder::new(self).build()
    }

    /// Whether a certificate watcher started by [`Options::config`] is running.
    ///
    /// Clones never share a watcher.
    pub fn is_watching(&self) -> bool {
        self.watch_handle.is_active()
    }

    /// Stop the certificate watcher, if one was started.
    ///
    /// Safe to call any number of times, including when nothing was started.
    pub fn close(&self) {
        self.watch_handle.close();
    }

    /// Load options from a YAML, TOML or JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).map_err(|e| {
            TlsError::Options(format!("failed to read {}: {e}", path.display()))
        })?;

        let format = OptionsFormat::from_path(path)?;

        Self::from_str_as(&content, format)
    }

    /// Parse options from a string in the given format
    pub fn from_str_as(content: &str, format: OptionsFormat) -> Result<Self> {
        let options = match format {
            OptionsFormat::Yaml => serde_yaml::from_str(content)
                .map_err(|e| TlsError::Options(format!("failed to parse YAML: {e}")))?,
            OptionsFormat::Toml => toml::from_str(content)
                .map_err(|e| TlsError::Options(format!("failed to parse TOML: {e}")))?,
            OptionsFormat::Json => serde_json::from_str(content)
                .map_err(|e| TlsError::Options(format!("failed to parse JSON: {e}")))?,
        };

        Ok(options)
    }

    pub(crate) fn ca_file(&self) -> Option<&Path> {
        non_empty(&self.ca_path)
    }

    pub(crate) fn cert_file(&self) -> Option<&Path> {
        non_empty(&self.cert_path)
    }

    pub(crate) fn key_file(&self) -> Option<&Path> {
        non_empty(&self.key_path)
    }

    pub(crate) fn client_ca_file(&self) -> Option<&Path> {
        non_empty(&self.client_ca_path)
    }

    pub(crate) fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref().filter(|name| !name.is_empty())
    }
}

fn non_empty(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| !p.as_os_str().is_empty())
}

/// Options file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionsFormat {
    /// YAML format
    Yaml,
    /// TOML format
    Toml,
    /// JSON format
    Json,
}

impl OptionsFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| TlsError::Options("unable to detect options format".to_string()))?;

        match ext {
            "yaml" | "yml" => Ok(OptionsFormat::Yaml),
            "toml" => Ok(OptionsFormat::Toml),
            "json" => Ok(OptionsFormat::Json),
            _ => Err(TlsError::Options(format!("unsupported options format: {ext}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format_from_path() {
        assert_eq!(
            OptionsFormat::from_path(Path::new("tls.yaml")).unwrap(),
            OptionsFormat::Yaml
        );
        assert_eq!(
            OptionsFormat::from_path(Path::new("tls.yml")).unwrap(),
            OptionsFormat::Yaml
        );
        assert_eq!(
            OptionsFormat::from_path(Path::new("tls.toml")).unwrap(),
            OptionsFormat::Toml
        );
        assert_eq!(
            OptionsFormat::from_path(Path::new("tls.json")).unwrap(),
            OptionsFormat::Json
        );
    }

    #[test]
    fn test_unsupported_format() {
        assert!(OptionsFormat::from_path(Path::new("tls.txt")).is_err());
        assert!(OptionsFormat::from_path(Path::new("tls")).is_err());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
enabled: true
ca_path: /etc/tls/ca.pem
cert_path: /etc/tls/cert.pem
key_path: /etc/tls/key.pem
server_name: example.com
cipher_suites:
  - TLS_AES_128_GCM_SHA256
  - TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
min_version: "1.2"
max_version: "1.3"
"#;
        let options = Options::from_str_as(yaml, OptionsFormat::Yaml).unwrap();

        assert!(options.enabled);
        assert_eq!(options.ca_file(), Some(Path::new("/etc/tls/ca.pem")));
        assert_eq!(options.cipher_suites.len(), 2);
        assert_eq!(options.min_version.as_deref(), Some("1.2"));
        assert!(options.client_ca_file().is_none());
        assert!(!options.hot_reload);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
enabled = true
client_ca_path = "/etc/tls/clients.pem"
hot_reload = true
"#;
        let options = Options::from_str_as(toml, OptionsFormat::Toml).unwrap();

        assert_eq!(
            options.client_ca_file(),
            Some(Path::new("/etc/tls/clients.pem"))
        );
        assert!(options.hot_reload);
        assert!(options.cipher_suites.is_empty());
    }

    #[test]
    fn test_parse_json_rejects_wrong_types() {
        let err = Options::from_str_as(r#"{"enabled": "yes"}"#, OptionsFormat::Json).unwrap_err();
        assert!(matches!(err, TlsError::Options(_)));
    }

    #[test]
    fn test_empty_strings_are_unset() {
        let options = Options {
            ca_path: Some(PathBuf::new()),
            cert_path: Some(PathBuf::from("")),
            server_name: Some(String::new()),
            ..Default::default()
        };

        assert!(options.ca_file().is_none());
        assert!(options.cert_file().is_none());
        assert!(options.key_file().is_none());
        assert!(options.server_name().is_none());
    }

    #[test]
    fn test_close_is_idempotent() {
        let options = Options::default();
        options.close();
        options.close();
        assert!(!options.is_watching());
    }

    #[test]
    fn test_watcher_not_serialized() {
        let options = Options {
            hot_reload: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&options).unwrap();
        assert!(!json.contains("watch"));
        assert!(json.contains("\"hot_reload\":true"));
    }
}
