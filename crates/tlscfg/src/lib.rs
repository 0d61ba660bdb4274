//! # tlscfg
//!
//! Declarative TLS options turned into ready-to-use rustls handshake configuration.
//!
//! This crate covers:
//! - Trusted root pools from a PEM bundle or the system trust store
//! - Certificate/key pairs, optionally reloaded when the files change
//! - Mutual TLS through a client CA pool
//! - Cipher suite and protocol version restrictions
//! - Async acceptor and connector built on tokio-rustls
//!
//! ```no_run
//! use tlscfg::{Options, TlsAcceptor};
//!
//! # fn main() -> tlscfg::Result<()> {
//! let options = Options::from_file("tls.yaml")?;
//! let config = options.config()?;
//! let acceptor = TlsAcceptor::new(&config)?;
//! # let _ = acceptor;
//! options.close();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod acceptor;
pub mod builder;
pub mod cipher;
pub mod config;
pub mod error;
pub mod loader;
pub mod options;
pub mod trust;
pub mod version;

mod reloader;
mod verifier;

pub use acceptor::{TlsAcceptor, TlsConnector};
pub use builder::ConfigBuilder;
pub use cipher::{resolve_cipher_suites, supported_cipher_suite_names};
pub use config::{CertificateResolver, HandshakeConfig};
pub use error::{Result, TlsError};
pub use options::{Options, OptionsFormat};
pub use trust::{NativeTrustStore, TrustStore};
pub use version::{TlsVersion, UnknownVersion, VersionRange};
