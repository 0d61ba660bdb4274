//! Async TLS acceptor and connector

use crate::config::HandshakeConfig;
use crate::error::{Result, TlsError};
use rustls::pki_types::ServerName;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::{client, server};
use tracing::{debug, info};

/// TLS connection acceptor
#[derive(Clone)]
pub struct TlsAcceptor {
    inner: tokio_rustls::TlsAcceptor,
    mutual_tls: bool,
}

impl TlsAcceptor {
    /// Create an acceptor from a handshake configuration.
    ///
    /// The certificate and the client CA pool are read per handshake, so a
    /// hot-reloaded config keeps serving fresh material through the same
    /// acceptor.
    pub fn new(config: &HandshakeConfig) -> Result<Self> {
        let server_config = config.server_config()?;
        let mutual_tls = config.mutual_tls();

        info!(
            mutual_tls,
            min_tls = ?config.min_version(),
            max_tls = ?config.max_version(),
            "TLS acceptor initialized"
        );

        Ok(Self {
            inner: tokio_rustls::TlsAcceptor::from(Arc::new(server_config)),
            mutual_tls,
        })
    }

    /// Create an acceptor that offers the given ALPN protocols, most preferred first
    pub fn new_with_alpn(config: &HandshakeConfig, protocols: &[&[u8]]) -> Result<Self> {
        let mut server_config = config.server_config()?;
        server_config.alpn_protocols = protocols.iter().map(|p| p.to_vec()).collect();

        Ok(Self {
            inner: tokio_rustls::TlsAcceptor::from(Arc::new(server_config)),
            mutual_tls: config.mutual_tls(),
        })
    }

    /// Accept a TLS connection
    pub async fn accept<IO>(&self, stream: IO) -> Result<server::TlsStream<IO>>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let stream = self.inner.accept(stream).await.map_err(TlsError::Handshake)?;
        debug!(mutual_tls = self.mutual_tls, "TLS connection accepted");
        Ok(stream)
    }
}

impl fmt::Debug for TlsAcceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsAcceptor")
            .field("mutual_tls", &self.mutual_tls)
            .finish_non_exhaustive()
    }
}

/// TLS connection initiator
#[derive(Clone)]
pub struct TlsConnector {
    inner: tokio_rustls::TlsConnector,
    server_name: Option<ServerName<'static>>,
}

impl TlsConnector {
    /// Create a connector from a handshake configuration.
    ///
    /// The configured server name, if any, becomes the default name used by
    /// [`TlsConnector::connect`]. Reloaded roots and certificates reach
    /// connections made after the reload.
    pub fn new(config: &HandshakeConfig) -> Result<Self> {
        let client_config = config.client_config()?;

        let server_name = config
            .server_name()
            .map(|name| {
                ServerName::try_from(name.to_string()).map_err(|_| {
                    TlsError::InvalidServerName {
                        name: name.to_string(),
                    }
                })
            })
            .transpose()?;

        info!(
            server_name = ?config.server_name(),
            skip_host_verify = config.skip_host_verify(),
            "TLS connector initialized"
        );

        Ok(Self {
            inner: tokio_rustls::TlsConnector::from(Arc::new(client_config)),
            server_name,
        })
    }

    /// Connect using the configured server name
    pub async fn connect<IO>(&self, stream: IO) -> Result<client::TlsStream<IO>>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let name = self
            .server_name
            .clone()
            .ok_or(TlsError::MissingServerName)?;
        self.connect_to(name, stream).await
    }

    /// Connect, expecting the peer to present a certificate for `name`
    pub async fn connect_to<IO>(
        &self,
        name: ServerName<'static>,
        stream: IO,
    ) -> Result<client::TlsStream<IO>>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let stream = self
            .inner
            .connect(name, stream)
            .await
            .map_err(TlsError::Handshake)?;
        debug!("TLS connection established");
        Ok(stream)
    }
}

impl fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConnector")
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}
