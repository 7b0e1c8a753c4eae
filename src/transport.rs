use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls;
use tracing::{debug, info};

use crate::error::ConnError;
use crate::locator::{Locator, Scheme};

/// A duplex byte stream to the broker: plain TCP or TLS over TCP.
pub enum Channel {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

/// Open the channel described by `locator`.
///
/// Any failure (resolution, TCP connect, TLS handshake) is reported as
/// `ConnError::Connect`.
pub async fn open(locator: &Locator) -> Result<Channel, ConnError> {
    let addr = locator.address();
    debug!("opening {:?} channel to {}", locator.scheme, addr);
    let tcp = TcpStream::connect(&addr).await.map_err(ConnError::Connect)?;
    let _ = tcp.set_nodelay(true);

    match locator.scheme {
        Scheme::Tcp => Ok(Channel::Tcp(tcp)),
        Scheme::Tcps => {
            info!("establishing TLS session with {}", addr);
            let mut roots = rustls::RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

            let provider = Arc::new(rustls::crypto::ring::default_provider());
            let config = rustls::ClientConfig::builder_with_provider(provider)
                .with_safe_default_protocol_versions()
                .map_err(|e| ConnError::Connect(std::io::Error::other(e)))?
                .with_root_certificates(roots)
                .with_no_client_auth();
            let connector = TlsConnector::from(Arc::new(config));

            let domain = rustls::pki_types::ServerName::try_from(locator.host.as_str())
                .map_err(|e| {
                    ConnError::Connect(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("invalid TLS server name '{}': {}", locator.host, e),
                    ))
                })?
                .to_owned();

            let tls = connector
                .connect(domain, tcp)
                .await
                .map_err(ConnError::Connect)?;
            Ok(Channel::Tls(Box::new(tls)))
        }
    }
}

impl AsyncRead for Channel {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Channel::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            Channel::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Channel {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, std::io::Error>> {
        match self.get_mut() {
            Channel::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            Channel::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), std::io::Error>> {
        match self.get_mut() {
            Channel::Tcp(s) => Pin::new(s).poll_flush(cx),
            Channel::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<(), std::io::Error>> {
        match self.get_mut() {
            Channel::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            Channel::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}
