use std::io;
use std::net::SocketAddr;

use anyhow::{anyhow, bail, Context};
use futures::future::{BoxFuture, FutureExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, trace};

mod client;
mod registry;
mod resolver;
pub mod v4;

pub use client::{Mode, Socks4Config, Socks4Dialer, DEFAULT_PORT, DEFAULT_USER_ID};
pub use registry::{Constructor, Registry};
pub use resolver::{Resolve, SystemResolver};

/// A byte stream returned by a [`Dialer`].
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Connection for T {}

pub type BoxConnection = Box<dyn Connection>;

/// Opens a connection to `address` over `network` ("tcp", "tcp4", ...).
///
/// Implemented by [`Direct`] and by the proxy dialers, so a proxy can be used
/// wherever a plain connection is expected, including as the transport of
/// another proxy.
pub trait Dialer: Send + Sync {
    fn dial<'a>(
        &'a self,
        network: &'a str,
        address: &'a str,
    ) -> BoxFuture<'a, Result<BoxConnection, Errors>>;
}

#[derive(thiserror::Error, Debug)]
pub enum Errors {
    #[error("network should be tcp or tcp4, got {0:?}")]
    UnsupportedNetwork(String),
    #[error("socks4 dial to proxy {proxy} failed")]
    DialFailed {
        proxy: String,
        #[source]
        source: Box<Errors>,
    },
    #[error("wrong address: {address}")]
    InvalidAddress {
        address: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("unable to find IP address of host {host}")]
    HostUnknown {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("unable to write request into buffer")]
    Buffer(#[from] v4::BuildError),
    #[error("i/o error")]
    Io(#[from] io::Error),
    #[error("ident required (reply {0:#04x})")]
    IdentRequired(u8),
    #[error("connection rejected")]
    ConnectionRejected,
    #[error("invalid response {0:#04x}")]
    InvalidResponse(u8),
    #[error("unsupported proxy scheme {0:?}")]
    UnsupportedScheme(String),
    #[error("invalid proxy url {url}: {reason}")]
    InvalidProxyUrl { url: String, reason: &'static str },
}

/// Plain TCP, no proxy.
#[derive(Debug, Default, Clone, Copy)]
pub struct Direct;

impl Direct {
    async fn connect(network: &str, address: &str) -> Result<TcpStream, Errors> {
        let family: fn(&SocketAddr) -> bool = match network {
            "tcp" => |_: &SocketAddr| true,
            "tcp4" => SocketAddr::is_ipv4,
            "tcp6" => SocketAddr::is_ipv6,
            _ => return Err(Errors::UnsupportedNetwork(network.into())),
        };

        let (host, port) = split_host_port(address).map_err(|source| Errors::InvalidAddress {
            address: address.into(),
            source,
        })?;

        let mut last_err = None;
        for addr in tokio::net::lookup_host((host, port)).await? {
            if !family(&addr) {
                continue;
            }

            trace!(%addr, "connecting");
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    debug!(%addr, "connected");
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err
            .unwrap_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no {network} address found for {host}"),
                )
            })
            .into())
    }
}

impl Dialer for Direct {
    fn dial<'a>(
        &'a self,
        network: &'a str,
        address: &'a str,
    ) -> BoxFuture<'a, Result<BoxConnection, Errors>> {
        async move {
            let stream = Direct::connect(network, address).await?;
            if let Err(e) = stream.set_nodelay(true) {
                trace!(error = &e as &dyn std::error::Error, "set_nodelay failed");
            }
            Ok(Box::new(stream) as BoxConnection)
        }
        .boxed()
    }
}

/// Splits `host:port`, accepting `[v6]:port` as well.
pub fn split_host_port(address: &str) -> anyhow::Result<(&str, u16)> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("missing port in address"))?;

    let host = match host.strip_prefix('[') {
        Some(inner) => inner
            .strip_suffix(']')
            .ok_or_else(|| anyhow!("missing ']' in address"))?,
        None if host.contains(':') => bail!("too many colons in address"),
        None => host,
    };

    if host.contains(&['[', ']'][..]) {
        bail!("unexpected bracket in address");
    }

    if host.is_empty() {
        bail!("missing host in address");
    }

    let port = port
        .parse::<u16>()
        .with_context(|| format!("invalid port {port:?}"))?;

    Ok((host, port))
}
