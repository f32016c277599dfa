use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use anyhow::anyhow;
use futures::future::{BoxFuture, FutureExt};
use percent_encoding::percent_decode_str;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, debug_span, trace, warn, Instrument};
use url::Url;

use super::resolver::{Resolve, SystemResolver};
use super::v4::{self, Address, Reply, ReplyCode, Request};
use super::{split_host_port, BoxConnection, Dialer, Errors};

pub const DEFAULT_USER_ID: &str = "nobody@0.0.0.0";
pub const DEFAULT_PORT: u16 = 1080;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    /// The client resolves the destination and sends its address.
    Socks4,
    /// The proxy resolves the destination name.
    Socks4a,
}

impl Mode {
    pub fn scheme(&self) -> &'static str {
        match self {
            Mode::Socks4 => "socks4",
            Mode::Socks4a => "socks4a",
        }
    }

    pub fn from_scheme(scheme: &str) -> Option<Mode> {
        match scheme {
            "socks4" => Some(Mode::Socks4),
            "socks4a" => Some(Mode::Socks4a),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Socks4Config {
    /// `host:port` of the proxy server, handed to the transport dialer as is.
    pub proxy_addr: String,
    pub mode: Mode,
    /// Sent as USERID in every request.
    pub user_id: String,
}

impl Socks4Config {
    pub fn new(proxy_addr: impl Into<String>, mode: Mode) -> Self {
        Socks4Config {
            proxy_addr: proxy_addr.into(),
            mode,
            user_id: DEFAULT_USER_ID.into(),
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// `socks4://[ident@]host[:port]` or `socks4a://...`; the port defaults to 1080.
    ///
    /// The ident is percent-decoded, so `nobody%400.0.0.0` sends `nobody@0.0.0.0`.
    pub fn from_url(url: &Url) -> Result<Self, Errors> {
        let mode = Mode::from_scheme(url.scheme())
            .ok_or_else(|| Errors::UnsupportedScheme(url.scheme().into()))?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Errors::InvalidProxyUrl {
                url: url.to_string(),
                reason: "missing host",
            })?;
        let port = url.port().unwrap_or(DEFAULT_PORT);

        let config = Socks4Config::new(format!("{host}:{port}"), mode);

        let user = percent_decode_str(url.username())
            .decode_utf8()
            .map_err(|_| Errors::InvalidProxyUrl {
                url: url.to_string(),
                reason: "user id is not valid UTF-8",
            })?;

        Ok(match &*user {
            "" => config,
            user => config.with_user_id(user),
        })
    }
}

pub struct Socks4Dialer {
    config: Socks4Config,
    transport: Arc<dyn Dialer>,
    resolver: Arc<dyn Resolve>,
}

impl Socks4Dialer {
    pub fn new(config: Socks4Config, transport: Arc<dyn Dialer>) -> Self {
        Socks4Dialer {
            config,
            transport,
            resolver: Arc::new(SystemResolver),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &Socks4Config {
        &self.config
    }

    /// Opens a connection to the proxy and negotiates a relay to `address`.
    ///
    /// Once the proxy connection is open, any failure shuts it down before the
    /// error is returned. Use [`Socks4Dialer::handshake`] on a stream you own
    /// if the connection is needed after a refused negotiation.
    pub async fn connect(&self, network: &str, address: &str) -> Result<BoxConnection, Errors> {
        if network != "tcp" && network != "tcp4" {
            return Err(Errors::UnsupportedNetwork(network.into()));
        }

        let mut conn = self
            .transport
            .dial(network, &self.config.proxy_addr)
            .await
            .map_err(|e| Errors::DialFailed {
                proxy: self.config.proxy_addr.clone(),
                source: Box::new(e),
            })?;

        match self.handshake(&mut conn, address).await {
            Ok(reply) => {
                debug!(bound_port = reply.port, bound_ip = %reply.ip, "request granted");
                Ok(conn)
            }
            Err(e) => {
                if let Err(close_err) = conn.shutdown().await {
                    trace!(error = &close_err as &dyn std::error::Error, "shutdown failed");
                }
                drop(conn);
                Err(e)
            }
        }
    }

    /// Runs the request/reply exchange over an already open proxy connection.
    ///
    /// The stream is left open whatever the outcome.
    pub async fn handshake(
        &self,
        stream: &mut (impl AsyncRead + AsyncWrite + Unpin),
        address: &str,
    ) -> Result<Reply, Errors> {
        let (host, port) = split_host_port(address).map_err(|source| Errors::InvalidAddress {
            address: address.into(),
            source,
        })?;

        let dest = self.destination(address, host).await?;
        let req = Request::connect(dest, port, &self.config.user_id).to_buf()?;

        trace!(request = ?req, "sending request");
        stream.write_all(&req).await?;
        stream.flush().await?;

        let mut buf = [0_u8; v4::REPLY_LEN];
        stream.read_exact(&mut buf).await?;

        let reply = Reply::from(buf);
        trace!(?reply, "received reply");

        if reply.version != v4::RESP_VERSION {
            debug!(version = reply.version, "unexpected reply version");
        }

        match reply.code() {
            Ok(ReplyCode::Granted) => Ok(reply),
            Ok(ReplyCode::Rejected) => {
                warn!("proxy rejected request");
                Err(Errors::ConnectionRejected)
            }
            Ok(code @ (ReplyCode::IdentUnreachable | ReplyCode::IdentMismatch)) => {
                warn!(?code, "proxy requires ident");
                Err(Errors::IdentRequired(code as u8))
            }
            Err(code) => Err(Errors::InvalidResponse(code)),
        }
    }

    async fn destination(&self, address: &str, host: &str) -> Result<Address, Errors> {
        match host.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => return Ok(ip.into()),
            Ok(IpAddr::V6(_)) => {
                return Err(Errors::InvalidAddress {
                    address: address.into(),
                    source: anyhow!("socks4 cannot reach IPv6 destinations"),
                })
            }
            Err(_) => {}
        }

        match self.config.mode {
            Mode::Socks4a => Ok(Address::Domain(host.into())),
            Mode::Socks4 => {
                let ip: Ipv4Addr = self.resolver.lookup_ipv4(host).await.map_err(|source| {
                    Errors::HostUnknown {
                        host: host.into(),
                        source,
                    }
                })?;
                Ok(ip.into())
            }
        }
    }
}

impl Dialer for Socks4Dialer {
    fn dial<'a>(
        &'a self,
        network: &'a str,
        address: &'a str,
    ) -> BoxFuture<'a, Result<BoxConnection, Errors>> {
        let span = debug_span!(
            "socks4",
            proxy = %self.config.proxy_addr,
            scheme = self.config.mode.scheme(),
            target = address
        );

        self.connect(network, address).instrument(span).boxed()
    }
}
