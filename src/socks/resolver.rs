use std::io;
use std::net::{IpAddr, Ipv4Addr};

use futures::future::{BoxFuture, FutureExt};
use tracing::trace;

/// Name lookup used by plain SOCKS4, where the client has to send an address.
pub trait Resolve: Send + Sync {
    fn lookup_ipv4<'a>(&'a self, host: &'a str) -> BoxFuture<'a, io::Result<Ipv4Addr>>;
}

/// Resolves through the operating system via [`tokio::net::lookup_host`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl Resolve for SystemResolver {
    fn lookup_ipv4<'a>(&'a self, host: &'a str) -> BoxFuture<'a, io::Result<Ipv4Addr>> {
        async move {
            let ip = tokio::net::lookup_host((host, 0))
                .await?
                .find_map(|addr| match addr.ip() {
                    IpAddr::V4(ip) => Some(ip),
                    IpAddr::V6(_) => None,
                })
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("no IPv4 address for {host}"),
                    )
                })?;

            trace!(host, %ip, "resolved");
            Ok(ip)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ipv4_literal_resolves_to_itself() {
        let ip = SystemResolver.lookup_ipv4("192.0.2.20").await.unwrap();

        assert_eq!(ip, Ipv4Addr::new(192, 0, 2, 20));
    }

    #[tokio::test]
    async fn ipv6_literal_has_no_ipv4_answer() {
        let err = SystemResolver.lookup_ipv4("::1").await.unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
