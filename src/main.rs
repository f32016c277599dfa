use std::sync::Arc;

use clap::Parser;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, info_span, Instrument};
use url::Url;

use socks4_dial::socks::{Dialer, Direct, Errors, Registry, Socks4Config, Socks4Dialer};

#[derive(Debug, Parser)]
#[command(name = "socks4-dial", about = "Open a TCP connection through a SOCKS4/4a proxy")]
struct Cli {
    /// Proxy URL, socks4://[ident@]host[:port] or socks4a://...
    #[arg(long, default_value = "socks4a://127.0.0.1:1080")]
    proxy: Url,

    /// Network passed to the dialer, tcp or tcp4
    #[arg(long, default_value = "tcp")]
    network: String,

    /// Overrides the ident taken from the proxy URL
    #[arg(long)]
    ident: Option<String>,

    /// Log request and reply bytes
    #[arg(short, long)]
    verbose: bool,

    /// Destination as host:port
    target: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = tracing_subscriber::fmt::format()
        .without_time()
        .with_level(false)
        .with_target(false)
        .pretty()
        .with_source_location(false);
    tracing_subscriber::fmt()
        .event_format(format)
        .with_max_level(if cli.verbose {
            tracing::Level::TRACE
        } else {
            tracing::Level::DEBUG
        })
        .init();

    let dialer: Arc<dyn Dialer> = match cli.ident {
        Some(ident) => Arc::new(Socks4Dialer::new(
            Socks4Config::from_url(&cli.proxy)?.with_user_id(ident),
            Arc::new(Direct),
        )),
        None => Registry::default().from_url(&cli.proxy, Arc::new(Direct))?,
    };

    let span = info_span!("dial", proxy = %cli.proxy, target = %cli.target);
    match dialer
        .dial(&cli.network, &cli.target)
        .instrument(span.clone())
        .await
    {
        Ok(mut conn) => {
            info!(parent: &span, "connection established");
            conn.shutdown().await?;
            Ok(())
        }
        Err(e) => {
            match &e {
                Errors::DialFailed { proxy, .. } => {
                    error!(parent: &span, %proxy, "invalid proxy server")
                }
                Errors::ConnectionRejected => {
                    error!(parent: &span, "proxy refused the destination")
                }
                _ => {}
            }
            error!(
                parent: &span,
                error = &e as &dyn std::error::Error,
                "failed to open connection"
            );
            Err(e.into())
        }
    }
}
