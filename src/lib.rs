//! SOCKS4 and SOCKS4a client dialers.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use socks4_dial::socks::{Dialer, Direct, Registry};
//! use url::Url;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let proxy = Url::parse("socks4a://127.0.0.1:1080")?;
//! let dialer = Registry::default().from_url(&proxy, Arc::new(Direct))?;
//! let conn = dialer.dial("tcp", "example.com:80").await?;
//! # drop(conn);
//! # Ok(())
//! # }
//! ```

pub mod socks;
