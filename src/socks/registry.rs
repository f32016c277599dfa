use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use url::Url;

use super::client::{Socks4Config, Socks4Dialer};
use super::{Dialer, Errors};

/// Builds a dialer for a proxy URL on top of `forward`, the dialer used to
/// reach the proxy itself.
pub type Constructor = fn(&Url, Arc<dyn Dialer>) -> Result<Arc<dyn Dialer>, Errors>;

/// Maps URL schemes to dialer constructors.
pub struct Registry {
    constructors: HashMap<String, Constructor>,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            constructors: HashMap::new(),
        }
    }

    /// A registry knowing `socks4` and `socks4a`.
    pub fn with_defaults() -> Self {
        let mut registry = Registry::new();
        registry.register("socks4", socks4);
        registry.register("socks4a", socks4);
        registry
    }

    pub fn register(&mut self, scheme: impl Into<String>, constructor: Constructor) {
        self.constructors.insert(scheme.into(), constructor);
    }

    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn from_url(&self, url: &Url, forward: Arc<dyn Dialer>) -> Result<Arc<dyn Dialer>, Errors> {
        let constructor = self
            .constructors
            .get(url.scheme())
            .ok_or_else(|| Errors::UnsupportedScheme(url.scheme().into()))?;

        debug!(scheme = url.scheme(), host = ?url.host_str(), "building proxy dialer");
        constructor(url, forward)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Registry::with_defaults()
    }
}

fn socks4(url: &Url, forward: Arc<dyn Dialer>) -> Result<Arc<dyn Dialer>, Errors> {
    let config = Socks4Config::from_url(url)?;
    Ok(Arc::new(Socks4Dialer::new(config, forward)))
}
