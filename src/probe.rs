//! Reachability probes
//!
//! Links are checked with a `HEAD` request that bypasses caches. When the
//! request fails at the transport level, the site root is probed as well:
//! a reachable root means the server is up and the link is treated as a
//! client-side route, an unreachable root means the link is broken.
//! That fallback can mislabel a genuinely dead deep link as a route; it is
//! kept as-is.

use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

/// Probe failure
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Response to a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
}

impl ProbeResponse {
    /// 2xx and 3xx count as reachable
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

/// Network capability used by link checks
pub trait Prober: Send + Sync {
    /// Issue a no-cache `HEAD` request
    fn head(&self, url: &Url) -> Result<ProbeResponse, ProbeError>;
}

impl<P: Prober + ?Sized> Prober for std::sync::Arc<P> {
    fn head(&self, url: &Url) -> Result<ProbeResponse, ProbeError> {
        (**self).head(url)
    }
}

/// Prober backed by a blocking `reqwest` client
pub struct HttpProber {
    client: reqwest::blocking::Client,
}

impl HttpProber {
    /// Build a client. `None` keeps the transport's default timeout.
    pub fn new(timeout: Option<Duration>) -> Result<Self, ProbeError> {
        let mut builder = reqwest::blocking::Client::builder()
            .user_agent(concat!("pageaudit/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e: reqwest::Error| ProbeError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Prober for HttpProber {
    fn head(&self, url: &Url) -> Result<ProbeResponse, ProbeError> {
        log::debug!("HEAD {}", url);
        let response = self
            .client
            .head(url.clone())
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .map_err(|e: reqwest::Error| ProbeError::Transport(e.to_string()))?;

        Ok(ProbeResponse {
            status: response.status().as_u16(),
        })
    }
}

/// Prober that never reaches the network
pub struct OfflineProber;

impl Prober for OfflineProber {
    fn head(&self, url: &Url) -> Result<ProbeResponse, ProbeError> {
        Err(ProbeError::Transport(format!("offline, not probing {}", url)))
    }
}

/// Outcome of probing one link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reachability {
    /// The link answered with a success status
    Reachable { status: u16 },
    /// The link answered with an error status, or nothing answered at all
    Broken { status: Option<u16>, reason: String },
    /// The link failed but the site root answered: probably a route
    /// handled in the browser
    ClientRoute { reason: String },
}

impl Reachability {
    pub fn is_broken(&self) -> bool {
        matches!(self, Reachability::Broken { .. })
    }
}

/// Probe a link, falling back to the site root on transport failure
pub fn check_link(prober: &dyn Prober, url: &Url) -> Reachability {
    match prober.head(url) {
        Ok(response) if response.is_success() => Reachability::Reachable {
            status: response.status,
        },
        Ok(response) => Reachability::Broken {
            status: Some(response.status),
            reason: format!("HTTP {}", response.status),
        },
        Err(error) => {
            let mut root = url.clone();
            root.set_path("/");
            root.set_query(None);
            root.set_fragment(None);

            match prober.head(&root) {
                Ok(response) if response.is_success() => Reachability::ClientRoute {
                    reason: error.to_string(),
                },
                _ => Reachability::Broken {
                    status: None,
                    reason: error.to_string(),
                },
            }
        }
    }
}
