use log::{debug, info};
use std::cell::Cell;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use url::Url;

use crate::peripherals::Connectivity;

const DEFAULT_POSTGRES_PORT: u16 = 5432;
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Link status derived from reachability of the upload host
///
/// On a host gateway the network interface is managed by the OS, so "connected"
/// means the database endpoint accepts a TCP connection.
#[derive(Debug, Clone)]
pub struct TcpLink {
    host: String,
    port: u16,
    up: Cell<bool>,
}

impl TcpLink {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            up: Cell::new(false),
        }
    }

    /// Build a link probe for the host named in a PostgreSQL connection URL.
    pub fn from_database_url(database_url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let url = Url::parse(database_url)?;
        let host = url
            .host_str()
            .ok_or("DATABASE_URL has no host")?
            .to_string();
        Ok(Self::new(host, url.port().unwrap_or(DEFAULT_POSTGRES_PORT)))
    }
}

impl Connectivity for TcpLink {
    async fn is_connected(&self) -> bool {
        let reachable =
            match timeout(PROBE_TIMEOUT, TcpStream::connect((self.host.as_str(), self.port))).await {
                Ok(Ok(_)) => true,
                Ok(Err(e)) => {
                    debug!("{}:{} unreachable: {}", self.host, self.port, e);
                    false
                }
                Err(_) => {
                    debug!("{}:{} probe timed out", self.host, self.port);
                    false
                }
            };
        if reachable && !self.up.get() {
            info!("Link to {}:{} is up", self.host, self.port);
        }
        self.up.set(reachable);
        reachable
    }

    fn disconnect(&mut self) {
        if self.up.replace(false) {
            info!("Releasing link to {}:{}", self.host, self.port);
        }
    }
}
