//! TCP connect probe, grounded on the health-check port connector pattern.

use std::time::Duration;
use tokio::net::TcpStream;

/// A probe that succeeds when a TCP connection to `host:port` can be
/// established within one second.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    port: u16,
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

impl TcpProbe {
    /// Build a probe for the given port.
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// The port this probe connects to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Attempt a single connection.
    pub async fn test(&self, host: &str) -> bool {
        let addr = format!("{host}:{}", self.port);
        matches!(
            tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr)).await,
            Ok(Ok(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connection_refused_is_failure() {
        // Nothing listens on this high port on loopback in a test sandbox.
        let probe = TcpProbe::new(1);
        assert!(!probe.test("127.0.0.1").await);
    }
}
