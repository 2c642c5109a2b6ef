//! Konfiguration des DHT-Servers

use std::net::Ipv4Addr;
use std::time::Duration;

use libp2p::multiaddr::Protocol;
use libp2p::Multiaddr;

/// Standard-Zeitlimit fuer `dial()`
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct DhtConfig {
    /// Lausch-Adressen (z.B. `/ip4/0.0.0.0/tcp/0`)
    pub listen: Vec<Multiaddr>,
    /// Bootstrap-Knoten, jeweils mit `/p2p/<peer-id>` am Ende
    pub bootstrap: Vec<Multiaddr>,
    /// mDNS-Erkennung im lokalen Netz
    pub mdns: bool,
    /// Zeitlimit fuer ausgehende Verbindungen
    pub dial_timeout: Duration,
    /// Leerlauf-Zeitlimit fuer Verbindungen ohne offene Streams
    pub idle_timeout: Duration,
}

impl Default for DhtConfig {
    fn default() -> Self {
        Self {
            listen: vec![tcp_adresse(Ipv4Addr::UNSPECIFIED)],
            bootstrap: Vec::new(),
            mdns: true,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            idle_timeout: Duration::from_secs(60),
        }
    }
}

impl DhtConfig {
    /// Isolierter Knoten auf Loopback, ohne mDNS (fuer Tests)
    pub fn lokal() -> Self {
        Self {
            listen: vec![tcp_adresse(Ipv4Addr::LOCALHOST)],
            mdns: false,
            ..Self::default()
        }
    }
}

fn tcp_adresse(ip: Ipv4Addr) -> Multiaddr {
    Multiaddr::empty()
        .with(Protocol::Ip4(ip))
        .with(Protocol::Tcp(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_werte() {
        let config = DhtConfig::default();
        assert_eq!(config.dial_timeout, Duration::from_secs(10));
        assert!(config.mdns);
        assert_eq!(config.listen.len(), 1);
        assert!(config.bootstrap.is_empty());
    }

    #[test]
    fn lokal_ohne_mdns() {
        let config = DhtConfig::lokal();
        assert!(!config.mdns);
        assert_eq!(config.listen[0].to_string(), "/ip4/127.0.0.1/tcp/0");
    }
}
