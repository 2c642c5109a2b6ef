//! Peer-Lernen der Medienbruecke
//!
//! Die Bruecke kennt ihren Gegenpart vorab nicht. Der erste Datagramm-Absender
//! auf dem Loopback-Interface wird genau einmal uebernommen; danach ist der
//! Zustand fest.

use std::net::SocketAddr;

/// Zustand des autorisierten lokalen Peers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeerZustand {
    #[default]
    Ungebunden,
    Gebunden(SocketAddr),
}

impl PeerZustand {
    /// Einmaliger Uebergang `Ungebunden -> Gebunden(absender)`
    ///
    /// Gibt `true` zurueck, wenn dieser Aufruf den Uebergang ausgeloest hat.
    /// Nicht-Loopback-Absender loesen nie einen Uebergang aus.
    pub fn lernen(&mut self, absender: SocketAddr) -> bool {
        match self {
            Self::Ungebunden if absender.ip().is_loopback() => {
                *self = Self::Gebunden(absender);
                true
            }
            _ => false,
        }
    }

    /// Ob ein Datagramm dieses Absenders weitergereicht werden darf
    pub fn erlaubt(&self, absender: &SocketAddr) -> bool {
        match self {
            Self::Ungebunden => false,
            Self::Gebunden(peer) => peer == absender,
        }
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        match self {
            Self::Ungebunden => None,
            Self::Gebunden(addr) => Some(*addr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn erster_loopback_absender_gewinnt() {
        let mut zustand = PeerZustand::default();
        assert!(zustand.lernen(addr("127.0.0.1:5000")));
        assert!(!zustand.lernen(addr("127.0.0.1:6000")));
        assert_eq!(zustand.peer(), Some(addr("127.0.0.1:5000")));
    }

    #[test]
    fn fremder_absender_wird_ignoriert() {
        let mut zustand = PeerZustand::default();
        assert!(!zustand.lernen(addr("192.168.1.4:5000")));
        assert_eq!(zustand, PeerZustand::Ungebunden);

        assert!(zustand.lernen(addr("[::1]:7000")));
        assert!(zustand.erlaubt(&addr("[::1]:7000")));
        assert!(!zustand.erlaubt(&addr("127.0.0.1:7000")));
    }
}
