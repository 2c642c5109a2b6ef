//! Kandidaten aus dem Verbindungs-Deskriptor (SDP)
//!
//! Der Deskriptor ist fuer den Kern opak. Gelesen werden nur die
//! `a=candidate:`-Zeilen:
//!
//! ```text
//! a=candidate:<foundation> <component> <transport> <priority> <ip> <port> typ <typ> ...
//! ```
//!
//! Voraussetzung fuer die Medien-Bruecke: die Medien-Engine gibt nur
//! Loopback-Kandidaten weiter. Die Bruecke bindet `127.0.0.1` auf dem Port
//! des ersten Kandidaten mit genau dieser Adresse; `::1` und der Rest von
//! `127.0.0.0/8` zaehlen nicht.

use std::net::{IpAddr, Ipv4Addr};

use crate::error::{ProtocolError, ProtocolResult};

/// Ein ICE-Kandidat aus einer `a=candidate:`-Zeile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kandidat {
    pub foundation: String,
    pub component: u32,
    pub transport: String,
    pub priority: u64,
    pub ip: IpAddr,
    pub port: u16,
    pub typ: String,
}

impl Kandidat {
    /// Nur `127.0.0.1`, die Adresse auf der die Medienbruecke bindet
    pub fn ist_loopback(&self) -> bool {
        self.ip == IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    fn parsen(zeile: &str) -> Option<Self> {
        let rest = zeile.trim().strip_prefix("a=candidate:")?;
        let mut teile = rest.split_whitespace();

        let foundation = teile.next()?.to_owned();
        let component = teile.next()?.parse().ok()?;
        let transport = teile.next()?.to_owned();
        let priority = teile.next()?.parse().ok()?;
        // mDNS-Hostnamen (*.local) sind hier nicht aufloesbar
        let ip = teile.next()?.parse().ok()?;
        let port = teile.next()?.parse().ok()?;
        if teile.next()? != "typ" {
            return None;
        }
        let typ = teile.next()?.to_owned();

        Some(Self {
            foundation,
            component,
            transport,
            priority,
            ip,
            port,
            typ,
        })
    }
}

/// Alle lesbaren Kandidaten in Dokument-Reihenfolge
pub fn kandidaten(sdp: &str) -> Vec<Kandidat> {
    sdp.lines().filter_map(Kandidat::parsen).collect()
}

/// Erster Loopback-Kandidat des Deskriptors
///
/// Fehlt er, ist das ein Fehler des Deskriptor-Erzeugers und fuehrt zum
/// Abbruch der Aushandlung.
pub fn erster_loopback_kandidat(sdp: &str) -> ProtocolResult<Kandidat> {
    kandidaten(sdp)
        .into_iter()
        .find(Kandidat::ist_loopback)
        .ok_or(ProtocolError::KeinLoopbackKandidat)
}
