//! Knoten-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Bis auf das
//! Identitaets-Geheimnis haben alle Felder sinnvolle Standardwerte.

use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use nostrrtc_core::{CallOptions, IdentityPublicKey, PeerIdentity, TransportPublicKey};
use nostrrtc_dht::{DhtConfig, Multiaddr};
use nostrrtc_signaling::{BackendConfig, SessionConfig};
use serde::{Deserialize, Serialize};

/// Vollstaendige Knoten-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub identitaet: IdentitaetEinstellungen,
    pub dht: DhtEinstellungen,
    pub session: SessionEinstellungen,
    pub mute: MuteEinstellungen,
    pub logging: LoggingEinstellungen,
    /// Ausgehender Anruf beim Start (optional)
    pub anruf: Option<AnrufEinstellungen>,
}

/// Eigene Identitaet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitaetEinstellungen {
    /// Identitaets-Geheimnis, 32 Bytes hex
    pub geheimnis: String,
    /// Anzeige-Identitaet (npub)
    pub npub: String,
}

/// DHT-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DhtEinstellungen {
    /// Lausch-Adressen als Multiaddr
    pub listen: Vec<String>,
    /// Bootstrap-Knoten als Multiaddr mit `/p2p/<peer-id>`
    pub bootstrap: Vec<String>,
    pub mdns: bool,
    pub dial_timeout_sek: u64,
}

impl Default for DhtEinstellungen {
    fn default() -> Self {
        Self {
            listen: vec!["/ip4/0.0.0.0/tcp/0".into()],
            bootstrap: vec![],
            mdns: true,
            dial_timeout_sek: 10,
        }
    }
}

/// Session-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionEinstellungen {
    /// Zeit bis eine Annahme eintreffen muss
    pub notify_timeout_sek: u64,
}

impl Default for SessionEinstellungen {
    fn default() -> Self {
        Self {
            notify_timeout_sek: 30,
        }
    }
}

/// Stummgeschaltete Identitaeten
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MuteEinstellungen {
    /// Identitaets-Schluessel (hex)
    pub schluessel: Vec<String>,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Ziel und Deskriptor eines ausgehenden Anrufs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnrufEinstellungen {
    /// Identitaets-Schluessel des Ziels (hex)
    pub ziel_pub: String,
    pub ziel_npub: String,
    /// Transport-Schluessel des Ziels (hex), aus dem Verzeichnis
    pub ziel_transport_pub: String,
    /// Datei mit dem SDP-Offer der Medien-Engine
    pub deskriptor_datei: String,
    #[serde(default)]
    pub optionen: CallOptions,
}

impl NodeConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow!("Konfigurationsdatei '{pfad}' nicht lesbar: {e}")),
        }
    }

    /// Identitaets-Geheimnis als Bytes
    pub fn geheimnis(&self) -> anyhow::Result<[u8; 32]> {
        if self.identitaet.geheimnis.is_empty() {
            bail!("[identitaet] geheimnis fehlt");
        }
        let bytes = hex::decode(&self.identitaet.geheimnis)
            .context("[identitaet] geheimnis ist kein Hex")?;
        bytes
            .try_into()
            .map_err(|b: Vec<u8>| anyhow!("[identitaet] geheimnis: 32 Bytes erwartet, {} erhalten", b.len()))
    }

    pub fn backend_config(&self) -> anyhow::Result<BackendConfig> {
        let adressen = |liste: &[String]| -> anyhow::Result<Vec<Multiaddr>> {
            liste
                .iter()
                .map(|a| {
                    a.parse::<Multiaddr>()
                        .with_context(|| format!("ungueltige Multiaddr '{a}'"))
                })
                .collect()
        };

        let dht = DhtConfig {
            listen: adressen(&self.dht.listen)?,
            bootstrap: adressen(&self.dht.bootstrap)?,
            mdns: self.dht.mdns,
            dial_timeout: Duration::from_secs(self.dht.dial_timeout_sek),
            ..DhtConfig::default()
        };
        let session = SessionConfig {
            notify_timeout: Duration::from_secs(self.session.notify_timeout_sek),
            ..SessionConfig::default()
        };
        Ok(BackendConfig { dht, session })
    }

    pub fn mute_schluessel(&self) -> anyhow::Result<Vec<IdentityPublicKey>> {
        self.mute
            .schluessel
            .iter()
            .map(|s| {
                IdentityPublicKey::aus_hex(s)
                    .with_context(|| format!("[mute] ungueltiger Schluessel '{s}'"))
            })
            .collect()
    }
}

impl AnrufEinstellungen {
    pub fn ziel(&self) -> anyhow::Result<PeerIdentity> {
        Ok(PeerIdentity {
            pub_key: IdentityPublicKey::aus_hex(&self.ziel_pub).context("[anruf] ziel_pub")?,
            npub: self.ziel_npub.clone(),
            transport_pub: TransportPublicKey::aus_hex(&self.ziel_transport_pub)
                .context("[anruf] ziel_transport_pub")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.session.notify_timeout_sek, 30);
        assert_eq!(cfg.dht.dial_timeout_sek, 10);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.anruf.is_none());

        let backend = cfg.backend_config().unwrap();
        assert_eq!(backend.dht.listen.len(), 1);
        assert_eq!(backend.session.notify_timeout, Duration::from_secs(30));
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [identitaet]
            geheimnis = "0101010101010101010101010101010101010101010101010101010101010101"
            npub = "npub1alice"

            [dht]
            listen = ["/ip4/127.0.0.1/tcp/4001"]
            mdns = false

            [session]
            notify_timeout_sek = 5
        "#;
        let cfg: NodeConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.geheimnis().unwrap(), [1u8; 32]);
        assert_eq!(cfg.identitaet.npub, "npub1alice");
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.dht.dial_timeout_sek, 10);

        let backend = cfg.backend_config().unwrap();
        assert!(!backend.dht.mdns);
        assert_eq!(backend.session.notify_timeout, Duration::from_secs(5));
    }

    #[test]
    fn geheimnis_pflicht_und_32_bytes() {
        let mut cfg = NodeConfig::default();
        assert!(cfg.geheimnis().is_err());
        cfg.identitaet.geheimnis = "abcd".into();
        assert!(cfg.geheimnis().is_err());
        cfg.identitaet.geheimnis = "zz".repeat(32);
        assert!(cfg.geheimnis().is_err());
    }

    #[test]
    fn ungueltige_multiaddr_abgelehnt() {
        let mut cfg = NodeConfig::default();
        cfg.dht.bootstrap = vec!["kein-multiaddr".into()];
        assert!(cfg.backend_config().is_err());
    }

    #[test]
    fn anruf_abschnitt() {
        let toml = format!(
            r#"
            [anruf]
            ziel_pub = "{}"
            ziel_npub = "npub1bob"
            ziel_transport_pub = "{}"
            deskriptor_datei = "offer.sdp"
            "#,
            "02".repeat(32),
            "03".repeat(32)
        );
        let cfg: NodeConfig = toml::from_str(&toml).unwrap();
        let anruf = cfg.anruf.expect("[anruf] gesetzt");
        let ziel = anruf.ziel().unwrap();
        assert_eq!(ziel.pub_key, IdentityPublicKey([2; 32]));
        assert_eq!(ziel.transport_pub, TransportPublicKey([3; 32]));
        assert!(anruf.optionen.audio);
    }

    #[test]
    fn mute_liste_wird_geparst() {
        let mut cfg = NodeConfig::default();
        cfg.mute.schluessel = vec!["04".repeat(32)];
        assert_eq!(cfg.mute_schluessel().unwrap(), vec![IdentityPublicKey([4; 32])]);
        cfg.mute.schluessel.push("xyz".into());
        assert!(cfg.mute_schluessel().is_err());
    }
}
