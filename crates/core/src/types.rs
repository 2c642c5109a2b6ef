//! Gemeinsame Identifikationstypen fuer nostrRTC
//!
//! Schluessel und IDs verwenden das Newtype-Pattern, damit Identitaets- und
//! Transport-Schluessel zur Compilezeit nicht verwechselt werden koennen.
//! Auf dem Draht werden beide Schluesselarten als Hex-String (64 Zeichen)
//! uebertragen.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

/// Laenge eines oeffentlichen Schluessels in Bytes
pub const SCHLUESSEL_LAENGE: usize = 32;

/// Fehler beim Parsen eines Hex-kodierten Schluessels
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchluesselFehler {
    #[error("Kein gueltiger Hex-String")]
    KeinHex,

    #[error("Ungueltige Schluessel-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    FalscheLaenge { erwartet: usize, erhalten: usize },
}

fn hex_32_parsen(s: &str) -> Result<[u8; SCHLUESSEL_LAENGE], SchluesselFehler> {
    let bytes = hex::decode(s).map_err(|_| SchluesselFehler::KeinHex)?;
    let laenge = bytes.len();
    bytes
        .try_into()
        .map_err(|_| SchluesselFehler::FalscheLaenge {
            erwartet: SCHLUESSEL_LAENGE,
            erhalten: laenge,
        })
}

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Eindeutige Session-ID (eine pro Anrufversuch)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Erstellt eine neue zufaellige SessionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// IdentityPublicKey
// ---------------------------------------------------------------------------

/// Oeffentlicher Langzeit-Identitaetsschluessel (32 Bytes)
///
/// Wird vom Identitaets-Verzeichnis verwaltet; der Kern nutzt ihn nur zur
/// Signaturpruefung und fuer die Mute-Liste.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityPublicKey(pub [u8; SCHLUESSEL_LAENGE]);

impl IdentityPublicKey {
    /// Parst einen Hex-kodierten Schluessel
    pub fn aus_hex(s: &str) -> Result<Self, SchluesselFehler> {
        hex_32_parsen(s).map(Self)
    }

    /// Hex-Darstellung (klein geschrieben)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; SCHLUESSEL_LAENGE] {
        &self.0
    }
}

impl std::fmt::Display for IdentityPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for IdentityPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IdentityPublicKey({})", self.to_hex())
    }
}

impl Serialize for IdentityPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for IdentityPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::aus_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// TransportPublicKey
// ---------------------------------------------------------------------------

/// Oeffentlicher Transport-Schluessel (Ed25519, 32 Bytes)
///
/// Adressiert einen Knoten im DHT. Wird deterministisch aus dem
/// Identitaets-Geheimnis abgeleitet.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportPublicKey(pub [u8; SCHLUESSEL_LAENGE]);

impl TransportPublicKey {
    /// Parst einen Hex-kodierten Schluessel
    pub fn aus_hex(s: &str) -> Result<Self, SchluesselFehler> {
        hex_32_parsen(s).map(Self)
    }

    /// Hex-Darstellung (klein geschrieben)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; SCHLUESSEL_LAENGE] {
        &self.0
    }
}

impl std::fmt::Display for TransportPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for TransportPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransportPublicKey({})", self.to_hex())
    }
}

impl Serialize for TransportPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TransportPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::aus_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// PeerIdentity
// ---------------------------------------------------------------------------

/// Vollstaendige Identitaet eines Gespraechspartners
///
/// Bindet den Identitaetsschluessel an den Transport-Schluessel. Die Bindung
/// selbst stammt aus dem Verzeichnis; der Kern prueft nur, dass der
/// Transport-Schluessel der tatsaechlichen Verbindung zu `transport_pub` passt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerIdentity {
    /// Identitaetsschluessel (Signaturpruefung)
    #[serde(rename = "pub")]
    pub pub_key: IdentityPublicKey,
    /// Anzeige-Identitaet (z.B. npub-Kodierung)
    pub npub: String,
    /// Transport-Schluessel im DHT
    #[serde(rename = "transportPub")]
    pub transport_pub: TransportPublicKey,
}

// ---------------------------------------------------------------------------
// CallOptions
// ---------------------------------------------------------------------------

/// Gewuenschte Medienarten eines Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallOptions {
    pub audio: bool,
    pub video: bool,
    pub data: bool,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            audio: true,
            video: false,
            data: false,
        }
    }
}
