//! Gemeinsame Typen fuer das Kryptografie-Subsystem

use ed25519_dalek::SigningKey;
use nostrrtc_core::TransportPublicKey;

/// Sicherer Schluessel-Container (wird beim Drop genullt)
#[derive(Clone)]
pub struct SecretBytes(pub [u8; 32]);

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes([REDACTED] {} bytes)", self.0.len())
    }
}

impl SecretBytes {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Transport-Schluessel-Paar (Ed25519)
///
/// Der geheime Teil ist der 32-Byte-Seed, aus dem sowohl der
/// `ed25519_dalek::SigningKey` als auch die libp2p-Identitaet gebaut werden.
/// Unveraenderlich fuer die Lebensdauer des Prozesses.
#[derive(Clone)]
pub struct TransportKeyPair {
    seed: SecretBytes,
    public: TransportPublicKey,
}

impl TransportKeyPair {
    /// Baut das Schluessel-Paar aus einem Ed25519-Seed
    pub fn aus_seed(seed: [u8; 32]) -> Self {
        let public = TransportPublicKey(SigningKey::from_bytes(&seed).verifying_key().to_bytes());
        Self {
            seed: SecretBytes::new(seed),
            public,
        }
    }

    /// Oeffentlicher Transport-Schluessel
    pub fn public(&self) -> TransportPublicKey {
        self.public
    }

    /// Geheimer Seed (fuer die DHT-Identitaet)
    pub fn seed(&self) -> &SecretBytes {
        &self.seed
    }
}

impl std::fmt::Debug for TransportKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportKeyPair")
            .field("public", &self.public)
            .field("seed", &self.seed)
            .finish()
    }
}

impl PartialEq for TransportKeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.public == other.public && self.seed.0 == other.seed.0
    }
}

impl Eq for TransportKeyPair {}
