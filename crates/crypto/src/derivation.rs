//! Ableitung des Transport-Schluessel-Paars
//!
//! `seed = SHA-256("nostrRTC:" ‖ geheimnis)`. Der Seed ist der geheime
//! Ed25519-Schluessel des Transport-Paars. Identitaets-Schicht und DHT nutzen
//! ausschliesslich diese eine Funktion, damit beide Seiten denselben
//! Transport-Schluessel berechnen.

use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};
use crate::types::TransportKeyPair;

/// Domain-Separation-Tag, wird vor dem Hashen vorangestellt
pub const DOMAIN_TAG: &[u8] = b"nostrRTC:";

/// Erwartete Laenge des Identitaets-Geheimnisses in Bytes
pub const GEHEIMNIS_LAENGE: usize = 32;

/// Leitet das Transport-Schluessel-Paar aus dem Identitaets-Geheimnis ab
///
/// Rein und deterministisch. Schlaegt nur bei falscher Laenge fehl.
pub fn transport_schluessel_ableiten(geheimnis: &[u8]) -> CryptoResult<TransportKeyPair> {
    if geheimnis.len() != GEHEIMNIS_LAENGE {
        return Err(CryptoError::InvalidSecret(format!(
            "erwartet {GEHEIMNIS_LAENGE} Bytes, erhalten {}",
            geheimnis.len()
        )));
    }

    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_TAG);
    hasher.update(geheimnis);
    let seed: [u8; 32] = hasher.finalize().into();

    Ok(TransportKeyPair::aus_seed(seed))
}

/// Wie [`transport_schluessel_ableiten`], aber mit Hex-kodiertem Geheimnis
pub fn transport_schluessel_aus_hex(geheimnis_hex: &str) -> CryptoResult<TransportKeyPair> {
    let geheimnis = hex::decode(geheimnis_hex.trim())
        .map_err(|_| CryptoError::InvalidSecret("kein gueltiger Hex-String".into()))?;
    transport_schluessel_ableiten(&geheimnis)
}
