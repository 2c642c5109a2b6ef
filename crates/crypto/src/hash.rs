//! Kanonischer Objekt-Hash
//!
//! Handshake-Nachrichten werden ueber `SHA-256(JSON)` signiert. Der Hash
//! wird ueber einen `serde_json::Value` gebildet, dessen Objekt-Schluessel
//! sortiert serialisiert werden. Damit hashen Sender und Empfaenger dieselben
//! Bytes, unabhaengig von der Feldreihenfolge auf dem Draht.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::CryptoResult;

/// Berechnet den SHA-256-Hash der kanonischen JSON-Darstellung
pub fn objekt_hash<T: Serialize + ?Sized>(objekt: &T) -> CryptoResult<[u8; 32]> {
    let wert = serde_json::to_value(objekt)?;
    let json = serde_json::to_string(&wert)?;
    Ok(Sha256::digest(json.as_bytes()).into())
}
