//! Signierte Handshake-Nachrichten (notify / accept / disconnect)
//!
//! ```text
//! { "source": PeerIdentity, "destination": PeerIdentity, "params": {...}, "sig": "<hex>" }
//! ```
//!
//! Die Signatur deckt das Objekt ohne `sig` ab (Objekt-Hash, siehe
//! `nostrrtc_crypto::objekt_hash`). Bei empfangenen Nachrichten wird das
//! empfangene Objekt gehasht, nicht die geparste Form; jede Aenderung an den
//! Bytes (auch Gross-/Kleinschreibung im Hex) bricht die Signatur. Eine Nachricht gilt nur, wenn die Signatur
//! zum Identitaetsschluessel passt UND der Transport-Schluessel der Verbindung
//! dem in der Nachricht genannten entspricht.

use nostrrtc_core::{CallOptions, IdentityPublicKey, PeerIdentity, TransportPublicKey};
use nostrrtc_crypto::{objekt_hash, IdentitySigner, IdentityVerifier};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ProtocolError, ProtocolResult};

// ---------------------------------------------------------------------------
// Params
// ---------------------------------------------------------------------------

/// Params einer `/session/notify`-Nachricht
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyParams {
    pub options: CallOptions,
    /// SDP-Offer des Anrufers
    pub offer: String,
}

/// Params einer `/session/accept`-Nachricht (beide Deskriptoren)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptParams {
    pub options: CallOptions,
    pub offer: String,
    pub answer: String,
}

/// Params einer `/session/disconnect`-Nachricht
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectParams {}

// ---------------------------------------------------------------------------
// HandshakeMessage
// ---------------------------------------------------------------------------

/// Handshake-Nachricht wie sie im `data`-Feld eines Requests steht
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeMessage {
    pub source: PeerIdentity,
    pub destination: PeerIdentity,
    pub params: Value,
    /// Hex-kodierte Signatur (Kleinbuchstaben)
    pub sig: String,
    /// Empfangenes Objekt ohne `sig`
    #[serde(skip)]
    empfangen: Option<Value>,
}

impl HandshakeMessage {
    /// Baut und signiert eine Nachricht
    pub fn signieren<P: Serialize>(
        source: PeerIdentity,
        destination: PeerIdentity,
        params: &P,
        signer: &dyn IdentitySigner,
    ) -> ProtocolResult<Self> {
        let params = serde_json::to_value(params)?;
        let hash = unsignierter_hash(&source, &destination, &params)?;
        let sig = hex::encode(signer.sign(&hash));
        Ok(Self {
            source,
            destination,
            params,
            sig,
            empfangen: None,
        })
    }

    /// Parst eine Nachricht aus dem `data`-Feld eines Requests
    pub fn aus_daten(data: &Map<String, Value>) -> ProtocolResult<Self> {
        let mut nachricht: Self = serde_json::from_value(Value::Object(data.clone()))?;
        let mut unsigniert = data.clone();
        unsigniert.remove("sig");
        nachricht.empfangen = Some(Value::Object(unsigniert));
        Ok(nachricht)
    }

    /// Serialisiert die Nachricht fuer das `data`-Feld eines Requests
    pub fn als_daten(&self) -> ProtocolResult<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(ProtocolError::UngueltigeNachricht(
                "Handshake ist kein Objekt".into(),
            )),
        }
    }

    /// Typisierte Sicht auf die Params
    pub fn params_als<P: DeserializeOwned>(&self) -> ProtocolResult<P> {
        Ok(serde_json::from_value(self.params.clone())?)
    }

    /// Prueft Signatur und Transport-Bindung
    ///
    /// `erwarteter_pub` ist der Identitaetsschluessel gegen den geprueft wird,
    /// `verbindung_transport` der tatsaechliche Transport-Schluessel der
    /// Gegenseite. Gibt nur `true`/`false` zurueck, damit nach aussen nie
    /// sichtbar wird welche Pruefung fehlschlug.
    pub fn verifizieren(
        &self,
        verifier: &dyn IdentityVerifier,
        erwarteter_pub: &IdentityPublicKey,
        verbindung_transport: &TransportPublicKey,
    ) -> bool {
        if self.source.transport_pub != *verbindung_transport {
            return false;
        }
        if self.source.pub_key != *erwarteter_pub {
            return false;
        }
        let Ok(signatur) = hex::decode(&self.sig) else {
            return false;
        };
        if hex::encode(&signatur) != self.sig {
            return false;
        }
        let hash = match &self.empfangen {
            Some(objekt) => objekt_hash(objekt).map_err(ProtocolError::from),
            None => unsignierter_hash(&self.source, &self.destination, &self.params),
        };
        let Ok(hash) = hash else {
            return false;
        };
        verifier.verify(&signatur, &hash, erwarteter_pub)
    }
}

fn unsignierter_hash(
    source: &PeerIdentity,
    destination: &PeerIdentity,
    params: &Value,
) -> ProtocolResult<[u8; 32]> {
    let objekt = json!({
        "source": source,
        "destination": destination,
        "params": params,
    });
    Ok(objekt_hash(&objekt)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use nostrrtc_crypto::Ed25519Identity;

    fn peer(id: &Ed25519Identity, npub: &str, transport: u8) -> PeerIdentity {
        PeerIdentity {
            pub_key: id.public_key(),
            npub: npub.into(),
            transport_pub: TransportPublicKey([transport; 32]),
        }
    }

    fn notify(alice: &Ed25519Identity, bob: &Ed25519Identity) -> HandshakeMessage {
        let params = NotifyParams {
            options: CallOptions::default(),
            offer: "v=0\r\n".into(),
        };
        HandshakeMessage::signieren(peer(alice, "npub1alice", 1), peer(bob, "npub1bob", 2), &params, alice)
            .unwrap()
    }

    #[test]
    fn signierte_nachricht_wird_akzeptiert() {
        let alice = Ed25519Identity::from_bytes(&[1; 32]);
        let bob = Ed25519Identity::from_bytes(&[2; 32]);
        let msg = notify(&alice, &bob);

        assert!(msg.verifizieren(&bob, &alice.public_key(), &TransportPublicKey([1; 32])));
        let params: NotifyParams = msg.params_als().unwrap();
        assert_eq!(params.offer, "v=0\r\n");
    }

    #[test]
    fn manipulierte_params_werden_abgelehnt() {
        let alice = Ed25519Identity::from_bytes(&[1; 32]);
        let bob = Ed25519Identity::from_bytes(&[2; 32]);
        let mut msg = notify(&alice, &bob);
        msg.params["offer"] = Value::String("v=1\r\n".into());

        assert!(!msg.verifizieren(&bob, &alice.public_key(), &TransportPublicKey([1; 32])));
    }

    #[test]
    fn manipulierte_signatur_wird_abgelehnt() {
        let alice = Ed25519Identity::from_bytes(&[1; 32]);
        let bob = Ed25519Identity::from_bytes(&[2; 32]);
        let mut msg = notify(&alice, &bob);
        let mut sig = hex::decode(&msg.sig).unwrap();
        sig[10] ^= 0x01;
        msg.sig = hex::encode(sig);

        assert!(!msg.verifizieren(&bob, &alice.public_key(), &TransportPublicKey([1; 32])));
    }

    #[test]
    fn falscher_transport_schluessel_wird_abgelehnt() {
        let alice = Ed25519Identity::from_bytes(&[1; 32]);
        let bob = Ed25519Identity::from_bytes(&[2; 32]);
        let msg = notify(&alice, &bob);

        assert!(!msg.verifizieren(&bob, &alice.public_key(), &TransportPublicKey([9; 32])));
    }

    #[test]
    fn daten_roundtrip_behaelt_signatur() {
        let alice = Ed25519Identity::from_bytes(&[1; 32]);
        let bob = Ed25519Identity::from_bytes(&[2; 32]);
        let msg = notify(&alice, &bob);

        let daten = msg.als_daten().unwrap();
        assert!(daten.contains_key("sig"));
        let geparst = HandshakeMessage::aus_daten(&daten).unwrap();
        assert!(geparst.verifizieren(&bob, &alice.public_key(), &TransportPublicKey([1; 32])));
    }

    #[test]
    fn grossgeschriebenes_hex_bricht_signatur() {
        let alice = Ed25519Identity::from_bytes(&[1; 32]);
        let bob = Ed25519Identity::from_bytes(&[2; 32]);
        let daten = notify(&alice, &bob).als_daten().unwrap();

        let mut quelle_gross = daten.clone();
        let pub_hex = quelle_gross["source"]["pub"].as_str().unwrap().to_uppercase();
        assert_ne!(quelle_gross["source"]["pub"], Value::String(pub_hex.clone()));
        quelle_gross["source"]["pub"] = Value::String(pub_hex);
        let geparst = HandshakeMessage::aus_daten(&quelle_gross).unwrap();
        assert_eq!(geparst.source.pub_key, alice.public_key());
        assert!(!geparst.verifizieren(&bob, &alice.public_key(), &TransportPublicKey([1; 32])));

        let mut sig_gross = daten.clone();
        let sig = sig_gross["sig"].as_str().unwrap().to_uppercase();
        sig_gross["sig"] = Value::String(sig);
        let geparst = HandshakeMessage::aus_daten(&sig_gross).unwrap();
        assert!(!geparst.verifizieren(&bob, &alice.public_key(), &TransportPublicKey([1; 32])));
    }

    #[test]
    fn zusaetzliches_feld_bricht_signatur() {
        let alice = Ed25519Identity::from_bytes(&[1; 32]);
        let bob = Ed25519Identity::from_bytes(&[2; 32]);
        let mut daten = notify(&alice, &bob).als_daten().unwrap();
        daten.insert("extra".into(), json!(1));

        let geparst = HandshakeMessage::aus_daten(&daten).unwrap();
        assert!(!geparst.verifizieren(&bob, &alice.public_key(), &TransportPublicKey([1; 32])));
    }

    #[test]
    fn unvollstaendige_daten_abgelehnt() {
        let mut daten = Map::new();
        daten.insert("params".into(), json!({}));
        assert!(HandshakeMessage::aus_daten(&daten).is_err());
    }
}
