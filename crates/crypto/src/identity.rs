//! Identitaets-Schnittstellen (Ed25519)
//!
//! Der Kern signiert und verifiziert Handshake-Nachrichten nur ueber die
//! Traits `IdentitySigner` und `IdentityVerifier`. Das eigentliche
//! Identitaets-Verzeichnis liefert die Implementierung; `Ed25519Identity`
//! dient dem Knoten-Binary und den Tests.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use nostrrtc_core::IdentityPublicKey;

/// Signiert Hashes mit dem eigenen Langzeit-Schluessel
pub trait IdentitySigner: Send + Sync + 'static {
    /// Eigener oeffentlicher Identitaetsschluessel
    fn public_key(&self) -> IdentityPublicKey;

    /// Signiert einen 32-Byte-Hash (deterministisch)
    fn sign(&self, hash: &[u8; 32]) -> Vec<u8>;
}

/// Prueft Signaturen fremder Identitaeten
pub trait IdentityVerifier: Send + Sync + 'static {
    fn verify(&self, signature: &[u8], hash: &[u8; 32], public_key: &IdentityPublicKey) -> bool;
}

/// Langzeit-Identitaet eines Benutzers (Ed25519)
pub struct Ed25519Identity {
    signing_key: SigningKey,
}

impl Ed25519Identity {
    /// Erstellt eine Identity aus einem privaten Schluessel (32 Bytes)
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// Gibt den privaten Schluessel als Bytes zurueck
    ///
    /// Wird auch als Identitaets-Geheimnis fuer die Transport-Ableitung genutzt.
    pub fn private_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Gibt den oeffentlichen Schluessel als Bytes zurueck
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Verifiziert eine Signatur mit einem oeffentlichen Schluessel
    pub fn verify_bytes(data: &[u8], signature_bytes: &[u8], public_key_bytes: &[u8; 32]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(public_key_bytes) else {
            return false;
        };
        let Ok(sig_array) = signature_bytes.try_into() else {
            return false;
        };
        let signature = Signature::from_bytes(sig_array);
        verifying_key.verify(data, &signature).is_ok()
    }
}

impl IdentitySigner for Ed25519Identity {
    fn public_key(&self) -> IdentityPublicKey {
        IdentityPublicKey(self.public_key_bytes())
    }

    fn sign(&self, hash: &[u8; 32]) -> Vec<u8> {
        self.signing_key.sign(hash).to_bytes().to_vec()
    }
}

impl IdentityVerifier for Ed25519Identity {
    fn verify(&self, signature: &[u8], hash: &[u8; 32], public_key: &IdentityPublicKey) -> bool {
        Self::verify_bytes(hash, signature, public_key.as_bytes())
    }
}

impl std::fmt::Debug for Ed25519Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519Identity {{ public_key: {} }}", self.public_key())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(b: u8) -> Ed25519Identity {
        Ed25519Identity::from_bytes(&[b; 32])
    }

    #[test]
    fn identity_signieren_und_verifizieren() {
        let id = identity(1);
        let hash = [9u8; 32];

        let signature = id.sign(&hash);
        assert_eq!(signature.len(), 64);
        assert!(id.verify(&signature, &hash, &id.public_key()));
    }

    #[test]
    fn signatur_ist_deterministisch() {
        let id = identity(1);
        assert_eq!(id.sign(&[3u8; 32]), id.sign(&[3u8; 32]));
    }

    #[test]
    fn falsche_signatur_wird_abgelehnt() {
        let id = identity(1);
        let hash = [9u8; 32];

        let mut signature = id.sign(&hash);
        signature[0] ^= 0xFF;
        assert!(!id.verify(&signature, &hash, &id.public_key()));
    }

    #[test]
    fn falscher_hash_wird_abgelehnt() {
        let id = identity(1);
        let signature = id.sign(&[9u8; 32]);
        assert!(!id.verify(&signature, &[8u8; 32], &id.public_key()));
    }

    #[test]
    fn verschiedene_keys_ablehnen() {
        let id1 = identity(1);
        let id2 = identity(2);
        let hash = [5u8; 32];

        let sig = id1.sign(&hash);
        assert!(!id1.verify(&sig, &hash, &id2.public_key()));
    }

    #[test]
    fn kaputte_signatur_laenge_abgelehnt() {
        let id = identity(1);
        assert!(!id.verify(&[0u8; 12], &[5u8; 32], &id.public_key()));
    }

    #[test]
    fn identity_from_bytes_roundtrip() {
        let id = identity(4);
        let restored = Ed25519Identity::from_bytes(&id.private_key_bytes());
        assert_eq!(restored.public_key(), id.public_key());
    }
}
