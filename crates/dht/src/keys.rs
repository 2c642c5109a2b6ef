//! Umrechnung zwischen Transport-Schluesseln und libp2p-Identitaeten
//!
//! Ein Ed25519-Schluessel ergibt eine `PeerId` mit Identity-Multihash; daraus
//! laesst sich der oeffentliche Schluessel wieder gewinnen. Der libp2p-Keypair
//! wird aus demselben Seed gebaut wie `TransportKeyPair`.

use libp2p::identity::{ed25519, Keypair, PublicKey};
use libp2p::PeerId;
use nostrrtc_core::TransportPublicKey;
use nostrrtc_crypto::TransportKeyPair;

use crate::error::{DhtError, DhtResult};

/// Multihash-Code fuer "identity"
const IDENTITY_MULTIHASH: u8 = 0x00;

/// libp2p-Identitaet aus dem abgeleiteten Transport-Schluessel-Paar
pub fn libp2p_keypair(paar: &TransportKeyPair) -> DhtResult<Keypair> {
    let seed = *paar.seed().as_bytes();
    Keypair::ed25519_from_bytes(seed).map_err(|e| DhtError::UngueltigerSchluessel(e.to_string()))
}

/// `PeerId` eines Transport-Schluessels
pub fn peer_id_aus_schluessel(schluessel: &TransportPublicKey) -> DhtResult<PeerId> {
    let ed = ed25519::PublicKey::try_from_bytes(schluessel.as_bytes())
        .map_err(|e| DhtError::UngueltigerSchluessel(e.to_string()))?;
    Ok(PublicKey::from(ed).to_peer_id())
}

/// Transport-Schluessel einer `PeerId`
///
/// `None` fuer Peers die keinen inline kodierten Ed25519-Schluessel tragen.
pub fn schluessel_aus_peer_id(peer: &PeerId) -> Option<TransportPublicKey> {
    let bytes = peer.to_bytes();
    let (&code, rest) = bytes.split_first()?;
    if code != IDENTITY_MULTIHASH {
        return None;
    }
    let (&laenge, digest) = rest.split_first()?;
    if usize::from(laenge) != digest.len() {
        return None;
    }
    let ed = PublicKey::try_decode_protobuf(digest)
        .ok()?
        .try_into_ed25519()
        .ok()?;
    Some(TransportPublicKey(ed.to_bytes()))
}
