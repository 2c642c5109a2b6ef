//! # nostrrtc-crypto
//!
//! Kryptografische Bausteine fuer nostrRTC.
//!
//! ## Module
//! - `derivation` - Ableitung des Transport-Schluessel-Paars aus dem Identitaets-Geheimnis
//! - `hash` - Kanonischer Objekt-Hash fuer Handshake-Nachrichten
//! - `identity` - Signatur-Schnittstellen und Ed25519-Implementierung
//! - `types` - Gemeinsame Typen (TransportKeyPair, SecretBytes)
//! - `error` - Fehlertypen

pub mod derivation;
pub mod error;
pub mod hash;
pub mod identity;
pub mod types;

// Bequeme Re-Exports
pub use derivation::{transport_schluessel_ableiten, transport_schluessel_aus_hex, DOMAIN_TAG};
pub use error::{CryptoError, CryptoResult};
pub use hash::objekt_hash;
pub use identity::{Ed25519Identity, IdentitySigner, IdentityVerifier};
pub use types::{SecretBytes, TransportKeyPair};
