//! nostrrtc-core – Gemeinsame Typen, Fehler und Events
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen nostrRTC-Crates gemeinsam genutzt werden: Schluessel-Newtypes,
//! die Identitaet eines Gespraechspartners, die Fehlertaxonomie und die
//! Events, die eine Session nach aussen meldet.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{NostrRtcError, Result};
pub use event::SessionEvent;
pub use types::{
    CallOptions, IdentityPublicKey, PeerIdentity, SchluesselFehler, SessionId, TransportPublicKey,
};
