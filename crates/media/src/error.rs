//! Fehlertypen der Medienbruecke

use nostrrtc_core::NostrRtcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("UDP-Port {port} konnte nicht gebunden werden: {quelle}")]
    Binden {
        port: u16,
        #[source]
        quelle: std::io::Error,
    },

    #[error("Bruecke ist geschlossen")]
    Geschlossen,

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

pub type BridgeResult<T> = Result<T, BridgeError>;

impl From<BridgeError> for NostrRtcError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Binden { .. } => NostrRtcError::BindError(e.to_string()),
            BridgeError::Geschlossen => NostrRtcError::SessionGeschlossen,
            BridgeError::Io(e) => NostrRtcError::Intern(e.to_string()),
        }
    }
}
