//! Fehlertypen fuer das Signaling-Protokoll

use nostrrtc_core::NostrRtcError;
use nostrrtc_crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Kein Loopback-Kandidat im Verbindungs-Deskriptor")]
    KeinLoopbackKandidat,

    #[error("Krypto-Fehler: {0}")]
    Krypto(#[from] CryptoError),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

impl From<ProtocolError> for NostrRtcError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Krypto(e) => e.into(),
            other => NostrRtcError::ProtocolViolation(other.to_string()),
        }
    }
}
