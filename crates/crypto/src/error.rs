//! Fehlertypen fuer das Kryptografie-Subsystem

use nostrrtc_core::NostrRtcError;
use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Ungueltiges Identitaets-Geheimnis: {0}")]
    InvalidSecret(String),

    #[error("Signierung fehlgeschlagen: {0}")]
    Signierung(String),

    #[error("Objekt nicht kanonisierbar: {0}")]
    Kanonisierung(#[from] serde_json::Error),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

impl From<CryptoError> for NostrRtcError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidSecret(msg) => NostrRtcError::Konfiguration(msg),
            CryptoError::Signierung(msg) => NostrRtcError::Intern(msg),
            CryptoError::Kanonisierung(e) => NostrRtcError::protokoll(e.to_string()),
        }
    }
}
