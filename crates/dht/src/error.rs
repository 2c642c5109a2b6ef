//! Fehlertypen des DHT-Transports

use nostrrtc_core::NostrRtcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DhtError {
    #[error("Ungueltiger Transport-Schluessel: {0}")]
    UngueltigerSchluessel(String),

    #[error("Lauschen fehlgeschlagen: {0}")]
    Binden(String),

    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Zeitlimit beim Verbindungsaufbau ueberschritten")]
    Zeitlimit,

    #[error("Peer im DHT nicht gefunden")]
    NichtGefunden,

    #[error("DHT-Server ist geschlossen")]
    Geschlossen,

    #[error("Swarm-Aufbau fehlgeschlagen: {0}")]
    Swarm(String),
}

pub type DhtResult<T> = Result<T, DhtError>;

impl From<DhtError> for NostrRtcError {
    fn from(e: DhtError) -> Self {
        match e {
            DhtError::Zeitlimit => NostrRtcError::DialTimeout,
            DhtError::Binden(msg) => NostrRtcError::BindError(msg),
            DhtError::Swarm(msg) => NostrRtcError::Intern(msg),
            other => NostrRtcError::DialError(other.to_string()),
        }
    }
}
