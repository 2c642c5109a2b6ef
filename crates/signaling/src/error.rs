//! Fehlertypen fuer die Session-Schicht

use nostrrtc_core::NostrRtcError;
use nostrrtc_crypto::CryptoError;
use nostrrtc_dht::DhtError;
use nostrrtc_media::BridgeError;
use nostrrtc_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Session ist bereits beendet
    #[error("Session ist geschlossen")]
    Geschlossen,

    /// Operation im aktuellen Zustand nicht erlaubt (lokaler Fehlgebrauch)
    #[error("Operation im Zustand {0} nicht erlaubt")]
    FalscherZustand(String),

    /// Der Session-Slot ist belegt
    #[error("Es ist bereits eine Session aktiv")]
    Belegt,

    /// Ziel passt nicht zum Transport-Schluessel der Verbindung
    #[error("Ziel {0} passt nicht zur Verbindung")]
    UngueltigesZiel(String),

    /// Es existiert keine Session
    #[error("Keine Session vorhanden")]
    KeineSession,

    /// Identitaets-Geheimnis oder Signierung unbrauchbar
    #[error("Kryptografie: {0}")]
    Krypto(#[from] CryptoError),

    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtocolError),

    #[error("Medienbruecke: {0}")]
    Bruecke(#[from] BridgeError),

    #[error("Transport: {0}")]
    Transport(#[from] DhtError),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    pub fn falscher_zustand(zustand: impl std::fmt::Debug) -> Self {
        Self::FalscherZustand(format!("{zustand:?}"))
    }

    /// Fehler fuer das `Error`-Event, ohne den Fehler selbst zu verbrauchen
    pub fn als_ereignis_fehler(&self) -> NostrRtcError {
        match self {
            Self::Geschlossen | Self::KeineSession => NostrRtcError::SessionGeschlossen,
            Self::Belegt => NostrRtcError::SessionBelegt,
            Self::FalscherZustand(_) | Self::UngueltigesZiel(_) | Self::Protokoll(_) => {
                NostrRtcError::ProtocolViolation(self.to_string())
            }
            Self::Bruecke(_) => NostrRtcError::BindError(self.to_string()),
            Self::Transport(_) => NostrRtcError::DialError(self.to_string()),
            Self::Io(_) => NostrRtcError::Intern(self.to_string()),
            Self::Krypto(CryptoError::InvalidSecret(msg)) => {
                NostrRtcError::Konfiguration(msg.clone())
            }
            Self::Krypto(_) => NostrRtcError::Intern(self.to_string()),
        }
    }
}

/// Result-Typ fuer die Session-Schicht
pub type SessionResult<T> = Result<T, SessionError>;

impl From<SessionError> for NostrRtcError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Geschlossen | SessionError::KeineSession => {
                NostrRtcError::SessionGeschlossen
            }
            SessionError::FalscherZustand(_) | SessionError::UngueltigesZiel(_) => {
                NostrRtcError::ProtocolViolation(e.to_string())
            }
            SessionError::Belegt => NostrRtcError::SessionBelegt,
            SessionError::Protokoll(e) => e.into(),
            SessionError::Bruecke(e) => e.into(),
            SessionError::Transport(e) => e.into(),
            SessionError::Io(e) => NostrRtcError::Intern(e.to_string()),
            SessionError::Krypto(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbildung_auf_kern_fehler() {
        assert!(matches!(
            NostrRtcError::from(SessionError::Belegt),
            NostrRtcError::SessionBelegt
        ));
        assert!(matches!(
            NostrRtcError::from(SessionError::Protokoll(ProtocolError::KeinLoopbackKandidat)),
            NostrRtcError::ProtocolViolation(_)
        ));
        assert!(matches!(
            NostrRtcError::from(SessionError::Krypto(CryptoError::InvalidSecret("31 Bytes".into()))),
            NostrRtcError::Konfiguration(_)
        ));
        assert!(matches!(
            SessionError::falscher_zustand("Active").als_ereignis_fehler(),
            NostrRtcError::ProtocolViolation(_)
        ));
    }
}
