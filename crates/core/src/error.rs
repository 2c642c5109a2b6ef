//! Fehlertaxonomie fuer nostrRTC
//!
//! Zentraler Fehler-Enum, in den die Fehler aller Untermodule konvertiert
//! werden. Authentifizierungsfehler tragen bewusst keine Details nach aussen.

use thiserror::Error;

/// Globaler Result-Alias fuer nostrRTC
pub type Result<T> = std::result::Result<T, NostrRtcError>;

/// Alle moeglichen Fehler im nostrRTC-Kern
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NostrRtcError {
    // --- Transport ---
    #[error("Verbindungsaufbau: Zeitlimit ueberschritten")]
    DialTimeout,

    #[error("Verbindungsaufbau fehlgeschlagen: {0}")]
    DialError(String),

    #[error("Binden fehlgeschlagen: {0}")]
    BindError(String),

    // --- Session ---
    #[error("Authentifizierung fehlgeschlagen")]
    AuthenticationFailure,

    #[error("Anfrage aufgrund der Mute-Liste abgelehnt")]
    PolicyRejection,

    #[error("Protokollverletzung: {0}")]
    ProtocolViolation(String),

    #[error("Keine Antwort vom Gegenueber")]
    NoResponse,

    #[error("Es ist bereits eine Session aktiv")]
    SessionBelegt,

    #[error("Session ist bereits geschlossen")]
    SessionGeschlossen,

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl NostrRtcError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Erstellt eine Protokollverletzung
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::ProtocolViolation(msg.into())
    }

    /// Gibt true zurueck wenn ein erneuter Versuch sinnvoll sein koennte
    ///
    /// Der Kern wiederholt selbst nie; die Entscheidung liegt beim Aufrufer.
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(self, Self::DialTimeout | Self::DialError(_) | Self::NoResponse)
    }
}
