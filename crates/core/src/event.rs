//! Session-Ereignisse
//!
//! Jede Session meldet ihre Zustandsuebergaenge ueber einen eigenen Kanal
//! an die Anwendung. `Closed` ist immer das letzte Ereignis und wird genau
//! einmal pro Session gesendet.

use crate::error::NostrRtcError;
use crate::types::{CallOptions, PeerIdentity};

/// Alle Ereignisse die eine Session an ihren Besitzer meldet
#[derive(Debug)]
pub enum SessionEvent {
    /// Ein authentifizierter Anruf ist eingegangen
    RemoteNotify {
        source: PeerIdentity,
        destination: PeerIdentity,
        options: CallOptions,
        /// SDP-Offer des Anrufers
        descriptor: String,
    },
    /// Die Gegenseite hat den Anruf angenommen
    Accepted {
        options: CallOptions,
        /// SDP-Answer des Angerufenen
        descriptor: String,
    },
    /// Die Gegenseite hat den Anruf abgelehnt (oder wurde stummgeschaltet)
    Rejected { identity: PeerIdentity },
    /// Die Gegenseite hat aufgelegt
    Disconnected,
    /// Keine Annahme innerhalb des Zeitlimits
    NoResponse,
    /// Fehler waehrend der Session
    ///
    /// Authentifizierungsfehler werden immer als generisches
    /// `AuthenticationFailure` gemeldet.
    Error(NostrRtcError),
    /// Session ist beendet, alle Ressourcen freigegeben
    Closed,
}

impl SessionEvent {
    /// Kurzer Name fuer Logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::RemoteNotify { .. } => "remote_notify",
            Self::Accepted { .. } => "accepted",
            Self::Rejected { .. } => "rejected",
            Self::Disconnected => "disconnected",
            Self::NoResponse => "no_response",
            Self::Error(_) => "error",
            Self::Closed => "closed",
        }
    }

    /// Fehlerklasse eines Ereignisses, das die Session ohne Gespraech beendet
    ///
    /// `Rejected` ist fuer die Session ein regulaerer Ausgang; die Anwendung
    /// sieht es als `PolicyRejection`.
    pub fn abbruch_grund(&self) -> Option<NostrRtcError> {
        match self {
            Self::Rejected { .. } => Some(NostrRtcError::PolicyRejection),
            Self::NoResponse => Some(NostrRtcError::NoResponse),
            Self::Error(fehler) => Some(fehler.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ereignis_namen() {
        assert_eq!(SessionEvent::Closed.name(), "closed");
        assert_eq!(
            SessionEvent::Error(NostrRtcError::AuthenticationFailure).name(),
            "error"
        );
    }

    #[test]
    fn abbruch_gruende() {
        let abgelehnt = SessionEvent::Rejected {
            identity: PeerIdentity {
                pub_key: crate::types::IdentityPublicKey([1; 32]),
                npub: "npub1test".into(),
                transport_pub: crate::types::TransportPublicKey([2; 32]),
            },
        };
        assert_eq!(
            abgelehnt.abbruch_grund(),
            Some(NostrRtcError::PolicyRejection)
        );
        assert_eq!(
            SessionEvent::NoResponse.abbruch_grund(),
            Some(NostrRtcError::NoResponse)
        );
        assert_eq!(
            SessionEvent::Error(NostrRtcError::AuthenticationFailure).abbruch_grund(),
            Some(NostrRtcError::AuthenticationFailure)
        );
        assert_eq!(SessionEvent::Disconnected.abbruch_grund(), None);
        assert_eq!(SessionEvent::Closed.abbruch_grund(), None);
    }
}
