//! Kontext einer Session: eigene Identitaet, Signatur-Dienste, Mute-Liste
//!
//! Der Kontext wird von allen Sessions eines Prozesses geteilt und nur
//! gelesen. Die Mute-Liste ist die einzige veraenderliche Stelle; die Session
//! fragt sie bei jeder Pruefung neu ab.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use nostrrtc_core::{IdentityPublicKey, PeerIdentity};
use nostrrtc_crypto::{IdentitySigner, IdentityVerifier};
use parking_lot::RwLock;

/// Standard-Zeitlimit bis eine Annahme eintreffen muss
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Richtlinie: Identitaeten deren Anfragen abgelehnt werden
pub trait MuteList: Send + Sync + 'static {
    fn is_muted(&self, key: &IdentityPublicKey) -> bool;
}

/// Einfache Mute-Liste im Speicher
#[derive(Debug, Default)]
pub struct MuteListe {
    eintraege: RwLock<HashSet<IdentityPublicKey>>,
}

impl MuteListe {
    pub fn neu(eintraege: impl IntoIterator<Item = IdentityPublicKey>) -> Self {
        Self {
            eintraege: RwLock::new(eintraege.into_iter().collect()),
        }
    }

    pub fn stummschalten(&self, key: IdentityPublicKey) {
        self.eintraege.write().insert(key);
    }

    pub fn freigeben(&self, key: &IdentityPublicKey) {
        self.eintraege.write().remove(key);
    }
}

impl MuteList for MuteListe {
    fn is_muted(&self, key: &IdentityPublicKey) -> bool {
        self.eintraege.read().contains(key)
    }
}

/// Zeitlimits einer Session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Ab dem Senden von notify bis zum Eintreffen von accept
    pub notify_timeout: Duration,
    /// Obergrenze fuer das Halb-Schliessen der Verbindung
    pub schliessen_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
            schliessen_timeout: Duration::from_secs(2),
        }
    }
}

/// Geteilter Kontext aller Sessions
pub struct SessionKontext {
    /// Eigene Identitaet inkl. eigenem Transport-Schluessel
    pub identitaet: PeerIdentity,
    pub signer: Arc<dyn IdentitySigner>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub mute_liste: Arc<dyn MuteList>,
    pub config: SessionConfig,
}

impl std::fmt::Debug for SessionKontext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKontext")
            .field("identitaet", &self.identitaet)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mute_liste_aenderungen_sofort_sichtbar() {
        let liste = MuteListe::neu([IdentityPublicKey([1; 32])]);
        assert!(liste.is_muted(&IdentityPublicKey([1; 32])));
        assert!(!liste.is_muted(&IdentityPublicKey([2; 32])));

        liste.stummschalten(IdentityPublicKey([2; 32]));
        liste.freigeben(&IdentityPublicKey([1; 32]));
        assert!(liste.is_muted(&IdentityPublicKey([2; 32])));
        assert!(!liste.is_muted(&IdentityPublicKey([1; 32])));
    }

    #[test]
    fn standard_zeitlimit() {
        assert_eq!(SessionConfig::default().notify_timeout, Duration::from_secs(30));
    }
}
