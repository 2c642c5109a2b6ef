//! Backend – Einstiegspunkt fuer die Anwendung
//!
//! Leitet aus dem Identitaets-Geheimnis den Transport-Schluessel ab, startet
//! den DHT-Server und verwaltet den Session-Slot. Eingehende Verbindungen
//! werden nur angenommen, solange der Slot frei ist; sonst wird die
//! Verbindung sofort verworfen.

use std::sync::Arc;

use nostrrtc_core::{CallOptions, PeerIdentity, SessionEvent, SessionId};
use nostrrtc_crypto::{
    objekt_hash, transport_schluessel_ableiten, IdentitySigner, IdentityVerifier,
};
use nostrrtc_dht::{Connection, DhtConfig, DhtEvent, DhtServer};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::context::{MuteList, SessionConfig, SessionKontext};
use crate::error::{SessionError, SessionResult};
use crate::session::{Rolle, Session, SessionHandle};
use crate::slot::{SessionPermit, SessionSlot};

/// Groesse des Event-Kanals zur Anwendung
const EVENT_KANAL_GROESSE: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    pub dht: DhtConfig,
    pub session: SessionConfig,
}

/// Eigene Identitaet
pub struct Identitaet {
    /// Identitaets-Geheimnis (32 Bytes), Quelle des Transport-Schluessels
    pub geheimnis: Vec<u8>,
    pub npub: String,
    pub signer: Arc<dyn IdentitySigner>,
}

/// Events an die Anwendung
#[derive(Debug)]
pub enum BackendEvent {
    /// Eine Session wurde gestartet
    SessionErstellt { session_id: SessionId, rolle: Rolle },
    /// Event einer Session
    Session {
        session_id: SessionId,
        event: SessionEvent,
    },
}

struct BackendInner {
    dht: DhtServer,
    kontext: Arc<SessionKontext>,
    slot: SessionSlot,
    aktuell: Mutex<Option<SessionHandle>>,
    ereignisse: mpsc::Sender<BackendEvent>,
}

#[derive(Clone)]
pub struct Backend {
    inner: Arc<BackendInner>,
}

impl Backend {
    /// Startet DHT-Server und Annahme-Loop und beginnt zu lauschen
    pub async fn starten(
        config: BackendConfig,
        identitaet: Identitaet,
        verifier: Arc<dyn IdentityVerifier>,
        mute_liste: Arc<dyn MuteList>,
    ) -> SessionResult<(Self, mpsc::Receiver<BackendEvent>)> {
        let paar = transport_schluessel_ableiten(&identitaet.geheimnis)?;
        let (dht, mut dht_rx) = DhtServer::starten(&paar, config.dht)?;

        let eigene = PeerIdentity {
            pub_key: identitaet.signer.public_key(),
            npub: identitaet.npub,
            transport_pub: paar.public(),
        };
        let kontext = Arc::new(SessionKontext {
            identitaet: eigene,
            signer: identitaet.signer,
            verifier,
            mute_liste,
            config: config.session,
        });

        let (ereignisse, rx) = mpsc::channel(EVENT_KANAL_GROESSE);
        let backend = Self {
            inner: Arc::new(BackendInner {
                dht,
                kontext,
                slot: SessionSlot::neu(),
                aktuell: Mutex::new(None),
                ereignisse,
            }),
        };

        let adressen = backend.inner.dht.listen().await?;
        tracing::info!(
            npub = %backend.inner.kontext.identitaet.npub,
            transport_pub = %backend.inner.kontext.identitaet.transport_pub,
            adressen = ?adressen,
            "Backend gestartet"
        );

        let annahme = backend.clone();
        tokio::spawn(async move {
            while let Some(event) = dht_rx.recv().await {
                match event {
                    DhtEvent::EingehendeVerbindung(verbindung) => {
                        annahme.eingehende_verbindung(verbindung);
                    }
                }
            }
            tracing::debug!("Annahme-Loop beendet");
        });

        Ok((backend, rx))
    }

    /// Eigene Identitaet inklusive Transport-Schluessel
    pub fn identitaet(&self) -> &PeerIdentity {
        &self.inner.kontext.identitaet
    }

    pub fn dht(&self) -> &DhtServer {
        &self.inner.dht
    }

    /// Aktuelle Session, falls vorhanden
    pub fn session(&self) -> Option<SessionHandle> {
        self.inner.aktuell.lock().clone()
    }

    /// Ruft `ziel` an: Slot belegen, waehlen, Session starten, notify senden
    pub async fn session_notify(
        &self,
        ziel: PeerIdentity,
        options: CallOptions,
        descriptor: impl Into<String>,
    ) -> SessionResult<SessionId> {
        let permit = self.inner.slot.belegen().ok_or(SessionError::Belegt)?;
        let verbindung = self.inner.dht.dial_standard(&ziel.transport_pub).await?;

        let handle = self.session_starten(verbindung, permit, Rolle::Anrufer);
        if let Err(e) = handle.session_notify(ziel, options, descriptor).await {
            handle.close().await;
            return Err(e);
        }
        Ok(handle.id())
    }

    /// Nimmt den eingehenden Anruf an
    pub async fn session_accept(
        &self,
        options: CallOptions,
        descriptor: impl Into<String>,
    ) -> SessionResult<()> {
        let handle = self.session().ok_or(SessionError::KeineSession)?;
        handle.session_accept(options, descriptor).await
    }

    /// Legt auf; ohne Session wirkungslos
    pub async fn session_disconnect(&self) -> SessionResult<()> {
        match self.session() {
            Some(handle) => match handle.session_disconnect().await {
                Err(SessionError::Geschlossen) | Ok(()) => Ok(()),
                Err(e) => Err(e),
            },
            None => Ok(()),
        }
    }

    /// Signiert den Objekt-Hash von `wert` mit der eigenen Identitaet (hex)
    pub fn signatur(&self, wert: &Value) -> SessionResult<String> {
        let hash = objekt_hash(wert)?;
        Ok(hex::encode(self.inner.kontext.signer.sign(&hash)))
    }

    /// Schliesst Session und DHT-Server; idempotent
    pub async fn close(&self) {
        if let Some(handle) = self.session() {
            handle.close().await;
        }
        self.inner.dht.close().await;
    }

    // -----------------------------------------------------------------------
    // Intern
    // -----------------------------------------------------------------------

    pub(crate) fn eingehende_verbindung(&self, verbindung: Connection) {
        let Some(permit) = self.inner.slot.belegen() else {
            tracing::warn!(remote = %verbindung.remote(), "Session-Slot belegt, Verbindung verworfen");
            return;
        };
        tracing::info!(remote = %verbindung.remote(), "Eingehende Verbindung");
        self.session_starten(verbindung, permit, Rolle::Angerufener);
    }

    fn session_starten(
        &self,
        verbindung: Connection,
        permit: SessionPermit,
        rolle: Rolle,
    ) -> SessionHandle {
        let (handle, mut events) =
            Session::starten(verbindung, Arc::clone(&self.inner.kontext), permit, rolle);
        let session_id = handle.id();
        *self.inner.aktuell.lock() = Some(handle.clone());

        // Zustellung an die Anwendung nur in diesem Task; der Annahme-Loop
        // wartet nie auf sie
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut anwendung_offen = inner
                .ereignisse
                .send(BackendEvent::SessionErstellt { session_id, rolle })
                .await
                .is_ok();
            while let Some(event) = events.recv().await {
                if matches!(event, SessionEvent::Closed) {
                    let mut aktuell = inner.aktuell.lock();
                    if aktuell.as_ref().is_some_and(|h| h.id() == session_id) {
                        *aktuell = None;
                    }
                }
                if anwendung_offen {
                    anwendung_offen = inner
                        .ereignisse
                        .send(BackendEvent::Session { session_id, event })
                        .await
                        .is_ok();
                }
            }
        });

        handle
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("identitaet", &self.inner.kontext.identitaet)
            .field("slot_frei", &self.inner.slot.ist_frei())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MuteListe;
    use crate::session::SessionZustand;
    use nostrrtc_core::TransportPublicKey;
    use nostrrtc_crypto::Ed25519Identity;

    async fn backend(saat: u8) -> (Backend, mpsc::Receiver<BackendEvent>) {
        let signer = Arc::new(Ed25519Identity::from_bytes(&[saat; 32]));
        let identitaet = Identitaet {
            geheimnis: vec![saat; 32],
            npub: format!("npub1test{saat}"),
            signer,
        };
        let config = BackendConfig {
            dht: DhtConfig::lokal(),
            session: SessionConfig::default(),
        };
        Backend::starten(
            config,
            identitaet,
            Arc::new(Ed25519Identity::from_bytes(&[0; 32])),
            Arc::new(MuteListe::default()),
        )
        .await
        .expect("Backend startet")
    }

    #[tokio::test]
    async fn transport_schluessel_aus_geheimnis() {
        let (backend, _rx) = backend(7).await;
        let erwartet = transport_schluessel_ableiten(&[7; 32]).unwrap().public();
        assert_eq!(backend.identitaet().transport_pub, erwartet);
        assert_eq!(backend.dht().public_key(), erwartet);
        backend.close().await;
    }

    #[tokio::test]
    async fn ungueltiges_geheimnis_ist_kryptofehler() {
        let identitaet = Identitaet {
            geheimnis: vec![3; 31],
            npub: "npub1kurz".into(),
            signer: Arc::new(Ed25519Identity::from_bytes(&[3; 32])),
        };
        let ergebnis = Backend::starten(
            BackendConfig {
                dht: DhtConfig::lokal(),
                session: SessionConfig::default(),
            },
            identitaet,
            Arc::new(Ed25519Identity::from_bytes(&[0; 32])),
            Arc::new(MuteListe::default()),
        )
        .await;
        assert!(matches!(
            ergebnis,
            Err(SessionError::Krypto(nostrrtc_crypto::CryptoError::InvalidSecret(_)))
        ));
    }

    #[tokio::test]
    async fn zweite_eingehende_verbindung_wird_verworfen() {
        let (backend, mut rx) = backend(8).await;

        let (a, _a_gegenseite) = tokio::io::duplex(1024);
        backend
            .eingehende_verbindung(Connection::neu(TransportPublicKey([1; 32]), a));
        assert!(matches!(
            rx.recv().await,
            Some(BackendEvent::SessionErstellt { rolle: Rolle::Angerufener, .. })
        ));
        let erste = backend.session().expect("Session aktiv");

        let (b, b_gegenseite) = tokio::io::duplex(1024);
        backend
            .eingehende_verbindung(Connection::neu(TransportPublicKey([2; 32]), b));

        // Verworfene Verbindung: Gegenseite sieht Stream-Ende
        let mut gegenseite = Connection::neu(TransportPublicKey([8; 32]), b_gegenseite);
        assert!(gegenseite.empfangen().await.is_none());
        assert_eq!(backend.session().map(|h| h.id()), Some(erste.id()));

        backend.close().await;
    }

    #[tokio::test]
    async fn session_wird_auch_ohne_anwendung_aufgeraeumt() {
        let (backend, rx) = backend(12).await;
        drop(rx);

        let (a, gegenseite) = tokio::io::duplex(1024);
        backend.eingehende_verbindung(Connection::neu(TransportPublicKey([1; 32]), a));
        let handle = backend.session().expect("Session aktiv");

        drop(gegenseite);
        assert_eq!(
            handle.warten_auf(SessionZustand::Closed).await,
            SessionZustand::Closed
        );
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while backend.session().is_some() || !backend.inner.slot.ist_frei() {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("Slot wird frei");
        backend.close().await;
    }

    #[tokio::test]
    async fn anruf_bei_belegtem_slot_schlaegt_fehl() {
        let (backend, _rx) = backend(9).await;
        let (a, _gegenseite) = tokio::io::duplex(1024);
        backend
            .eingehende_verbindung(Connection::neu(TransportPublicKey([1; 32]), a));

        let ziel = PeerIdentity {
            pub_key: Ed25519Identity::from_bytes(&[1; 32]).public_key(),
            npub: "npub1ziel".into(),
            transport_pub: TransportPublicKey([1; 32]),
        };
        let ergebnis = backend
            .session_notify(ziel, CallOptions::default(), "v=0\r\n")
            .await;
        assert!(matches!(ergebnis, Err(SessionError::Belegt)));
        backend.close().await;
    }

    #[tokio::test]
    async fn disconnect_ohne_session_ist_wirkungslos() {
        let (backend, _rx) = backend(10).await;
        assert!(backend.session_disconnect().await.is_ok());
        assert!(matches!(
            backend.session_accept(CallOptions::default(), "v=0").await,
            Err(SessionError::KeineSession)
        ));
        backend.close().await;
    }

    #[tokio::test]
    async fn signatur_ist_pruefbar() {
        let (backend, _rx) = backend(11).await;
        let wert = serde_json::json!({ "kind": 1, "content": "hallo" });
        let sig = hex::decode(backend.signatur(&wert).unwrap()).unwrap();

        let pruefer = Ed25519Identity::from_bytes(&[0; 32]);
        let hash = objekt_hash(&wert).unwrap();
        assert!(pruefer.verify(&sig, &hash, &backend.identitaet().pub_key));
        backend.close().await;
    }
}
