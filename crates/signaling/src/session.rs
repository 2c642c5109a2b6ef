//! Session – ein Anrufversuch ueber genau eine DHT-Verbindung
//!
//! Jede Session laeuft als eigener Task und besitzt ihren gesamten Zustand.
//! Von aussen wird sie nur ueber den [`SessionHandle`] gesteuert (Befehle mit
//! Antwortkanal) und meldet sich ueber einen Event-Kanal zurueck.
//!
//! ## Zustaende
//!
//! ```text
//! Anrufer:      Idle --notify--> AwaitingAccept --accept(ok)--> Active
//! Angerufener:  AwaitingRemoteNotify --notify(ok)--> AwaitingAccept
//!                   --session_accept--> Negotiating --200--> Active
//! jeder Zustand --> Closed | Rejected | Errored
//! ```
//!
//! Nach dem Schliessen wird `SessionEvent::Closed` genau einmal als letztes
//! Event gesendet.

use std::collections::HashMap;
use std::future;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use nostrrtc_core::{CallOptions, PeerIdentity, SessionEvent, SessionId, TransportPublicKey};
use nostrrtc_dht::Connection;
use nostrrtc_media::{BridgeEmpfaenger, LoopbackBridge};
use nostrrtc_protocol::frame::{METHOD_POST, PFAD_DISCONNECT};
use nostrrtc_protocol::{DisconnectParams, HandshakeMessage, Request, Response, Route};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::context::SessionKontext;
use crate::error::{SessionError, SessionResult};
use crate::slot::SessionPermit;

// ---------------------------------------------------------------------------
// Oeffentliche Typen
// ---------------------------------------------------------------------------

/// Wer die Verbindung aufgebaut hat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rolle {
    /// Hat gewaehlt und sendet notify
    Anrufer,
    /// Hat die Verbindung angenommen und erwartet notify
    Angerufener,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionZustand {
    Idle,
    AwaitingRemoteNotify,
    AwaitingAccept,
    Negotiating,
    Active,
    Closed,
    Rejected,
    Errored,
}

impl SessionZustand {
    pub fn ist_beendet(self) -> bool {
        matches!(self, Self::Closed | Self::Rejected | Self::Errored)
    }
}

pub(crate) enum SessionBefehl {
    Notify {
        ziel: PeerIdentity,
        options: CallOptions,
        descriptor: String,
        antwort: oneshot::Sender<SessionResult<()>>,
    },
    Accept {
        options: CallOptions,
        descriptor: String,
        antwort: oneshot::Sender<SessionResult<()>>,
    },
    Disconnect {
        antwort: oneshot::Sender<SessionResult<()>>,
    },
    Close {
        antwort: oneshot::Sender<()>,
    },
}

/// Steuerung einer laufenden Session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    rolle: Rolle,
    befehle: mpsc::UnboundedSender<SessionBefehl>,
    zustand: watch::Receiver<SessionZustand>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn rolle(&self) -> Rolle {
        self.rolle
    }

    pub fn zustand(&self) -> SessionZustand {
        *self.zustand.borrow()
    }

    /// Sendet eine signierte notify-Anfrage an `ziel` (nur Anrufer, nur `Idle`)
    pub async fn session_notify(
        &self,
        ziel: PeerIdentity,
        options: CallOptions,
        descriptor: impl Into<String>,
    ) -> SessionResult<()> {
        let descriptor = descriptor.into();
        self.anfragen(|antwort| SessionBefehl::Notify {
            ziel,
            options,
            descriptor,
            antwort,
        })
        .await
    }

    /// Nimmt den eingegangenen Anruf an (nur Angerufener, nur `AwaitingAccept`)
    pub async fn session_accept(
        &self,
        options: CallOptions,
        descriptor: impl Into<String>,
    ) -> SessionResult<()> {
        let descriptor = descriptor.into();
        self.anfragen(|antwort| SessionBefehl::Accept {
            options,
            descriptor,
            antwort,
        })
        .await
    }

    /// Sendet ein signiertes disconnect und schliesst die Session
    pub async fn session_disconnect(&self) -> SessionResult<()> {
        self.anfragen(|antwort| SessionBefehl::Disconnect { antwort })
            .await
    }

    /// Schliesst die Session; idempotent
    ///
    /// Kehrt erst zurueck, wenn `Closed` gesendet wurde.
    pub async fn close(&self) {
        let (antwort, rx) = oneshot::channel();
        if self.befehle.send(SessionBefehl::Close { antwort }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Wartet bis die Session den Zustand `ziel` oder einen Endzustand erreicht
    pub async fn warten_auf(&self, ziel: SessionZustand) -> SessionZustand {
        let mut rx = self.zustand.clone();
        let ergebnis = rx
            .wait_for(|z| *z == ziel || z.ist_beendet())
            .await
            .map(|z| *z);
        ergebnis.unwrap_or_else(|_| *rx.borrow())
    }

    async fn anfragen(
        &self,
        befehl: impl FnOnce(oneshot::Sender<SessionResult<()>>) -> SessionBefehl,
    ) -> SessionResult<()> {
        let (antwort, rx) = oneshot::channel();
        self.befehle
            .send(befehl(antwort))
            .map_err(|_| SessionError::Geschlossen)?;
        rx.await.map_err(|_| SessionError::Geschlossen)?
    }
}

// ---------------------------------------------------------------------------
// Session-Task
// ---------------------------------------------------------------------------

pub struct Session;

impl Session {
    /// Startet den Session-Task auf `verbindung`
    ///
    /// Das `permit` belegt den Session-Slot bis die Session geschlossen ist.
    pub fn starten(
        verbindung: Connection,
        kontext: Arc<SessionKontext>,
        permit: SessionPermit,
        rolle: Rolle,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        let id = SessionId::new();
        let start = match rolle {
            Rolle::Anrufer => SessionZustand::Idle,
            Rolle::Angerufener => SessionZustand::AwaitingRemoteNotify,
        };
        let (befehl_tx, befehl_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (zustand_tx, zustand_rx) = watch::channel(start);

        let span = tracing::info_span!(
            "session",
            session_id = %id,
            rolle = ?rolle,
            remote_transport = %verbindung.remote()
        );

        let task = SessionTask {
            rolle,
            kontext,
            remote_transport: verbindung.remote(),
            verbindung: Some(verbindung),
            befehle: befehl_rx,
            befehle_offen: true,
            ereignisse: event_tx,
            zustand: zustand_tx,
            remote: None,
            remote_angebot: None,
            bruecke: None,
            bruecke_rx: None,
            ausstehend: HashMap::new(),
            notify_frist: None,
            permit: Some(permit),
            geschlossen: false,
        };
        tokio::spawn(task.ausfuehren().instrument(span));

        let handle = SessionHandle {
            id,
            rolle,
            befehle: befehl_tx,
            zustand: zustand_rx,
        };
        (handle, event_rx)
    }
}

pub(crate) struct SessionTask {
    pub(crate) rolle: Rolle,
    pub(crate) kontext: Arc<SessionKontext>,
    pub(crate) verbindung: Option<Connection>,
    /// Vom Transport authentifizierter Schluessel der Gegenseite
    pub(crate) remote_transport: TransportPublicKey,
    befehle: mpsc::UnboundedReceiver<SessionBefehl>,
    befehle_offen: bool,
    ereignisse: mpsc::UnboundedSender<SessionEvent>,
    zustand: watch::Sender<SessionZustand>,
    /// Identitaet der Gegenseite, sobald bekannt
    pub(crate) remote: Option<PeerIdentity>,
    /// Offer des Anrufers (nur Angerufener)
    pub(crate) remote_angebot: Option<String>,
    pub(crate) bruecke: Option<LoopbackBridge>,
    pub(crate) bruecke_rx: Option<BridgeEmpfaenger>,
    /// Eigene, noch unbeantwortete Anfragen
    pub(crate) ausstehend: HashMap<Uuid, Route>,
    pub(crate) notify_frist: Option<Instant>,
    permit: Option<SessionPermit>,
    geschlossen: bool,
}

impl SessionTask {
    async fn ausfuehren(mut self) {
        tracing::info!("Session gestartet");

        while !self.geschlossen {
            tokio::select! {
                chunk = verbindung_empfangen(&mut self.verbindung) => match chunk {
                    Some(Ok(chunk)) => self.chunk_verarbeiten(chunk).await,
                    Some(Err(e)) => {
                        tracing::warn!(fehler = %e, "Lesefehler auf der Verbindung");
                        self.schliessen(None).await;
                    }
                    None => {
                        tracing::info!("Verbindung von der Gegenseite beendet");
                        self.schliessen(None).await;
                    }
                },
                befehl = self.befehle.recv(), if self.befehle_offen => match befehl {
                    Some(befehl) => self.befehl_ausfuehren(befehl).await,
                    None => self.befehle_offen = false,
                },
                daten = bruecke_empfangen(&mut self.bruecke_rx) => match daten {
                    Some(daten) => self.tunnel_senden(daten).await,
                    None => self.bruecke_rx = None,
                },
                _ = frist_abwarten(self.notify_frist) => {
                    self.notify_zeitlimit().await;
                }
            }
        }

        tracing::debug!("Session-Task beendet");
    }

    async fn befehl_ausfuehren(&mut self, befehl: SessionBefehl) {
        match befehl {
            SessionBefehl::Notify {
                ziel,
                options,
                descriptor,
                antwort,
            } => {
                let ergebnis = self.notify_senden(ziel, options, descriptor).await;
                let _ = antwort.send(ergebnis);
            }
            SessionBefehl::Accept {
                options,
                descriptor,
                antwort,
            } => {
                let ergebnis = self.accept_senden(options, descriptor).await;
                let _ = antwort.send(ergebnis);
            }
            SessionBefehl::Disconnect { antwort } => {
                let ergebnis = self.disconnect_senden().await;
                let _ = antwort.send(ergebnis);
            }
            SessionBefehl::Close { antwort } => {
                self.schliessen(None).await;
                let _ = antwort.send(());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Hilfsfunktionen fuer die Handler
    // -----------------------------------------------------------------------

    pub(crate) fn zustand(&self) -> SessionZustand {
        *self.zustand.borrow()
    }

    pub(crate) fn zustand_setzen(&self, neu: SessionZustand) {
        let alt = self.zustand.send_replace(neu);
        if alt != neu {
            tracing::debug!(von = ?alt, nach = ?neu, "Zustandswechsel");
        }
    }

    pub(crate) fn melden(&self, event: SessionEvent) {
        tracing::debug!(event = event.name(), "Session-Event");
        let _ = self.ereignisse.send(event);
    }

    pub(crate) async fn chunk_senden(&mut self, chunk: Bytes) -> SessionResult<()> {
        let verbindung = self.verbindung.as_mut().ok_or(SessionError::Geschlossen)?;
        verbindung.senden(chunk).await?;
        Ok(())
    }

    /// Signiert eine Handshake-Nachricht an die Gegenseite und sendet sie
    pub(crate) async fn anfrage_senden<P: serde::Serialize>(
        &mut self,
        route: Route,
        pfad: &str,
        params: &P,
    ) -> SessionResult<()> {
        let ziel = self.remote.clone().ok_or(SessionError::KeineSession)?;
        let nachricht = HandshakeMessage::signieren(
            self.kontext.identitaet.clone(),
            ziel,
            params,
            self.kontext.signer.as_ref(),
        )?;
        let request = Request::neu(METHOD_POST, pfad, nachricht.als_daten()?);
        let chunk = request.kodieren()?;
        self.chunk_senden(chunk).await?;
        self.ausstehend.insert(request.request_id, route);
        tracing::debug!(request_id = %request.request_id, pfad, "Anfrage gesendet");
        Ok(())
    }

    pub(crate) async fn antworten(&mut self, request_id: Uuid, status: u16) {
        let chunk = match Response::neu(request_id, status).kodieren() {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::error!(fehler = %e, "Antwort nicht kodierbar");
                return;
            }
        };
        if let Err(e) = self.chunk_senden(chunk).await {
            tracing::warn!(request_id = %request_id, status, fehler = %e, "Antwort nicht gesendet");
        }
    }

    async fn tunnel_senden(&mut self, daten: Bytes) {
        if let Err(e) = self.chunk_senden(daten).await {
            tracing::warn!(fehler = %e, "Tunnel-Daten nicht gesendet");
            self.schliessen(None).await;
        }
    }

    /// Gibt die Bruecke auf `port` frei und verbindet sie mit der Verbindung
    pub(crate) async fn bruecke_binden(&mut self, port: u16) -> SessionResult<()> {
        let (bruecke, rx) = LoopbackBridge::binden(port).await?;
        tracing::info!(adresse = %bruecke.lokale_adresse(), "Medienbruecke gebunden");
        self.bruecke = Some(bruecke);
        self.bruecke_rx = Some(rx);
        Ok(())
    }

    async fn notify_zeitlimit(&mut self) {
        self.notify_frist = None;
        tracing::info!("Keine Annahme innerhalb des Zeitlimits");

        if let Err(e) = self
            .anfrage_senden(Route::Disconnect, PFAD_DISCONNECT, &DisconnectParams::default())
            .await
        {
            tracing::debug!(fehler = %e, "disconnect nach Zeitlimit nicht gesendet");
        }
        self.schliessen(Some(SessionEvent::NoResponse)).await;
    }

    /// Baut die Session ab
    ///
    /// Reihenfolge: Event (optional), Bruecke, Verbindung halb schliessen und
    /// verwerfen, Slot freigeben, `Closed`. Weitere Aufrufe sind wirkungslos.
    pub(crate) async fn schliessen(&mut self, ereignis: Option<SessionEvent>) {
        if self.geschlossen {
            return;
        }
        self.geschlossen = true;

        let endzustand = match &ereignis {
            Some(SessionEvent::Rejected { .. }) => SessionZustand::Rejected,
            Some(SessionEvent::Error(_)) => SessionZustand::Errored,
            _ => SessionZustand::Closed,
        };
        if let Some(event) = ereignis {
            self.melden(event);
        }

        self.bruecke_rx = None;
        if let Some(bruecke) = self.bruecke.take() {
            bruecke.close();
        }

        if let Some(mut verbindung) = self.verbindung.take() {
            let frist = self.kontext.config.schliessen_timeout;
            match tokio::time::timeout(frist, verbindung.schliessen()).await {
                Ok(Err(e)) => tracing::debug!(fehler = %e, "Halb-Schliessen fehlgeschlagen"),
                Err(_) => tracing::debug!("Halb-Schliessen abgebrochen"),
                Ok(Ok(())) => {}
            }
        }

        self.notify_frist = None;
        self.ausstehend.clear();
        self.permit = None;
        self.zustand_setzen(endzustand);

        tracing::info!(zustand = ?endzustand, "Session geschlossen");
        self.melden(SessionEvent::Closed);
    }
}

async fn verbindung_empfangen(
    verbindung: &mut Option<Connection>,
) -> Option<std::io::Result<Bytes>> {
    match verbindung {
        Some(v) => v.next().await,
        None => future::pending().await,
    }
}

async fn bruecke_empfangen(rx: &mut Option<BridgeEmpfaenger>) -> Option<Bytes> {
    match rx {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}

async fn frist_abwarten(frist: Option<Instant>) {
    match frist {
        Some(frist) => tokio::time::sleep_until(frist).await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endzustaende() {
        assert!(SessionZustand::Closed.ist_beendet());
        assert!(SessionZustand::Rejected.ist_beendet());
        assert!(SessionZustand::Errored.ist_beendet());
        assert!(!SessionZustand::Active.ist_beendet());
        assert!(!SessionZustand::Negotiating.ist_beendet());
    }
}
