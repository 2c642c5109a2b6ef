//! Routing und Handler der Session
//!
//! Eingehende Chunks werden klassifiziert und hier verteilt. Die lokalen
//! Befehle (notify, accept, disconnect) liegen daneben, damit beide Seiten
//! eines Handshakes an einer Stelle stehen.

use bytes::Bytes;
use nostrrtc_core::{CallOptions, NostrRtcError, PeerIdentity, SessionEvent};
use nostrrtc_protocol::frame::{
    PFAD_ACCEPT, PFAD_DISCONNECT, PFAD_NOTIFY, STATUS_BAD_REQUEST, STATUS_FORBIDDEN, STATUS_OK,
};
use nostrrtc_protocol::{
    sdp, AcceptParams, DisconnectParams, Frame, HandshakeMessage, NotifyParams, Request, Response,
    Route,
};
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{SessionError, SessionResult};
use crate::session::{Rolle, SessionTask, SessionZustand};

impl SessionTask {
    // -----------------------------------------------------------------------
    // Eingang
    // -----------------------------------------------------------------------

    pub(crate) async fn chunk_verarbeiten(&mut self, chunk: Bytes) {
        match Frame::klassifizieren(chunk) {
            Frame::Request(request) => self.request_verarbeiten(request).await,
            Frame::Response(response) => self.response_verarbeiten(response).await,
            Frame::Tunnel(daten) => self.tunnel_empfangen(daten).await,
        }
    }

    async fn tunnel_empfangen(&mut self, daten: Bytes) {
        if let Some(bruecke) = self.bruecke.as_ref() {
            if let Err(e) = bruecke.senden(&daten).await {
                tracing::debug!(fehler = %e, "Tunnel-Daten verworfen");
            }
            return;
        }

        tracing::warn!(laenge = daten.len(), "Tunnel-Daten ohne aktive Medienbruecke");
        let fehler = NostrRtcError::protokoll("Tunnel-Daten ohne aktive Medienbruecke");
        self.schliessen(Some(SessionEvent::Error(fehler))).await;
    }

    async fn request_verarbeiten(&mut self, request: Request) {
        tracing::debug!(request_id = %request.request_id, pfad = %request.path, "Anfrage empfangen");

        match request.route() {
            Route::Notify => self.notify_empfangen(request).await,
            Route::Accept => self.accept_empfangen(request).await,
            Route::Disconnect => self.disconnect_empfangen(request).await,
            Route::Unbekannt => {
                tracing::warn!(methode = %request.method, pfad = %request.path, "Unbekannte Route");
                self.antworten(request.request_id, STATUS_BAD_REQUEST).await;
            }
        }
    }

    /// 400 senden, Fehler melden, Session beenden
    async fn ablehnen(&mut self, request_id: Uuid, fehler: NostrRtcError) {
        tracing::warn!(request_id = %request_id, fehler = %fehler, "Anfrage abgelehnt");
        self.antworten(request_id, STATUS_BAD_REQUEST).await;
        self.schliessen(Some(SessionEvent::Error(fehler))).await;
    }

    async fn notify_empfangen(&mut self, request: Request) {
        let id = request.request_id;
        if self.rolle != Rolle::Angerufener
            || self.zustand() != SessionZustand::AwaitingRemoteNotify
        {
            let fehler = NostrRtcError::protokoll(format!("notify im Zustand {:?}", self.zustand()));
            return self.ablehnen(id, fehler).await;
        }

        let nachricht = match HandshakeMessage::aus_daten(&request.data) {
            Ok(n) => n,
            Err(e) => return self.ablehnen(id, e.into()).await,
        };

        let authentisch = nachricht.verifizieren(
            self.kontext.verifier.as_ref(),
            &nachricht.source.pub_key,
            &self.remote_transport,
        ) && nachricht.destination == self.kontext.identitaet;
        if !authentisch {
            return self.ablehnen(id, NostrRtcError::AuthenticationFailure).await;
        }

        let params: NotifyParams = match nachricht.params_als() {
            Ok(p) => p,
            Err(e) => return self.ablehnen(id, e.into()).await,
        };

        if self.kontext.mute_liste.is_muted(&nachricht.source.pub_key) {
            tracing::info!(npub = %nachricht.source.npub, "Anrufer ist stummgeschaltet");
            self.antworten(id, STATUS_FORBIDDEN).await;
            let event = SessionEvent::Rejected {
                identity: nachricht.source,
            };
            return self.schliessen(Some(event)).await;
        }

        self.antworten(id, STATUS_OK).await;
        self.remote = Some(nachricht.source.clone());
        self.remote_angebot = Some(params.offer.clone());
        self.zustand_setzen(SessionZustand::AwaitingAccept);

        tracing::info!(npub = %nachricht.source.npub, "Eingehender Anruf");
        self.melden(SessionEvent::RemoteNotify {
            source: nachricht.source,
            destination: nachricht.destination,
            options: params.options,
            descriptor: params.offer,
        });
    }

    async fn accept_empfangen(&mut self, request: Request) {
        let id = request.request_id;
        let remote = match (&self.remote, self.rolle, self.zustand()) {
            (Some(remote), Rolle::Anrufer, SessionZustand::AwaitingAccept) => remote.clone(),
            (_, _, zustand) => {
                let fehler = NostrRtcError::protokoll(format!("accept im Zustand {zustand:?}"));
                return self.ablehnen(id, fehler).await;
            }
        };

        let nachricht = match HandshakeMessage::aus_daten(&request.data) {
            Ok(n) => n,
            Err(e) => return self.ablehnen(id, e.into()).await,
        };

        let authentisch = nachricht.verifizieren(
            self.kontext.verifier.as_ref(),
            &remote.pub_key,
            &self.remote_transport,
        ) && nachricht.destination == self.kontext.identitaet;
        if !authentisch {
            return self.ablehnen(id, NostrRtcError::AuthenticationFailure).await;
        }

        let params: AcceptParams = match nachricht.params_als() {
            Ok(p) => p,
            Err(e) => return self.ablehnen(id, e.into()).await,
        };
        let kandidat = match sdp::erster_loopback_kandidat(&params.answer) {
            Ok(k) => k,
            Err(e) => return self.ablehnen(id, e.into()).await,
        };
        if let Err(e) = self.bruecke_binden(kandidat.port).await {
            return self.ablehnen(id, e.into()).await;
        }

        self.notify_frist = None;
        self.melden(SessionEvent::Accepted {
            options: params.options,
            descriptor: params.answer,
        });
        self.antworten(id, STATUS_OK).await;
        self.zustand_setzen(SessionZustand::Active);
        tracing::info!(npub = %remote.npub, "Anruf angenommen");
    }

    async fn disconnect_empfangen(&mut self, request: Request) {
        let id = request.request_id;
        let Some(remote) = self.remote.clone() else {
            let fehler = NostrRtcError::protokoll("disconnect vor notify");
            return self.ablehnen(id, fehler).await;
        };

        let authentisch = HandshakeMessage::aus_daten(&request.data)
            .map(|n| {
                n.verifizieren(
                    self.kontext.verifier.as_ref(),
                    &remote.pub_key,
                    &self.remote_transport,
                )
            })
            .unwrap_or(false);
        if !authentisch {
            return self.ablehnen(id, NostrRtcError::AuthenticationFailure).await;
        }

        self.antworten(id, STATUS_OK).await;
        tracing::info!(npub = %remote.npub, "Gegenseite hat aufgelegt");
        self.schliessen(Some(SessionEvent::Disconnected)).await;
    }

    async fn response_verarbeiten(&mut self, response: Response) {
        let Some(route) = self.ausstehend.remove(&response.request_id) else {
            tracing::debug!(request_id = %response.request_id, "Antwort ohne offene Anfrage");
            return;
        };
        tracing::debug!(request_id = %response.request_id, status = response.status, ?route, "Antwort empfangen");

        match (route, response.status) {
            (Route::Notify, STATUS_OK) => {
                tracing::debug!("notify zugestellt, warte auf Annahme");
            }
            (Route::Notify, STATUS_FORBIDDEN) => {
                tracing::info!("Anruf von der Gegenseite abgelehnt");
                let event = self
                    .remote
                    .clone()
                    .map(|identity| SessionEvent::Rejected { identity });
                self.schliessen(event).await;
            }
            (Route::Accept, STATUS_OK) => {
                if self.zustand() == SessionZustand::Negotiating {
                    self.zustand_setzen(SessionZustand::Active);
                    tracing::info!("Annahme bestaetigt");
                }
            }
            (Route::Disconnect, _) => {}
            (_, STATUS_BAD_REQUEST) => {
                let event = SessionEvent::Error(NostrRtcError::AuthenticationFailure);
                self.schliessen(Some(event)).await;
            }
            (route, status) => {
                let fehler =
                    NostrRtcError::protokoll(format!("unerwarteter Status {status} auf {route:?}"));
                self.schliessen(Some(SessionEvent::Error(fehler))).await;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Lokale Befehle
    // -----------------------------------------------------------------------

    pub(crate) async fn notify_senden(
        &mut self,
        ziel: PeerIdentity,
        options: CallOptions,
        descriptor: String,
    ) -> SessionResult<()> {
        if self.rolle != Rolle::Anrufer || self.zustand() != SessionZustand::Idle {
            return Err(SessionError::falscher_zustand(self.zustand()));
        }
        if ziel.transport_pub != self.remote_transport {
            return Err(SessionError::UngueltigesZiel(ziel.npub));
        }

        let npub = ziel.npub.clone();
        self.remote = Some(ziel);
        let params = NotifyParams {
            options,
            offer: descriptor,
        };
        if let Err(e) = self.anfrage_senden(Route::Notify, PFAD_NOTIFY, &params).await {
            tracing::warn!(fehler = %e, "notify nicht gesendet");
            self.schliessen(None).await;
            return Err(e);
        }

        self.notify_frist = Some(Instant::now() + self.kontext.config.notify_timeout);
        self.zustand_setzen(SessionZustand::AwaitingAccept);
        tracing::info!(npub = %npub, "Anruf signalisiert");
        Ok(())
    }

    pub(crate) async fn accept_senden(
        &mut self,
        options: CallOptions,
        descriptor: String,
    ) -> SessionResult<()> {
        let angebot = match (&self.remote_angebot, self.rolle, self.zustand()) {
            (Some(angebot), Rolle::Angerufener, SessionZustand::AwaitingAccept) => angebot.clone(),
            (_, _, zustand) => return Err(SessionError::falscher_zustand(zustand)),
        };

        let kandidat = match sdp::erster_loopback_kandidat(&angebot) {
            Ok(k) => k,
            Err(e) => return Err(self.abbrechen(e.into()).await),
        };
        if let Err(e) = self.bruecke_binden(kandidat.port).await {
            return Err(self.abbrechen(e).await);
        }

        let params = AcceptParams {
            options,
            offer: angebot,
            answer: descriptor,
        };
        if let Err(e) = self.anfrage_senden(Route::Accept, PFAD_ACCEPT, &params).await {
            return Err(self.abbrechen(e).await);
        }

        self.zustand_setzen(SessionZustand::Negotiating);
        Ok(())
    }

    pub(crate) async fn disconnect_senden(&mut self) -> SessionResult<()> {
        if self.remote.is_some() {
            if let Err(e) = self
                .anfrage_senden(Route::Disconnect, PFAD_DISCONNECT, &DisconnectParams::default())
                .await
            {
                tracing::debug!(fehler = %e, "disconnect nicht gesendet");
            }
        }
        tracing::info!("Aufgelegt");
        self.schliessen(Some(SessionEvent::Disconnected)).await;
        Ok(())
    }

    /// Meldet den Fehler, beendet die Session und gibt den Fehler zurueck
    async fn abbrechen(&mut self, fehler: SessionError) -> SessionError {
        tracing::warn!(fehler = %fehler, "Aushandlung abgebrochen");
        let event = SessionEvent::Error(fehler.als_ereignis_fehler());
        self.schliessen(Some(event)).await;
        fehler
    }
}
