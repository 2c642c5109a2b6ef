//! nostrrtc-node – Bibliotheks-Root
//!
//! Verdrahtet Konfiguration, Identitaet und Backend und stellt den
//! Einstiegspunkt fuer das Binary bereit.

pub mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use config::NodeConfig;
use nostrrtc_core::SessionEvent;
use nostrrtc_crypto::Ed25519Identity;
use nostrrtc_signaling::{Backend, BackendEvent, Identitaet, MuteListe};
use tokio::sync::mpsc;

/// Haelt den laufenden Knoten zusammen
pub struct Node {
    pub config: NodeConfig,
}

impl Node {
    pub fn neu(config: NodeConfig) -> Self {
        Self { config }
    }

    /// Startet das Backend und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Identitaet aus dem Geheimnis aufbauen
    /// 2. Backend starten (DHT lauscht)
    /// 3. Optional ausgehenden Anruf absetzen
    /// 4. Auf Ctrl-C warten, dann Backend schliessen
    pub async fn starten(self) -> Result<()> {
        let geheimnis = self.config.geheimnis()?;
        let schluessel = Arc::new(Ed25519Identity::from_bytes(&geheimnis));
        let identitaet = Identitaet {
            geheimnis: geheimnis.to_vec(),
            npub: self.config.identitaet.npub.clone(),
            signer: schluessel.clone(),
        };
        let mute_liste = Arc::new(MuteListe::neu(self.config.mute_schluessel()?));

        let (backend, events) = Backend::starten(
            self.config.backend_config()?,
            identitaet,
            schluessel,
            mute_liste,
        )
        .await
        .context("Backend konnte nicht gestartet werden")?;

        tracing::info!(
            npub = %backend.identitaet().npub,
            transport_pub = %backend.identitaet().transport_pub,
            peer_id = %backend.dht().peer_id(),
            adressen = ?backend.dht().adressen(),
            "Knoten bereit"
        );

        tokio::spawn(events_protokollieren(events));

        if let Some(anruf) = &self.config.anruf {
            let ziel = anruf.ziel()?;
            let deskriptor = std::fs::read_to_string(&anruf.deskriptor_datei).with_context(|| {
                format!("Deskriptor-Datei '{}' nicht lesbar", anruf.deskriptor_datei)
            })?;
            match backend.session_notify(ziel, anruf.optionen, deskriptor).await {
                Ok(session_id) => tracing::info!(session_id = %session_id, "Anruf gestartet"),
                Err(e) => tracing::error!(fehler = %e, "Anruf fehlgeschlagen"),
            }
        }

        tracing::info!("Knoten laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Knoten wird beendet");

        backend.close().await;
        Ok(())
    }
}

async fn events_protokollieren(mut events: mpsc::Receiver<BackendEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            BackendEvent::SessionErstellt { session_id, rolle } => {
                tracing::info!(session_id = %session_id, rolle = ?rolle, "Session erstellt");
            }
            BackendEvent::Session {
                session_id,
                event: SessionEvent::RemoteNotify { source, options, .. },
            } => {
                tracing::info!(
                    session_id = %session_id,
                    npub = %source.npub,
                    audio = options.audio,
                    video = options.video,
                    "Eingehender Anruf"
                );
            }
            BackendEvent::Session { session_id, event } => match event.abbruch_grund() {
                Some(grund) => tracing::warn!(
                    session_id = %session_id,
                    event = event.name(),
                    grund = %grund,
                    wiederholbar = grund.ist_wiederholbar(),
                    "Session ohne Gespraech beendet"
                ),
                None => {
                    tracing::info!(session_id = %session_id, event = event.name(), "Session-Event");
                }
            },
        }
    }
}
