//! Loopback-UDP-Bruecke
//!
//! Bindet einen UDP-Socket auf `127.0.0.1:port` und praesentiert ihn als
//! Byte-Pipe:
//! - eingehende Datagramme des gelernten Peers landen in einer begrenzten
//!   mpsc-Queue (volle Queue -> Datagramm wird verworfen)
//! - `senden()` schickt Bytes als Datagramm an den gelernten Peer, vor dem
//!   Lernen werden sie still verworfen
//!
//! Keine Wiederholung, keine Umsortierung. Die getunnelte Medien-Engine
//! toleriert Verluste selbst.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::error::{BridgeError, BridgeResult};
use crate::peer::PeerZustand;

/// Maximale UDP-Datagrammgroesse
const UDP_BUFFER_SIZE: usize = 65_535;

/// Standard-Groesse der Empfangs-Queue
pub const DEFAULT_QUEUE_GROESSE: usize = 256;

/// Empfangsseite der Bruecke (Datagramme der lokalen Medien-Engine)
pub type BridgeEmpfaenger = mpsc::Receiver<Bytes>;

// ---------------------------------------------------------------------------
// LoopbackBridge
// ---------------------------------------------------------------------------

pub struct LoopbackBridge {
    socket: Arc<UdpSocket>,
    lokale_adresse: SocketAddr,
    peer: Arc<Mutex<PeerZustand>>,
    empfangs_task: Mutex<Option<JoinHandle<()>>>,
    geschlossen: AtomicBool,
}

impl LoopbackBridge {
    /// Bindet die Bruecke auf `127.0.0.1:port`
    ///
    /// `port` stammt aus dem ausgehandelten Verbindungs-Deskriptor; 0 laesst
    /// das Betriebssystem waehlen.
    pub async fn binden(port: u16) -> BridgeResult<(Self, BridgeEmpfaenger)> {
        Self::binden_mit_queue(port, DEFAULT_QUEUE_GROESSE).await
    }

    /// Wie [`LoopbackBridge::binden`], mit eigener Queue-Groesse
    pub async fn binden_mit_queue(
        port: u16,
        queue_groesse: usize,
    ) -> BridgeResult<(Self, BridgeEmpfaenger)> {
        let bind_addr = SocketAddrV4::new(Ipv4Addr::LOCALHOST, port);
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|quelle| BridgeError::Binden { port, quelle })?;
        let lokale_adresse = socket.local_addr()?;
        let socket = Arc::new(socket);
        let peer = Arc::new(Mutex::new(PeerZustand::Ungebunden));

        let (tx, rx) = mpsc::channel(queue_groesse.max(1));
        let task = tokio::spawn(empfangs_loop(Arc::clone(&socket), Arc::clone(&peer), tx));

        tracing::info!(addr = %lokale_adresse, "Medienbruecke gebunden");

        Ok((
            Self {
                socket,
                lokale_adresse,
                peer,
                empfangs_task: Mutex::new(Some(task)),
                geschlossen: AtomicBool::new(false),
            },
            rx,
        ))
    }

    /// Gibt die lokale Bind-Adresse zurueck
    pub fn lokale_adresse(&self) -> SocketAddr {
        self.lokale_adresse
    }

    /// Der gelernte lokale Peer, falls schon bekannt
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer.lock().peer()
    }

    pub fn ist_geschlossen(&self) -> bool {
        self.geschlossen.load(Ordering::Acquire)
    }

    /// Sendet Bytes als ein Datagramm an den gelernten Peer
    ///
    /// Ohne gelernten Peer werden die Bytes still verworfen.
    pub async fn senden(&self, daten: &[u8]) -> BridgeResult<()> {
        if self.ist_geschlossen() {
            return Err(BridgeError::Geschlossen);
        }
        let Some(ziel) = self.peer() else {
            tracing::trace!(bytes = daten.len(), "Kein lokaler Peer, Datagramm verworfen");
            return Ok(());
        };
        match self.socket.send_to(daten, ziel).await {
            Ok(_) => {
                tracing::trace!(bytes = daten.len(), ziel = %ziel, "Datagramm gesendet");
            }
            Err(e) => {
                tracing::warn!(fehler = %e, ziel = %ziel, "UDP-Sendefehler");
            }
        }
        Ok(())
    }

    /// Beendet den Empfang und schliesst die Queue. Idempotent.
    pub fn close(&self) {
        if self.geschlossen.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self.empfangs_task.lock().take() {
            task.abort();
        }
        tracing::info!(addr = %self.lokale_adresse, "Medienbruecke geschlossen");
    }
}

impl Drop for LoopbackBridge {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for LoopbackBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackBridge")
            .field("lokale_adresse", &self.lokale_adresse)
            .field("peer", &self.peer())
            .field("geschlossen", &self.ist_geschlossen())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Empfangs-Loop
// ---------------------------------------------------------------------------

async fn empfangs_loop(
    socket: Arc<UdpSocket>,
    peer: Arc<Mutex<PeerZustand>>,
    tx: mpsc::Sender<Bytes>,
) {
    let mut buf = vec![0u8; UDP_BUFFER_SIZE];

    loop {
        let (len, absender) = match socket.recv_from(&mut buf).await {
            Ok(ergebnis) => ergebnis,
            Err(e) => {
                tracing::warn!(fehler = %e, "UDP-Empfangsfehler");
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                continue;
            }
        };

        {
            let mut zustand = peer.lock();
            if zustand.lernen(absender) {
                tracing::info!(peer = %absender, "Lokaler Medien-Peer gelernt");
            }
            if !zustand.erlaubt(&absender) {
                tracing::debug!(absender = %absender, "Datagramm von fremdem Absender ignoriert");
                continue;
            }
        }

        match tx.try_send(Bytes::copy_from_slice(&buf[..len])) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::debug!(bytes = len, "Empfangs-Queue voll, Datagramm verworfen");
            }
            Err(TrySendError::Closed(_)) => break,
        }
    }

    tracing::debug!("Empfangs-Loop der Medienbruecke beendet");
}
