//! DHT-Server – Listener und Dialer
//!
//! ## Architektur
//!
//! ```text
//! DhtServer (Handle)
//!     |  Befehle (mpsc)
//!     v
//! EventLoop (eigener Task, besitzt den Swarm)
//!     |-- Kademlia: Peer per get_closest_peers suchen
//!     |-- Identify / mDNS: Adressen in die Routing-Tabelle
//!     |-- libp2p-stream: eingehende Streams auf SESSION_PROTOKOLL
//!     v
//! DhtEvent::EingehendeVerbindung(Connection)
//! ```
//!
//! Transport: TCP + Noise + Yamux. Der Server wiederholt nie selbst; jede
//! Fehlerentscheidung liegt beim Aufrufer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use libp2p::kad::store::MemoryStore;
use libp2p::kad::{self, GetClosestPeersError, Mode, PeerInfo, QueryId, QueryResult};
use libp2p::multiaddr::Protocol;
use libp2p::swarm::behaviour::toggle::Toggle;
use libp2p::swarm::dial_opts::{DialOpts, PeerCondition};
use libp2p::swarm::{DialError, NetworkBehaviour, SwarmEvent};
use libp2p::{identify, mdns, noise, ping, tcp, yamux, Multiaddr, PeerId, StreamProtocol, Swarm};
use libp2p_stream::{Control, IncomingStreams};
use nostrrtc_core::TransportPublicKey;
use nostrrtc_crypto::TransportKeyPair;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_util::compat::FuturesAsyncReadCompatExt;

use crate::config::DhtConfig;
use crate::connection::Connection;
use crate::error::{DhtError, DhtResult};
use crate::keys;

/// Stream-Protokoll fuer Session-Verbindungen
pub const SESSION_PROTOKOLL: StreamProtocol = StreamProtocol::new("/nostrrtc/session/1");

const KAD_PROTOKOLL: StreamProtocol = StreamProtocol::new("/nostrrtc/kad/1.0.0");
const PROTOKOLL_VERSION: &str = concat!("/nostrrtc/", env!("CARGO_PKG_VERSION"));

/// Pause zwischen zwei erfolglosen DHT-Suchen innerhalb eines `dial()`
const SUCHE_PAUSE: Duration = Duration::from_millis(500);

/// Ereignisse des DHT-Servers
#[derive(Debug)]
pub enum DhtEvent {
    /// Ein Peer hat eine verschluesselte Verbindung geoeffnet
    EingehendeVerbindung(Connection),
}

#[derive(NetworkBehaviour)]
struct Behaviour {
    identify: identify::Behaviour,
    kad: kad::Behaviour<MemoryStore>,
    mdns: Toggle<mdns::tokio::Behaviour>,
    ping: ping::Behaviour,
    stream: libp2p_stream::Behaviour,
}

enum Befehl {
    Lauschen {
        adressen: Vec<Multiaddr>,
        bootstrap: Vec<Multiaddr>,
        antwort: oneshot::Sender<DhtResult<Vec<Multiaddr>>>,
    },
    Verbinden {
        peer: PeerId,
        antwort: oneshot::Sender<DhtResult<()>>,
    },
    Trennen {
        peer: PeerId,
    },
    Beenden {
        antwort: oneshot::Sender<()>,
    },
}

// ---------------------------------------------------------------------------
// DhtServer
// ---------------------------------------------------------------------------

/// Handle auf den laufenden DHT-Server
///
/// Der Transport-Schluessel ist fuer die Lebensdauer des Servers fest und
/// wird von allen Sessions nur gelesen.
pub struct DhtServer {
    config: DhtConfig,
    public: TransportPublicKey,
    peer_id: PeerId,
    control: Control,
    befehle: mpsc::Sender<Befehl>,
    adressen: Mutex<Vec<Multiaddr>>,
    lauscht: AtomicBool,
    geschlossen: AtomicBool,
}

impl DhtServer {
    /// Baut den Swarm und startet die Event-Loop
    ///
    /// Muss innerhalb einer tokio-Runtime aufgerufen werden. Eingehende
    /// Verbindungen werden erst nach `listen()` angenommen.
    pub fn starten(
        paar: &TransportKeyPair,
        config: DhtConfig,
    ) -> DhtResult<(Self, mpsc::Receiver<DhtEvent>)> {
        let keypair = keys::libp2p_keypair(paar)?;
        let peer_id = keypair.public().to_peer_id();
        let mdns_aktiv = config.mdns;

        let swarm = libp2p::SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_tcp(tcp::Config::default(), noise::Config::new, yamux::Config::default)
            .map_err(|e| DhtError::Swarm(e.to_string()))?
            .with_behaviour(|key| Behaviour {
                identify: identify::Behaviour::new(identify::Config::new(
                    PROTOKOLL_VERSION.to_owned(),
                    key.public(),
                )),
                kad: {
                    let kad_config = kad::Config::new(KAD_PROTOKOLL);
                    let mut kad =
                        kad::Behaviour::with_config(peer_id, MemoryStore::new(peer_id), kad_config);
                    kad.set_mode(Some(Mode::Server));
                    kad
                },
                mdns: mdns_aktiv
                    .then_some(())
                    .and_then(|()| mdns::tokio::Behaviour::new(mdns::Config::default(), peer_id).ok())
                    .into(),
                ping: ping::Behaviour::default(),
                stream: libp2p_stream::Behaviour::new(),
            })
            .map_err(|e| DhtError::Swarm(e.to_string()))?
            .with_swarm_config(|c| c.with_idle_connection_timeout(config.idle_timeout))
            .build();

        let mut control = swarm.behaviour().stream.new_control();
        let eingehend = control
            .accept(SESSION_PROTOKOLL)
            .map_err(|e| DhtError::Swarm(format!("{e:?}")))?;

        let (befehl_tx, befehl_rx) = mpsc::channel(32);
        let (ereignis_tx, ereignis_rx) = mpsc::channel(32);

        let event_loop = EventLoop {
            swarm,
            eingehend,
            befehle: befehl_rx,
            ereignisse: ereignis_tx,
            suchen: HashMap::new(),
            wartend: HashMap::new(),
            lauschen: None,
        };
        tokio::spawn(event_loop.run());

        tracing::debug!(transport_pub = %paar.public(), peer = %peer_id, "DHT-Server gestartet");

        Ok((
            Self {
                config,
                public: paar.public(),
                peer_id,
                control,
                befehle: befehl_tx,
                adressen: Mutex::new(Vec::new()),
                lauscht: AtomicBool::new(false),
                geschlossen: AtomicBool::new(false),
            },
            ereignis_rx,
        ))
    }

    /// Eigener Transport-Schluessel
    pub fn public_key(&self) -> TransportPublicKey {
        self.public
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Tatsaechliche Lausch-Adressen (leer vor `listen()`)
    pub fn adressen(&self) -> Vec<Multiaddr> {
        self.adressen.lock().clone()
    }

    pub fn lauscht(&self) -> bool {
        self.lauscht.load(Ordering::Acquire)
    }

    /// Bindet alle Lausch-Adressen und meldet sich beim DHT an
    ///
    /// Idempotent: ein zweiter Aufruf liefert die bereits gebundenen Adressen.
    pub async fn listen(&self) -> DhtResult<Vec<Multiaddr>> {
        if self.geschlossen.load(Ordering::Acquire) {
            return Err(DhtError::Geschlossen);
        }
        if self.lauscht() {
            return Ok(self.adressen());
        }

        let (antwort, rx) = oneshot::channel();
        self.befehle
            .send(Befehl::Lauschen {
                adressen: self.config.listen.clone(),
                bootstrap: self.config.bootstrap.clone(),
                antwort,
            })
            .await
            .map_err(|_| DhtError::Geschlossen)?;
        let adressen = rx.await.map_err(|_| DhtError::Geschlossen)??;

        *self.adressen.lock() = adressen.clone();
        self.lauscht.store(true, Ordering::Release);

        tracing::info!(
            transport_pub = %self.public,
            adressen = ?adressen,
            "DHT-Server lauscht"
        );
        Ok(adressen)
    }

    /// Baut eine ausgehende Verbindung zum Transport-Schluessel auf
    ///
    /// Der gesamte Versuch ist durch `timeout` begrenzt. Bei Ablauf wird eine
    /// halb offene Verbindung zum Peer getrennt, bevor `Zeitlimit` gemeldet wird.
    pub async fn dial(&self, ziel: &TransportPublicKey, timeout: Duration) -> DhtResult<Connection> {
        if self.geschlossen.load(Ordering::Acquire) {
            return Err(DhtError::Geschlossen);
        }
        let peer = keys::peer_id_aus_schluessel(ziel)?;
        if peer == self.peer_id {
            return Err(DhtError::Verbindung("Verbindung zu sich selbst".into()));
        }

        tracing::debug!(peer = %peer, timeout_ms = timeout.as_millis() as u64, "Verbindungsaufbau");

        match tokio::time::timeout(timeout, self.verbinden(peer, *ziel)).await {
            Ok(ergebnis) => ergebnis,
            Err(_) => {
                let _ = self.befehle.send(Befehl::Trennen { peer }).await;
                tracing::warn!(peer = %peer, "Zeitlimit beim Verbindungsaufbau");
                Err(DhtError::Zeitlimit)
            }
        }
    }

    /// `dial()` mit dem konfigurierten Standard-Zeitlimit
    pub async fn dial_standard(&self, ziel: &TransportPublicKey) -> DhtResult<Connection> {
        self.dial(ziel, self.config.dial_timeout).await
    }

    async fn verbinden(&self, peer: PeerId, ziel: TransportPublicKey) -> DhtResult<Connection> {
        loop {
            let (antwort, rx) = oneshot::channel();
            self.befehle
                .send(Befehl::Verbinden { peer, antwort })
                .await
                .map_err(|_| DhtError::Geschlossen)?;

            match rx.await.map_err(|_| DhtError::Geschlossen)? {
                Ok(()) => break,
                Err(DhtError::NichtGefunden) => {
                    tracing::debug!(peer = %peer, "Peer noch nicht im DHT gefunden");
                    tokio::time::sleep(SUCHE_PAUSE).await;
                }
                Err(e) => return Err(e),
            }
        }

        let mut control = self.control.clone();
        let stream = control
            .open_stream(peer, SESSION_PROTOKOLL)
            .await
            .map_err(|e| DhtError::Verbindung(format!("{e:?}")))?;

        tracing::info!(peer = %peer, transport_pub = %ziel, "Verbunden");
        Ok(Connection::neu(ziel, stream.compat()))
    }

    /// Beendet die Event-Loop und gibt den Swarm frei
    ///
    /// Idempotent, auch ohne vorheriges `listen()`.
    pub async fn close(&self) {
        if self.geschlossen.swap(true, Ordering::AcqRel) {
            return;
        }
        let (antwort, rx) = oneshot::channel();
        if self.befehle.send(Befehl::Beenden { antwort }).await.is_ok() {
            let _ = rx.await;
        }
        if self.lauscht.swap(false, Ordering::AcqRel) {
            tracing::info!(transport_pub = %self.public, "DHT-Server lauscht nicht mehr");
        }
    }
}

impl std::fmt::Debug for DhtServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhtServer")
            .field("public", &self.public)
            .field("peer_id", &self.peer_id)
            .field("lauscht", &self.lauscht())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// EventLoop
// ---------------------------------------------------------------------------

struct LauschAuftrag {
    offen: Vec<libp2p::core::transport::ListenerId>,
    adressen: Vec<Multiaddr>,
    antwort: oneshot::Sender<DhtResult<Vec<Multiaddr>>>,
}

struct EventLoop {
    swarm: Swarm<Behaviour>,
    eingehend: IncomingStreams,
    befehle: mpsc::Receiver<Befehl>,
    ereignisse: mpsc::Sender<DhtEvent>,
    /// Laufende Kademlia-Suchen
    suchen: HashMap<QueryId, PeerId>,
    /// Auf eine Verbindung wartende `dial()`-Aufrufe
    wartend: HashMap<PeerId, Vec<oneshot::Sender<DhtResult<()>>>>,
    lauschen: Option<LauschAuftrag>,
}

impl EventLoop {
    async fn run(mut self) {
        loop {
            tokio::select! {
                ereignis = self.swarm.select_next_some() => self.swarm_ereignis(ereignis),
                Some((peer, stream)) = self.eingehend.next() => {
                    self.eingehender_stream(peer, stream);
                }
                befehl = self.befehle.recv() => match befehl {
                    Some(Befehl::Beenden { antwort }) => {
                        let _ = antwort.send(());
                        break;
                    }
                    Some(befehl) => self.befehl(befehl),
                    None => break,
                },
            }
        }
        tracing::debug!("DHT-Event-Loop beendet");
    }

    fn befehl(&mut self, befehl: Befehl) {
        match befehl {
            Befehl::Lauschen {
                adressen,
                bootstrap,
                antwort,
            } => self.lauschen(adressen, bootstrap, antwort),
            Befehl::Verbinden { peer, antwort } => {
                if self.swarm.is_connected(&peer) {
                    let _ = antwort.send(Ok(()));
                    return;
                }
                let neu = !self.wartend.contains_key(&peer);
                self.wartend.entry(peer).or_default().push(antwort);
                if neu {
                    let id = self.swarm.behaviour_mut().kad.get_closest_peers(peer);
                    self.suchen.insert(id, peer);
                }
            }
            Befehl::Trennen { peer } => {
                self.wartend.remove(&peer);
                self.suchen.retain(|_, p| *p != peer);
                let _ = self.swarm.disconnect_peer_id(peer);
            }
            Befehl::Beenden { .. } => {}
        }
    }

    fn lauschen(
        &mut self,
        adressen: Vec<Multiaddr>,
        bootstrap: Vec<Multiaddr>,
        antwort: oneshot::Sender<DhtResult<Vec<Multiaddr>>>,
    ) {
        let mut offen = Vec::with_capacity(adressen.len());
        for adresse in adressen {
            match self.swarm.listen_on(adresse.clone()) {
                Ok(id) => offen.push(id),
                Err(e) => {
                    let _ = antwort.send(Err(DhtError::Binden(format!("{adresse}: {e}"))));
                    return;
                }
            }
        }

        let mut bekannt = 0usize;
        for mut adresse in bootstrap {
            let Some(Protocol::P2p(peer)) = adresse.pop() else {
                tracing::warn!(adresse = %adresse, "Bootstrap-Adresse ohne /p2p/-Peer-ID ignoriert");
                continue;
            };
            self.swarm.behaviour_mut().kad.add_address(&peer, adresse);
            bekannt += 1;
        }
        if bekannt > 0 {
            if let Err(e) = self.swarm.behaviour_mut().kad.bootstrap() {
                tracing::warn!(fehler = %e, "Kademlia-Bootstrap fehlgeschlagen");
            }
        }

        if offen.is_empty() {
            let _ = antwort.send(Err(DhtError::Binden("keine Lausch-Adressen".into())));
            return;
        }
        self.lauschen = Some(LauschAuftrag {
            offen,
            adressen: Vec::new(),
            antwort,
        });
    }

    fn swarm_ereignis(&mut self, ereignis: SwarmEvent<BehaviourEvent>) {
        match ereignis {
            SwarmEvent::NewListenAddr {
                listener_id,
                address,
            } => {
                tracing::debug!(adresse = %address, "Neue Lausch-Adresse");
                let fertig = match self.lauschen.as_mut() {
                    Some(auftrag) => {
                        if let Some(pos) = auftrag.offen.iter().position(|id| *id == listener_id) {
                            auftrag.offen.swap_remove(pos);
                            auftrag.adressen.push(address);
                        }
                        auftrag.offen.is_empty()
                    }
                    None => false,
                };
                if fertig {
                    if let Some(auftrag) = self.lauschen.take() {
                        let _ = auftrag.antwort.send(Ok(auftrag.adressen));
                    }
                }
            }
            SwarmEvent::ListenerError { listener_id, error } => {
                tracing::warn!(fehler = %error, "Listener-Fehler");
                self.lauschen_fehlgeschlagen(listener_id, error.to_string());
            }
            SwarmEvent::ListenerClosed {
                listener_id,
                reason,
                ..
            } => {
                let grund = match reason {
                    Ok(()) => "geschlossen".to_owned(),
                    Err(e) => e.to_string(),
                };
                self.lauschen_fehlgeschlagen(listener_id, grund);
            }
            SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                tracing::debug!(peer = %peer_id, "Verbindung hergestellt");
                self.wartende_beantworten(peer_id, || Ok(()));
            }
            SwarmEvent::OutgoingConnectionError {
                peer_id: Some(peer_id),
                error,
                ..
            } => {
                tracing::debug!(peer = %peer_id, fehler = %error, "Ausgehende Verbindung fehlgeschlagen");
                let grund = error.to_string();
                self.wartende_beantworten(peer_id, || Err(DhtError::Verbindung(grund.clone())));
            }
            SwarmEvent::Behaviour(BehaviourEvent::Kad(ereignis)) => self.kad_ereignis(ereignis),
            SwarmEvent::Behaviour(BehaviourEvent::Identify(identify::Event::Received {
                peer_id,
                info,
                ..
            })) => {
                if info.protocols.contains(&KAD_PROTOKOLL) {
                    for adresse in info.listen_addrs {
                        self.swarm.behaviour_mut().kad.add_address(&peer_id, adresse);
                    }
                }
            }
            SwarmEvent::Behaviour(BehaviourEvent::Mdns(mdns::Event::Discovered(peers))) => {
                for (peer_id, adresse) in peers {
                    tracing::debug!(peer = %peer_id, adresse = %adresse, "mDNS: Peer entdeckt");
                    self.swarm.behaviour_mut().kad.add_address(&peer_id, adresse);
                }
            }
            _ => {}
        }
    }

    fn lauschen_fehlgeschlagen(&mut self, listener_id: libp2p::core::transport::ListenerId, grund: String) {
        let betroffen = self
            .lauschen
            .as_ref()
            .is_some_and(|a| a.offen.contains(&listener_id));
        if betroffen {
            if let Some(auftrag) = self.lauschen.take() {
                let _ = auftrag.antwort.send(Err(DhtError::Binden(grund)));
            }
        }
    }

    fn kad_ereignis(&mut self, ereignis: kad::Event) {
        let kad::Event::OutboundQueryProgressed {
            id,
            result: QueryResult::GetClosestPeers(ergebnis),
            step,
            ..
        } = ereignis
        else {
            return;
        };

        let peers = match ergebnis {
            Ok(ok) => ok.peers,
            Err(GetClosestPeersError::Timeout { peers, .. }) => peers,
        };
        self.suche_fortschritt(id, peers, step.last);
    }

    fn suche_fortschritt(&mut self, id: QueryId, peers: Vec<PeerInfo>, letzter: bool) {
        let Some(&ziel) = self.suchen.get(&id) else {
            return;
        };

        if let Some(info) = peers.into_iter().find(|p| p.peer_id == ziel) {
            self.suchen.remove(&id);
            if let Some(mut query) = self.swarm.behaviour_mut().kad.query_mut(&id) {
                query.finish();
            }
            self.waehlen(ziel, info.addrs);
        } else if letzter {
            self.suchen.remove(&id);
            self.wartende_beantworten(ziel, || Err(DhtError::NichtGefunden));
        }
    }

    fn waehlen(&mut self, peer: PeerId, adressen: Vec<Multiaddr>) {
        if !self.wartend.contains_key(&peer) {
            return;
        }
        if self.swarm.is_connected(&peer) {
            self.wartende_beantworten(peer, || Ok(()));
            return;
        }

        for adresse in &adressen {
            self.swarm.behaviour_mut().kad.add_address(&peer, adresse.clone());
        }
        let opts = DialOpts::peer_id(peer)
            .addresses(adressen)
            .condition(PeerCondition::DisconnectedAndNotDialing)
            .build();

        match self.swarm.dial(opts) {
            Ok(()) | Err(DialError::DialPeerConditionFalse(_)) => {}
            Err(e) => {
                let grund = e.to_string();
                self.wartende_beantworten(peer, || Err(DhtError::Verbindung(grund.clone())));
            }
        }
    }

    fn wartende_beantworten(&mut self, peer: PeerId, ergebnis: impl Fn() -> DhtResult<()>) {
        if let Some(wartende) = self.wartend.remove(&peer) {
            for antwort in wartende {
                let _ = antwort.send(ergebnis());
            }
        }
    }

    fn eingehender_stream(&mut self, peer: PeerId, stream: libp2p::Stream) {
        let Some(remote) = keys::schluessel_aus_peer_id(&peer) else {
            tracing::warn!(peer = %peer, "Eingehender Stream ohne Ed25519-Schluessel verworfen");
            return;
        };
        tracing::info!(transport_pub = %remote, "Eingehende Verbindung");

        verbindung_zustellen(&self.ereignisse, Connection::neu(remote, stream.compat()));
    }
}

/// Reicht eine eingehende Verbindung weiter, ohne den Swarm zu blockieren
///
/// Bei vollem Kanal wird die Verbindung verworfen; die Gegenseite sieht ein
/// Stream-Ende.
fn verbindung_zustellen(ereignisse: &mpsc::Sender<DhtEvent>, verbindung: Connection) -> bool {
    let remote = verbindung.remote();
    match ereignisse.try_send(DhtEvent::EingehendeVerbindung(verbindung)) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!(transport_pub = %remote, "Ereignis-Kanal voll, Verbindung verworfen");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            tracing::debug!("Kein Empfaenger fuer DHT-Ereignisse");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verbindung(saat: u8) -> (Connection, Connection) {
        let (a, b) = tokio::io::duplex(1024);
        (
            Connection::neu(TransportPublicKey([saat; 32]), a),
            Connection::neu(TransportPublicKey([0; 32]), b),
        )
    }

    #[tokio::test]
    async fn voller_kanal_verwirft_verbindung() {
        let (tx, mut rx) = mpsc::channel(1);

        let (erste, _erste_gegenseite) = verbindung(1);
        assert!(verbindung_zustellen(&tx, erste));

        let (zweite, mut zweite_gegenseite) = verbindung(2);
        assert!(!verbindung_zustellen(&tx, zweite));
        assert!(zweite_gegenseite.empfangen().await.is_none());

        let Some(DhtEvent::EingehendeVerbindung(zugestellt)) = rx.recv().await else {
            panic!("Verbindung erwartet");
        };
        assert_eq!(zugestellt.remote(), TransportPublicKey([1; 32]));
    }

    #[tokio::test]
    async fn ohne_empfaenger_wird_verworfen() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let (v, _gegenseite) = verbindung(3);
        assert!(!verbindung_zustellen(&tx, v));
    }
}
