//! nostrrtc-dht – Verschluesselter Transport ueber ein Kademlia-DHT
//!
//! Besitzt genau ein Transport-Schluessel-Paar, nimmt eingehende
//! verschluesselte Verbindungen an und baut ausgehende mit Zeitlimit auf.
//! Kennt keine Signaling-Semantik.
//!
//! ## Module
//! - `server` - `DhtServer` mit libp2p-Swarm und Event-Loop
//! - `connection` - `Connection` (ein geordneter Byte-Stream zu genau einem Peer)
//! - `keys` - Umrechnung Transport-Schluessel <-> libp2p `PeerId`
//! - `config` - `DhtConfig`

pub mod config;
pub mod connection;
pub mod error;
pub mod keys;
pub mod server;

pub use config::DhtConfig;
pub use connection::{ByteStream, Connection};
pub use error::{DhtError, DhtResult};
pub use server::{DhtEvent, DhtServer, SESSION_PROTOKOLL};

pub use libp2p::Multiaddr;
