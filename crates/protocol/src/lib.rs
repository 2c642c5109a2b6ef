//! nostrrtc-protocol – Signaling-Protokoll
//!
//! Dieses Crate definiert die Nachrichten die zwischen zwei Sessions ueber
//! eine verschluesselte DHT-Verbindung ausgetauscht werden:
//! - `frame` - Request/Response-Frames und die Klassifizierung eingehender Chunks
//! - `handshake` - signierte notify/accept/disconnect-Nachrichten
//! - `sdp` - Extraktion von Kandidaten aus dem Verbindungs-Deskriptor
//! - `wire` - Laengen-Rahmen fuer Chunks auf dem Byte-Stream

pub mod error;
pub mod frame;
pub mod handshake;
pub mod sdp;
pub mod wire;

pub use error::{ProtocolError, ProtocolResult};
pub use frame::{Frame, Request, Response, Route};
pub use handshake::{AcceptParams, DisconnectParams, HandshakeMessage, NotifyParams};
pub use sdp::Kandidat;
pub use wire::ChunkCodec;
