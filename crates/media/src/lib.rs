//! nostrrtc-media – Lokale Medienbruecke
//!
//! Ein UDP-Socket auf dem Loopback-Interface, der als verbundene Byte-Pipe
//! zwischen der Session und der lokalen Echtzeit-Medien-Engine sitzt.
//!
//! ## Architektur
//!
//! ```text
//! Medien-Engine (127.0.0.1:x)
//!     |  UDP
//!     v
//! LoopbackBridge (127.0.0.1:port)
//!     |  erster Loopback-Absender wird gelernt (PeerZustand)
//!     v
//! mpsc-Queue -> Session -> DHT-Verbindung
//! ```

pub mod bridge;
pub mod error;
pub mod peer;

pub use bridge::{BridgeEmpfaenger, LoopbackBridge};
pub use error::{BridgeError, BridgeResult};
pub use peer::PeerZustand;
