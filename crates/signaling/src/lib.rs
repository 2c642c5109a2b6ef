//! nostrrtc-signaling – Session-Schicht
//!
//! Eine Session besitzt genau eine verschluesselte DHT-Verbindung fuer die
//! Dauer eines Anrufversuchs, spricht darueber das Signaling-Protokoll und
//! verbindet nach der Aushandlung die lokale Medienbruecke mit der Verbindung.
//!
//! ## Architektur
//!
//! ```text
//! Backend
//!     |  SessionSlot (genau eine Session pro Prozess)
//!     v
//! Session (eigener Task)
//!     |  State Machine: Idle/AwaitingRemoteNotify -> AwaitingAccept
//!     |                 -> Negotiating -> Active -> Closed
//!     |
//!     +-- Frame::klassifizieren -> Request | Response | Tunnel
//!     +-- handlers (notify, accept, disconnect)
//!     +-- LoopbackBridge <-> Connection (Medien-Tunnel)
//! ```

pub mod backend;
pub mod context;
pub mod error;
mod handlers;
pub mod session;
pub mod slot;

// Bequeme Re-Exporte
pub use backend::{Backend, BackendConfig, BackendEvent, Identitaet};
pub use context::{MuteList, MuteListe, SessionConfig, SessionKontext};
pub use error::{SessionError, SessionResult};
pub use session::{Rolle, Session, SessionHandle, SessionZustand};
pub use slot::{SessionPermit, SessionSlot};
