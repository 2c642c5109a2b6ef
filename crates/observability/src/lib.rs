//! # nostrrtc-observability
//!
//! Structured Logging via tracing-subscriber (Text oder JSON). Sessions
//! tragen ihre `session_id` als Span-Feld, sodass jede Zeile einer Session
//! zugeordnet werden kann.

pub mod logging;

pub use logging::{log_format_aus, log_level_aus, logging_initialisieren};
