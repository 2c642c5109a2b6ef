//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (hat Vorrang vor der Konfiguration):
//! - `NRTC_LOG_LEVEL`: Filter-Direktive (z.B. `info`, `nostrrtc_dht=debug`), Standard: info
//! - `NRTC_LOG_FORMAT`: Format (text/json), Standard: text

use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "NRTC_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "NRTC_LOG_FORMAT";

/// Initialisiert das Logging-System.
///
/// Darf nur einmal pro Prozess aufgerufen werden.
pub fn logging_initialisieren(level: &str, format: &str) {
    let level = log_level_aus(std::env::var(ENV_LOG_LEVEL).ok(), level);
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    match log_format_aus(std::env::var(ENV_LOG_FORMAT).ok(), format) {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Level aus der Umgebung, sonst aus der Konfiguration, sonst `info`
pub fn log_level_aus(env: Option<String>, konfiguriert: &str) -> String {
    env.filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| {
            if konfiguriert.trim().is_empty() {
                "info".to_string()
            } else {
                konfiguriert.to_string()
            }
        })
}

/// Format aus der Umgebung, sonst aus der Konfiguration; unbekannt -> `text`
pub fn log_format_aus(env: Option<String>, konfiguriert: &str) -> &'static str {
    let gewaehlt = env.unwrap_or_else(|| konfiguriert.to_string());
    if gewaehlt.eq_ignore_ascii_case("json") {
        "json"
    } else {
        "text"
    }
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}
