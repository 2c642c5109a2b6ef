//! nostrRTC-Knoten – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Knoten.

use anyhow::Result;
use nostrrtc_node::{config::NodeConfig, Node};
use nostrrtc_observability::logging_initialisieren;

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("NOSTRRTC_CONFIG").unwrap_or_else(|_| "nostrrtc.toml".into());

    let config = NodeConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "nostrRTC-Knoten wird initialisiert"
    );

    Node::neu(config).starten().await
}
