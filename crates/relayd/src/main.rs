//! # relayd
//!
//! Board relay server binary: loads settings, starts logging and metrics,
//! and serves the WebSocket relay until Ctrl+C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use relay_server::{RelayServer, ServerConfig};
use relay_settings::{LogLevel, RelaySettings};

/// Board relay server.
#[derive(Parser, Debug)]
#[command(name = "relayd", about = "WebSocket broadcast relay for board games")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.board-relay/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level: trace, debug, info, warn or error (overrides settings).
    #[arg(long, value_parser = parse_log_level)]
    log_level: Option<LogLevel>,
}

fn parse_log_level(val: &str) -> Result<LogLevel, String> {
    LogLevel::parse(val).ok_or_else(|| format!("unknown log level `{val}`"))
}

impl Cli {
    /// Fold CLI flags over loaded settings.
    fn apply(self, mut settings: RelaySettings) -> RelaySettings {
        if let Some(host) = self.host {
            settings.server.host = host;
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = self.log_level {
            settings.logging.level = level;
        }
        settings
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = Cli::parse();

    let settings = match args.settings.take() {
        Some(path) => relay_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => relay_settings::load_settings().with_context(|| {
            format!(
                "Failed to load settings from {}",
                relay_settings::settings_path().display()
            )
        })?,
    };
    let settings = args.apply(settings);

    relay_core::logging::init_subscriber(settings.logging.level.as_filter_str());
    let metrics = relay_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let server = RelayServer::new(ServerConfig::from(&settings.server), metrics);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("relay listening on ws://{addr}/ws");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().graceful_shutdown(None).await;
    let _ = handle.await;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_keeps_settings() {
        let cli = Cli::parse_from(["relayd"]);
        assert!(cli.settings.is_none());
        let settings = cli.apply(RelaySettings::default());
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.logging.level, LogLevel::Info);
    }

    #[test]
    fn flags_override_settings() {
        let cli = Cli::parse_from([
            "relayd",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--log-level",
            "DEBUG",
        ]);
        let settings = cli.apply(RelaySettings::default());
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.logging.level, LogLevel::Debug);
    }

    #[test]
    fn settings_path_flag() {
        let cli = Cli::parse_from(["relayd", "--settings", "/etc/relay.json"]);
        assert_eq!(cli.settings, Some(PathBuf::from("/etc/relay.json")));
    }

    #[test]
    fn bad_log_level_rejected() {
        assert!(Cli::try_parse_from(["relayd", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn bad_port_rejected() {
        assert!(Cli::try_parse_from(["relayd", "--port", "70000"]).is_err());
    }
}
