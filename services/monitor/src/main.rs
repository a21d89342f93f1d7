//! Risk-control session monitor.
//!
//! Connects to the control server, mirrors its broadcast feed into a
//! reconstructed order book and relays server log lines to the local log
//! until interrupted.

mod config;
mod session;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use std::net::Ipv4Addr;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::MonitorConfig;
use session::RiskSession;
use types::Severity;

#[derive(Debug, Parser)]
#[command(name = "riskwatch", about = "Risk-control session monitor")]
struct Args {
    /// TOML config file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Control server host.
    #[arg(long)]
    host: Option<String>,

    /// Control server stream port.
    #[arg(long)]
    stream_port: Option<u16>,

    /// Multicast group address.
    #[arg(long)]
    multicast_group: Option<Ipv4Addr>,

    /// Multicast group port.
    #[arg(long)]
    multicast_port: Option<u16>,

    /// Ask the server to replay all history from the start of day.
    #[arg(long)]
    rewind: bool,
}

impl Args {
    fn into_config(self) -> Result<(MonitorConfig, bool)> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::from_file(path)?,
            None => MonitorConfig::default(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.stream_port {
            config.stream_port = port;
        }
        if let Some(group) = self.multicast_group {
            config.multicast_group = group;
        }
        if let Some(port) = self.multicast_port {
            config.multicast_port = port;
        }
        Ok((config, self.rewind))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (config, rewind) = Args::parse().into_config()?;
    info!(endpoint = %config.stream_endpoint(), "starting risk session monitor");

    let mut session = RiskSession::new(&config);
    session
        .connect()
        .await
        .with_context(|| format!("failed to connect to {}", config.stream_endpoint()))?;

    if rewind {
        session.request_rewind(0).await.context("rewind request failed")?;
        info!("requested full history replay");
    }

    // Relay server-side log lines and connection transitions into our log.
    let mut status = session.subscribe_status();
    tokio::spawn(async move {
        while let Ok(transition) = status.recv().await {
            match transition {
                types::ConnectionStatus::Connected { endpoint } => {
                    info!(endpoint = %endpoint, "stream connected");
                }
                types::ConnectionStatus::Disconnected { reason } => {
                    warn!(reason = %reason, "stream disconnected");
                }
            }
        }
    });
    let mut server_logs = session.subscribe_logs();
    tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match server_logs.recv().await {
                Ok(record) => match record.severity {
                    Severity::Error => error!(server = true, "{}", record.message),
                    Severity::Warning => warn!(server = true, "{}", record.message),
                    _ => info!(server = true, "{}", record.message),
                },
                Err(RecvError::Lagged(dropped)) => {
                    warn!(dropped, "server log relay lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    tokio::signal::ctrl_c().await.context("signal handler failed")?;
    info!("shutting down");
    session.disconnect().await;
    Ok(())
}
