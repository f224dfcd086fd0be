mod acme;
mod browse;
mod events;
mod gateway;
mod host;
mod info;
mod mpd;
mod playlist;
mod session;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use samc_proto::config::Config;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::acme::AcmeHost;
use crate::gateway::SessionGateway;
use crate::host::WindowHost;
use crate::info::SongInfo;
use crate::mpd::MpdConnector;
use crate::playlist::PlaylistController;

#[derive(Parser, Debug)]
#[command(name = "samc", about = "Music player client living in acme windows")]
struct Args {
    /// Config file (default: ~/.config/samc/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mount point of the acme file tree
    #[arg(short, long)]
    mount: Option<PathBuf>,
}

fn init_logging() -> anyhow::Result<PathBuf> {
    let data_dir = samc_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = samc_proto::platform::log_path();

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // file gets everything the filter allows, the terminal only problems
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,samc=debug")),
        )
        .init();
    Ok(log_path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let log_path = init_logging()?;
    info!("Log file: {:?}", log_path);

    let mut config = match &args.config {
        Some(path) => Config::load_file(path)?,
        None => Config::load()?,
    };
    if let Some(mount) = args.mount {
        config.acme.mount = mount;
    }
    info!(
        "mpd at {}, acme at {}",
        config.mpd.address(),
        config.acme.mount.display()
    );

    let gateway = SessionGateway::connect(Box::new(MpdConnector::new(config.mpd.clone())))
        .await
        .with_context(|| format!("connecting to mpd at {}", config.mpd.address()))?;
    let gateway = Arc::new(gateway);

    let host: Arc<dyn WindowHost> = Arc::new(AcmeHost::new(config.acme.mount.clone()));
    let info_viewer = Arc::new(SongInfo::new(host.clone(), config.info.command.clone()));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, closing windows");
                shutdown.cancel();
            }
        });
    }

    let playlist = PlaylistController::open(host, gateway.clone(), info_viewer, shutdown)
        .await
        .context("opening playlist window")?;
    if let Err(e) = playlist.run().await {
        error!("playlist window stopped: {:#}", e);
        return Err(e);
    }
    info!("bye ({} reconnects)", gateway.reconnect_count());
    Ok(())
}
