// ABOUTME: Entry point for the overlaycast binary.
// ABOUTME: Parses CLI arguments, initializes tracing, and runs either the HTTP server or the stream generator.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use overlaycast_server::{AppState, ServerConfig, create_router};

#[derive(Debug, Parser)]
#[command(name = "overlaycast", version, about = "Overlay store and HLS stream launcher")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP API (the default when no subcommand is given)
    Serve {
        /// Listen port; overrides PORT
        #[arg(long)]
        port: Option<u16>,
        /// Data directory; overrides OVERLAYCAST_DATA_DIR
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Feed a rolling HLS playlist from a looping file or a live feed, in the foreground
    Generate {
        /// Local video file or rtsp:// / rtmp:// / http(s):// URL
        source: String,
        /// Where to write the playlist and segments (default: <data dir>/static/stream)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "overlaycast=debug,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ServerConfig::from_env().context("invalid configuration")?;

    match cli.command {
        None => serve(config).await,
        Some(Commands::Serve { port, data_dir }) => {
            if let Some(port) = port {
                config.set_port(port);
            }
            if let Some(dir) = data_dir {
                config.set_data_dir(dir);
            }
            serve(config).await
        }
        Some(Commands::Generate { source, output_dir }) => {
            let output_dir = output_dir.unwrap_or_else(|| config.stream_dir.clone());
            let status =
                overlaycast_transcode::run_generator(&config.ffmpeg_bin, &source, &output_dir)
                    .await
                    .context("stream generator failed")?;
            if !status.success() {
                anyhow::bail!("transcoder exited with {}", status);
            }
            Ok(())
        }
    }
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let bind = config.bind;
    let state = AppState::new(config);
    state
        .ensure_dirs()
        .context("failed to create upload and stream directories")?;

    tracing::info!(
        "overlay file {}, uploads {}, stream output {} ({:?} mode)",
        state.config.overlay_file.display(),
        state.config.upload_dir.display(),
        state.config.stream_dir.display(),
        state.config.session_mode
    );

    let app = create_router(Arc::new(state));
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;

    tracing::info!("overlaycast listening on {}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("overlaycast shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
