//! `collect` command implementation.
//!
//! Counterpart of the network mirror: each connection starts with a header
//! line naming the stream, every following line is appended to
//! `<out>/<header>.txt`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::cli::CollectArgs;
use crate::error::CliError;
use crate::signal::shutdown_signal;

/// Execute the `collect` command
pub async fn run_collect(args: &CollectArgs) -> Result<()> {
    tokio::fs::create_dir_all(&args.out)
        .await
        .with_context(|| format!("Failed to create output directory {}", args.out.display()))?;

    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("Failed to listen on {}", args.listen))?;

    info!(
        listen = %args.listen,
        out = %args.out.display(),
        "Collector listening"
    );

    tokio::select! {
        result = serve(listener, args.out.clone()) => {
            result.context("Collector stopped accepting connections")?;
        }
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping collector...");
        }
    }

    info!("Collector finished");
    Ok(())
}

/// Accept connections forever, one task per mirrored stream
async fn serve(listener: TcpListener, out: PathBuf) -> std::io::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        let out = out.clone();
        tokio::spawn(async move {
            match handle_connection(socket, peer, &out).await {
                Ok((name, lines)) => info!(peer = %peer, stream = %name, lines, "Stream closed"),
                Err(e) => warn!(peer = %peer, error = %e, "Stream failed"),
            }
        });
    }
}

/// Store one mirrored stream, returning its name and line count
async fn handle_connection(
    socket: TcpStream,
    peer: SocketAddr,
    out: &Path,
) -> std::result::Result<(String, u64), CliError> {
    let mut lines = BufReader::new(socket).lines();

    let header = lines.next_line().await?.unwrap_or_default();
    let name = stream_name(&header)
        .ok_or_else(|| CliError::invalid_header(peer.to_string(), &header))?
        .to_string();

    let path = out.join(format!("{name}.txt"));
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await?;
    debug!(peer = %peer, path = %path.display(), "Stream opened");

    let mut count: u64 = 0;
    while let Some(line) = lines.next_line().await? {
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        count += 1;
    }
    file.flush().await?;

    Ok((name, count))
}

/// Header as a file stem, if it is safe to use as one
fn stream_name(header: &str) -> Option<&str> {
    let name = header.trim();
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        None
    } else {
        Some(name)
    }
}
