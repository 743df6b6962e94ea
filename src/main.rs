//! Entry point for `rudp-transfer`.
//!
//! Parses CLI arguments and dispatches into either **send** or **recv** mode.
//! All protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, argument parsing) and the file I/O at the edges.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use rudp_transfer::faults::{FaultChannel, FaultConfig};
use rudp_transfer::session::{persist, FileReceiver, FileSender, TransferConfig};
use rudp_transfer::socket::RudpSocket;

/// Reliable file transfer over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Send a file to a receiving endpoint.
    Send {
        /// Receiver address, e.g. 127.0.0.1:9000.
        #[arg(short, long)]
        receiver: SocketAddr,
        /// Path of the file to transfer.
        #[arg(short, long)]
        file: PathBuf,
        /// Sliding-window size (maximum unacknowledged segments).
        #[arg(long, default_value_t = 5)]
        window: usize,
        /// Payload bytes per data segment.
        #[arg(long, default_value_t = 1024)]
        chunk_size: usize,
        /// Retransmission timeout in milliseconds.
        #[arg(long, default_value_t = 3000)]
        timeout_ms: u64,
        /// Retransmissions per segment before the transfer is abandoned.
        #[arg(long, default_value_t = 10)]
        max_retries: u32,
    },
    /// Receive one file and write it to disk.
    Recv {
        /// UDP port to listen on.
        #[arg(short, long)]
        port: u16,
        /// Directory the reconstructed file is written into.
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Drop each inbound datagram with this probability (testing aid).
        #[arg(long, default_value_t = 0.0)]
        loss_rate: f64,
        /// Hold each inbound datagram up to this many milliseconds (testing aid).
        #[arg(long, default_value_t = 0)]
        max_delay_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Send {
            receiver,
            file,
            window,
            chunk_size,
            timeout_ms,
            max_retries,
        } => {
            let contents = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let name = file
                .file_name()
                .and_then(|n| n.to_str())
                .context("source path has no usable file name")?;

            let socket = RudpSocket::bind("0.0.0.0:0".parse()?).await?;
            let config = TransferConfig {
                window_size: window,
                chunk_size,
                retransmit_timeout: Duration::from_millis(timeout_ms),
                max_retries,
            };
            let mut sender = FileSender::new(socket, receiver, config);
            sender.send_file(name, &contents).await?;
            println!("sent {} ({} bytes)", file.display(), contents.len());
        }
        Mode::Recv {
            port,
            output_dir,
            loss_rate,
            max_delay_ms,
        } => {
            let bind: SocketAddr = format!("0.0.0.0:{port}").parse()?;
            let socket = RudpSocket::bind(bind).await?;
            log::info!("listening on {}", socket.local_addr);

            let file = if loss_rate > 0.0 || max_delay_ms > 0 {
                let faults = FaultConfig {
                    loss_rate,
                    max_delay: Duration::from_millis(max_delay_ms),
                };
                FileReceiver::new(FaultChannel::new(socket, faults))
                    .receive_file()
                    .await?
            } else {
                FileReceiver::new(socket).receive_file().await?
            };

            let path = persist(&file, &output_dir).await?;
            println!("received {} bytes; saved as {}", file.contents.len(), path.display());
        }
    }

    Ok(())
}
