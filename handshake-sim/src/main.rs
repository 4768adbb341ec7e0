//! Entry point for `tcp-handshake-sim`.
//!
//! Parses CLI arguments and dispatches into either **initiator** or
//! **responder** mode.  All protocol work is delegated to library modules;
//! `main.rs` owns only process setup (logging, argument parsing, socket
//! setup, exit status).

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use tcp_handshake_sim::{
    config::EndpointConfig,
    initiator::Initiator,
    journal::OutputJournal,
    responder::Responder,
    socket::{self, SegmentSocket},
};

/// Simulated TCP handshake and teardown over a stream socket.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Open a connection to a responder, then close it.
    Initiator {
        /// Port the responder listens on.
        port: u16,
        /// Responder host [default: 127.0.0.1].
        #[arg(long)]
        host: Option<String>,
        /// Journal file, appended to [default: client.out].
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Accept one connection and answer its teardown.
    Responder {
        /// Port to listen on.
        port: u16,
        /// Address to bind [default: 0.0.0.0].
        #[arg(long)]
        host: Option<String>,
        /// Journal file, appended to [default: server.out].
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn apply(mut config: EndpointConfig, host: Option<String>, out: Option<PathBuf>) -> EndpointConfig {
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(out) = out {
        config = config.with_journal_path(out);
    }
    config
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.mode {
        Mode::Initiator { port, host, out } => {
            run_initiator(apply(EndpointConfig::initiator(port), host, out)).await
        }
        Mode::Responder { port, host, out } => {
            run_responder(apply(EndpointConfig::responder(port), host, out)).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run_initiator(config: EndpointConfig) -> anyhow::Result<()> {
    let journal = OutputJournal::open(&config.journal_path, config.echo_console)
        .with_context(|| format!("opening journal {}", config.journal_path.display()))?;

    let socket = SegmentSocket::connect(&config.host, config.port)
        .await
        .with_context(|| format!("connecting to {}:{}", config.host, config.port))?;
    let local_port = socket.local_addr()?.port();
    log::info!(
        "connected to {}:{} from port {local_port}",
        config.host,
        config.port
    );

    let mut initiator = Initiator::new(socket, journal, local_port, config.port);
    initiator.run().await?;

    tokio::time::sleep(config.linger).await;
    Ok(())
}

async fn run_responder(config: EndpointConfig) -> anyhow::Result<()> {
    let journal = OutputJournal::open(&config.journal_path, config.echo_console)
        .with_context(|| format!("opening journal {}", config.journal_path.display()))?;

    let listener = socket::listen(&config.host, config.port)
        .await
        .with_context(|| format!("listening on {}:{}", config.host, config.port))?;
    let local_port = listener.local_addr()?.port();
    log::info!("listening on {}:{local_port}", config.host);

    let (stream, peer) = socket::accept(&listener).await?;
    log::info!("accepted connection from {peer}");

    let mut responder = Responder::new(stream, journal, local_port);
    responder.run().await?;
    Ok(())
}
