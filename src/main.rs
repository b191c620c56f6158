use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sling::Config;

#[derive(Parser)]
#[command(name = "sling", version, about = "Chunked file transfer over secure serial links")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a TOML config file
    #[arg(long, global = true, env = "SLING_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a file to the peer on the other end of a serial device
    Send {
        /// Serial device, e.g. /dev/ttyUSB0
        #[arg(long, env = "SLING_DEVICE")]
        device: PathBuf,

        /// File to send
        file: PathBuf,

        /// Override the configured block size
        #[arg(long)]
        block_size: Option<u32>,

        /// Override the configured pacing delay between blocks
        #[arg(long)]
        pacing_ms: Option<u64>,

        /// Override the configured whole-file attempt cap
        #[arg(long)]
        max_attempts: Option<u32>,
    },

    /// Receive a file from the peer on the other end of a serial device
    Recv {
        /// Serial device, e.g. /dev/ttyUSB0
        #[arg(long, env = "SLING_DEVICE")]
        device: PathBuf,

        /// Where to write the received file
        output: PathBuf,
    },

    /// Generate a pseudo-random test file
    Gen {
        /// Where to write the file
        path: PathBuf,

        /// File size in bytes
        #[arg(long, default_value_t = 65536)]
        size: u64,

        /// Seed for reproducible content
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Send {
            device,
            file,
            block_size,
            pacing_ms,
            max_attempts,
        } => {
            if let Some(block_size) = block_size {
                config.block_size = block_size;
            }
            if let Some(pacing_ms) = pacing_ms {
                config.pacing_ms = pacing_ms;
            }
            if let Some(max_attempts) = max_attempts {
                config.max_attempts = Some(max_attempts);
            }
            run_send(&device, &file, &config).await
        }
        Command::Recv { device, output } => run_recv(&device, &output, &config).await,
        Command::Gen { path, size, seed } => {
            sling::genfile::write_test_file(&path, size, seed).await?;
            println!("wrote {} bytes to {}", size, path.display());
            Ok(())
        }
    }
}

#[cfg(unix)]
async fn run_send(device: &PathBuf, file: &PathBuf, config: &Config) -> Result<()> {
    use sling::channel::framed::FramedChannel;
    use sling::channel::serial::SerialPort;
    use sling::channel::SystemClock;
    use sling::transfer::{bootstrap, negotiate_as_sender, Sender};

    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let total_size =
        u32::try_from(data.len()).context("file exceeds the 4 GiB protocol limit")?;

    let port = SerialPort::open(device)
        .with_context(|| format!("failed to open {}", device.display()))?;
    let mut channel = FramedChannel::new(port);

    bootstrap(&mut channel, &SystemClock, &config.bootstrap_config()).await?;
    let mut session = negotiate_as_sender(&mut channel, total_size, config.block_size).await?;
    let outcome = Sender::new(config.sender_config())
        .send_file(&mut channel, &mut session, &data)
        .await?;

    println!(
        "sent {} bytes in {} block(s), {} attempt(s)",
        session.total_size,
        session.block_count(),
        outcome.attempts
    );
    Ok(())
}

#[cfg(unix)]
async fn run_recv(device: &PathBuf, output: &PathBuf, config: &Config) -> Result<()> {
    use sling::channel::framed::FramedChannel;
    use sling::channel::serial::SerialPort;
    use sling::channel::SystemClock;
    use sling::transfer::{bootstrap, negotiate_as_receiver, Receiver};

    let port = SerialPort::open(device)
        .with_context(|| format!("failed to open {}", device.display()))?;
    let mut channel = FramedChannel::new(port);

    bootstrap(&mut channel, &SystemClock, &config.bootstrap_config()).await?;
    let mut session = negotiate_as_receiver(&mut channel, config.poll_interval()).await?;

    let mut sink = tokio::fs::File::create(output)
        .await
        .with_context(|| format!("failed to create {}", output.display()))?;
    let outcome = Receiver::new(config.receiver_config())
        .receive_file(&mut channel, &mut session, &mut sink)
        .await?;

    println!(
        "received {} bytes in {} message(s) into {}",
        outcome.bytes_written,
        outcome.messages,
        output.display()
    );
    Ok(())
}

#[cfg(not(unix))]
async fn run_send(_device: &PathBuf, _file: &PathBuf, _config: &Config) -> Result<()> {
    anyhow::bail!("serial transfers are only supported on unix")
}

#[cfg(not(unix))]
async fn run_recv(_device: &PathBuf, _output: &PathBuf, _config: &Config) -> Result<()> {
    anyhow::bail!("serial transfers are only supported on unix")
}
