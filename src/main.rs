//! kinetic-cli - talk to Kinetic drives from the command line.
//!
//! Connects to every `--drive`, runs one subcommand and exits.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use kinetic::{
    ByteRange, ClientConfig, Drive, KineticClient, Synchronization, WriteOptions,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kinetic-cli", version, about = "Store and fetch objects on Kinetic drives")]
struct Cli {
    /// Drive address as host[:port]; repeat for several drives
    #[arg(short, long = "drive", value_name = "HOST:PORT", required = true)]
    drives: Vec<Drive>,

    /// Per-request timeout in milliseconds
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,

    /// Connect and handshake timeout in milliseconds
    #[arg(long, default_value_t = 5_000)]
    connect_timeout_ms: u64,

    /// Log filter, e.g. `info` or `kinetic=debug`
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a file and print the key it was stored under
    Put {
        file: PathBuf,
        /// Drive slot to write to; defaults to the least full drive
        #[arg(long)]
        drive_index: Option<usize>,
        #[arg(long, value_enum, default_value_t = SyncMode::WriteThrough)]
        sync: SyncMode,
        /// Overwrite regardless of the stored version
        #[arg(long)]
        force: bool,
    },
    /// Fetch a value by key
    Get {
        key: String,
        /// Write the value here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete a value by key
    Delete {
        key: String,
        #[arg(long, value_enum, default_value_t = SyncMode::WriteThrough)]
        sync: SyncMode,
        #[arg(long)]
        force: bool,
    },
    /// Show capacity and session state of every drive
    Capacity,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SyncMode {
    WriteThrough,
    WriteBack,
    Flush,
}

impl From<SyncMode> for Synchronization {
    fn from(mode: SyncMode) -> Self {
        match mode {
            SyncMode::WriteThrough => Synchronization::WriteThrough,
            SyncMode::WriteBack => Synchronization::WriteBack,
            SyncMode::Flush => Synchronization::Flush,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log filter `{}`", cli.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::new(cli.drives.clone())
        .with_operation_timeout(Duration::from_millis(cli.timeout_ms))
        .with_connect_timeout(Duration::from_millis(cli.connect_timeout_ms));
    let client = KineticClient::new(config);
    if let Err(e) = client.connect_all().await {
        // Failed drives are retried on first use.
        tracing::warn!(error = %e, "Not every drive connected");
    }

    match cli.command {
        Command::Put {
            file,
            drive_index,
            sync,
            force,
        } => {
            let value = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let options = WriteOptions::new(sync.into(), force);

            let (drive, key) = match drive_index {
                Some(drive) => (drive, client.put(drive, &value, options).await?),
                None => client.put_balanced(&value, options).await?,
            };
            info!(drive = %client.drives()[drive], bytes = value.len(), "Stored");
            println!("{}", String::from_utf8_lossy(&key));
        }
        Command::Get { key, out } => {
            let mut value = client
                .get_by_key(key.as_bytes(), ByteRange::Full)
                .await
                .with_context(|| format!("GET {key} failed"))?;

            match out {
                Some(path) => {
                    let mut file = tokio::fs::File::create(&path)
                        .await
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    tokio::io::copy(&mut value, &mut file).await?;
                    file.flush().await?;
                }
                None => {
                    let mut stdout = tokio::io::stdout();
                    tokio::io::copy(&mut value, &mut stdout).await?;
                    stdout.flush().await?;
                }
            }
        }
        Command::Delete { key, sync, force } => {
            client
                .delete_by_key(key.as_bytes(), WriteOptions::new(sync.into(), force))
                .await
                .with_context(|| format!("DELETE {key} failed"))?;
        }
        Command::Capacity => {
            let mut failures = 0;
            for (index, drive) in client.drives().iter().enumerate() {
                match client.capacity(index).await {
                    Ok(capacity) => println!(
                        "{index}  {drive}  {:.1}% full of {} bytes",
                        capacity.portion_full * 100.0,
                        capacity.nominal_capacity_bytes
                    ),
                    Err(e) => {
                        failures += 1;
                        println!("{index}  {drive}  unavailable: {e}");
                    }
                }
            }
            for socket in client.sockets() {
                println!(
                    "{}  {:?}  connection_id={:?} sequence={:?} next_key={:?}",
                    socket.index,
                    socket.phase,
                    socket.connection_id,
                    socket.sequence,
                    socket.lexi_key
                );
            }
            if failures == client.drives().len() {
                bail!("no drive answered");
            }
        }
    }

    Ok(())
}
