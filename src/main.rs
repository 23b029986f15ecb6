//! diskstash CLI - Persistent file-backed object cache
//!
//! Thin command-line front end over the library:
//! - `push` stores stdin under an identifier
//! - `fetch` prints a fresh entry, exit code 1 on a miss
//! - `path` / `status` show where an entry lives and whether it is fresh
//! - `run` replays a command's cached stdout, or runs it and caches the output
//! - `sweep` deletes stale entries from the expiring namespace

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Command, ExitCode};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use diskstash::{replay_or_capture, sweep_expired, CacheStore, Config, ExpirationPolicy};

/// Persistent file-backed object cache
///
/// Entries without --expires never expire. With --expires, an entry is
/// fresh until the expression (e.g. "+1 hour", "+2 days") applied to its
/// last write time has passed.
#[derive(Parser, Debug)]
#[command(name = "diskstash")]
#[command(version)]
#[command(about, long_about = None)]
struct Cli {
    /// Storage root (overrides DISKSTASH_ROOT)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store stdin under IDENTIFIER
    Push(EntryArgs),
    /// Print the entry for IDENTIFIER if it is fresh
    Fetch(EntryArgs),
    /// Print the entry file path for IDENTIFIER
    Path(EntryArgs),
    /// Show freshness and expiration of IDENTIFIER
    Status(EntryArgs),
    /// Replay cached stdout of a command, or run it and cache the output
    Run {
        #[command(flatten)]
        entry: EntryArgs,

        /// Command and arguments to run on a miss
        #[arg(last = true, required = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
    /// Delete expiring entries that are stale under --expires
    Sweep {
        /// Relative expiration expression applied to every entry
        #[arg(long, value_name = "EXPR")]
        expires: ExpirationPolicy,
    },
}

#[derive(Args, Debug)]
struct EntryArgs {
    /// Opaque, case-sensitive name of the cached object
    identifier: String,

    /// Relative expiration expression, e.g. "+1 hour"
    #[arg(long, value_name = "EXPR")]
    expires: Option<ExpirationPolicy>,
}

impl EntryArgs {
    fn store(&self, config: &Config) -> CacheStore {
        CacheStore::new(
            config,
            self.identifier.as_str(),
            self.expires.clone().unwrap_or_default(),
        )
    }
}

fn main() -> Result<ExitCode> {
    // Logs go to stderr so cached payloads on stdout stay clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diskstash=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(root) = cli.root {
        config = config.with_root(root);
    }

    run(cli.command, &config)
}

fn run(command: Commands, config: &Config) -> Result<ExitCode> {
    match command {
        Commands::Push(args) => {
            let store = args.store(config);
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read stdin")?;

            store
                .push(&input)
                .with_context(|| format!("Failed to store '{}'", store.identifier()))?;
            info!("Stored {} bytes at {}", input.len(), store.path().display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Fetch(args) => {
            let store = args.store(config);
            match store.fetch::<String>()? {
                Some(text) => {
                    let mut stdout = io::stdout().lock();
                    stdout.write_all(text.as_bytes())?;
                    stdout.flush()?;
                    Ok(ExitCode::SUCCESS)
                }
                None => Ok(ExitCode::from(1)),
            }
        }
        Commands::Path(args) => {
            println!("{}", args.store(config).path().display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status(args) => {
            let store = args.store(config);
            println!("identifier: {}", store.identifier());
            println!("namespace:  {}", store.namespace());
            println!("path:       {}", store.path().display());
            println!("policy:     {}", store.policy());
            println!("state:      {}", store.freshness()?);
            if let Some(written) = store.last_written()? {
                println!("written:    {}", written.to_rfc3339());
            }
            if let Some(expires) = store.expires_at()? {
                println!("expires:    {}", expires.to_rfc3339());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { entry, command } => {
            let store = entry.store(config);
            let mut stdout = io::stdout().lock();
            replay_or_capture(&store, &mut stdout, |capture| {
                let output = Command::new(&command[0]).args(&command[1..]).output()?;
                if !output.status.success() {
                    return Err(io::Error::other(format!(
                        "'{}' exited with {}",
                        command.join(" "),
                        output.status
                    )));
                }
                capture.write_all(&output.stdout)
            })?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Sweep { expires } => {
            if expires.is_unbounded() {
                bail!("sweep needs a bounded --expires expression");
            }
            let report = sweep_expired(config, &expires, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
