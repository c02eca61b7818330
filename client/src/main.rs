//! Command-line front end for the drive filesystem.
//!
//! 1. Loads the configuration (`--config`, default `config.toml`).
//! 2. Installs the `tracing` subscriber.
//! 3. Builds the filesystem through a [`DriveMount`].
//! 4. Runs one command; Ctrl-C cancels whatever request is in flight.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::thread;
use std::time::UNIX_EPOCH;

use clap::{Parser, Subcommand};
use drivefs::{
    Config, DriveClient, DriveMount, FileHandle, FileMetadata, OpContext, OpenFlags,
    PropertyName, PropertyPatch, load_config,
};
use tracing::{debug, error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "drivefs", version, about = "Browse and edit a cloud drive by path")]
struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show metadata of a path.
    Stat { path: String },
    /// List a folder.
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print a file to stdout.
    Cat { path: String },
    /// Upload a local file (or `-` for stdin) to a new remote path.
    Put { local: PathBuf, remote: String },
    /// Create a folder.
    Mkdir { path: String },
    /// Delete a path and everything below it.
    Rm { path: String },
    /// Rename within a folder.
    Mv { from: String, to: String },
    /// Show or change extended properties.
    Props {
        path: String,
        /// `namespace!name=value` to set, `namespace!name=` to remove.
        #[arg(long = "set")]
        set: Vec<String>,
    },
}

fn init_tracing(config: &Config) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Cancels `ctx` on Ctrl-C. The watcher runs on its own thread with a
/// private runtime, as the filesystem itself is synchronous.
fn cancel_on_ctrl_c(ctx: &OpContext) {
    let token = ctx.token().clone();
    let spawned = thread::Builder::new()
        .name("drivefs-ctrl-c".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    warn!(error = %err, "cannot watch for Ctrl-C");
                    return;
                }
            };
            runtime.block_on(async {
                tokio::select! {
                    signal = tokio::signal::ctrl_c() => {
                        if signal.is_ok() {
                            warn!("interrupted, cancelling");
                            token.cancel();
                        }
                    }
                    _ = token.cancelled() => {}
                }
            });
        });
    if let Err(err) = spawned {
        warn!(error = %err, "cannot watch for Ctrl-C");
    }
}

fn print_metadata(meta: &FileMetadata) {
    let modified = meta
        .modified
        .duration_since(UNIX_EPOCH)
        .map(|age| age.as_secs())
        .unwrap_or_default();
    let kind = if meta.is_dir { 'd' } else { '-' };
    println!("{kind} {:>12} {:>12} {}", meta.size, modified, meta.name);
}

fn parse_patch(raw: &str) -> CliResult<PropertyPatch> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected namespace!name=value, got {raw:?}"))?;
    let (namespace, local) = key
        .split_once('!')
        .ok_or_else(|| format!("expected namespace!name, got {key:?}"))?;
    let name = PropertyName::new(namespace, local);
    Ok(if value.is_empty() {
        PropertyPatch::remove(name)
    } else {
        PropertyPatch::set(name, value)
    })
}

fn run(cli: Cli, config: Config) -> CliResult<()> {
    let mount = DriveMount::new(config);
    let fs = mount.get_or_try_init(DriveClient::from_config)?;
    let ctx = OpContext::background();
    cancel_on_ctrl_c(&ctx);

    match cli.command {
        Command::Stat { path } => print_metadata(&fs.stat(&ctx, &path)?),
        Command::Ls { path } => {
            let mut dir = fs.open_file(&ctx, &path, OpenFlags::READ_ONLY)?;
            if !dir.is_dir() {
                print_metadata(&dir.stat()?);
            } else {
                for entry in dir.readdir()? {
                    print_metadata(&entry);
                }
            }
            dir.close()?;
        }
        Command::Cat { path } => {
            let mut file = fs.open_file(&ctx, &path, OpenFlags::READ_ONLY)?;
            let mut stdout = io::stdout().lock();
            io::copy(&mut file, &mut stdout)?;
            stdout.flush()?;
            file.close()?;
        }
        Command::Put { local, remote } => {
            let content = if local.as_os_str() == "-" {
                let mut buf = Vec::new();
                io::stdin().read_to_end(&mut buf)?;
                buf
            } else {
                std::fs::read(&local)?
            };
            let flags = OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::TRUNCATE;
            let mut file = fs.open_file(&ctx, &remote, flags)?;
            file.write_all(&content)?;
            file.close()?;
            debug!(remote, bytes = content.len(), "uploaded");
        }
        Command::Mkdir { path } => fs.mkdir(&ctx, &path)?,
        Command::Rm { path } => fs.remove_all(&ctx, &path)?,
        Command::Mv { from, to } => fs.rename(&ctx, &from, &to)?,
        Command::Props { path, set } => {
            let patches = set
                .iter()
                .map(|raw| parse_patch(raw))
                .collect::<CliResult<Vec<_>>>()?;
            let props = if patches.is_empty() {
                fs.dead_props(&ctx, &path)?
            } else {
                fs.patch_props(&ctx, &path, &patches)?
            };
            for (name, value) in props {
                println!("{name} = {value}");
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("drivefs: {err}");
            std::process::exit(2);
        }
    };
    init_tracing(&config);
    debug!(strategy = ?config.cache_strategy, root_id = %config.root_id, "configuration loaded");

    if let Err(err) = run(cli, config) {
        error!(error = %err, "command failed");
        eprintln!("drivefs: {err}");
        std::process::exit(1);
    }
}
