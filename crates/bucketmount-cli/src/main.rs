#![deny(unsafe_code)]

mod commands;
mod config;
mod exit_code;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bucketmount::MountError;

use crate::commands::{backends, completions, mount, mounts, resolve, unmount};

/// Mount object-storage buckets with s3fs or rclone
#[derive(Parser)]
#[command(name = "bucketmount")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Mount a bucket described by a volume file
    bucketmount mount volume.toml /mnt/logs

    # Show what a volume resolves to (secrets redacted)
    bucketmount resolve volume.toml

    # Unmount and remove the mount point
    bucketmount unmount /mnt/logs
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Settings file (TOML)
    #[arg(long, value_name = "PATH", env = "BUCKETMOUNT_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount a bucket at a target directory
    Mount(mount::Args),

    /// Unmount a target and remove its directory
    Unmount(unmount::Args),

    /// Print the resolved configuration for a volume
    Resolve(resolve::Args),

    /// List mount backends
    Backends(backends::Args),

    /// List active s3fs and rclone mounts
    Mounts(mounts::Args),

    /// Generate shell completions
    Completions(completions::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let quiet = cli.quiet;

    match run(cli) {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            if !quiet {
                eprintln!("Error: {e:#}");
            }
            ExitCode::from(categorize_error(&e))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    let settings = config::load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Mount(args) => mount::execute(&args, settings),
        Commands::Unmount(args) => unmount::execute(&args, settings),
        Commands::Resolve(args) => resolve::execute(&args, settings),
        Commands::Backends(args) => backends::execute(&args, &settings),
        Commands::Mounts(args) => mounts::execute(&args),
        Commands::Completions(args) => {
            completions::execute(&args, &mut <Cli as clap::CommandFactory>::command());
            Ok(())
        }
    }
}

fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Map an error onto an exit code by looking for a [`MountError`] in the chain.
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(mount_err) = cause.downcast_ref::<MountError>()
            && mount_err.is_timeout()
        {
            return exit_code::MOUNT_TIMEOUT;
        }
    }
    exit_code::FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cli_definition_is_valid() {
        <Cli as clap::CommandFactory>::command().debug_assert();
    }

    #[test]
    fn test_timeout_maps_to_its_own_code() {
        let err = anyhow::Error::new(MountError::ReadinessTimeout {
            path: PathBuf::from("/mnt/x"),
            timeout: Duration::from_secs(1),
            last_probe_error: None,
        })
        .context("Failed to mount");
        assert_eq!(categorize_error(&err), exit_code::MOUNT_TIMEOUT);
    }

    #[test]
    fn test_other_errors_are_generic() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(categorize_error(&err), exit_code::FAILURE);
    }
}
