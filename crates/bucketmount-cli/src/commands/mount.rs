//! Mount command - mount a bucket described by a volume file.
//!
//! Blocks until the helper has exited and the target shows up in the mount
//! table, or the readiness timeout expires.

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use std::path::PathBuf;
use tracing::instrument;

use bucketmount::{MounterFactory, MounterSettings, NewMounter};

use crate::config::load_volume;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Volume file (TOML with [attributes], [secrets] and mount_flags)
    pub volume: PathBuf,

    /// Directory to mount the bucket at (created if missing)
    pub target: PathBuf,

    /// Staging path reported to the mounter
    #[arg(long, default_value = "")]
    pub source: String,

    /// Extra mount flags, appended after the volume file's flags
    #[arg(short = 'o', long = "option", value_name = "OPTION")]
    pub options: Vec<String>,
}

#[instrument(level = "info", name = "cmd::mount", skip_all, fields(target = %args.target.display()))]
pub fn execute(args: &Args, settings: MounterSettings) -> Result<()> {
    let mut volume = load_volume(&args.volume)?;
    volume.mount_flags.extend(args.options.iter().cloned());

    let factory = MounterFactory::system(settings);
    let mounter = factory.new_mounter(&volume.attributes, &volume.secrets, &volume.mount_flags)?;
    if let Some(warning) = mounter.options_warning() {
        eprintln!("Warning: {warning}");
    }

    mounter
        .mount(&args.source, &args.target)
        .with_context(|| format!("Failed to mount at {}", args.target.display()))?;

    eprintln!(
        "Mounted {} at {}",
        mounter.backend().display_name(),
        args.target.display()
    );
    Ok(())
}
