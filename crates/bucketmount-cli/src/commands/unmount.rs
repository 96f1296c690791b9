//! Unmount command - unmount a target and remove its directory.
//!
//! Succeeds when the target is already gone or not mounted. A stale FUSE
//! mount (helper died) is detached lazily.

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use std::path::PathBuf;
use tracing::instrument;

use bucketmount::{MounterFactory, MounterSettings, NewMounter};

use crate::config::{load_volume, VolumeSpec};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Directory the bucket is mounted at
    pub target: PathBuf,

    /// Volume file used to pick the backend (defaults to s3fs)
    #[arg(long)]
    pub volume: Option<PathBuf>,
}

#[instrument(level = "info", name = "cmd::unmount", skip_all, fields(target = %args.target.display()))]
pub fn execute(args: &Args, settings: MounterSettings) -> Result<()> {
    let volume = match &args.volume {
        Some(path) => load_volume(path)?,
        None => VolumeSpec::default(),
    };

    let factory = MounterFactory::system(settings);
    let mounter = factory.new_mounter(&volume.attributes, &volume.secrets, &volume.mount_flags)?;
    mounter
        .unmount(&args.target)
        .with_context(|| format!("Failed to unmount {}", args.target.display()))?;

    eprintln!("Unmounted {}", args.target.display());
    Ok(())
}
