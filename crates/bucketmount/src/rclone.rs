//! rclone backend.
//!
//! Command line:
//! `rclone mount cos:<bucket>[/<prefix>] <target> --config=<file> --daemon
//!  --allow-other --<option>…`
//!
//! Credentials go into a generated rclone config (see
//! [`rclone_config`]); options use rclone's `--name=value` syntax.

use std::path::Path;

use crate::backend::{BackendType, Mounter};
use crate::credentials::{rclone_config, write_password_file, RCLONE_REMOTE};
use crate::error::{MountError, OptionsWarning};
use crate::keys::SecretMap;
use crate::lifecycle::{self, MountRuntime, TargetState};
use crate::options::{self, MountConfig};

/// Name of the rclone config inside the metadata directory.
pub const CONFIG_FILE_NAME: &str = "rclone.conf";

/// Mounts a bucket with `rclone mount`.
#[derive(Debug, Clone)]
pub struct RcloneMounter {
    config: MountConfig,
    warning: Option<OptionsWarning>,
    runtime: MountRuntime,
}

impl RcloneMounter {
    /// Resolve `secrets` on top of the default rclone options and
    /// `mount_flags`. The s3fs-only passthrough keys are not applied.
    pub fn new(secrets: &SecretMap, mount_flags: &[String], runtime: MountRuntime) -> Self {
        let mut base = runtime.settings().rclone_default_options.clone();
        base.extend_from_slice(mount_flags);
        let resolution = options::resolve_with_passthrough(secrets, &base, &[]);
        Self {
            config: resolution.config,
            warning: resolution.warning,
            runtime,
        }
    }

    /// The resolved configuration.
    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    /// Full argv (without the program name) for mounting at `target`.
    pub fn args(&self, target: &Path, config_file: &Path) -> Vec<String> {
        let mut args = vec![
            "mount".to_string(),
            format!("{RCLONE_REMOTE}:{}", self.config.bucket_path()),
            target.to_string_lossy().into_owned(),
            format!("--config={}", config_file.display()),
            "--daemon".to_string(),
            "--allow-other".to_string(),
        ];
        args.extend(self.config.mount_options.iter().map(|o| flag(o)));
        args
    }
}

/// `name=value` or `name` as an rclone long flag; dashed input is kept.
fn flag(option: &str) -> String {
    if option.starts_with('-') {
        option.to_string()
    } else {
        format!("--{option}")
    }
}

impl Mounter for RcloneMounter {
    fn backend(&self) -> BackendType {
        BackendType::Rclone
    }

    fn mount(&self, source: &str, target: &Path) -> Result<(), MountError> {
        let target = &lifecycle::absolute_target(target)?;
        tracing::info!(
            source,
            target = %target.display(),
            bucket = %self.config.bucket_name,
            kp_root_key_crn = %self.config.kp_root_key_crn,
            "rclone mount"
        );

        let host = self.runtime.host();
        if lifecycle::prepare_target(host, target)? == TargetState::AlreadyMounted {
            tracing::info!(target = %target.display(), "target already mounted, reusing");
            return Ok(());
        }

        let meta_dir = self.runtime.meta_dir(target);
        lifecycle::prepare_meta_dir(host, &meta_dir)?;
        let config_file = meta_dir.join(CONFIG_FILE_NAME);
        write_password_file(&config_file, &rclone_config(&self.config))?;

        let args = self.args(target, &config_file);
        let command = &self.runtime.settings().rclone_command;
        lifecycle::run_helper(&self.runtime, target, command, &args, &meta_dir)
    }

    fn unmount(&self, target: &Path) -> Result<(), MountError> {
        let target = &lifecycle::absolute_target(target)?;
        tracing::info!(target = %target.display(), "rclone unmount");
        lifecycle::teardown(self.runtime.host(), target)?;
        lifecycle::remove_meta_dir(self.runtime.host(), &self.runtime.meta_dir(target));
        Ok(())
    }

    fn options_warning(&self) -> Option<&OptionsWarning> {
        self.warning.as_ref()
    }
}
