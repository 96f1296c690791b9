//! s3fs-fuse backend.
//!
//! Command line:
//! `s3fs <bucket>[:/<prefix>] <target> -o passwd_file=<file> -o url=<endpoint>
//!  [-o endpoint=<location>] [-o ibm_iam_auth] -o allow_other -o <option>…`
//!
//! The password file holds `access:secret` (HMAC) or `:apikey` (IAM).

use std::path::Path;

use crate::backend::{BackendType, Mounter};
use crate::credentials::write_password_file;
use crate::error::{MountError, OptionsWarning};
use crate::keys::SecretMap;
use crate::lifecycle::{self, MountRuntime, TargetState};
use crate::options::{self, AuthType, MountConfig};

/// Name of the password file inside the metadata directory.
pub const PASSWD_FILE_NAME: &str = "passwd";

/// Mounts a bucket with s3fs.
#[derive(Debug, Clone)]
pub struct S3fsMounter {
    config: MountConfig,
    warning: Option<OptionsWarning>,
    runtime: MountRuntime,
}

impl S3fsMounter {
    /// Resolve `secrets` on top of the default s3fs options and `mount_flags`.
    pub fn new(secrets: &SecretMap, mount_flags: &[String], runtime: MountRuntime) -> Self {
        let mut base = runtime.settings().s3fs_default_options.clone();
        base.extend_from_slice(mount_flags);
        let resolution = options::resolve(secrets, &base);
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
    pub fn args(&self, target: &Path, passwd_file: &Path) -> Vec<String> {
        let config = &self.config;
        let prefix = config.obj_path.trim_matches('/');
        let bucket = if prefix.is_empty() {
            config.bucket_name.clone()
        } else {
            format!("{}:/{prefix}", config.bucket_name)
        };

        let mut args = vec![bucket, target.to_string_lossy().into_owned()];
        let mut opt = |value: String| {
            args.push("-o".to_string());
            args.push(value);
        };

        opt(format!("passwd_file={}", passwd_file.display()));
        if !config.endpoint.is_empty() {
            opt(format!("url={}", config.endpoint));
        }
        if !config.location_constraint.is_empty() {
            opt(format!("endpoint={}", config.location_constraint));
        }
        if config.auth_type == AuthType::Iam {
            opt("ibm_iam_auth".to_string());
        }
        opt("allow_other".to_string());
        for option in &config.mount_options {
            opt(option.clone());
        }
        args
    }
}

impl Mounter for S3fsMounter {
    fn backend(&self) -> BackendType {
        BackendType::S3fs
    }

    fn mount(&self, source: &str, target: &Path) -> Result<(), MountError> {
        let target = &lifecycle::absolute_target(target)?;
        tracing::info!(
            source,
            target = %target.display(),
            bucket = %self.config.bucket_name,
            kp_root_key_crn = %self.config.kp_root_key_crn,
            "s3fs mount"
        );

        let host = self.runtime.host();
        if lifecycle::prepare_target(host, target)? == TargetState::AlreadyMounted {
            tracing::info!(target = %target.display(), "target already mounted, reusing");
            return Ok(());
        }

        let meta_dir = self.runtime.meta_dir(target);
        lifecycle::prepare_meta_dir(host, &meta_dir)?;
        let passwd_file = meta_dir.join(PASSWD_FILE_NAME);
        write_password_file(&passwd_file, &self.config.access_keys)?;

        let args = self.args(target, &passwd_file);
        let command = &self.runtime.settings().s3fs_command;
        lifecycle::run_helper(&self.runtime, target, command, &args, &meta_dir)
    }

    fn unmount(&self, target: &Path) -> Result<(), MountError> {
        let target = &lifecycle::absolute_target(target)?;
        tracing::info!(target = %target.display(), "s3fs unmount");
        lifecycle::teardown(self.runtime.host(), target)?;
        lifecycle::remove_meta_dir(self.runtime.host(), &self.runtime.meta_dir(target));
        Ok(())
    }

    fn options_warning(&self) -> Option<&OptionsWarning> {
        self.warning.as_ref()
    }
}
