//! Credential files consumed by the mount helper.
//!
//! Both helpers read key material from a local file rather than argv, so it
//! never shows up in `ps`. The file is owner read/write only.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;

use crate::error::{CredentialStage, MountError};
use crate::options::{AuthType, MountConfig};

/// Permission bits for credential files.
pub const CREDENTIAL_FILE_MODE: u32 = 0o600;

/// Write `content` to `path` with owner-only permissions.
///
/// The file is created or truncated, written in full and synced before the
/// handle is dropped. If writing or syncing fails the partial file is
/// removed, so a credential file on disk is always complete.
pub fn write_password_file(path: &Path, content: &str) -> Result<(), MountError> {
    let fail = |stage, source| MountError::Credential {
        stage,
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(CREDENTIAL_FILE_MODE)
        .open(path)
        .map_err(|e| fail(CredentialStage::Open, e))?;

    // `mode` only applies on creation; tighten a pre-existing file too.
    let result = file
        .set_permissions(fs::Permissions::from_mode(CREDENTIAL_FILE_MODE))
        .map_err(|e| fail(CredentialStage::Open, e))
        .and_then(|()| {
            file.write_all(content.as_bytes())
                .map_err(|e| fail(CredentialStage::Write, e))
        })
        .and_then(|()| file.sync_all().map_err(|e| fail(CredentialStage::Flush, e)));
    drop(file);

    if let Err(err) = result {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove partial credential file");
        }
        return Err(err);
    }

    tracing::debug!(path = %path.display(), "credential file written");
    Ok(())
}

/// Name of the rclone remote written into the generated config.
pub const RCLONE_REMOTE: &str = "cos";

/// Render an rclone config with a single S3 remote for `config`.
pub fn rclone_config(config: &MountConfig) -> String {
    let mut out = format!(
        "[{RCLONE_REMOTE}]\ntype = s3\nprovider = IBMCOS\nenv_auth = false\nendpoint = {}\n",
        config.endpoint
    );
    if !config.location_constraint.is_empty() {
        out.push_str(&format!(
            "location_constraint = {}\n",
            config.location_constraint
        ));
    }
    match config.auth_type {
        AuthType::Iam => {
            out.push_str(&format!("ibm_api_key = {}\n", config.secret()));
        }
        AuthType::Hmac => {
            out.push_str(&format!(
                "access_key_id = {}\nsecret_access_key = {}\n",
                config.access_key_id(),
                config.secret()
            ));
        }
    }
    if !config.kp_root_key_crn.is_empty() {
        out.push_str("server_side_encryption = aws:kms\n");
        out.push_str(&format!("sse_kms_key_id = {}\n", config.kp_root_key_crn));
    }
    out.push_str("acl = private\nbucket_acl = private\n");
    out
}
