//! Option resolution: secret bundle + mount flags -> [`MountConfig`].
//!
//! Resolution is pure. It reads the recognized keys from the secret bundle,
//! picks the authentication mode and merges helper options in a fixed order:
//!
//! 1. base options (backend defaults followed by per-call mount flags)
//! 2. backend passthrough keys (`tmpdir`, `use_cache` for s3fs)
//! 3. ownership (`gid`, then `uid`, which falls back to `gid`)
//! 4. entries of the `mountOptions` override
//!
//! Nothing is deduplicated. Helpers parse options left to right, so a later
//! entry shadows an earlier one with the same key.

use std::fmt;

use crate::error::OptionsWarning;
use crate::keys::{self, SecretMap};

/// Secret keys copied verbatim into s3fs options as `key=value`.
pub const S3FS_PASSTHROUGH_KEYS: &[&str] = &[keys::TMPDIR, keys::USE_CACHE];

/// Credential scheme handed to the helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthType {
    /// Access key / secret key pair.
    #[default]
    Hmac,
    /// Bearer API key exchanged for IAM tokens by the helper.
    Iam,
}

impl AuthType {
    /// Lowercase wire name (`"hmac"` / `"iam"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hmac => "hmac",
            Self::Iam => "iam",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-volume mount configuration, built once when a mounter is created.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MountConfig {
    /// Bucket to mount
    pub bucket_name: String,
    /// Prefix inside the bucket, empty for the bucket root
    pub obj_path: String,
    /// Service endpoint URL
    pub endpoint: String,
    /// Location / region constraint
    pub location_constraint: String,
    /// Selected credential scheme
    pub auth_type: AuthType,
    /// `access:secret` for HMAC, `:apikey` for IAM
    pub access_keys: String,
    /// Key Protect root key CRN, empty when not configured
    pub kp_root_key_crn: String,
    /// Owning group id
    pub gid: Option<String>,
    /// Owning user id (explicit, or defaulted from `gid`)
    pub uid: Option<String>,
    /// Merged helper options in application order
    pub mount_options: Vec<String>,
}

impl MountConfig {
    /// Access key id half of `access_keys` (empty for IAM).
    pub fn access_key_id(&self) -> &str {
        self.access_keys
            .split_once(':')
            .map_or(self.access_keys.as_str(), |(id, _)| id)
    }

    /// Secret half of `access_keys`: the secret key, or the API key for IAM.
    pub fn secret(&self) -> &str {
        self.access_keys
            .split_once(':')
            .map_or("", |(_, secret)| secret)
    }

    /// `bucket` or `bucket/prefix`, with stray slashes removed from the prefix.
    pub fn bucket_path(&self) -> String {
        let prefix = self.obj_path.trim_matches('/');
        if prefix.is_empty() {
            self.bucket_name.clone()
        } else {
            format!("{}/{}", self.bucket_name, prefix)
        }
    }
}

// Key material never goes through Debug; mounters are logged with `?`.
impl fmt::Debug for MountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountConfig")
            .field("bucket_name", &self.bucket_name)
            .field("obj_path", &self.obj_path)
            .field("endpoint", &self.endpoint)
            .field("location_constraint", &self.location_constraint)
            .field("auth_type", &self.auth_type)
            .field("access_keys", &"<redacted>")
            .field("kp_root_key_crn", &self.kp_root_key_crn)
            .field("gid", &self.gid)
            .field("uid", &self.uid)
            .field("mount_options", &self.mount_options)
            .finish()
    }
}

/// Outcome of option resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The resolved configuration
    pub config: MountConfig,
    /// Set when the `mountOptions` override was malformed and dropped
    pub warning: Option<OptionsWarning>,
}

/// Resolve a secret bundle with the s3fs passthrough keys.
pub fn resolve(secrets: &SecretMap, base_options: &[String]) -> Resolution {
    resolve_with_passthrough(secrets, base_options, S3FS_PASSTHROUGH_KEYS)
}

/// Resolve a secret bundle, copying `passthrough` keys into the options.
pub fn resolve_with_passthrough(
    secrets: &SecretMap,
    base_options: &[String],
    passthrough: &[&str],
) -> Resolution {
    let get = |key: &str| secrets.get(key).cloned().unwrap_or_default();

    let api_key = get(keys::API_KEY);
    let (auth_type, access_keys) = if api_key.is_empty() {
        (
            AuthType::Hmac,
            format!("{}:{}", get(keys::ACCESS_KEY), get(keys::SECRET_KEY)),
        )
    } else {
        (AuthType::Iam, format!(":{api_key}"))
    };

    let (gid, uid) = resolve_ownership(secrets);
    let (mount_options, warning) = merge_mount_options(base_options, secrets, passthrough);

    if let Some(warning) = &warning {
        tracing::warn!(%warning, "problem with retrieving mount options from secret");
    }

    let config = MountConfig {
        bucket_name: get(keys::BUCKET_NAME),
        obj_path: get(keys::OBJ_PATH),
        endpoint: get(keys::ENDPOINT),
        location_constraint: get(keys::LOCATION_CONSTRAINT),
        auth_type,
        access_keys,
        kp_root_key_crn: get(keys::KP_ROOT_KEY_CRN),
        gid,
        uid,
        mount_options,
    };

    tracing::debug!(
        bucket = %config.bucket_name,
        obj_path = %config.obj_path,
        endpoint = %config.endpoint,
        location = %config.location_constraint,
        auth = %config.auth_type,
        kp_root_key_crn = %config.kp_root_key_crn,
        "resolved mount configuration"
    );

    Resolution { config, warning }
}

/// `gid` as given; `uid` explicit if set, otherwise copied from `gid`.
fn resolve_ownership(secrets: &SecretMap) -> (Option<String>, Option<String>) {
    let non_empty = |key: &str| secrets.get(key).filter(|v| !v.is_empty()).cloned();
    let gid = non_empty(keys::GID);
    let uid = non_empty(keys::UID).or_else(|| gid.clone());
    (gid, uid)
}

/// Merge base options with secret-driven options.
///
/// A malformed override is dropped entirely; everything merged before it
/// is returned along with the warning.
pub fn merge_mount_options(
    base_options: &[String],
    secrets: &SecretMap,
    passthrough: &[&str],
) -> (Vec<String>, Option<OptionsWarning>) {
    let mut options = base_options.to_vec();

    for key in passthrough {
        if let Some(value) = secrets.get(*key).filter(|v| !v.is_empty()) {
            options.push(format!("{key}={value}"));
        }
    }

    let (gid, uid) = resolve_ownership(secrets);
    if let Some(gid) = gid {
        options.push(format!("{}={gid}", keys::GID));
    }
    if let Some(uid) = uid {
        options.push(format!("{}={uid}", keys::UID));
    }

    let Some(raw) = secrets.get(keys::MOUNT_OPTIONS) else {
        return (options, None);
    };

    match parse_override(raw) {
        Ok(extra) => {
            options.extend(extra);
            (options, None)
        }
        Err(warning) => (options, Some(warning)),
    }
}

/// Split a `mountOptions` value into entries.
///
/// Entries are separated by whitespace (including newlines) or commas, so
/// `a=1,b=2` yields two entries. Each one must be a bare flag or
/// `key=value` with a key made of ASCII alphanumerics, `_`, `-` or `.`,
/// starting with an alphanumeric.
pub fn parse_override(raw: &str) -> Result<Vec<String>, OptionsWarning> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let key = entry.split_once('=').map_or(entry, |(key, _)| key);
            validate_key(key).map_err(|reason| OptionsWarning {
                entry: entry.to_string(),
                reason,
            })?;
            Ok(entry.to_string())
        })
        .collect()
}

fn validate_key(key: &str) -> Result<(), &'static str> {
    let Some(first) = key.chars().next() else {
        return Err("empty option name");
    };
    if !first.is_ascii_alphanumeric() {
        return Err("option name must start with a letter or digit");
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err("option name contains invalid characters");
    }
    Ok(())
}
