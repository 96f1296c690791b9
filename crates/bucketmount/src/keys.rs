//! Recognized storage-class attribute and secret keys.
//!
//! Keys are case-sensitive and match what the provisioning side writes into
//! the volume's secret bundle.

use std::collections::HashMap;

/// String map handed in by the caller for attributes and secrets.
pub type SecretMap = HashMap<String, String>;

/// Backend selector (`"s3fs"` or `"rclone"`).
pub const MOUNTER: &str = "mounter";
/// Object storage service endpoint URL.
pub const ENDPOINT: &str = "cosEndpoint";
/// Location / region constraint.
pub const LOCATION_CONSTRAINT: &str = "locationConstraint";
/// Bucket to mount.
pub const BUCKET_NAME: &str = "bucketName";
/// Prefix inside the bucket to expose at the mount root.
pub const OBJ_PATH: &str = "objPath";
/// HMAC access key id.
pub const ACCESS_KEY: &str = "accessKey";
/// HMAC secret access key.
pub const SECRET_KEY: &str = "secretKey";
/// IAM API key; selects IAM auth when non-empty.
pub const API_KEY: &str = "apiKey";
/// Key Protect root key CRN for server-side encryption.
pub const KP_ROOT_KEY_CRN: &str = "kpRootKeyCRN";
/// Owning group id.
pub const GID: &str = "gid";
/// Owning user id; defaults to `gid` when absent.
pub const UID: &str = "uid";
/// s3fs scratch directory.
pub const TMPDIR: &str = "tmpdir";
/// s3fs local cache directory.
pub const USE_CACHE: &str = "use_cache";
/// Extra helper options, `key=value` or bare flags separated by whitespace or commas.
pub const MOUNT_OPTIONS: &str = "mountOptions";
