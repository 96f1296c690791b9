//! Process exit codes.

/// Command completed.
pub const SUCCESS: u8 = 0;
/// Any failure without a more specific code. Usage errors exit with 2
/// from clap itself.
pub const FAILURE: u8 = 1;
/// The helper ran but the mount never appeared.
pub const MOUNT_TIMEOUT: u8 = 3;
