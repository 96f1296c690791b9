//! Kernel mount table parsing.
//!
//! Readiness and unmount decisions ask "is this path a mount point?" by
//! reading the mount table instead of stat-ing the path, so a dead FUSE
//! helper can never block the probe.
//!
//! Format of `/proc/self/mounts`:
//! `{source} {mountpoint} {fstype} {options} {dump} {pass}`
//! Example: `s3fs /var/lib/kubelet/pods/x/volumes/cos fuse.s3fs rw,nosuid 0 0`

use std::ffi::OsString;
use std::io;
use std::os::unix::ffi::OsStringExt;
use std::path::{Component, Path, PathBuf};

/// Mount table of the calling process's mount namespace.
pub const PROC_MOUNTS: &str = "/proc/self/mounts";

/// One line of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemMount {
    /// Mount source (e.g. `s3fs`, `cos:bucket`)
    pub source: String,
    /// Mount point path, unescaped
    pub mountpoint: PathBuf,
    /// Filesystem type (e.g. `fuse.s3fs`, `fuse.rclone`)
    pub fstype: String,
}

impl SystemMount {
    /// Whether this is a FUSE mount (`fuse`, `fuseblk` or `fuse.<subtype>`).
    pub fn is_fuse(&self) -> bool {
        self.fstype == "fuse" || self.fstype == "fuseblk" || self.fstype.starts_with("fuse.")
    }
}

/// Read and parse the mount table at `table`.
pub fn read_mount_table(table: &Path) -> io::Result<Vec<SystemMount>> {
    let contents = std::fs::read_to_string(table)?;
    Ok(parse_mount_table(&contents))
}

/// Parse mount table contents, skipping malformed lines.
pub fn parse_mount_table(contents: &str) -> Vec<SystemMount> {
    contents.lines().filter_map(parse_mount_line).collect()
}

fn parse_mount_line(line: &str) -> Option<SystemMount> {
    let mut parts = line.split_whitespace();
    let source = parts.next()?;
    let mountpoint = parts.next()?;
    let fstype = parts.next()?;

    Some(SystemMount {
        source: unescape(source).to_string_lossy().into_owned(),
        mountpoint: PathBuf::from(unescape(mountpoint)),
        fstype: fstype.to_string(),
    })
}

/// Find the entry mounted exactly at `path`.
///
/// The last matching entry wins, since stacked mounts shadow earlier ones.
/// Paths are compared lexically; nothing is resolved on disk.
pub fn find_mount<'a>(mounts: &'a [SystemMount], path: &Path) -> Option<&'a SystemMount> {
    let wanted = normalize(path);
    mounts.iter().rev().find(|m| normalize(&m.mountpoint) == wanted)
}

/// Drop `.` components and trailing separators without touching the disk.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Decode the octal escapes the kernel uses for whitespace and backslashes
/// (`\040` space, `\011` tab, `\012` newline, `\134` backslash).
fn unescape(field: &str) -> OsString {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    OsString::from_vec(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
s3fs /mnt/cos fuse.s3fs rw,nosuid,nodev,relatime,user_id=0,group_id=0 0 0
cos:bucket/data /mnt/my\\040bucket fuse.rclone rw,nosuid,nodev 0 0
garbage
";

    #[test]
    fn test_parse_mount_table() {
        let mounts = parse_mount_table(SAMPLE);
        assert_eq!(mounts.len(), 3);

        assert_eq!(mounts[1].source, "s3fs");
        assert_eq!(mounts[1].mountpoint, PathBuf::from("/mnt/cos"));
        assert_eq!(mounts[1].fstype, "fuse.s3fs");
        assert!(mounts[1].is_fuse());
        assert!(!mounts[0].is_fuse());
    }

    #[test]
    fn test_escaped_mountpoint() {
        let mounts = parse_mount_table(SAMPLE);
        assert_eq!(mounts[2].mountpoint, PathBuf::from("/mnt/my bucket"));
        assert_eq!(mounts[2].source, "cos:bucket/data");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("/mnt/a\\040b\\040c"), OsString::from("/mnt/a b c"));
        assert_eq!(unescape("/mnt/back\\134slash"), OsString::from("/mnt/back\\slash"));
        assert_eq!(unescape("/mnt/plain"), OsString::from("/mnt/plain"));
        // Not an escape: kept verbatim
        assert_eq!(unescape("/mnt/x\\9"), OsString::from("/mnt/x\\9"));
    }

    #[test]
    fn test_find_mount_ignores_trailing_slash() {
        let mounts = parse_mount_table(SAMPLE);
        let found = find_mount(&mounts, Path::new("/mnt/cos/")).unwrap();
        assert_eq!(found.fstype, "fuse.s3fs");
        assert!(find_mount(&mounts, Path::new("/mnt/cos/sub")).is_none());
        assert!(find_mount(&mounts, Path::new("/mnt")).is_none());
    }

    #[test]
    fn test_find_mount_prefers_last_entry() {
        let mounts = parse_mount_table(
            "tmpfs /mnt/x tmpfs rw 0 0\ns3fs /mnt/x fuse.s3fs rw 0 0\n",
        );
        assert_eq!(find_mount(&mounts, Path::new("/mnt/x")).unwrap().fstype, "fuse.s3fs");
    }

    #[test]
    fn test_read_live_mount_table() {
        let mounts = read_mount_table(Path::new(PROC_MOUNTS)).unwrap();
        assert!(find_mount(&mounts, Path::new("/")).is_some());
    }
}
