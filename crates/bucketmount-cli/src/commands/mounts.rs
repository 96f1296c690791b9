//! Mounts command - list s3fs and rclone mounts in the kernel mount table.

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use comfy_table::{Cell, Color, Table};
use std::path::PathBuf;

use bucketmount::mount_table::{read_mount_table, SystemMount, PROC_MOUNTS};
use bucketmount::BackendType;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Include every FUSE mount, not only s3fs and rclone
    #[arg(long)]
    pub all: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Mount table to read
    #[arg(long, value_name = "PATH", default_value = PROC_MOUNTS, hide = true)]
    pub mount_table: PathBuf,
}

/// Backend that produced a mount, from its `fuse.<subtype>` filesystem type.
fn backend_of(mount: &SystemMount) -> Option<BackendType> {
    mount.fstype.strip_prefix("fuse.")?.parse().ok()
}

pub fn execute(args: &Args) -> Result<()> {
    let mounts = read_mount_table(&args.mount_table)
        .with_context(|| format!("Failed to read {}", args.mount_table.display()))?;
    let selected: Vec<&SystemMount> = mounts
        .iter()
        .filter(|m| if args.all { m.is_fuse() } else { backend_of(m).is_some() })
        .collect();

    if args.json {
        let items: Vec<_> = selected
            .iter()
            .map(|m| {
                serde_json::json!({
                    "source": m.source,
                    "mountpoint": m.mountpoint.display().to_string(),
                    "fstype": m.fstype,
                    "backend": backend_of(m).map(BackendType::as_str),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if selected.is_empty() {
        eprintln!("No active mounts.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Source", "Mountpoint", "Backend"]);
    for m in &selected {
        let backend = backend_of(m);
        let backend_cell = Cell::new(backend.map_or(m.fstype.as_str(), |b| b.as_str())).fg(
            match backend {
                Some(BackendType::S3fs) => Color::Blue,
                Some(BackendType::Rclone) => Color::Green,
                None => Color::White,
            },
        );
        table.add_row(vec![
            Cell::new(&m.source),
            Cell::new(m.mountpoint.display()),
            backend_cell,
        ]);
    }
    println!("{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucketmount::mount_table::parse_mount_table;

    #[test]
    fn test_backend_of_fstype() {
        let mounts = parse_mount_table(
            "s3fs /a fuse.s3fs rw 0 0\ncos:b /b fuse.rclone rw 0 0\nx /c fuse.sshfs rw 0 0\n",
        );
        assert_eq!(backend_of(&mounts[0]), Some(BackendType::S3fs));
        assert_eq!(backend_of(&mounts[1]), Some(BackendType::Rclone));
        assert_eq!(backend_of(&mounts[2]), None);
    }
}
