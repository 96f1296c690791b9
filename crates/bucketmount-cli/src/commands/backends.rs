//! Backends command - list mount backends and whether their helper is installed.

use anyhow::Result;
use clap::Args as ClapArgs;
use comfy_table::{Cell, Color, Table};
use std::env;
use std::path::{Path, PathBuf};

use bucketmount::{BackendType, MounterSettings};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: &Args, settings: &MounterSettings) -> Result<()> {
    let rows: Vec<(BackendType, &str, Option<PathBuf>)> = BackendType::ALL
        .into_iter()
        .map(|backend| {
            let command = match backend {
                BackendType::S3fs => settings.s3fs_command.as_str(),
                BackendType::Rclone => settings.rclone_command.as_str(),
            };
            (backend, command, find_executable(command))
        })
        .collect();

    if args.json {
        let items: Vec<_> = rows
            .iter()
            .map(|(backend, command, found)| {
                serde_json::json!({
                    "name": backend.as_str(),
                    "display_name": backend.display_name(),
                    "command": command,
                    "path": found.as_ref().map(|p| p.display().to_string()),
                    "available": found.is_some(),
                    "default": *backend == BackendType::default(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Backend", "Helper", "Command", "Status"]);
    for (backend, command, found) in &rows {
        let name = if *backend == BackendType::default() {
            format!("{backend} (default)")
        } else {
            backend.to_string()
        };
        let status = match found {
            Some(path) => Cell::new(format!("found: {}", path.display())).fg(Color::Green),
            None => Cell::new("not found").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(backend.display_name()),
            Cell::new(command),
            status,
        ]);
    }
    println!("{table}");
    Ok(())
}

/// Resolve `command` like the shell would: paths as given, names via `PATH`.
fn find_executable(command: &str) -> Option<PathBuf> {
    if command.contains('/') {
        let path = Path::new(command);
        return path.is_file().then(|| path.to_path_buf());
    }
    env::split_paths(&env::var_os("PATH")?)
        .map(|dir| dir.join(command))
        .find(|candidate| candidate.is_file())
}
