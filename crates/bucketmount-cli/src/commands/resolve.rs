//! Resolve command - show what a volume file resolves to.
//!
//! Runs the same option resolution a mount would, without touching the
//! host. Key material is never printed.

use anyhow::Result;
use clap::Args as ClapArgs;
use comfy_table::{Cell, Color, Table};
use std::path::PathBuf;

use bucketmount::{
    select_backend, BackendType, MountConfig, MountRuntime, Mounter, MounterSettings, OptionsWarning,
    RcloneMounter, S3fsMounter,
};

use crate::config::load_volume;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Volume file (TOML with [attributes], [secrets] and mount_flags)
    pub volume: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: &Args, settings: MounterSettings) -> Result<()> {
    let volume = load_volume(&args.volume)?;
    let backend = select_backend(&volume.attributes, &volume.secrets);
    let runtime = MountRuntime::system(settings);

    let (config, warning) = match backend {
        BackendType::S3fs => {
            let m = S3fsMounter::new(&volume.secrets, &volume.mount_flags, runtime);
            (m.config().clone(), m.options_warning().cloned())
        }
        BackendType::Rclone => {
            let m = RcloneMounter::new(&volume.secrets, &volume.mount_flags, runtime);
            (m.config().clone(), m.options_warning().cloned())
        }
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&to_json(backend, &config, warning.as_ref()))?
        );
    } else {
        output_table(backend, &config, warning.as_ref());
    }
    Ok(())
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

fn output_table(backend: BackendType, config: &MountConfig, warning: Option<&OptionsWarning>) {
    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);

    let rows = [
        ("Backend", backend.as_str().to_string()),
        ("Bucket", config.bucket_name.clone()),
        ("Object path", or_dash(&config.obj_path).to_string()),
        ("Endpoint", or_dash(&config.endpoint).to_string()),
        ("Location", or_dash(&config.location_constraint).to_string()),
        ("Auth", config.auth_type.to_string()),
        ("KP root key CRN", or_dash(&config.kp_root_key_crn).to_string()),
        ("gid", config.gid.clone().unwrap_or_else(|| "-".to_string())),
        ("uid", config.uid.clone().unwrap_or_else(|| "-".to_string())),
        ("Options", config.mount_options.join(" ")),
    ];
    for (field, value) in rows {
        table.add_row(vec![Cell::new(field), Cell::new(value)]);
    }
    if let Some(warning) = warning {
        table.add_row(vec![
            Cell::new("Warning"),
            Cell::new(warning.to_string()).fg(Color::Yellow),
        ]);
    }

    println!("{table}");
}

fn to_json(
    backend: BackendType,
    config: &MountConfig,
    warning: Option<&OptionsWarning>,
) -> serde_json::Value {
    serde_json::json!({
        "backend": backend.as_str(),
        "bucket": config.bucket_name,
        "obj_path": config.obj_path,
        "endpoint": config.endpoint,
        "location_constraint": config.location_constraint,
        "auth_type": config.auth_type.as_str(),
        "kp_root_key_crn": config.kp_root_key_crn,
        "gid": config.gid,
        "uid": config.uid,
        "mount_options": config.mount_options,
        "warning": warning.map(ToString::to_string),
    })
}
