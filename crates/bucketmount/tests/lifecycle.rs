//! End-to-end mount and unmount flows against the fake host and spawner.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bucketmount::testing::{
    assert_file_mode, assert_has_option, assert_no_arg_containing, read_file, FakeHost,
    FakeMounter, FakeMounterFactory, HostCall, MounterCall, ScriptedSpawner,
};
use bucketmount::{
    BackendType, MountError, MountRuntime, MounterFactory, MounterSettings, NewMounter,
    SecretMap, UnmountMode, WaitFailure,
};
use tempfile::TempDir;

fn map(pairs: &[(&str, &str)]) -> SecretMap {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

struct Fixture {
    temp: TempDir,
    host: FakeHost,
    spawner: Arc<ScriptedSpawner>,
    factory: MounterFactory,
}

impl Fixture {
    /// Helpers that exit cleanly and leave `target` mounted.
    fn mounting(target: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let host = FakeHost::new();
        let mounted = host.clone();
        let path = std::fs::canonicalize(temp.path()).unwrap().join(target);
        let spawner = ScriptedSpawner::succeeding().after_success(move || mounted.set_mounted(&path));
        Self::build(temp, host, spawner, Duration::from_secs(5))
    }

    fn with_spawner(spawner: ScriptedSpawner, timeout: Duration) -> Self {
        Self::build(TempDir::new().unwrap(), FakeHost::new(), spawner, timeout)
    }

    fn build(temp: TempDir, host: FakeHost, spawner: ScriptedSpawner, timeout: Duration) -> Self {
        let spawner = Arc::new(spawner);
        let settings = MounterSettings::default()
            .meta_root(temp.path().join("meta"))
            .mount_timeout(timeout)
            .poll_interval(Duration::from_millis(5));
        let runtime = MountRuntime::new(settings, spawner.clone(), Arc::new(host.clone()));
        Self {
            temp,
            host,
            spawner,
            factory: MounterFactory::new(runtime),
        }
    }

    /// `name` under the canonical temp root, as mounters resolve targets.
    fn path(&self, name: &str) -> PathBuf {
        std::fs::canonicalize(self.temp.path()).unwrap().join(name)
    }

    fn meta_dir(&self, target: &Path) -> PathBuf {
        self.factory.runtime().meta_dir(target)
    }
}

fn hmac_secrets() -> SecretMap {
    map(&[
        ("bucketName", "logs"),
        ("cosEndpoint", "https://s3.example.com"),
        ("locationConstraint", "us-south"),
        ("accessKey", "AK"),
        ("secretKey", "SK"),
    ])
}

#[test]
fn test_s3fs_mount_then_unmount() {
    let fx = Fixture::mounting("vol");
    let target = fx.path("vol");
    let mounter = fx
        .factory
        .new_mounter(&map(&[]), &hmac_secrets(), &["ro".to_string()])
        .unwrap();
    assert_eq!(mounter.backend(), BackendType::S3fs);

    mounter.mount("/staging", &target).unwrap();

    let passwd = fx.meta_dir(&target).join("passwd");
    assert_eq!(read_file(&passwd, "password file"), "AK:SK");
    assert_file_mode(&passwd, 0o600, "password file");

    let calls = fx.spawner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].command, "s3fs");
    assert_eq!(calls[0].args[0], "logs");
    assert_eq!(calls[0].args[1], target.to_string_lossy());
    assert_has_option(&calls[0].args, &format!("passwd_file={}", passwd.display()), "s3fs argv");
    assert_has_option(&calls[0].args, "url=https://s3.example.com", "s3fs argv");
    assert_has_option(&calls[0].args, "ro", "s3fs argv");
    assert_no_arg_containing(&calls[0].args, "SK", "s3fs argv");

    mounter.unmount(&target).unwrap();

    assert_eq!(
        fx.host.unmount_calls(),
        vec![HostCall::Unmount(target.clone(), UnmountMode::Normal)]
    );
    assert!(!target.exists());
    assert!(!fx.meta_dir(&target).exists());
}

#[test]
fn test_dotdot_target_is_resolved_for_mount_and_unmount() {
    let fx = Fixture::mounting("vol");
    let target = fx.path("vol");
    std::fs::create_dir(fx.path("sub")).unwrap();
    let mounter = fx
        .factory
        .new_mounter(&map(&[]), &hmac_secrets(), &[])
        .unwrap();

    mounter.mount("/staging", &fx.path("sub/../vol")).unwrap();

    assert_eq!(fx.spawner.calls()[0].args[1], target.to_string_lossy());
    assert!(fx.host.is_mounted(&target));
    assert!(fx.meta_dir(&target).join("passwd").exists());

    mounter.unmount(&fx.path("sub/.././vol/")).unwrap();

    assert_eq!(
        fx.host.unmount_calls(),
        vec![HostCall::Unmount(target.clone(), UnmountMode::Normal)]
    );
    assert!(!target.exists());
    assert!(!fx.meta_dir(&target).exists());
}

#[test]
fn test_rclone_mount_writes_config() {
    let fx = Fixture::mounting("vol");
    let target = fx.path("vol");
    let mut secrets = map(&[("bucketName", "logs"), ("apiKey", "API"), ("mounter", "rclone")]);
    secrets.insert("cosEndpoint".to_string(), "https://s3.example.com".to_string());
    let mounter = fx.factory.new_mounter(&map(&[]), &secrets, &[]).unwrap();
    assert_eq!(mounter.backend(), BackendType::Rclone);

    mounter.mount("/staging", &target).unwrap();

    let config_file = fx.meta_dir(&target).join("rclone.conf");
    let config = read_file(&config_file, "rclone config");
    assert!(config.starts_with("[cos]\n"));
    assert!(config.contains("ibm_api_key = API\n"));
    assert_file_mode(&config_file, 0o600, "rclone config");

    let calls = fx.spawner.calls();
    assert_eq!(calls[0].command, "rclone");
    assert_eq!(calls[0].args[..2], ["mount".to_string(), "cos:logs".to_string()]);
    assert!(calls[0].args.contains(&format!("--config={}", config_file.display())));
    assert!(calls[0].args.contains(&"--daemon".to_string()));
    assert_no_arg_containing(&calls[0].args, "API", "rclone argv");
}

#[test]
fn test_mount_reuses_healthy_mount() {
    let fx = Fixture::mounting("vol");
    let target = fx.path("vol");
    std::fs::create_dir(&target).unwrap();
    fx.host.set_mounted(&target);

    let mounter = fx.factory.new_mounter(&map(&[]), &hmac_secrets(), &[]).unwrap();
    mounter.mount("/staging", &target).unwrap();

    assert!(fx.spawner.calls().is_empty());
    assert!(!fx.meta_dir(&target).exists());
}

#[test]
fn test_mount_recovers_stale_target() {
    let fx = Fixture::mounting("vol");
    let target = fx.path("vol");
    std::fs::create_dir(&target).unwrap();
    fx.host.set_corrupted(&target, libc::ENOTCONN);

    let mounter = fx.factory.new_mounter(&map(&[]), &hmac_secrets(), &[]).unwrap();
    mounter.mount("/staging", &target).unwrap();

    assert_eq!(
        fx.host.unmount_calls(),
        vec![HostCall::Unmount(target.clone(), UnmountMode::Forced)]
    );
    assert_eq!(fx.spawner.calls().len(), 1);
    assert!(fx.host.is_mounted(&target));
}

#[test]
fn test_helper_failure_removes_credentials() {
    let fx = Fixture::with_spawner(
        ScriptedSpawner::exiting(Some(1), "s3fs: bad credentials"),
        Duration::from_secs(5),
    );
    let target = fx.path("vol");
    let mounter = fx.factory.new_mounter(&map(&[]), &hmac_secrets(), &[]).unwrap();

    let err = mounter.mount("/staging", &target).unwrap_err();

    match err {
        MountError::Wait {
            command,
            reason: WaitFailure::NonZeroExit { code, stderr },
            ..
        } => {
            assert_eq!(command, "s3fs");
            assert_eq!(code, Some(1));
            assert_eq!(stderr, "s3fs: bad credentials");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!fx.meta_dir(&target).exists());
}

#[test]
fn test_start_failure_is_returned() {
    let fx = Fixture::with_spawner(
        ScriptedSpawner::failing_start("no such file"),
        Duration::from_secs(5),
    );
    let mounter = fx.factory.new_mounter(&map(&[]), &hmac_secrets(), &[]).unwrap();
    let err = mounter.mount("/staging", &fx.path("vol")).unwrap_err();
    assert!(matches!(err, MountError::Start { .. }));
}

#[test]
fn test_readiness_timeout_is_bounded() {
    let fx = Fixture::with_spawner(ScriptedSpawner::succeeding(), Duration::from_millis(50));
    let target = fx.path("vol");
    let mounter = fx.factory.new_mounter(&map(&[]), &hmac_secrets(), &[]).unwrap();

    let start = Instant::now();
    let err = mounter.mount("/staging", &target).unwrap_err();

    assert!(err.is_timeout());
    assert!(start.elapsed() < Duration::from_secs(2));
    // The helper may still be coming up; its credentials stay.
    assert!(fx.meta_dir(&target).join("passwd").exists());
}

#[test]
fn test_unmount_is_idempotent() {
    let fx = Fixture::with_spawner(ScriptedSpawner::succeeding(), Duration::from_secs(1));
    let target = fx.path("vol");
    std::fs::create_dir(&target).unwrap();
    let mounter = fx.factory.new_mounter(&map(&[]), &hmac_secrets(), &[]).unwrap();

    mounter.unmount(&target).unwrap();
    assert!(!target.exists());

    mounter.unmount(&target).unwrap();
    assert!(fx.host.unmount_calls().is_empty());
}

#[test]
fn test_selection_through_factory() {
    let fx = Fixture::with_spawner(ScriptedSpawner::succeeding(), Duration::from_secs(1));
    let backend = |attributes: &[(&str, &str)], secrets: &[(&str, &str)]| {
        fx.factory
            .new_mounter(&map(attributes), &map(secrets), &[])
            .unwrap()
            .backend()
    };

    let s3fs = backend(&[("mounter", "s3fs")], &[]);
    let rclone = backend(&[("mounter", "rclone")], &[]);
    let unknown = backend(&[("mounter", "unknown")], &[("mounter", "rclone")]);

    assert_ne!(rclone, s3fs);
    assert_ne!(rclone, unknown);
    assert_eq!(s3fs, unknown);
}

#[test]
fn test_fake_factory_records_requests() {
    let mounter = FakeMounter::new(BackendType::Rclone).on_unmount(|target| {
        Err(MountError::Unmount {
            path: target.to_path_buf(),
            forced: true,
            source: std::io::Error::from_raw_os_error(libc::EBUSY),
        })
    });
    let factory = FakeMounterFactory::new(mounter);
    let caller: &dyn NewMounter = &factory;

    let attributes = HashMap::from([("mounter".to_string(), "rclone".to_string())]);
    let built = caller
        .new_mounter(&attributes, &hmac_secrets(), &["ro".to_string()])
        .unwrap();
    built.mount("/staging", Path::new("/mnt/a")).unwrap();
    assert!(built.unmount(Path::new("/mnt/a")).is_err());

    let requests = factory.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].attributes, attributes);
    assert_eq!(requests[0].mount_flags, vec!["ro".to_string()]);
    assert_eq!(
        factory.mounter().calls(),
        vec![
            MounterCall::Mount {
                source: "/staging".to_string(),
                target: PathBuf::from("/mnt/a"),
            },
            MounterCall::Unmount {
                target: PathBuf::from("/mnt/a"),
            },
        ]
    );
}
