//! External mount/unmount command orchestration: the `ExternalMounter`
//! seam, provider command construction, and the idempotent per-mount
//! executors with bounded retries.

use std::path::Path;
use std::time::Duration;

use crate::cmd;
use crate::config::{MountSpec, SourceUri};
use crate::error::SyncError;
use crate::platform;

/// Attempts per mount before giving up for this pass.
pub const MOUNT_ATTEMPTS: u32 = 3;

/// Fixed delay between mount attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Narrow seam over the external FUSE driver binaries, so the retry and
/// idempotence logic is decoupled from the specific driver invoked.
pub trait ExternalMounter {
    fn mount(&self, spec: &MountSpec, target: &Path) -> Result<(), String>;
    fn unmount(&self, target: &Path) -> Result<(), String>;
}

// ── Command construction ──────────────────────────────────────────────────────

/// Driver binary for a source scheme. The sidecar image ships the drivers
/// for the schemes its datasets use; unknown schemes follow the `<scheme>fs`
/// naming convention.
pub fn driver_program(scheme: &str) -> String {
    match scheme {
        "oss" => "ossfs".to_string(),
        "s3" => "s3fs".to_string(),
        other => format!("{other}fs"),
    }
}

/// Source argument in the driver convention: `bucket` or `bucket:/subpath`.
pub fn source_arg(source: &SourceUri) -> String {
    match &source.subpath {
        Some(sub) => format!("{}:/{}", source.bucket, sub),
        None => source.bucket.clone(),
    }
}

/// Build the driver argument list: source, target, then option flags.
///
/// Option mapping: `"true"` → `--key`, `"false"` → omitted, anything else →
/// `--key=value`, in document order. A read-only flag is derived from the
/// pod access modes unless the document sets `ro`/`readOnly` itself.
pub fn mount_args(spec: &MountSpec, target: &Path, read_only: bool) -> Vec<String> {
    let mut args = vec![source_arg(&spec.source), target.to_string_lossy().into_owned()];
    let mut explicit_ro = false;
    for (key, value) in &spec.options {
        if key == "ro" || key == "readOnly" {
            explicit_ro = true;
        }
        match value.as_str() {
            "true" => args.push(format!("--{key}")),
            "false" => {}
            other => args.push(format!("--{key}={other}")),
        }
    }
    if read_only && !explicit_ro {
        args.push("--ro".to_string());
    }
    args
}

/// Full mount command for `spec`: `(program, args)`.
pub fn mount_command(spec: &MountSpec, target: &Path, read_only: bool) -> (String, Vec<String>) {
    (
        driver_program(&spec.source.scheme),
        mount_args(spec, target, read_only),
    )
}

// ── Real implementation ───────────────────────────────────────────────────────

/// Shells out to the provider FUSE driver and the platform unmount tool.
pub struct FuseMounter {
    pub read_only: bool,
}

impl ExternalMounter for FuseMounter {
    fn mount(&self, spec: &MountSpec, target: &Path) -> Result<(), String> {
        let (prog, args) = mount_command(spec, target, self.read_only);
        let out = cmd::run_capture(&prog, &args)?;
        if out.status != 0 {
            return Err(format!(
                "{prog} failed (exit {}): {}",
                out.status,
                out.stderr.trim()
            ));
        }
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<(), String> {
        let prog = platform::unmount_prog();
        let args = platform::unmount_args(target);
        let args_str: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        let out = cmd::run_capture(prog, &args_str)?;
        if out.status != 0 {
            return Err(format!(
                "{prog} failed (exit {}): {}",
                out.status,
                out.stderr.trim()
            ));
        }
        Ok(())
    }
}

// ── Executors ─────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
pub enum MountAction {
    /// Target was already an active FUSE mount; nothing was done.
    AlreadyMounted,
    Mounted,
}

#[derive(Debug, PartialEq)]
pub enum UnmountAction {
    /// Target path no longer exists; nothing to do.
    NothingToDo,
    /// Target existed but was not a FUSE mount (leftover from a failed
    /// attempt); the directory tree was removed without an unmount command.
    RemovedStaleDir,
    Unmounted,
}

/// Outcome of one unmount, with an optional non-fatal cleanup note.
#[derive(Debug)]
pub struct UnmountReport {
    pub action: UnmountAction,
    pub cleanup_warning: Option<String>,
}

/// Run the mount command with bounded retries and a fixed inter-attempt
/// delay, surfacing the last underlying error after exhaustion.
pub fn mount_with_retry(
    mounter: &dyn ExternalMounter,
    spec: &MountSpec,
    target: &Path,
    delay: Duration,
) -> Result<(), SyncError> {
    let mut last_err = String::new();
    for attempt in 1..=MOUNT_ATTEMPTS {
        match mounter.mount(spec, target) {
            Ok(()) => return Ok(()),
            Err(e) => {
                last_err = e;
                if attempt < MOUNT_ATTEMPTS {
                    std::thread::sleep(delay);
                }
            }
        }
    }
    Err(SyncError::MountFailed {
        name: spec.name.clone(),
        detail: format!("{last_err} (after {MOUNT_ATTEMPTS} attempts)"),
    })
}

/// Mount one entry of `to_mount`.
///
/// Creates the target directory if absent and skips entirely when the
/// target is already an active FUSE mount (the idempotence guard against
/// double-mounting). A directory left behind by a failed attempt is kept:
/// the prober does not count it as active, so the next pass retries.
pub fn mount_one(
    mounter: &dyn ExternalMounter,
    spec: &MountSpec,
    target: &Path,
    already_fuse_mounted: bool,
) -> Result<MountAction, SyncError> {
    if already_fuse_mounted {
        return Ok(MountAction::AlreadyMounted);
    }
    std::fs::create_dir_all(target).map_err(|e| SyncError::MountFailed {
        name: spec.name.clone(),
        detail: format!("cannot create {}: {e}", target.display()),
    })?;
    mount_with_retry(mounter, spec, target, RETRY_DELAY)?;
    Ok(MountAction::Mounted)
}

/// Unmount one entry of `to_unmount`, identified by its reconciliation key.
///
/// Missing path → no-op. Existing non-FUSE path → remove the directory
/// tree only. FUSE mount → unmount, then best-effort directory removal.
pub fn unmount_one(
    mounter: &dyn ExternalMounter,
    key: &str,
    target: &Path,
    is_fuse_mounted: bool,
) -> Result<UnmountReport, SyncError> {
    if !target.exists() {
        return Ok(UnmountReport {
            action: UnmountAction::NothingToDo,
            cleanup_warning: None,
        });
    }
    if !is_fuse_mounted {
        std::fs::remove_dir_all(target).map_err(|e| SyncError::UnmountFailed {
            name: key.to_string(),
            detail: format!("cannot remove {}: {e}", target.display()),
        })?;
        return Ok(UnmountReport {
            action: UnmountAction::RemovedStaleDir,
            cleanup_warning: None,
        });
    }
    mounter
        .unmount(target)
        .map_err(|detail| SyncError::UnmountFailed {
            name: key.to_string(),
            detail,
        })?;
    let cleanup_warning = std::fs::remove_dir_all(target)
        .err()
        .map(|e| format!("unmounted {key} but could not remove {}: {e}", target.display()));
    Ok(UnmountReport {
        action: UnmountAction::Unmounted,
        cleanup_warning,
    })
}

// ── Test double ───────────────────────────────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::testing::MockMounter;
    use super::*;
    use std::path::PathBuf;

    fn spec(name: &str, uri: &str, options: &[(&str, &str)]) -> MountSpec {
        MountSpec {
            name: name.to_string(),
            source: SourceUri::parse(uri).unwrap(),
            relative_path: name.to_string(),
            options: options
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            credentials: None,
        }
    }

    // --- driver_program / source_arg ---

    #[test]
    fn driver_for_known_schemes() {
        assert_eq!(driver_program("oss"), "ossfs");
        assert_eq!(driver_program("s3"), "s3fs");
    }

    #[test]
    fn driver_for_unknown_scheme_follows_convention() {
        assert_eq!(driver_program("gcs"), "gcsfs");
    }

    #[test]
    fn source_arg_bucket_only() {
        let s = spec("a", "oss://bucket1", &[]);
        assert_eq!(source_arg(&s.source), "bucket1");
    }

    #[test]
    fn source_arg_with_subpath() {
        let s = spec("a", "oss://bucket1/models/v1", &[]);
        assert_eq!(source_arg(&s.source), "bucket1:/models/v1");
    }

    // --- mount_args ---

    #[test]
    fn mount_args_source_and_target_come_first() {
        let s = spec("a", "oss://bucket1", &[]);
        let args = mount_args(&s, Path::new("/target/a"), false);
        assert_eq!(args[0], "bucket1");
        assert_eq!(args[1], "/target/a");
    }

    #[test]
    fn mount_args_true_becomes_bare_flag() {
        let s = spec("a", "oss://b", &[("allow_other", "true")]);
        let args = mount_args(&s, Path::new("/target/a"), false);
        assert!(args.contains(&"--allow_other".to_string()), "got: {args:?}");
    }

    #[test]
    fn mount_args_false_is_omitted() {
        let s = spec("a", "oss://b", &[("allow_other", "false")]);
        let args = mount_args(&s, Path::new("/target/a"), false);
        assert!(
            !args.iter().any(|a| a.contains("allow_other")),
            "got: {args:?}"
        );
    }

    #[test]
    fn mount_args_value_becomes_key_equals_value() {
        let s = spec("a", "oss://b", &[("url", "http://oss.example.com")]);
        let args = mount_args(&s, Path::new("/target/a"), false);
        assert!(
            args.contains(&"--url=http://oss.example.com".to_string()),
            "got: {args:?}"
        );
    }

    #[test]
    fn mount_args_preserve_option_order() {
        let s = spec("a", "oss://b", &[("x", "1"), ("y", "true"), ("z", "3")]);
        let args = mount_args(&s, Path::new("/t/a"), false);
        assert_eq!(args[2..], ["--x=1", "--y", "--z=3"]);
    }

    #[test]
    fn read_only_access_mode_injects_ro() {
        let s = spec("a", "oss://b", &[]);
        let args = mount_args(&s, Path::new("/target/a"), true);
        assert!(args.contains(&"--ro".to_string()), "got: {args:?}");
    }

    #[test]
    fn read_write_access_mode_injects_nothing() {
        let s = spec("a", "oss://b", &[]);
        let args = mount_args(&s, Path::new("/target/a"), false);
        assert!(!args.contains(&"--ro".to_string()), "got: {args:?}");
    }

    #[test]
    fn explicit_ro_option_wins_over_access_mode() {
        // ro=false in the document means read-write even for a read-only pod.
        let s = spec("a", "oss://b", &[("ro", "false")]);
        let args = mount_args(&s, Path::new("/target/a"), true);
        assert!(!args.iter().any(|a| a.contains("ro")), "got: {args:?}");
    }

    #[test]
    fn explicit_ro_true_is_not_duplicated() {
        let s = spec("a", "oss://b", &[("ro", "true")]);
        let args = mount_args(&s, Path::new("/target/a"), true);
        let ro_flags = args.iter().filter(|a| *a == "--ro").count();
        assert_eq!(ro_flags, 1, "got: {args:?}");
    }

    #[test]
    fn mount_command_pairs_driver_and_args() {
        let s = spec("a", "oss://bucket1", &[]);
        let (prog, args) = mount_command(&s, Path::new("/target/a"), false);
        assert_eq!(prog, "ossfs");
        assert_eq!(args[0], "bucket1");
    }

    // --- mount_with_retry ---

    #[test]
    fn retry_returns_on_first_success() {
        let mock = MockMounter::new();
        let s = spec("a", "oss://b", &[]);
        mount_with_retry(&mock, &s, Path::new("/t/a"), Duration::ZERO).unwrap();
        assert_eq!(mock.call_count("mount"), 1);
    }

    #[test]
    fn retry_recovers_from_transient_failures() {
        let mock = MockMounter::failing_mounts(2);
        let s = spec("a", "oss://b", &[]);
        mount_with_retry(&mock, &s, Path::new("/t/a"), Duration::ZERO).unwrap();
        assert_eq!(mock.call_count("mount"), 3);
    }

    #[test]
    fn retry_exhaustion_is_mount_failed() {
        let mock = MockMounter::failing_mounts(MOUNT_ATTEMPTS);
        let s = spec("a", "oss://b", &[]);
        let err = mount_with_retry(&mock, &s, Path::new("/t/a"), Duration::ZERO).unwrap_err();
        assert_eq!(mock.call_count("mount"), MOUNT_ATTEMPTS as usize);
        assert!(matches!(err, SyncError::MountFailed { .. }));
        let msg = err.to_string();
        assert!(msg.contains('a'), "got: {msg}");
        assert!(msg.contains("mock mount failure"), "got: {msg}");
    }

    // --- mount_one ---

    #[test]
    fn mount_one_skips_active_fuse_mount() {
        let mock = MockMounter::new();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a");
        let s = spec("a", "oss://b", &[]);
        let action = mount_one(&mock, &s, &target, true).unwrap();
        assert_eq!(action, MountAction::AlreadyMounted);
        assert_eq!(mock.call_count("mount"), 0);
        assert!(!target.exists(), "guard must not create the directory");
    }

    #[test]
    fn mount_one_creates_dir_and_mounts() {
        let mock = MockMounter::new();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a");
        let s = spec("a", "oss://b", &[]);
        let action = mount_one(&mock, &s, &target, false).unwrap();
        assert_eq!(action, MountAction::Mounted);
        assert!(target.is_dir());
        assert_eq!(mock.call_count("mount"), 1);
    }

    #[test]
    fn mount_one_is_fine_with_existing_dir() {
        // Leftover directory from a failed earlier attempt.
        let mock = MockMounter::new();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a");
        std::fs::create_dir(&target).unwrap();
        let s = spec("a", "oss://b", &[]);
        mount_one(&mock, &s, &target, false).unwrap();
        assert_eq!(mock.call_count("mount"), 1);
    }

    // --- unmount_one ---

    #[test]
    fn unmount_one_missing_path_is_noop() {
        let mock = MockMounter::new();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("gone");
        let report = unmount_one(&mock, "gone", &target, false).unwrap();
        assert_eq!(report.action, UnmountAction::NothingToDo);
        assert!(mock.calls.borrow().is_empty());
    }

    #[test]
    fn unmount_one_removes_stale_dir_without_unmount_command() {
        let mock = MockMounter::new();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("b");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("leftover"), "x").unwrap();
        let report = unmount_one(&mock, "b", &target, false).unwrap();
        assert_eq!(report.action, UnmountAction::RemovedStaleDir);
        assert!(!target.exists());
        assert_eq!(mock.call_count("unmount"), 0);
    }

    #[test]
    fn unmount_one_unmounts_then_removes_dir() {
        let mock = MockMounter::new();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a");
        std::fs::create_dir(&target).unwrap();
        let report = unmount_one(&mock, "a", &target, true).unwrap();
        assert_eq!(report.action, UnmountAction::Unmounted);
        assert!(report.cleanup_warning.is_none());
        assert_eq!(mock.call_count("unmount"), 1);
        assert!(!target.exists());
    }

    #[test]
    fn unmount_one_failure_is_unmount_failed() {
        let mock = MockMounter::new();
        mock.unmount_failures.set(1);
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a");
        std::fs::create_dir(&target).unwrap();
        let err = unmount_one(&mock, "a", &target, true).unwrap_err();
        assert!(matches!(err, SyncError::UnmountFailed { .. }));
        assert!(target.exists(), "failed unmount must leave the dir for retry");
    }

    #[test]
    fn unmount_one_double_run_is_idempotent() {
        // After a successful unmount+removal a second run is a clean no-op.
        let mock = MockMounter::new();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a");
        std::fs::create_dir(&target).unwrap();
        unmount_one(&mock, "a", &target, true).unwrap();
        let report = unmount_one(&mock, "a", &target, false).unwrap();
        assert_eq!(report.action, UnmountAction::NothingToDo);
    }

    #[test]
    fn retry_constants_match_contract() {
        assert_eq!(MOUNT_ATTEMPTS, 3);
        assert_eq!(RETRY_DELAY, Duration::from_secs(1));
    }

    // --- mock bookkeeping ---

    #[test]
    fn mock_records_target_paths() {
        let mock = MockMounter::new();
        let s = spec("a", "oss://b", &[]);
        let target = PathBuf::from("/t/a");
        let _ = mock.mount(&s, &target);
        assert_eq!(mock.calls.borrow()[0], "mount a /t/a");
    }
}
