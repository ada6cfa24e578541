use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::cmd;
use crate::config::{self, DesiredState};
use crate::exit_codes;
use crate::format::DoctorCheck;
use crate::mounter;
use crate::platform;
use crate::progress;

/// Extract the first version-like token (`MAJOR.MINOR[.PATCH...]`) from `output`.
///
/// Strips a leading `v` and trailing punctuation before matching. Returns `None`
/// if no token with at least two dot-separated numeric parts is found.
pub fn parse_version_str(output: &str) -> Option<String> {
    for word in output.split_whitespace() {
        let w = word
            .trim_start_matches('v')
            .trim_end_matches([',', ';', '.'].as_slice());
        let parts: Vec<&str> = w.split('.').collect();
        if parts.len() >= 2
            && parts
                .iter()
                .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
        {
            return Some(w.to_string());
        }
    }
    None
}

fn which(prog: &str) -> bool {
    cmd::run_capture("which", &[prog])
        .map(|out| out.status == 0)
        .unwrap_or(false)
}

/// Config document readable and parseable.
pub fn check_config(path: &Path) -> DoctorCheck {
    match config::load(path) {
        Ok(state) => DoctorCheck {
            name: format!("config {} parseable", path.display()),
            passed: true,
            detail: Some(format!("{} mounts", state.mounts.len())),
        },
        Err(e) => DoctorCheck {
            name: format!("config {} parseable", path.display()),
            passed: false,
            detail: Some(e.to_string()),
        },
    }
}

/// FUSE driver for one source scheme present on `$PATH`.
pub fn check_driver(scheme: &str) -> DoctorCheck {
    let driver = mounter::driver_program(scheme);
    if !which(&driver) {
        return DoctorCheck {
            name: format!("{driver} installed"),
            passed: false,
            detail: Some(format!("install {driver} in the sidecar image")),
        };
    }
    let version = cmd::run_capture(&driver, &["--version"])
        .ok()
        .and_then(|out| parse_version_str(&out.stdout).or_else(|| parse_version_str(&out.stderr)));
    DoctorCheck {
        name: format!("{driver} installed"),
        passed: true,
        detail: version,
    }
}

pub fn check_unmount_tool() -> DoctorCheck {
    let prog = platform::unmount_prog();
    DoctorCheck {
        name: format!("{prog} available"),
        passed: which(prog),
        detail: None,
    }
}

/// Target root present and writable (checked with a create-and-remove probe).
pub fn check_target_root(root: &Path) -> DoctorCheck {
    let name = format!("target root {} writable", root.display());
    if !root.is_dir() {
        return DoctorCheck {
            name,
            passed: false,
            detail: Some(format!("Run: mkdir -p {}", root.display())),
        };
    }
    let probe = root.join(".mntx-write-test");
    let writable = std::fs::write(&probe, b"").is_ok() && std::fs::remove_file(&probe).is_ok();
    DoctorCheck {
        name,
        passed: writable,
        detail: if writable {
            None
        } else {
            Some(format!("Check permissions on {}", root.display()))
        },
    }
}

fn schemes(state: &DesiredState) -> BTreeSet<String> {
    state
        .mounts
        .iter()
        .map(|m| m.source.scheme.clone())
        .collect()
}

/// Run all prerequisite checks, print the report, and return an exit code.
///
/// Returns `exit_codes::SUCCESS` (0) if all checks pass,
/// `exit_codes::PREREQ_NOT_FOUND` (127) otherwise.
pub fn run_doctor(config_path: Option<PathBuf>) -> i32 {
    progress::step("Running prerequisite checks...");
    let config_path = config_path.unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_PATH));

    let mut checks = vec![check_config(&config_path)];
    if let Ok(state) = config::load(&config_path) {
        for scheme in schemes(&state) {
            checks.push(check_driver(&scheme));
        }
        checks.push(check_target_root(&state.target_root));
    }
    checks.push(check_unmount_tool());

    let all_passed = checks.iter().all(|c| c.passed);
    let report = crate::format::format_doctor_report(&checks);
    println!("{report}");
    if all_passed {
        exit_codes::SUCCESS
    } else {
        exit_codes::PREREQ_NOT_FOUND
    }
}
