use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cmd;
use crate::config::{self, DesiredState};
use crate::credentials::{CredentialStore, DEFAULT_PASSWD_PATH};
use crate::diff::{self, Plan};
use crate::exit_codes;
use crate::mount_table::{self, MountEntry};
use crate::mounter::{self, ExternalMounter, FuseMounter, MountAction, UnmountAction};
use crate::platform;
use crate::probe;
use crate::progress;
use crate::signals;

// ── Pure functions ────────────────────────────────────────────────────────────

/// Outcome line for a completed mount action.
pub fn mount_outcome_line(action: &MountAction, key: &str) -> String {
    match action {
        MountAction::Mounted => format!("mounted: {key}"),
        MountAction::AlreadyMounted => format!("already mounted: {key}"),
    }
}

/// Outcome line for a completed unmount action.
pub fn unmount_outcome_line(action: &UnmountAction, key: &str) -> String {
    match action {
        UnmountAction::NothingToDo => format!("nothing to unmount: {key}"),
        UnmountAction::RemovedStaleDir => format!("removed stale dir: {key}"),
        UnmountAction::Unmounted => format!("unmounted: {key}"),
    }
}

/// Format the `--dry-run` plan: the commands a real pass would run.
pub fn dry_run_plan(state: &DesiredState, plan: &Plan) -> String {
    let mut lines = Vec::new();
    for key in &plan.to_mount {
        if let Some(spec) = state.spec_for_key(key) {
            let target = state.target_path(key);
            let (prog, args) = mounter::mount_command(spec, &target, state.read_only());
            lines.push(format!("Would run: {}", cmd::display_cmd(&prog, &args)));
        }
    }
    for key in &plan.to_unmount {
        lines.push(format!(
            "Would unmount: {}",
            state.target_path(key).display()
        ));
    }
    lines.join("\n")
}

// ── Pass execution ────────────────────────────────────────────────────────────

/// Counters for one reconciliation pass.
#[derive(Debug, Default, PartialEq)]
pub struct PassSummary {
    pub mounted: usize,
    pub unmounted: usize,
    pub failed: usize,
    /// Entries not attempted because the pass was interrupted; the next
    /// scheduled pass re-derives and retries them.
    pub skipped: usize,
}

/// Execute a plan: mount everything in `to_mount` (credentials first),
/// unmount everything in `to_unmount`. Per-entry failures are printed and
/// counted, never propagated — one bad mount must not starve the rest.
/// Exactly one outcome line is printed per planned key.
pub fn act(
    state: &DesiredState,
    plan: &Plan,
    table: &[MountEntry],
    mounter: &dyn ExternalMounter,
    store: &CredentialStore,
    interrupted: &AtomicBool,
) -> PassSummary {
    let mut summary = PassSummary::default();

    for (i, key) in plan.to_mount.iter().enumerate() {
        if interrupted.load(Ordering::Relaxed) {
            summary.skipped += plan.to_mount.len() - i;
            break;
        }
        // Keys in to_mount come from the desired set, so the spec exists.
        let Some(spec) = state.spec_for_key(key) else {
            continue;
        };
        let target = state.target_path(key);
        if let Err(e) = store.ensure(spec) {
            println!("mount failed: {e}");
            summary.failed += 1;
            continue;
        }
        let already = mount_table::is_fuse_mount(table, &target);
        match mounter::mount_one(mounter, spec, &target, already) {
            Ok(action) => {
                println!("{}", mount_outcome_line(&action, key));
                summary.mounted += 1;
            }
            Err(e) => {
                println!("mount failed: {e}");
                summary.failed += 1;
            }
        }
    }

    for (i, key) in plan.to_unmount.iter().enumerate() {
        if interrupted.load(Ordering::Relaxed) {
            summary.skipped += plan.to_unmount.len() - i;
            break;
        }
        let target = state.target_path(key);
        let is_fuse = mount_table::is_fuse_mount(table, &target);
        match mounter::unmount_one(mounter, key, &target, is_fuse) {
            Ok(report) => {
                println!("{}", unmount_outcome_line(&report.action, key));
                if let Some(warning) = report.cleanup_warning {
                    eprintln!("Warning: {warning}");
                }
                summary.unmounted += 1;
            }
            Err(e) => {
                println!("unmount failed: {e}");
                summary.failed += 1;
            }
        }
    }

    summary
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Run `mntx sync`: one complete reconciliation pass.
///
/// Returns the exit code that `main` should pass to `std::process::exit`.
pub fn run_sync(
    config_path: Option<PathBuf>,
    passwd_file: Option<PathBuf>,
    mounted: Vec<PathBuf>,
    dry_run: bool,
) -> i32 {
    // Install the SIGINT handler before any mount operations so Ctrl+C lets
    // the in-flight action finish instead of leaving a half-done mount.
    let interrupted = signals::interrupted_flag();

    // 1. Load the desired state; nothing is reconciled without it.
    let config_path = config_path.unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_PATH));
    progress::step(&format!(
        "Loading desired state from {}",
        config_path.display()
    ));
    let state = match config::load(&config_path) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("{e}");
            return exit_codes::CONFIG_ERROR;
        }
    };
    for warning in &state.warnings {
        eprintln!("Warning: {warning}");
    }

    // 2. Derive the active set: caller-supplied paths when given, otherwise
    // the live mount table. The table is read either way; the executors use
    // it for their idempotence guards.
    let table = platform::read_mount_table().unwrap_or_default();
    let active = if mounted.is_empty() {
        progress::step("Probing mount table...");
        probe::active_from_table(&state.target_root, &table)
    } else {
        probe::active_from_paths(&state.target_root, &mounted)
    };

    // 3. Diff and log the decision.
    let plan = diff::plan(&state.desired_keys(), &active);
    println!("{}", diff::describe(&plan));
    if plan.is_converged() {
        println!("nothing to do.");
        return exit_codes::SUCCESS;
    }

    // 4. Dry-run: print the commands and exit without side effects.
    if dry_run {
        println!("{}", dry_run_plan(&state, &plan));
        return exit_codes::SUCCESS;
    }

    // 5. Act. Every planned key produces exactly one outcome line.
    let store = CredentialStore::new(passwd_file.unwrap_or_else(|| PathBuf::from(DEFAULT_PASSWD_PATH)));
    let fuse = FuseMounter {
        read_only: state.read_only(),
    };
    let summary = act(&state, &plan, &table, &fuse, &store, &interrupted);

    // 6. Exit code: converged, partial, or interrupted-partial.
    if summary.skipped > 0 {
        eprintln!(
            "Interrupted: {} entries left for the next pass.",
            summary.skipped
        );
        return exit_codes::PARTIAL;
    }
    if summary.failed > 0 {
        eprintln!(
            "{} of {} actions failed; they stay in the diff for the next pass.",
            summary.failed,
            summary.failed + summary.mounted + summary.unmounted
        );
        return exit_codes::PARTIAL;
    }
    progress::step(&format!(
        "Done: {} mounted, {} unmounted.",
        summary.mounted, summary.unmounted
    ));
    exit_codes::SUCCESS
}
