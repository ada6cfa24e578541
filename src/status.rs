use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::config;
use crate::exit_codes;
use crate::format::{StatusRow, format_status_table};
use crate::platform;
use crate::probe;
use crate::progress;

/// Human-readable state label for one reconciliation key.
///
/// - Desired and active → `"mounted"`
/// - Desired only       → `"pending mount"` (next sync pass mounts it)
/// - Active only        → `"stale"` (next sync pass unmounts it)
pub fn mount_state_label(desired: bool, active: bool) -> &'static str {
    match (desired, active) {
        (true, true) => "mounted",
        (true, false) => "pending mount",
        (false, _) => "stale",
    }
}

/// Run `mntx status`: report desired vs. active without changing anything.
///
/// Returns the exit code that `main` should pass to `std::process::exit`.
pub fn run_status(config_path: Option<PathBuf>) -> i32 {
    let config_path = config_path.unwrap_or_else(|| PathBuf::from(config::DEFAULT_CONFIG_PATH));
    let state = match config::load(&config_path) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("{e}");
            return exit_codes::CONFIG_ERROR;
        }
    };

    progress::step("Probing mount table...");
    let table = platform::read_mount_table().unwrap_or_default();
    let active = probe::active_from_table(&state.target_root, &table);
    let desired = state.desired_keys();

    let all_keys: BTreeSet<&String> = desired.union(&active).collect();
    let rows: Vec<StatusRow> = all_keys
        .into_iter()
        .map(|key| StatusRow {
            name: key.clone(),
            source: state.spec_for_key(key).map(|s| s.source.to_string()),
            state: mount_state_label(desired.contains(key), active.contains(key)).to_string(),
        })
        .collect();

    println!("{}", format_status_table(&rows));
    exit_codes::SUCCESS
}
