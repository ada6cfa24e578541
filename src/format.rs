/// A row in the `mntx status` table.
pub struct StatusRow {
    /// Reconciliation key (relative path under the target root).
    pub name: String,
    /// Source URI from the config document, or None for a stale mount
    /// that no longer appears in the desired state.
    pub source: Option<String>,
    /// Human-readable state string (`mounted`, `pending mount`, `stale`).
    pub state: String,
}

/// Format the `mntx status` output table.
///
/// Returns `"No mounts."` when `rows` is empty.
pub fn format_status_table(rows: &[StatusRow]) -> String {
    if rows.is_empty() {
        return "No mounts.".to_string();
    }
    let header = format!("{:<24} {:<40} {}", "NAME", "SOURCE", "STATE");
    let mut lines = vec![header];
    for row in rows {
        let source = row.source.as_deref().unwrap_or("(unknown)");
        lines.push(format!("{:<24} {:<40} {}", row.name, source, row.state));
    }
    lines.join("\n")
}

/// A single prerequisite check result for `mntx doctor`.
pub struct DoctorCheck {
    /// Short description of the check (e.g. `ossfs installed`).
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// On pass: optional version string. On fail: optional fix hint.
    pub detail: Option<String>,
}

/// Format the full `mntx doctor` report.
pub fn format_doctor_report(checks: &[DoctorCheck]) -> String {
    let mut lines = vec!["Checking prerequisites...".to_string()];
    let all_passed = checks.iter().all(|c| c.passed);

    for check in checks {
        if check.passed {
            let detail = check
                .detail
                .as_deref()
                .map(|d| format!(" ({d})"))
                .unwrap_or_default();
            lines.push(format!("  \u{2713} {}{}", check.name, detail));
        } else {
            lines.push(format!("  \u{2717} {}", check.name));
            if let Some(fix) = &check.detail {
                lines.push(format!("    Fix: {fix}"));
            }
        }
    }

    lines.push(String::new());
    if all_passed {
        lines.push("All checks passed.".to_string());
    } else {
        lines.push("Some checks failed.".to_string());
    }
    lines.join("\n")
}
