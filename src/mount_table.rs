use std::path::Path;

#[derive(Debug, PartialEq)]
pub struct MountEntry {
    pub source: String,
    pub target: String,
    pub fstype: String,
}

/// True for FUSE-backed filesystem types (`fuse`, `fuse.ossfs`, `fuse.s3fs`, ...).
///
/// Each provider driver registers its own subtype, so any `fuse.*` entry
/// under the target root counts as one of ours.
pub fn is_fuse_fstype(fstype: &str) -> bool {
    fstype == "fuse" || fstype.starts_with("fuse.")
}

/// Parse `/proc/mounts` text (Linux) and return only FUSE entries.
///
/// Format per line: `<source> <target> <fstype> <options> <dump> <pass>`
pub fn parse_proc_mounts(text: &str) -> Vec<MountEntry> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let source = parts.next()?;
            let target = parts.next()?;
            let fstype = parts.next()?;
            if is_fuse_fstype(fstype) {
                Some(MountEntry {
                    source: source.to_string(),
                    target: target.to_string(),
                    fstype: fstype.to_string(),
                })
            } else {
                None
            }
        })
        .collect()
}

/// Parse `mount` command output (macOS) and return only FUSE entries.
///
/// Format per line: `<source> on <target> (<fstype>, ...)`
pub fn parse_mount_output(text: &str) -> Vec<MountEntry> {
    text.lines()
        .filter_map(|line| {
            // Split on " on " to separate source from the rest.
            let (source, rest) = line.split_once(" on ")?;
            // Target is everything before " (".
            let target = rest.split_once(" (")?.0;
            // Options are inside the parentheses; first comma-delimited token is fstype.
            let opts = rest.split_once('(')?.1;
            let fstype = opts.split(',').next()?.trim();
            if is_fuse_fstype(fstype) {
                Some(MountEntry {
                    source: source.trim().to_string(),
                    target: target.trim().to_string(),
                    fstype: fstype.to_string(),
                })
            } else {
                None
            }
        })
        .collect()
}

/// Return `true` if `target` appears in `entries` as a FUSE mount point.
pub fn is_fuse_mount(entries: &[MountEntry], target: &Path) -> bool {
    let Some(target_str) = target.to_str() else {
        return false;
    };
    entries.iter().any(|e| e.target == target_str)
}
