//! Actual-state probing: derive the set of currently-active mount names,
//! either from caller-supplied mounted paths or from the live mount table.

use std::collections::BTreeSet;
use std::path::Path;

use crate::mount_table::MountEntry;

/// Derive a reconciliation key from an absolute path under `root`.
///
/// Strips the `root` prefix and surrounding separators. Returns `None` for
/// `root` itself and for any path that does not fall under it (such paths
/// are not ours and are ignored).
pub fn key_from_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let key = rel
        .to_str()?
        .trim_matches('/')
        .to_string();
    if key.is_empty() { None } else { Some(key) }
}

/// Active set from caller-supplied currently-mounted absolute paths.
pub fn active_from_paths(root: &Path, mounted: &[impl AsRef<Path>]) -> BTreeSet<String> {
    mounted
        .iter()
        .filter_map(|p| key_from_path(root, p.as_ref()))
        .collect()
}

/// Active set from the live mount table.
///
/// A key is active only if its target is recognized by the OS as a FUSE
/// mount AND the directory is present on disk. The second check separates
/// "directory left behind by a failed attempt" from "truly mounted", so a
/// half-created target does not suppress the retry on the next pass.
pub fn active_from_table(root: &Path, entries: &[MountEntry]) -> BTreeSet<String> {
    entries
        .iter()
        .filter_map(|e| {
            let target = Path::new(&e.target);
            let key = key_from_path(root, target)?;
            if target.is_dir() { Some(key) } else { None }
        })
        .collect()
}
