use std::path::Path;

#[cfg(target_os = "macos")]
use crate::cmd;
use crate::mount_table::{self, MountEntry};

/// Return the program name for unmounting a FUSE mount.
///
/// Linux: `fusermount`
/// macOS: `umount`
pub fn unmount_prog() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        "fusermount"
    }
    #[cfg(target_os = "macos")]
    {
        "umount"
    }
}

/// Return the arguments (without the program name) for unmounting `mount_point`.
///
/// Linux: `["-u", "<mount_point>"]`
/// macOS: `["<mount_point>"]`
pub fn unmount_args(mount_point: &Path) -> Vec<String> {
    let path = mount_point.to_string_lossy().into_owned();
    #[cfg(target_os = "linux")]
    {
        vec!["-u".to_string(), path]
    }
    #[cfg(target_os = "macos")]
    {
        vec![path]
    }
}

/// Read the system mount table and return all FUSE entries.
///
/// Linux: reads `/proc/mounts` and parses with `parse_proc_mounts`.
/// macOS: runs `mount` and parses with `parse_mount_output`.
pub fn read_mount_table() -> Result<Vec<MountEntry>, String> {
    #[cfg(target_os = "linux")]
    {
        let text = std::fs::read_to_string("/proc/mounts")
            .map_err(|e| format!("Failed to read /proc/mounts: {e}"))?;
        Ok(mount_table::parse_proc_mounts(&text))
    }
    #[cfg(target_os = "macos")]
    {
        let out = cmd::run_capture("mount", &[] as &[&str])?;
        Ok(mount_table::parse_mount_output(&out.stdout))
    }
}
