use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by a reconciliation pass.
///
/// Config errors abort the whole pass; every other variant is scoped to a
/// single mount name and leaves the remaining entries unaffected.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The desired-state document could not be read.
    #[error("cannot read config {}: {source}", path.display())]
    ConfigUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The desired-state document was read but does not have the expected shape.
    #[error("malformed config: {reason}")]
    ConfigMalformed { reason: String },

    /// A credential file referenced by a mount is missing or unreadable.
    /// The file path is reported; its contents never are.
    #[error("{mount}: credential file {}: {detail}", path.display())]
    CredentialUnavailable {
        mount: String,
        path: PathBuf,
        detail: String,
    },

    /// The mount command failed after all retry attempts.
    #[error("{name}: {detail}")]
    MountFailed { name: String, detail: String },

    /// The unmount command (or stale-directory removal) failed.
    #[error("{name}: {detail}")]
    UnmountFailed { name: String, detail: String },
}
