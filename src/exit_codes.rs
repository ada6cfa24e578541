/// Exit code: the pass completed and every action succeeded.
pub const SUCCESS: i32 = 0;

/// Exit code: the pass completed but at least one mount/unmount action failed.
/// Failed names stay in the diff and are retried on the next scheduled pass.
pub const PARTIAL: i32 = 1;

/// Exit code: the desired state could not be loaded or parsed (pass-fatal).
pub const CONFIG_ERROR: i32 = 2;

/// Exit code: a required external binary could not be spawned.
pub const PREREQ_NOT_FOUND: i32 = 127;
