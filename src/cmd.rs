use std::ffi::OsStr;
use std::process::Command;

/// Output captured from a subprocess.
pub struct CaptureOutput {
    pub stdout: String,
    pub stderr: String,
    /// The process exit code, or 1 if the process was killed by a signal.
    pub status: i32,
}

/// Run `prog` with `args`, capturing stdout and stderr.
///
/// Returns `Err` if the process could not be spawned (e.g. program not found).
/// A non-zero exit code is NOT an error; it is returned in `CaptureOutput.status`.
pub fn run_capture<S: AsRef<OsStr>>(prog: &str, args: &[S]) -> Result<CaptureOutput, String> {
    let output = Command::new(prog)
        .args(args)
        .output()
        .map_err(|e| format!("Failed to run {prog}: {e}"))?;
    Ok(CaptureOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        status: output.status.code().unwrap_or(1),
    })
}

/// Render `prog` and `args` as a single shell-style line for display.
///
/// For `--dry-run` output only; no quoting is performed.
pub fn display_cmd<S: AsRef<OsStr>>(prog: &str, args: &[S]) -> String {
    let mut line = prog.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.as_ref().to_string_lossy());
    }
    line
}
