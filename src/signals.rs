use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Register a SIGINT (Ctrl+C) handler and return the interrupted flag.
///
/// When the first SIGINT arrives the flag is set to `true`. The pass then
/// finishes the action currently in flight, skips the remaining entries
/// (the next pass re-derives them from the filesystem) and exits non-zero.
///
/// A second SIGINT terminates the process immediately with exit code 130.
pub fn interrupted_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));

    // Registered first: on signal, if the flag is already true (second Ctrl+C) → exit.
    let _ = signal_hook::flag::register_conditional_shutdown(
        signal_hook::consts::SIGINT,
        130,
        Arc::clone(&flag),
    );

    // Registered second: on signal, set the flag to true (first Ctrl+C).
    let _ = signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&flag));

    flag
}
