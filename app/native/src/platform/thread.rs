//! Named worker threads.

use std::thread::{self, JoinHandle};

/// Prefix shared by every thread the application spawns.
pub const THREAD_PREFIX: &str = "strata-";

/// Spawns a thread named `strata-{name}`.
///
/// # Errors
///
/// Returns the OS error if the thread cannot be created.
pub fn spawn_named_thread<F, T>(name: &str, task: F) -> std::io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let thread_name = format!("{THREAD_PREFIX}{name}");

    thread::Builder::new().name(thread_name.clone()).spawn(task).inspect_err(|err| {
        tracing::error!(thread = %thread_name, error = %err, "failed to spawn thread");
    })
}
