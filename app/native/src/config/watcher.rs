//! Configuration file watcher for hot-reloading.
//!
//! Watches the configuration file's directory and calls back once per burst
//! of changes to the file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::platform::thread::spawn_named_thread;

/// Debounce duration for config file changes.
/// Some editors trigger multiple events per save (write to temp, rename, etc.).
const CONFIG_DEBOUNCE_MS: u64 = 200;

/// Keeps a configuration file watch alive. Dropping it stops the watch.
pub struct ConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher").field("path", &self.path).finish_non_exhaustive()
    }
}

impl ConfigWatcher {
    /// Starts watching `config_path`. `on_change` runs on the watcher thread
    /// after the file has been quiet for the debounce window.
    ///
    /// The parent directory is watched so that editors which save by writing
    /// a temp file and renaming it are still seen.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch cannot be set up.
    pub fn spawn<F>(config_path: &Path, on_change: F) -> notify::Result<Self>
    where F: Fn(&Path) + Send + 'static {
        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(tx)?;

        let watch_path = config_path.parent().unwrap_or(config_path);
        watcher.watch(watch_path, RecursiveMode::NonRecursive)?;

        let path = config_path.to_path_buf();
        let file_name = path.file_name().map(OsString::from).unwrap_or_default();
        let thread_path = path.clone();

        spawn_named_thread("config-watcher", move || {
            watch_loop(&rx, &file_name, || on_change(&thread_path));
        })?;

        tracing::debug!(path = %path.display(), "watching configuration file");
        Ok(Self { path, _watcher: watcher })
    }

    /// The watched file.
    #[must_use]
    pub fn path(&self) -> &Path { &self.path }
}

fn affects(event: &Event, file_name: &OsString) -> bool {
    event.paths.iter().any(|p| p.file_name().is_some_and(|name| name == file_name))
}

/// Runs until the sending side (the notify watcher) is dropped.
fn watch_loop(rx: &Receiver<notify::Result<Event>>, file_name: &OsString, on_change: impl Fn()) {
    let debounce = Duration::from_millis(CONFIG_DEBOUNCE_MS);

    loop {
        match rx.recv() {
            Ok(Ok(event)) if affects(&event, file_name) => {}
            Ok(Ok(_)) => continue,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "config watch error");
                continue;
            }
            Err(_) => break,
        }

        // Swallow the rest of the burst.
        loop {
            match rx.recv_timeout(debounce) {
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }

        tracing::info!("configuration file changed");
        on_change();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, mpsc};

    use notify::EventKind;
    use notify::event::{DataChange, ModifyKind};

    use super::*;

    fn event_for(path: &str) -> notify::Result<Event> {
        Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Any))).add_path(PathBuf::from(path)))
    }

    #[test]
    fn config_debounce_duration_is_reasonable() {
        const { assert!(CONFIG_DEBOUNCE_MS >= 100) };
        const { assert!(CONFIG_DEBOUNCE_MS <= 1000) };
    }

    #[test]
    fn closing_during_burst_stops_quietly() {
        let (tx, rx) = mpsc::channel();
        for _ in 0..5 {
            tx.send(event_for("/cfg/config.jsonc")).unwrap();
        }
        drop(tx);

        let count = AtomicUsize::new(0);
        watch_loop(&rx, &OsString::from("config.jsonc"), || {
            count.fetch_add(1, Ordering::SeqCst);
        });

        // The channel closed during the debounce window.
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn events_for_other_files_are_ignored() {
        let (tx, rx) = mpsc::channel();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        let handle = std::thread::spawn(move || {
            watch_loop(&rx, &OsString::from("config.jsonc"), || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });

        tx.send(event_for("/cfg/other.json")).unwrap();
        tx.send(event_for("/cfg/config.jsonc")).unwrap();
        std::thread::sleep(Duration::from_millis(CONFIG_DEBOUNCE_MS * 3));
        drop(tx);
        handle.join().unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn watcher_reports_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.jsonc");
        std::fs::write(&path, "{}").unwrap();

        let (tx, rx) = mpsc::channel();
        let watcher = ConfigWatcher::spawn(&path, move |changed| {
            let _ = tx.send(changed.to_path_buf());
        })
        .unwrap();

        std::thread::sleep(Duration::from_millis(100));
        std::fs::write(&path, r#"{ "numLayers": 3 }"#).unwrap();

        let changed = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(changed, path);
        assert_eq!(watcher.path(), path);
    }
}
