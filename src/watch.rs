use std::path::Path;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Watches `path` and signals on every modify, create or remove event.
/// The watcher stops when the returned handle is dropped.
pub fn watch_file(path: &Path) -> notify::Result<(RecommendedWatcher, Receiver<()>)> {
    let (tx, rx) = mpsc::channel::<()>();
    let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        if let Ok(event) = res {
            match event.kind {
                EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_) | EventKind::Any => {
                    let _ = tx.send(());
                }
                _ => {}
            }
        }
    })?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;
    Ok((watcher, rx))
}

/// Blocks until the next change, then swallows the burst of events an
/// editor save usually produces. Returns false once the watcher is gone.
pub fn wait_for_change(rx: &Receiver<()>, settle: Duration) -> bool {
    if rx.recv().is_err() {
        return false;
    }
    while rx.recv_timeout(settle).is_ok() {}
    true
}
