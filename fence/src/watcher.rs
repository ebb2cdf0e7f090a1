//! Watching the previewed document for writes

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Debounced watcher for a single document
pub struct DocumentWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<()>,
    path: PathBuf,
    last_event: Option<Instant>,
}

impl DocumentWatcher {
    pub fn new(path: &Path) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let path = path
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", path.display()))?;
        let target = path.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else { return };
            if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
                && event.paths.iter().any(|p| p == &target)
            {
                let _ = tx.send(());
            }
        })
        .context("Failed to create file watcher")?;

        // Editors that save by rename replace the inode, so watch the directory
        let watch_root = path.parent().unwrap_or(&path);
        watcher
            .watch(watch_root, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", watch_root.display()))?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            path,
            last_event: None,
        })
    }

    /// True once events have arrived and `debounce` has passed since the last one
    pub fn check_changed(&mut self, debounce: Duration) -> bool {
        while self.receiver.try_recv().is_ok() {
            self.last_event = Some(Instant::now());
        }

        match self.last_event {
            Some(last) if last.elapsed() >= debounce => {
                self.last_event = None;
                true
            }
            _ => false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
