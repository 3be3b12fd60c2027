//! Watch mode
//!
//! [`NotifyWatcher`] registers the directories of watched files with
//! `notify` and forwards create and modify events through a channel.
//! [`WatchLoop`] drains that channel on the main thread and hands each changed
//! path to the [`Workspace`], so the render graph is only ever touched from
//! one thread.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexSet;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use templer_core::PathWatcher;

use crate::error::{RenderError, Result};
use crate::report::RenderReport;
use crate::workspace::Workspace;

/// How long to wait for the first event of a tick
const POLL_TIMEOUT_MS: u64 = 100;

/// Pause between two ticks
const TICK_INTERVAL_MS: u64 = 100;

/// `PathWatcher` backed by the platform's recommended `notify` watcher
///
/// Files are watched through their parent directory (non-recursively) so
/// that editors replacing a file on save are still noticed. Directories are
/// reference counted by the number of watched files they contain.
pub struct NotifyWatcher {
    watcher: RecommendedWatcher,
    directories: HashMap<PathBuf, usize>,
}

impl NotifyWatcher {
    /// Create a watcher and the receiving end of its event channel
    pub fn new() -> Result<(Self, Receiver<PathBuf>)> {
        let (tx, rx) = channel();
        let watcher = Self::with_sender(tx)?;
        Ok((watcher, rx))
    }

    /// Create a watcher forwarding changed paths to `tx`
    pub fn with_sender(tx: Sender<PathBuf>) -> Result<Self> {
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) => {
                    for path in event.paths {
                        // The receiver is gone once the loop stopped
                        let _ = tx.send(path);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("File watcher error: {}", e),
            },
            Config::default(),
        )
        .map_err(|e| RenderError::Watch(e.to_string()))?;

        Ok(Self {
            watcher,
            directories: HashMap::new(),
        })
    }

    /// Directories currently registered with the backend
    pub fn directories(&self) -> impl Iterator<Item = &Path> {
        self.directories.keys().map(PathBuf::as_path)
    }
}

impl PathWatcher for NotifyWatcher {
    fn watch(&mut self, path: &Path) -> io::Result<()> {
        let directory = path.parent().unwrap_or(path).to_path_buf();

        if !self.directories.contains_key(&directory) {
            self.watcher
                .watch(&directory, RecursiveMode::NonRecursive)
                .map_err(io::Error::other)?;
            tracing::debug!("Watching directory '{}'", directory.display());
        }
        *self.directories.entry(directory).or_insert(0) += 1;
        Ok(())
    }

    fn unwatch(&mut self, path: &Path) {
        let directory = path.parent().unwrap_or(path);
        let Some(count) = self.directories.get_mut(directory) else {
            return;
        };

        *count -= 1;
        if *count == 0 {
            self.directories.remove(directory);
            if let Err(e) = self.watcher.unwatch(directory) {
                tracing::debug!("Could not unwatch '{}': {}", directory.display(), e);
            }
        }
    }
}

/// The long-running re-render loop
pub struct WatchLoop {
    workspace: Workspace,
    events: Receiver<PathBuf>,
    running: Arc<AtomicBool>,
    poll_timeout: Duration,
    interval: Duration,
}

impl WatchLoop {
    pub fn new(workspace: Workspace, events: Receiver<PathBuf>, running: Arc<AtomicBool>) -> Self {
        Self {
            workspace,
            events,
            running,
            poll_timeout: Duration::from_millis(POLL_TIMEOUT_MS),
            interval: Duration::from_millis(TICK_INTERVAL_MS),
        }
    }

    /// Override the pause between ticks
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }

    /// Render everything once, then re-render on changes until stopped
    ///
    /// Returns the report of the initial render.
    pub fn run(&mut self) -> RenderReport {
        tracing::info!("Starting auto renderer...");
        let initial = self.workspace.render_all();

        tracing::debug!("Listening for file changes...");
        while self.running.load(Ordering::SeqCst) {
            self.tick();
            std::thread::sleep(self.interval);
        }

        self.workspace.release_watches();
        tracing::info!("Auto renderer stopped");
        initial
    }

    /// Wait for events once and dispatch every changed path
    pub fn tick(&mut self) -> RenderReport {
        let mut report = RenderReport::new();

        let first = match self.events.recv_timeout(self.poll_timeout) {
            Ok(path) => path,
            Err(RecvTimeoutError::Timeout) => return report,
            Err(RecvTimeoutError::Disconnected) => {
                tracing::warn!("File watcher disconnected, stopping");
                self.running.store(false, Ordering::SeqCst);
                return report;
            }
        };

        let mut paths = IndexSet::new();
        paths.insert(first);
        paths.extend(self.events.try_iter());

        for path in paths {
            if self.workspace.files().is_watched(&path) {
                report.merge(self.workspace.handle_file_event(&path));
            }
        }
        report
    }

    /// Stop the loop after the current tick
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
