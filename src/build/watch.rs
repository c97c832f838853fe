//! File watching for automatic rebuilds.
//!
//! Uses `notify-debouncer-full` to watch content, template and style
//! directories. Events are classified on the watcher thread and delivered
//! over a channel to [`run_watch_loop`], which owns the [`Builder`]; page
//! rebuilds and full rebuilds therefore never overlap.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{
    Config as NotifyConfig, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher,
};
use notify_debouncer_full::{
    DebounceEventResult, Debouncer, RecommendedCache, new_debouncer, new_debouncer_opt,
};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::Instant;

use super::builder::Builder;
use crate::config::{Config, WatchConfig};

// =============================================================================
// Errors
// =============================================================================

#[derive(thiserror::Error, Debug)]
pub enum WatchError {
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("no content directory contains {0}")]
    NoContentDir(PathBuf),
}

// =============================================================================
// Watch events
// =============================================================================

/// Events sent from the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A content source file changed; rebuild just that page.
    Content(PathBuf),
    /// A template or style file changed; schedule a full rebuild.
    Templates(PathBuf),
    /// Watcher error occurred.
    Error(String),
}

// =============================================================================
// Path classification
// =============================================================================

/// Directories to watch, split by what a change inside them triggers.
#[derive(Debug, Clone, Default)]
pub struct WatchPaths {
    pub content_dirs: Vec<PathBuf>,
    /// Layout, partial and style directories.
    pub template_dirs: Vec<PathBuf>,
}

impl WatchPaths {
    /// Collect the watched directories from the config, canonicalized so
    /// they match the paths notify reports.
    pub fn from_config(config: &Config) -> Self {
        let canonical = |path: &PathBuf| path.canonicalize().unwrap_or_else(|_| path.clone());
        Self {
            content_dirs: config.content_dirs.iter().map(|dir| canonical(&dir.source)).collect(),
            template_dirs: config
                .template_dirs
                .layouts
                .iter()
                .chain(&config.template_dirs.partials)
                .chain(config.style_dirs.iter().map(|dir| &dir.source))
                .map(canonical)
                .collect(),
        }
    }
}

/// Classifies file paths into watch events.
#[derive(Clone)]
pub struct PathClassifier {
    paths: WatchPaths,
}

impl PathClassifier {
    pub fn new(paths: WatchPaths) -> Self {
        Self { paths }
    }

    /// Classify a changed path into a WatchEvent.
    pub fn classify(&self, path: &Path) -> Option<WatchEvent> {
        // Skip hidden files and directories
        if path
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
        {
            return None;
        }

        if self.paths.template_dirs.iter().any(|dir| path.starts_with(dir)) {
            return Some(WatchEvent::Templates(path.to_path_buf()));
        }

        if self.paths.content_dirs.iter().any(|dir| path.starts_with(dir))
            && path.extension().is_some_and(|ext| ext == "md")
        {
            return Some(WatchEvent::Content(path.to_path_buf()));
        }

        None // Unknown path, ignore
    }
}

// =============================================================================
// File watcher
// =============================================================================

/// A file watcher that can use either native or polling backend.
pub enum FileWatcher {
    /// Native file system watcher (recommended for local development).
    Native {
        _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    },
    /// Polling-based watcher (for network filesystems, Docker, etc.).
    Polling {
        _debouncer: Debouncer<PollWatcher, RecommendedCache>,
    },
}

impl FileWatcher {
    /// Create a new file watcher. Events are sent to `tx` until the watcher
    /// is dropped.
    pub fn new(
        config: &WatchConfig,
        paths: &WatchPaths,
        tx: UnboundedSender<WatchEvent>,
    ) -> Result<Self, WatchError> {
        let debounce_timeout = Duration::from_millis(config.debounce_ms);
        let classifier = PathClassifier::new(paths.clone());

        // Callback to convert notify events to our WatchEvent type
        let callback = move |result: DebounceEventResult| match result {
            Ok(events) => {
                for event in events.iter() {
                    if !is_relevant_event(&event.kind) {
                        continue;
                    }
                    // Renames report the new name last
                    let Some(path) = event.paths.last() else {
                        continue;
                    };
                    if !path.is_file() {
                        continue;
                    }
                    if let Some(change) = classifier.classify(path) {
                        let _ = tx.send(change);
                    }
                }
            }
            Err(errors) => {
                for e in errors {
                    let _ = tx.send(WatchEvent::Error(e.to_string()));
                }
            }
        };

        if config.poll {
            // Use polling watcher
            let poll_interval = Duration::from_millis(config.poll_interval_ms);
            let notify_config = NotifyConfig::default().with_poll_interval(poll_interval);

            let mut debouncer = new_debouncer_opt::<_, PollWatcher, RecommendedCache>(
                debounce_timeout,
                None,
                callback,
                RecommendedCache::default(),
                notify_config,
            )?;

            add_watch_paths_to_debouncer(&mut debouncer, paths)?;

            Ok(FileWatcher::Polling {
                _debouncer: debouncer,
            })
        } else {
            // Use native watcher
            let mut debouncer = new_debouncer(debounce_timeout, None, callback)?;

            add_watch_paths_to_debouncer(&mut debouncer, paths)?;

            Ok(FileWatcher::Native {
                _debouncer: debouncer,
            })
        }
    }
}

/// Add watch paths to a debouncer.
fn add_watch_paths_to_debouncer<W: Watcher, C: notify_debouncer_full::FileIdCache>(
    debouncer: &mut Debouncer<W, C>,
    paths: &WatchPaths,
) -> Result<(), WatchError> {
    for dir in paths.content_dirs.iter().chain(&paths.template_dirs) {
        if dir.exists() {
            debouncer.watch(dir, RecursiveMode::Recursive)?;
        } else {
            tracing::warn!(path = %dir.display(), "watched directory does not exist");
        }
    }
    Ok(())
}

/// Only new files, content writes and renames trigger rebuilds; removals
/// and metadata changes do not.
fn is_relevant_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both | RenameMode::Any))
    )
}

// =============================================================================
// Event loop
// =============================================================================

/// Watch the builder's directories until the process is interrupted.
pub async fn watch(builder: &mut Builder) -> Result<(), WatchError> {
    let (tx, rx) = unbounded_channel();
    let paths = WatchPaths::from_config(builder.config());
    let _watcher = FileWatcher::new(&builder.config().watch, &paths, tx)?;
    tracing::info!(
        content = paths.content_dirs.len(),
        templates = paths.template_dirs.len(),
        "watching for changes"
    );

    tokio::select! {
        _ = run_watch_loop(builder, rx) => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("stopping watch"),
    }
    Ok(())
}

/// Apply watch events to the builder, one at a time.
///
/// Content changes rebuild their page immediately. Template changes set a
/// rebuild deadline one quiet period away; every further template change
/// moves the deadline instead of queueing another rebuild. Returns when
/// the channel closes, running a still-pending rebuild first.
pub async fn run_watch_loop(builder: &mut Builder, mut events: UnboundedReceiver<WatchEvent>) {
    let quiet_period = builder.quiet_period();
    let mut deadline: Option<Instant> = None;
    builder.set_watching(true);
    tracing::debug!(state = ?builder.state(), "watch loop started");

    loop {
        let rebuild_due = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            event = events.recv() => match event {
                Some(WatchEvent::Content(path)) => rebuild_page(builder, &path),
                Some(WatchEvent::Templates(path)) => {
                    tracing::debug!(path = %path.display(), "template changed");
                    match quiet_period {
                        Some(quiet) => {
                            deadline = Some(Instant::now() + quiet);
                            tracing::info!(quiet_secs = quiet.as_secs(), "full rebuild scheduled");
                        }
                        None => tracing::debug!("template rebuilds disabled"),
                    }
                }
                Some(WatchEvent::Error(message)) => tracing::error!(%message, "watch error"),
                None => break,
            },
            _ = rebuild_due => {
                deadline = None;
                full_rebuild(builder).await;
            }
        }
    }

    if deadline.is_some() {
        full_rebuild(builder).await;
    }
    builder.set_watching(false);
}

fn rebuild_page(builder: &mut Builder, path: &Path) {
    tracing::debug!(path = %path.display(), "content changed");
    let Some(dir) = builder.content_dir_for(path).cloned() else {
        tracing::error!(error = %WatchError::NoContentDir(path.to_path_buf()), "cannot rebuild page");
        return;
    };
    if let Err(e) = builder.rebuild_page(&dir, path) {
        tracing::error!(error = %e, "page rebuild failed");
    }
}

async fn full_rebuild(builder: &mut Builder) {
    tracing::info!("rebuilding site");
    match builder.compile().await {
        Ok(_) => tracing::info!(build = builder.builds(), "site rebuilt"),
        Err(e) => tracing::error!(error = %e, "rebuild failed"),
    }
}
