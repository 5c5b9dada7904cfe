//! File system watcher for live rebuilds.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      Event Loop                            │
//! │                                                            │
//! │  ┌──────────┐    ┌───────────┐    ┌─────────────────────┐  │
//! │  │ notify   │───▶│ Debouncer │───▶│ Site::build()       │  │
//! │  │ events   │    │ (300ms)   │    │ (full, synchronous) │  │
//! │  └──────────┘    └───────────┘    └─────────────────────┘  │
//! │  ┌──────────┐                                              │
//! │  │ Ctrl-C   │───▶ stop                                     │
//! │  └──────────┘                                              │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every batch of changes triggers a full rebuild. A failed build is
//! reported and the watcher keeps running.

use crate::{log, site::Site};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, RecvTimeoutError},
    time::{Duration, Instant},
};

// =============================================================================
// Constants
// =============================================================================

const DEBOUNCE_MS: u64 = 300;
const REBUILD_COOLDOWN_MS: u64 = 800;

// =============================================================================
// Path Utilities
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// `/site/src/posts/a.html` → `posts/a.html`
fn rel_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events with debouncing and rebuild cooldown.
struct Debouncer {
    /// Output directory; its own writes never trigger a rebuild.
    dest: Option<PathBuf>,
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
    last_rebuild: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            dest: None,
            pending: FxHashSet::default(),
            last_event: None,
            last_rebuild: None,
        }
    }

    fn in_cooldown(&self) -> bool {
        self.last_rebuild
            .is_some_and(|t| t.elapsed() < Duration::from_millis(REBUILD_COOLDOWN_MS))
    }

    fn add(&mut self, event: Event) {
        for path in event.paths {
            if !self.is_ignored(&path) {
                self.pending.insert(path);
                self.last_event = Some(Instant::now());
            }
        }
    }

    fn is_ignored(&self, path: &Path) -> bool {
        is_temp_file(path) || self.dest.as_deref().is_some_and(|dest| path.starts_with(dest))
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        let mut paths: Vec<_> = self.pending.drain().collect();
        paths.sort();
        paths
    }

    fn mark_rebuild(&mut self) {
        self.last_rebuild = Some(Instant::now());
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

// =============================================================================
// Event Loop
// =============================================================================

enum Message {
    Fs(notify::Result<Event>),
    Stop,
}

/// Build once, then rebuild on every change under the source root until
/// Ctrl-C.
pub fn watch(site: &Site) -> Result<()> {
    let root = crate::config::absolute(site.src())
        .with_context(|| format!("Failed to resolve {}", site.src().display()))?;

    let mut debouncer = Debouncer::new();
    rebuild(site, &mut debouncer);

    let (tx, rx) = mpsc::channel();
    let stop = tx.clone();
    ctrlc::set_handler(move || {
        stop.send(Message::Stop).ok();
    })
    .context("Failed to set Ctrl+C handler")?;

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        tx.send(Message::Fs(res)).ok();
    })
    .context("Failed to create file watcher")?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", root.display()))?;
    log!("watch"; "watching {}/", root.display());

    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Message::Fs(Ok(event))) if is_relevant(&event) && !debouncer.in_cooldown() => {
                debouncer.add(event);
            }
            Ok(Message::Fs(Err(e))) => log!("watch"; "error: {e}"),
            Ok(Message::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                let changed = debouncer.take();
                let first = rel_path(&changed[0], &root);
                match changed.len() {
                    1 => log!("watch"; "{first} changed, rebuilding..."),
                    n => log!("watch"; "{first} and {} more changed, rebuilding...", n - 1),
                }
                rebuild(site, &mut debouncer);
            }
            // Irrelevant events, timeout without pending changes
            _ => {}
        }
    }

    log!("watch"; "stopped");
    Ok(())
}

/// Run a full build. Failures are logged, never returned.
fn rebuild(site: &Site, debouncer: &mut Debouncer) {
    match site.build() {
        Ok(report) => debouncer.dest = Some(report.dest),
        Err(err) => log!("error"; "{}", error_chain(&err)),
    }
    debouncer.mark_rebuild();
}

/// One cause per line, outermost first.
fn error_chain(err: &anyhow::Error) -> String {
    err.chain().map(ToString::to_string).collect::<Vec<_>>().join("\n  caused by: ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn test_is_temp_file() {
        assert!(is_temp_file(Path::new("/src/index.html~")));
        assert!(is_temp_file(Path::new("/src/.index.html.swp")));
        assert!(is_temp_file(Path::new("/src/notes.bak")));
        assert!(!is_temp_file(Path::new("/src/index.html")));
    }

    #[test]
    fn test_rel_path() {
        let root = Path::new("/site/src");
        assert_eq!(rel_path(Path::new("/site/src/posts/a.html"), root), "posts/a.html");
        assert_eq!(rel_path(Path::new("/elsewhere"), root), "/elsewhere");
    }

    #[test]
    fn test_debouncer_collects_and_filters() {
        let mut debouncer = Debouncer::new();
        debouncer.dest = Some(PathBuf::from("/src/build"));
        assert!(!debouncer.ready());

        debouncer.add(event(
            EventKind::Modify(ModifyKind::Any),
            &["/src/b.html", "/src/a.html", "/src/a.html~", "/src/build/a/index.html"],
        ));
        debouncer.add(event(EventKind::Create(CreateKind::File), &["/src/a.html"]));
        assert_eq!(debouncer.timeout(), Duration::from_millis(DEBOUNCE_MS));

        assert_eq!(
            debouncer.take(),
            vec![PathBuf::from("/src/a.html"), PathBuf::from("/src/b.html")]
        );
        assert!(!debouncer.ready());
        assert_eq!(debouncer.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_only_ignored_paths_leave_debouncer_idle() {
        let mut debouncer = Debouncer::new();
        debouncer.add(event(EventKind::Modify(ModifyKind::Any), &["/src/.DS_Store"]));
        assert!(debouncer.pending.is_empty());
        assert!(debouncer.last_event.is_none());
    }

    #[test]
    fn test_cooldown() {
        let mut debouncer = Debouncer::new();
        assert!(!debouncer.in_cooldown());
        debouncer.mark_rebuild();
        assert!(debouncer.in_cooldown());
    }

    #[test]
    fn test_error_chain() {
        let err = anyhow::anyhow!("undefined variable: x").context("failed to render `a.html`");
        assert_eq!(
            error_chain(&err),
            "failed to render `a.html`\n  caused by: undefined variable: x"
        );
    }

    #[test]
    fn test_is_relevant() {
        assert!(is_relevant(&event(EventKind::Modify(ModifyKind::Any), &[])));
        assert!(!is_relevant(&event(EventKind::Access(notify::event::AccessKind::Any), &[])));
    }
}
