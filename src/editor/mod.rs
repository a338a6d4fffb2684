//! Command bus between a mounted editor and the toolbar driving it.
//!
//! The editor registers its commands and holds the returned `Registration`; the
//! toolbar side only sees the bus. Dropping the registration unmounts the editor,
//! after which every bus call answers `false` or `None`.

pub mod buffer;

pub use buffer::TextBuffer;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, Weak};
use tracing::debug;

/// Imperative commands an editor exposes to the toolbar.
pub trait EditorCommands: Send + Sync {
    /// Selects the first case-insensitive match. `false` when nothing matches.
    fn search(&self, query: &str) -> bool;

    fn next_match(&self) -> bool;

    fn previous_match(&self) -> bool;

    /// Replaces the selected match, or the first match when the selection does not
    /// hold `search`.
    fn replace(&self, search: &str, replacement: &str) -> bool;

    /// Replaces every case-insensitive occurrence of `search`.
    fn replace_all(&self, search: &str, replacement: &str) -> bool;

    /// Selected text, if any.
    fn copy(&self) -> Option<String>;
}

type Slot = RwLock<Option<(u64, Arc<dyn EditorCommands>)>>;

#[derive(Clone, Default)]
pub struct CommandBus {
    slot: Arc<Slot>,
    next_token: Arc<AtomicU64>,
}

/// Keeps an editor mounted on the bus until dropped.
#[must_use = "the editor is unmounted as soon as the registration is dropped"]
pub struct Registration {
    slot: Weak<Slot>,
    token: u64,
}

impl CommandBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts `editor`, replacing any editor mounted before.
    pub fn register(&self, editor: Arc<dyn EditorCommands>) -> Registration {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = Some((token, editor));
        debug!(token, "Editor mounted");
        Registration {
            slot: Arc::downgrade(&self.slot),
            token,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.read().is_some()
    }

    pub fn search(&self, query: &str) -> bool {
        self.with_editor(|e| e.search(query)).unwrap_or(false)
    }

    pub fn next_match(&self) -> bool {
        self.with_editor(|e| e.next_match()).unwrap_or(false)
    }

    pub fn previous_match(&self) -> bool {
        self.with_editor(|e| e.previous_match()).unwrap_or(false)
    }

    pub fn replace(&self, search: &str, replacement: &str) -> bool {
        self.with_editor(|e| e.replace(search, replacement)).unwrap_or(false)
    }

    pub fn replace_all(&self, search: &str, replacement: &str) -> bool {
        self.with_editor(|e| e.replace_all(search, replacement)).unwrap_or(false)
    }

    pub fn copy(&self) -> Option<String> {
        self.with_editor(|e| e.copy()).flatten()
    }

    fn with_editor<R>(&self, f: impl FnOnce(&dyn EditorCommands) -> R) -> Option<R> {
        // Clone out of the lock so commands never run while it is held.
        let editor = self.read().as_ref().map(|(_, editor)| Arc::clone(editor))?;
        Some(f(editor.as_ref()))
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<(u64, Arc<dyn EditorCommands>)>> {
        self.slot.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let Some(slot) = self.slot.upgrade() else {
            return;
        };
        let mut slot = slot.write().unwrap_or_else(|e| e.into_inner());
        if matches!(slot.as_ref(), Some((token, _)) if *token == self.token) {
            *slot = None;
            debug!(token = self.token, "Editor unmounted");
        }
    }
}
