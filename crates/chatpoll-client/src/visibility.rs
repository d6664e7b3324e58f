use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Answers whether the consuming UI is currently in the foreground.
///
/// Poll cycles consult this before every due tick and skip the tick while it
/// returns `false`. Any `Fn() -> bool` closure can be used as a predicate.
pub trait Visibility: Send + Sync {
    fn is_visible(&self) -> bool;
}

impl<F> Visibility for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_visible(&self) -> bool {
        self()
    }
}

/// Process-wide visibility flag flipped by an external signal.
///
/// Clones share the same flag. It starts out visible. Showing the UI again
/// does not force a poll; the next natural tick picks it up.
#[derive(Debug, Clone)]
pub struct VisibilityGate {
    visible: Arc<AtomicBool>,
}

impl VisibilityGate {
    pub fn new() -> Self {
        Self {
            visible: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Record a visibility-change signal.
    pub fn set_visible(&self, visible: bool) {
        let previous = self.visible.swap(visible, Ordering::SeqCst);
        if previous != visible {
            tracing::debug!(visible, "Visibility changed");
        }
    }

    pub fn hide(&self) {
        self.set_visible(false);
    }

    pub fn show(&self) {
        self.set_visible(true);
    }
}

impl Default for VisibilityGate {
    fn default() -> Self {
        Self::new()
    }
}

impl Visibility for VisibilityGate {
    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }
}
