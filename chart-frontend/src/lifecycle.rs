use std::fmt;

use tracing::debug;

use crate::error::ChartError;

/// What a tracked listener is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Resize,
    MouseDown,
    MouseMove,
    MouseUp,
    MouseLeave,
    Wheel,
    ClickSubscription,
    RangeSubscription,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u32);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

struct Tracked {
    id: ListenerId,
    kind: ListenerKind,
    detach: Box<dyn FnOnce()>,
}

/// Owns the detach thunk of every listener and subscription a widget
/// installs, so tearing the widget down removes all of them exactly once.
#[derive(Default)]
pub struct ChartLifecycle {
    tracked: Vec<Tracked>,
    next_id: u32,
    removed: bool,
}

impl ChartLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener that is already attached. After teardown the
    /// listener is detached on the spot and `Removed` is returned.
    pub fn track(
        &mut self,
        kind: ListenerKind,
        detach: impl FnOnce() + 'static,
    ) -> Result<ListenerId, ChartError> {
        if self.removed {
            detach();
            return Err(ChartError::Removed);
        }
        let id = ListenerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.tracked.push(Tracked {
            id,
            kind,
            detach: Box::new(detach),
        });
        Ok(id)
    }

    /// Detach one listener. Unknown ids are ignored.
    pub fn release(&mut self, id: ListenerId) -> bool {
        match self.tracked.iter().position(|t| t.id == id) {
            Some(idx) => {
                let tracked = self.tracked.remove(idx);
                (tracked.detach)();
                true
            }
            None => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.tracked.len()
    }

    pub fn count_of(&self, kind: ListenerKind) -> usize {
        self.tracked.iter().filter(|t| t.kind == kind).count()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Detach everything, newest first. Later calls do nothing.
    pub fn teardown(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        let count = self.tracked.len();
        while let Some(tracked) = self.tracked.pop() {
            (tracked.detach)();
        }
        debug!(count, "chart listeners detached");
    }
}

impl Drop for ChartLifecycle {
    fn drop(&mut self) {
        self.teardown();
    }
}
