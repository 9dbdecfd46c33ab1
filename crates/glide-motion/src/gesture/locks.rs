//! Axis locks shared by every drag on a thread.
//!
//! Only one drag may own an axis at a time. A drag takes a
//! [`DragLockGuard`] when it starts and the axis frees up when the guard
//! drops.

use super::DragDirection;
use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Default)]
struct LockState {
    horizontal: Cell<bool>,
    vertical: Cell<bool>,
}

/// A set of axis locks. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct DragLocks {
    state: Rc<LockState>,
}

/// Holds one or both axes until dropped.
#[derive(Debug)]
pub struct DragLockGuard {
    state: Rc<LockState>,
    horizontal: bool,
    vertical: bool,
}

impl Drop for DragLockGuard {
    fn drop(&mut self) {
        if self.horizontal {
            self.state.horizontal.set(false);
        }
        if self.vertical {
            self.state.vertical.set(false);
        }
    }
}

thread_local! {
    static GLOBAL: DragLocks = DragLocks::default();
}

impl DragLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The locks shared by every drag on this thread.
    pub fn global() -> Self {
        GLOBAL.with(Clone::clone)
    }

    /// Claim the axes `direction` moves.
    ///
    /// `Both` succeeds only when both axes are free; a partial claim is
    /// released again.
    pub fn acquire(&self, direction: DragDirection) -> Option<DragLockGuard> {
        let take = |flag: &Cell<bool>| !flag.replace(true);
        let guard = |horizontal, vertical| DragLockGuard {
            state: self.state.clone(),
            horizontal,
            vertical,
        };
        match direction {
            DragDirection::X => take(&self.state.horizontal).then(|| guard(true, false)),
            DragDirection::Y => take(&self.state.vertical).then(|| guard(false, true)),
            DragDirection::Both => {
                // Dropping a partial guard frees whatever was claimed.
                let partial = guard(take(&self.state.horizontal), take(&self.state.vertical));
                (partial.horizontal && partial.vertical).then_some(partial)
            }
        }
    }

    pub fn is_locked(&self, direction: DragDirection) -> bool {
        match direction {
            DragDirection::X => self.state.horizontal.get(),
            DragDirection::Y => self.state.vertical.get(),
            DragDirection::Both => self.state.horizontal.get() || self.state.vertical.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_is_exclusive() {
        let locks = DragLocks::new();
        let x = locks.acquire(DragDirection::X);
        assert!(x.is_some());
        assert!(locks.acquire(DragDirection::X).is_none());
        assert!(locks.acquire(DragDirection::Y).is_some());
        drop(x);
        assert!(!locks.is_locked(DragDirection::X));
    }

    #[test]
    fn test_both_releases_partial_claim() {
        let locks = DragLocks::new();
        let y = locks.acquire(DragDirection::Y);
        assert!(locks.acquire(DragDirection::Both).is_none());
        assert!(!locks.is_locked(DragDirection::X));

        drop(y);
        let both = locks.acquire(DragDirection::Both);
        assert!(both.is_some());
        assert!(locks.is_locked(DragDirection::Y));
    }

    #[test]
    fn test_global_is_shared() {
        let guard = DragLocks::global().acquire(DragDirection::X);
        assert!(DragLocks::global().is_locked(DragDirection::X));
        drop(guard);
        assert!(!DragLocks::global().is_locked(DragDirection::X));
    }
}
