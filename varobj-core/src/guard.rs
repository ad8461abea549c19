//! Scoped target state
//!
//! Evaluating an expression may run code in the debugged program. While
//! that happens only the evaluating thread may run, and evaluations that
//! need a particular frame switch to it and switch back afterwards. Both
//! are guards that undo their change when dropped, whatever the exit path.

use std::ops::{Deref, DerefMut};

use crate::target::{FrameId, FrameProvider, Target};

/// Exclusive access to the target: scheduler locking is switched on for the
/// guard's lifetime and the previous setting restored on drop.
pub struct SchedulerLock<'a> {
    target: &'a mut dyn Target,
    previous: Option<bool>,
}

impl<'a> SchedulerLock<'a> {
    /// With `runs_all_threads` set the lock is not taken and the guard only
    /// forwards to the target.
    pub fn acquire(target: &'a mut dyn Target, runs_all_threads: bool) -> Self {
        let previous = if runs_all_threads {
            None
        } else {
            Some(target.set_scheduler_locking(true))
        };
        Self { target, previous }
    }
}

impl Drop for SchedulerLock<'_> {
    fn drop(&mut self) {
        // A lock that was already held stays held for the outer guard.
        if self.previous == Some(false) {
            self.target.set_scheduler_locking(false);
        }
    }
}

impl<'a> Deref for SchedulerLock<'a> {
    type Target = dyn Target + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.target
    }
}

impl DerefMut for SchedulerLock<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.target
    }
}

/// Remembers the selected frame and reselects it on drop.
pub struct FrameRestore<'a> {
    target: &'a mut dyn Target,
    saved: Option<FrameId>,
}

impl<'a> FrameRestore<'a> {
    pub fn new(target: &'a mut dyn Target) -> Self {
        let saved = target.selected_frame();
        Self { target, saved }
    }

    /// Select `frame` for the rest of the guard's lifetime.
    pub fn select(&mut self, frame: FrameId) {
        self.target.select_frame(frame);
    }
}

impl Drop for FrameRestore<'_> {
    fn drop(&mut self) {
        if let Some(frame) = self.saved {
            if self.target.frame_exists(frame) {
                self.target.select_frame(frame);
            }
        }
    }
}

impl<'a> Deref for FrameRestore<'a> {
    type Target = dyn Target + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.target
    }
}

impl DerefMut for FrameRestore<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimTarget;

    #[test]
    fn test_scheduler_lock_restores_previous() {
        let mut sim = SimTarget::new();
        assert!(!sim.scheduler_locked());
        {
            let lock = SchedulerLock::acquire(&mut sim, false);
            drop(lock);
        }
        assert!(!sim.scheduler_locked());
        assert_eq!(sim.lock_acquisitions(), 1);

        {
            let mut outer = SchedulerLock::acquire(&mut sim, false);
            let inner = SchedulerLock::acquire(&mut *outer, false);
            drop(inner);
        }
        assert!(!sim.scheduler_locked());
        assert_eq!(sim.lock_acquisitions(), 3);
    }

    #[test]
    fn test_runs_all_threads_skips_lock() {
        let mut sim = SimTarget::new();
        {
            let _lock = SchedulerLock::acquire(&mut sim, true);
        }
        assert_eq!(sim.lock_acquisitions(), 0);
    }

    #[test]
    fn test_frame_restore() {
        let mut sim = SimTarget::new();
        sim.add_function("main", 0x100, 0x200);
        let outer = sim.push_frame(0x110);
        let inner = sim.push_frame(0x120);
        assert_eq!(sim.selected_frame(), Some(inner));
        {
            let mut restore = FrameRestore::new(&mut sim);
            restore.select(outer);
            assert_eq!(restore.selected_frame(), Some(outer));
        }
        assert_eq!(sim.selected_frame(), Some(inner));
    }
}
