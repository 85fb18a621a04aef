//! Cooperative scheduler for the machine's clocked units.
//!
//! Every unit is an explicit state machine whose `main()` performs one bounded unit of work and
//! returns, so "switching" to a unit means running its `main()` and "resuming" a lagging peer
//! means running the peer until its clock is no longer negative. The scheduler only tracks which
//! unit is running, which unit the host wants synchronized, and the event that ends a run.

use bincode::{Decode, Encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Encode, Decode)]
pub enum ThreadId {
    Cpu,
    Smp,
    Ppu,
    Coprocessor(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum SchedulerMode {
    #[default]
    Run,
    Synchronize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum SchedulerEvent {
    /// The PPU reached the first line of vertical blank.
    Frame,
    /// The synchronization target reached its loop top with no unit having run out of turn.
    Synchronized,
    /// A unit other than the target was resumed since the previous synchronization check.
    Desynchronized,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Scheduler {
    active: ThreadId,
    current: ThreadId,
    mode: SchedulerMode,
    target: Option<ThreadId>,
    event: Option<SchedulerEvent>,
    desynchronized: bool,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: ThreadId::Cpu,
            current: ThreadId::Cpu,
            mode: SchedulerMode::Run,
            target: None,
            event: None,
            desynchronized: false,
        }
    }

    pub fn power(&mut self) {
        *self = Self::new();
    }

    /// Start a run from the host. Control goes to the unit that was active when the previous run
    /// ended.
    pub fn enter(&mut self, mode: SchedulerMode, target: Option<ThreadId>) {
        self.mode = mode;
        self.target = target;
        self.event = None;
        self.current = self.active;
    }

    /// End the run at the next loop top of the running unit, reporting `event` to the host.
    pub fn leave(&mut self, event: SchedulerEvent) {
        self.active = self.current;
        self.event = Some(event);
    }

    /// Transfer control to `thread`.
    pub fn resume(&mut self, thread: ThreadId) {
        if self.mode == SchedulerMode::Synchronize && self.target != Some(thread) {
            self.desynchronized = true;
        }
        self.current = thread;
    }

    /// Return control to `thread` after a nested catch-up finished, without it counting as a
    /// resumption.
    pub fn restore(&mut self, thread: ThreadId) {
        self.current = thread;
    }

    /// Loop-top check for `thread`. Returns whether the run should end here.
    ///
    /// In `Synchronize` mode the CPU always stops at its loop top because every peripheral is
    /// quiescent at a CPU instruction boundary; a peripheral stops only if it is the target.
    pub fn synchronize(&mut self, thread: ThreadId) -> bool {
        if self.event.is_some() {
            return true;
        }

        if self.mode != SchedulerMode::Synchronize {
            return false;
        }

        if thread != ThreadId::Cpu && self.target.is_some_and(|target| target != thread) {
            return false;
        }

        let event = if std::mem::take(&mut self.desynchronized) {
            SchedulerEvent::Desynchronized
        } else {
            SchedulerEvent::Synchronized
        };
        log::debug!("Scheduler leaving from {thread:?} with {event:?}");
        self.leave(event);
        true
    }

    /// Consume the event that ended the run.
    pub fn take_event(&mut self) -> Option<SchedulerEvent> {
        self.event.take()
    }

    #[inline]
    #[must_use]
    pub fn current(&self) -> ThreadId {
        self.current
    }

    #[inline]
    #[must_use]
    pub fn active(&self) -> ThreadId {
        self.active
    }

    #[inline]
    #[must_use]
    pub fn mode(&self) -> SchedulerMode {
        self.mode
    }

    #[must_use]
    pub fn desynchronized(&self) -> bool {
        self.desynchronized
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn resume_in_run_mode_never_desynchronizes() {
        let mut scheduler = Scheduler::new();
        scheduler.enter(SchedulerMode::Run, None);
        scheduler.resume(ThreadId::Smp);
        scheduler.resume(ThreadId::Cpu);
        assert!(!scheduler.desynchronized());
        assert!(!scheduler.synchronize(ThreadId::Cpu));
    }

    #[test]
    fn resuming_non_target_desynchronizes_once() {
        let mut scheduler = Scheduler::new();
        scheduler.enter(SchedulerMode::Synchronize, Some(ThreadId::Smp));

        // The target itself does not count
        scheduler.resume(ThreadId::Smp);
        assert!(!scheduler.desynchronized());

        scheduler.resume(ThreadId::Ppu);
        assert!(scheduler.desynchronized());
        scheduler.restore(ThreadId::Smp);

        assert!(scheduler.synchronize(ThreadId::Smp));
        assert_eq!(scheduler.take_event(), Some(SchedulerEvent::Desynchronized));
        assert_eq!(scheduler.active(), ThreadId::Smp);

        // Flag was consumed by the first check
        scheduler.enter(SchedulerMode::Synchronize, Some(ThreadId::Smp));
        assert!(scheduler.synchronize(ThreadId::Smp));
        assert_eq!(scheduler.take_event(), Some(SchedulerEvent::Synchronized));
    }

    #[test]
    fn peripheral_stops_only_when_targeted() {
        let mut scheduler = Scheduler::new();
        scheduler.enter(SchedulerMode::Synchronize, Some(ThreadId::Smp));
        assert!(!scheduler.synchronize(ThreadId::Ppu));
        assert!(!scheduler.synchronize(ThreadId::Coprocessor(0)));
        assert!(scheduler.synchronize(ThreadId::Smp));

        scheduler.enter(SchedulerMode::Synchronize, Some(ThreadId::Smp));
        assert!(scheduler.synchronize(ThreadId::Cpu));
        assert_eq!(scheduler.take_event(), Some(SchedulerEvent::Synchronized));
    }

    #[test]
    fn leave_records_active_thread() {
        let mut scheduler = Scheduler::new();
        scheduler.enter(SchedulerMode::Run, None);
        scheduler.resume(ThreadId::Ppu);
        scheduler.leave(SchedulerEvent::Frame);
        scheduler.restore(ThreadId::Cpu);

        // Pending event ends the run at the next loop top regardless of mode
        assert!(scheduler.synchronize(ThreadId::Cpu));
        assert_eq!(scheduler.take_event(), Some(SchedulerEvent::Frame));

        // Next run starts where the last one left
        scheduler.enter(SchedulerMode::Run, None);
        assert_eq!(scheduler.current(), ThreadId::Ppu);
    }
}
