//! Wake-up timer
//!
//! The engine owns exactly one pending wake-up. Arming replaces whatever was
//! armed before; there is no queue of timers.

use std::cell::Cell;
use std::rc::Rc;

/// One-shot wake-up capability handed to the engine.
pub trait WakeTimer {
    /// Fire once after `delay` more ticks of play. A negative delay fires as
    /// soon as possible.
    fn arm(&mut self, delay: f64);

    fn cancel(&mut self);
}

/// Shared single-slot timer.
///
/// The engine arms and cancels through one handle; a runner holds a clone and
/// counts played ticks down with [`TimerSlot::elapse`].
#[derive(Clone, Debug, Default)]
pub struct TimerSlot {
    remaining: Rc<Cell<Option<f64>>>,
}

impl TimerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticks of play left before the armed wake-up fires.
    pub fn remaining(&self) -> Option<f64> {
        self.remaining.get()
    }

    pub fn is_armed(&self) -> bool {
        self.remaining.get().is_some()
    }

    /// Count down `played` ticks. When the wake-up comes due it is disarmed
    /// and the result is how many ticks past due it fired.
    pub fn elapse(&self, played: f64) -> Option<f64> {
        let left = self.remaining.get()? - played.max(0.0);
        if left <= 0.0 {
            self.remaining.set(None);
            Some(-left)
        } else {
            self.remaining.set(Some(left));
            None
        }
    }
}

impl WakeTimer for TimerSlot {
    fn arm(&mut self, delay: f64) {
        let d = if delay.is_finite() { delay.max(0.0) } else { 0.0 };
        self.remaining.set(Some(d));
    }

    fn cancel(&mut self) {
        self.remaining.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_arm_wins() {
        let mut slot = TimerSlot::new();
        let watcher = slot.clone();
        slot.arm(100.0);
        slot.arm(40.0);
        assert_eq!(watcher.remaining(), Some(40.0));
    }

    #[test]
    fn test_elapse_fires_once() {
        let mut slot = TimerSlot::new();
        slot.arm(10.0);
        assert_eq!(slot.elapse(4.0), None);
        assert_eq!(slot.remaining(), Some(6.0));
        assert_eq!(slot.elapse(6.5), Some(0.5));
        assert!(!slot.is_armed());
        assert_eq!(slot.elapse(100.0), None);
    }

    #[test]
    fn test_negative_delay_fires_immediately() {
        let mut slot = TimerSlot::new();
        slot.arm(-3.0);
        assert_eq!(slot.remaining(), Some(0.0));
        assert_eq!(slot.elapse(0.0), Some(0.0));
    }

    #[test]
    fn test_cancel() {
        let mut slot = TimerSlot::new();
        slot.arm(5.0);
        slot.cancel();
        assert!(!slot.is_armed());
        assert_eq!(slot.elapse(10.0), None);
    }
}
