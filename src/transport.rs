//! Transport clocks
//!
//! The engine only ever asks the transport where it is. Both clocks here are
//! cheap shared handles: clone one into the engine and keep another to drive it.
//!
//! Besides its position, each clock tracks `played` ticks: how far it has
//! actually run. A scrub moves the position but not the played count, which is
//! what wake-up delays are measured against.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

/// Source of the current transport position.
pub trait Transport {
    /// Current position in ticks. May jump between calls.
    fn now_ticks(&self) -> f64;

    /// Whether the transport is rolling.
    fn is_running(&self) -> bool;
}

/// Clamp to positive, finite value. Returns 1.0 for invalid inputs.
fn clamp_pos(x: f64) -> f64 {
    if x.is_finite() && x > 0.0 {
        x
    } else {
        1.0
    }
}

// --- Offline ---

struct OfflineInner {
    position: f64,
    played: f64,
    running: bool,
}

/// Manually stepped transport for deterministic runs and tests.
#[derive(Clone)]
pub struct OfflineTransport {
    inner: Rc<RefCell<OfflineInner>>,
}

impl Default for OfflineTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl OfflineTransport {
    /// A stopped transport at tick 0.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(OfflineInner {
                position: 0.0,
                played: 0.0,
                running: false,
            })),
        }
    }

    /// A rolling transport positioned at `ticks`.
    pub fn running_at(ticks: f64) -> Self {
        let t = Self::new();
        t.locate(ticks);
        t.start();
        t
    }

    pub fn start(&self) {
        self.inner.borrow_mut().running = true;
    }

    pub fn stop(&self) {
        self.inner.borrow_mut().running = false;
    }

    /// Play forward by `dt` ticks. Negative or non-finite steps are ignored.
    pub fn advance(&self, dt: f64) {
        if !(dt.is_finite() && dt > 0.0) {
            return;
        }
        let mut s = self.inner.borrow_mut();
        s.position += dt;
        s.played += dt;
    }

    /// Jump to `ticks` without playing: a scrub or loop.
    pub fn locate(&self, ticks: f64) {
        if ticks.is_finite() {
            self.inner.borrow_mut().position = ticks;
        }
    }

    pub fn played_ticks(&self) -> f64 {
        self.inner.borrow().played
    }
}

impl Transport for OfflineTransport {
    fn now_ticks(&self) -> f64 {
        self.inner.borrow().position
    }

    fn is_running(&self) -> bool {
        self.inner.borrow().running
    }
}

// --- Realtime ---

struct RealtimeInner {
    /// Position reported while a wake-up is being handled.
    latched: Option<f64>,
    bpm: f64,
    ticks_per_beat: f64,
    running: bool,
    wall_anchor: Instant,
    position_anchor: f64,
    played_anchor: f64,
}

impl RealtimeInner {
    fn ticks_per_second(&self) -> f64 {
        self.bpm / 60.0 * self.ticks_per_beat
    }

    fn elapsed_ticks(&self) -> f64 {
        if !self.running {
            return 0.0;
        }
        self.wall_anchor.elapsed().as_secs_f64() * self.ticks_per_second()
    }

    /// Fold elapsed wall time into the anchors.
    fn reanchor(&mut self) {
        let dt = self.elapsed_ticks();
        self.position_anchor += dt;
        self.played_anchor += dt;
        self.wall_anchor = Instant::now();
    }
}

/// Wall-clock transport rolling at a fixed tempo.
#[derive(Clone)]
pub struct RealtimeTransport {
    inner: Rc<RefCell<RealtimeInner>>,
}

impl RealtimeTransport {
    /// A stopped transport at tick 0.
    pub fn new(bpm: f64, ticks_per_beat: f64) -> Self {
        Self {
            inner: Rc::new(RefCell::new(RealtimeInner {
                latched: None,
                bpm: clamp_pos(bpm),
                ticks_per_beat: clamp_pos(ticks_per_beat),
                running: false,
                wall_anchor: Instant::now(),
                position_anchor: 0.0,
                played_anchor: 0.0,
            })),
        }
    }

    pub fn start(&self) {
        let mut s = self.inner.borrow_mut();
        if !s.running {
            s.wall_anchor = Instant::now();
            s.running = true;
        }
    }

    pub fn stop(&self) {
        let mut s = self.inner.borrow_mut();
        s.reanchor();
        s.running = false;
    }

    /// Change tempo from now on.
    pub fn set_bpm(&self, bpm: f64) {
        let mut s = self.inner.borrow_mut();
        s.reanchor();
        s.bpm = clamp_pos(bpm);
    }

    pub fn bpm(&self) -> f64 {
        self.inner.borrow().bpm
    }

    /// Jump to `ticks` without playing.
    pub fn locate(&self, ticks: f64) {
        if !ticks.is_finite() {
            return;
        }
        let mut s = self.inner.borrow_mut();
        s.reanchor();
        s.position_anchor = ticks;
    }

    pub fn ticks_per_second(&self) -> f64 {
        self.inner.borrow().ticks_per_second()
    }

    /// Report `position` as now until [`RealtimeTransport::unlatch`].
    ///
    /// Wake-ups land a little after their tick; a runner latches the position
    /// the wake-up was due at so the engine sees logical time, not jitter.
    pub fn latch(&self, position: f64) {
        self.inner.borrow_mut().latched = Some(position);
    }

    pub fn unlatch(&self) {
        self.inner.borrow_mut().latched = None;
    }

    pub fn played_ticks(&self) -> f64 {
        let s = self.inner.borrow();
        s.played_anchor + s.elapsed_ticks()
    }
}

impl Transport for RealtimeTransport {
    fn now_ticks(&self) -> f64 {
        let s = self.inner.borrow();
        match s.latched {
            Some(p) => p,
            None => s.position_anchor + s.elapsed_ticks(),
        }
    }

    fn is_running(&self) -> bool {
        self.inner.borrow().running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_advance_and_locate() {
        let t = OfflineTransport::new();
        assert!(!t.is_running());
        assert!((t.now_ticks() - 0.0).abs() < 1e-10);

        t.start();
        t.advance(120.0);
        assert!((t.now_ticks() - 120.0).abs() < 1e-10);
        assert!((t.played_ticks() - 120.0).abs() < 1e-10);

        // Scrub moves the position only
        t.locate(960.0);
        assert!((t.now_ticks() - 960.0).abs() < 1e-10);
        assert!((t.played_ticks() - 120.0).abs() < 1e-10);

        t.advance(-5.0);
        assert!((t.now_ticks() - 960.0).abs() < 1e-10);
    }

    #[test]
    fn test_offline_handles_share_state() {
        let a = OfflineTransport::running_at(10.0);
        let b = a.clone();
        a.advance(5.0);
        assert!((b.now_ticks() - 15.0).abs() < 1e-10);
        assert!(b.is_running());
    }

    #[test]
    fn test_realtime_stopped_does_not_move() {
        let t = RealtimeTransport::new(120.0, 480.0);
        assert!((t.ticks_per_second() - 960.0).abs() < 1e-10);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!((t.now_ticks() - 0.0).abs() < 1e-10);

        t.locate(480.0);
        assert!((t.now_ticks() - 480.0).abs() < 1e-10);
        assert!((t.played_ticks() - 0.0).abs() < 1e-10);
    }

    #[test]
    fn test_realtime_rolls_forward() {
        let t = RealtimeTransport::new(120.0, 480.0);
        t.start();
        std::thread::sleep(std::time::Duration::from_millis(20));
        t.stop();
        let now = t.now_ticks();
        // 20ms at 960 ticks/s is at least 19.2 ticks
        assert!(now >= 19.0, "now={}", now);
        assert!((t.played_ticks() - now).abs() < 1e-9);
    }

    #[test]
    fn test_latch_pins_position() {
        let t = RealtimeTransport::new(120.0, 480.0);
        t.locate(100.0);
        t.start();
        t.latch(99.5);
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!((t.now_ticks() - 99.5).abs() < 1e-10);
        t.unlatch();
        assert!(t.now_ticks() > 100.0);
    }

    #[test]
    fn test_invalid_bpm_clamps() {
        let t = RealtimeTransport::new(-3.0, 480.0);
        assert!((t.bpm() - 1.0).abs() < 1e-10);
    }
}
