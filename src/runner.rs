//! Runners
//!
//! A runner owns an engine together with the other ends of its transport and
//! wake-up slot, and calls `flush` whenever the armed wake-up comes due.
//! - Offline: time only moves when stepped, for tests and rendering
//! - Realtime: a wall-clock transport and spin_sleep between wake-ups

use crate::config::CueConfig;
use crate::engine::CueEngine;
use crate::error::{CueError, Result};
use crate::output::Output;
use crate::timer::TimerSlot;
use crate::transport::{OfflineTransport, RealtimeTransport, Transport};
use spin_sleep::SpinSleeper;
use std::time::Duration;

/// Wake-ups one `advance` may fire before it is considered runaway.
pub const MAX_WAKEUPS: usize = 200_000;

pub type OfflineEngine<O> = CueEngine<OfflineTransport, TimerSlot, O>;
pub type RealtimeEngine<O> = CueEngine<RealtimeTransport, TimerSlot, O>;

/// Deterministic stepping runner.
pub struct OfflineRunner<O> {
    engine: OfflineEngine<O>,
    transport: OfflineTransport,
    slot: TimerSlot,
}

impl<O: Output> OfflineRunner<O> {
    /// A runner whose transport is already rolling at tick 0.
    pub fn new(output: O, config: &CueConfig) -> Result<Self> {
        Self::with_transport(OfflineTransport::running_at(0.0), output, config)
    }

    pub fn with_transport(transport: OfflineTransport, output: O, config: &CueConfig) -> Result<Self> {
        let slot = TimerSlot::new();
        let engine = CueEngine::with_config(transport.clone(), slot.clone(), output, config)?;
        Ok(Self {
            engine,
            transport,
            slot,
        })
    }

    pub fn engine(&self) -> &OfflineEngine<O> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut OfflineEngine<O> {
        &mut self.engine
    }

    pub fn into_engine(self) -> OfflineEngine<O> {
        self.engine
    }

    pub fn transport(&self) -> &OfflineTransport {
        &self.transport
    }

    pub fn slot(&self) -> &TimerSlot {
        &self.slot
    }

    pub fn now(&self) -> f64 {
        self.transport.now_ticks()
    }

    /// Scrub the transport. Nothing fires until time is played again.
    pub fn locate(&mut self, ticks: f64) {
        self.transport.locate(ticks);
    }

    /// Play `dt` ticks, firing every wake-up that comes due on the way.
    pub fn advance(&mut self, dt: f64) -> Result<()> {
        let mut left = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        let mut processed = 0;

        loop {
            let Some(remaining) = self.slot.remaining() else {
                break;
            };
            if remaining > left {
                break;
            }

            self.transport.advance(remaining);
            left -= remaining;
            let _ = self.slot.elapse(remaining);
            self.engine.flush()?;

            processed += 1;
            if processed > MAX_WAKEUPS {
                return Err(CueError::RunawayScheduling { limit: MAX_WAKEUPS });
            }
        }

        self.transport.advance(left);
        let _ = self.slot.elapse(left);
        Ok(())
    }

    /// Play until no wake-up is armed, or `max_ticks` have been played.
    /// Returns the ticks played.
    pub fn run_until_idle(&mut self, max_ticks: f64) -> Result<f64> {
        let start = self.transport.played_ticks();
        while let Some(remaining) = self.slot.remaining() {
            let played = self.transport.played_ticks() - start;
            if played + remaining > max_ticks {
                self.advance(max_ticks - played)?;
                break;
            }
            self.advance(remaining)?;
        }
        Ok(self.transport.played_ticks() - start)
    }
}

/// Wall-clock runner.
pub struct RealtimeRunner<O> {
    engine: RealtimeEngine<O>,
    transport: RealtimeTransport,
    slot: TimerSlot,
    sleeper: SpinSleeper,
}

impl<O: Output> RealtimeRunner<O> {
    /// A runner over a stopped transport at `bpm`; start it with
    /// `transport().start()`.
    pub fn new(bpm: f64, output: O, config: &CueConfig) -> Result<Self> {
        let transport = RealtimeTransport::new(bpm, config.ticks_per_beat);
        let slot = TimerSlot::new();
        let engine = CueEngine::with_config(transport.clone(), slot.clone(), output, config)?;
        Ok(Self {
            engine,
            transport,
            slot,
            sleeper: SpinSleeper::default(),
        })
    }

    pub fn engine(&self) -> &RealtimeEngine<O> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut RealtimeEngine<O> {
        &mut self.engine
    }

    pub fn transport(&self) -> &RealtimeTransport {
        &self.transport
    }

    /// Run until `is_done` returns true. The closure sees the engine between
    /// wake-ups and may cue, clear or scrub.
    pub fn run_until<F>(&mut self, mut is_done: F) -> Result<()>
    where
        F: FnMut(&mut RealtimeEngine<O>) -> bool,
    {
        let mut last_played = self.transport.played_ticks();

        loop {
            let played = self.transport.played_ticks();

            if let Some(late) = self.slot.elapse(played - last_played) {
                // The wake-up was due `late` ticks ago: flush at that position,
                // and count the lateness towards whatever gets armed next.
                last_played = played - late;
                self.transport.latch(self.transport.now_ticks() - late);
                let flushed = self.engine.flush();
                self.transport.unlatch();
                flushed?;
                continue;
            }
            last_played = played;

            if is_done(&mut self.engine) {
                break;
            }

            // Sleep until due, or poll when nothing is armed
            let wait = match self.slot.remaining() {
                Some(ticks) if self.transport.is_running() => {
                    (ticks / self.transport.ticks_per_second()).max(0.0)
                }
                _ => 0.001,
            };
            self.sleeper.sleep(Duration::from_secs_f64(wait));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Atom;
    use crate::output::EventLog;

    fn runner() -> OfflineRunner<EventLog> {
        OfflineRunner::new(EventLog::new(), &CueConfig::default()).unwrap()
    }

    #[test]
    fn test_offline_advance_fires_due_wakeups() {
        let mut r = runner();
        for (at, tag) in [(10.0, "a"), (20.0, "b"), (35.0, "c")] {
            r.engine_mut().enqueue(at, tag, vec![Atom::Int(1)]).unwrap();
        }
        r.engine_mut().arm().unwrap();

        r.advance(5.0).unwrap();
        assert!(r.engine().output().records.is_empty());

        r.advance(20.0).unwrap();
        assert_eq!(r.engine().output().emitted_tags(), vec!["a", "b"]);
        assert!((r.now() - 25.0).abs() < 1e-10);

        r.advance(10.0).unwrap();
        assert_eq!(r.engine().output().emitted_tags(), vec!["a", "b", "c"]);
        assert_eq!(r.engine().output().done_count(), 1);
        assert!(!r.slot().is_armed());
    }

    #[test]
    fn test_run_until_idle() {
        let mut r = runner();
        r.engine_mut().enqueue(480.0, "a", vec![Atom::Int(1)]).unwrap();
        r.engine_mut().enqueue(960.0, "b", vec![Atom::Int(2)]).unwrap();
        r.engine_mut().arm().unwrap();

        let played = r.run_until_idle(10_000.0).unwrap();
        assert!((played - 960.0).abs() < 1e-9);
        assert_eq!(r.engine().output().emit_count(), 2);
    }

    #[test]
    fn test_run_until_idle_respects_limit() {
        let mut r = runner();
        r.engine_mut().enqueue(480.0, "a", vec![Atom::Int(1)]).unwrap();
        r.engine_mut().arm().unwrap();

        let played = r.run_until_idle(100.0).unwrap();
        assert!((played - 100.0).abs() < 1e-9);
        assert_eq!(r.engine().output().emit_count(), 0);
        assert!(r.slot().is_armed());
    }

    #[test]
    fn test_realtime_dispatches() {
        let config = CueConfig::default();
        // 600 bpm * 480 = 4800 ticks/s
        let mut r = RealtimeRunner::new(600.0, EventLog::new(), &config).unwrap();
        r.transport().start();
        r.engine_mut().enqueue(24.0, "a", vec![Atom::Int(1)]).unwrap();
        r.engine_mut().enqueue(48.0, "b", vec![Atom::Int(2)]).unwrap();
        r.engine_mut().arm().unwrap();

        r.run_until(|engine| engine.output().done_count() > 0).unwrap();
        assert_eq!(r.engine().output().emitted_tags(), vec!["a", "b"]);
    }
}
