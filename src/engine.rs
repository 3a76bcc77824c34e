//! Cue engine
//!
//! The dispatch state machine. Events wait in an [`EventQueue`] until a pass
//! runs over the head of the queue:
//! - `arm` looks without dispatching due events and sets up the next wake-up
//! - `flush` runs when that wake-up fires: it checks for a scrub first, then
//!   dispatches the head tick group
//!
//! Either pass drops expired events and dispatches late non-expiring ones, so
//! neither can block scheduling of the next future event.

use crate::config::CueConfig;
use crate::drift::DriftDetector;
use crate::error::{CueError, Result};
use crate::event::{Atom, Event};
use crate::expiration::ExpirationPolicy;
use crate::output::{Output, Request, Requests};
use crate::queue::EventQueue;
use crate::timer::WakeTimer;
use crate::transport::Transport;
use log::{error, info, warn};

/// Slack at the now/scheduled boundary for floating-point noise.
pub const DISPATCH_EPSILON: f64 = 1e-5;

/// Passes chained through `notify_done` re-arming before giving up.
pub const MAX_CHAINED_PASSES: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// No wake-up armed.
    Idle,
    /// A wake-up is armed for `expected_wake_time`.
    Armed,
    /// A pass is running.
    Flushing,
}

/// What the requests gathered during a callback asked for.
#[derive(Default)]
struct Applied {
    reset: bool,
    arm: bool,
}

enum PassEnd {
    Settled,
    /// Requests after the pass asked for another (non-dispatching) pass.
    Rearm,
}

pub struct CueEngine<C, T, O> {
    name: String,
    verbose: bool,
    scrub_unit_ticks: f64,

    queue: EventQueue,
    expirations: ExpirationPolicy,

    /// Where the engine expects the transport to be when the armed wake-up
    /// fires. Set exactly while a wake-up is armed.
    expected_wake_time: Option<f64>,
    /// Treat now as tick 0 until the first wake-up is armed.
    override_now: bool,
    flushing: bool,

    transport: C,
    timer: T,
    output: O,
}

impl<C: Transport, T: WakeTimer, O: Output> CueEngine<C, T, O> {
    /// Create an engine with the default configuration.
    pub fn new(transport: C, timer: T, output: O) -> Self {
        let override_now = !transport.is_running();
        let config = CueConfig::default();
        Self {
            name: config.name,
            verbose: config.verbose,
            scrub_unit_ticks: config.scrub_unit_ticks,
            queue: EventQueue::new(),
            expirations: ExpirationPolicy::new(),
            expected_wake_time: None,
            override_now,
            flushing: false,
            transport,
            timer,
            output,
        }
    }

    pub fn with_config(transport: C, timer: T, output: O, config: &CueConfig) -> Result<Self> {
        config.validate()?;
        let mut engine = Self::new(transport, timer, output);
        engine.name = config.name.clone();
        engine.verbose = config.verbose;
        engine.scrub_unit_ticks = config.scrub_unit_ticks;
        engine.expirations = config.expiration_policy()?;
        Ok(engine)
    }

    // --- Intake ---

    /// Cue a payload at `scheduled_time`. Returns the new queue size.
    pub fn enqueue(&mut self, scheduled_time: f64, class_tag: &str, payload: Vec<Atom>) -> Result<usize> {
        let event = Event::new(scheduled_time, class_tag, payload).inspect_err(|e| {
            error!("Received invalid event @ '{}': {}", self.name, e);
        })?;
        self.enqueue_event(event)
    }

    pub fn enqueue_event(&mut self, event: Event) -> Result<usize> {
        let size = self.queue.enqueue(event).inspect_err(|_| {
            error!("Failed to push event to queue @ '{}'", self.name);
        })?;
        if self.verbose {
            info!("Added event to queue @ '{}' (new size: {})", self.name, size);
        }
        Ok(size)
    }

    /// Optionally cue an event, then arm.
    pub fn cue(&mut self, event: Option<Event>) -> Result<()> {
        if let Some(event) = event {
            self.enqueue_event(event)?;
        }
        self.arm()
    }

    /// Set up the wake-up for the next event without dispatching due events.
    pub fn arm(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Ok(());
        }
        self.run(false)
    }

    /// Wake-up callback: correct for scrubs, then dispatch the due tick group.
    pub fn flush(&mut self) -> Result<()> {
        self.run(true)
    }

    /// Drop every pending event and cancel the armed wake-up.
    pub fn reset(&mut self) {
        if self.verbose {
            info!("Clearing queue @ '{}'", self.name);
        }
        self.timer.cancel();
        self.queue.clear();
        self.expected_wake_time = None;
        self.override_now = !self.transport.is_running();
    }

    pub fn configure_expirations(&mut self, policy: ExpirationPolicy) {
        if self.verbose {
            info!("Configured {} expirations @ '{}'", policy.len(), self.name);
        }
        self.expirations.replace(policy);
    }

    // --- Accessors ---

    pub fn state(&self) -> EngineState {
        if self.flushing {
            EngineState::Flushing
        } else if self.expected_wake_time.is_some() {
            EngineState::Armed
        } else {
            EngineState::Idle
        }
    }

    pub fn size(&self) -> usize {
        self.queue.size()
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn expirations(&self) -> &ExpirationPolicy {
        &self.expirations
    }

    pub fn expected_wake_time(&self) -> Option<f64> {
        self.expected_wake_time
    }

    pub fn overrides_now(&self) -> bool {
        self.override_now
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        if self.verbose {
            info!("Naming '{}'", self.name);
        }
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn transport(&self) -> &C {
        &self.transport
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    pub fn into_output(self) -> O {
        self.output
    }

    // --- Passes ---

    fn now(&self) -> f64 {
        if self.override_now {
            0.0
        } else {
            self.transport.now_ticks()
        }
    }

    fn run(&mut self, dispatching: bool) -> Result<()> {
        let mut dispatching = dispatching;
        for _ in 0..MAX_CHAINED_PASSES {
            self.flushing = true;
            let end = self.pass(dispatching);
            self.flushing = false;
            match end? {
                PassEnd::Settled => return Ok(()),
                PassEnd::Rearm => dispatching = false,
            }
        }
        error!("Re-armed {} times without settling @ '{}'", MAX_CHAINED_PASSES, self.name);
        Err(CueError::RunawayScheduling {
            limit: MAX_CHAINED_PASSES,
        })
    }

    fn pass(&mut self, dispatching: bool) -> Result<PassEnd> {
        let now = self.now();

        if self.verbose {
            info!(
                "Processing queue to {} at {:.3} ticks @ '{}'",
                if dispatching { "dispatch" } else { "cue" },
                now,
                self.name
            );
        }

        if dispatching {
            // The wake-up that brought us here has fired.
            let expected = self.expected_wake_time.take();
            if let Some(correction) = DriftDetector::check(now, expected) {
                self.queue.shift_all(correction.delta);
                if self.verbose {
                    info!("Detected scrub of {:.3} ticks @ '{}'", correction.delta, self.name);
                }
                self.output.notify_scrub(correction.delta / self.scrub_unit_ticks);

                if correction.is_ahead_of(now) {
                    self.schedule_next(correction.desired, now);
                    return Ok(PassEnd::Settled);
                }
            }
        }

        let mut requests = Requests::new();
        let mut last_dispatch: Option<f64> = None;
        let mut removed_any = false;

        while let Some(head) = self.queue.peek_head() {
            let at = head.scheduled_time();
            let grace = self.expirations.grace_for(head.class_tag());

            // Non-expiring events use a zero window here: it only decides
            // whether they are late, never whether they are dropped.
            let on_time = at >= now - DISPATCH_EPSILON - grace.unwrap_or(0.0);
            let in_group = last_dispatch.map_or(true, |t| t == at);

            if self.verbose {
                info!(
                    "Found '{}' event cued at {:.3} ticks (+{:.3} expiration ticks / {} on time / {} at dispatch time) @ '{}'",
                    head.class_tag(),
                    at,
                    grace.unwrap_or(0.0),
                    if on_time { "IS" } else { "is NOT" },
                    if in_group { "IS" } else { "is NOT" },
                    self.name
                );
                if !on_time {
                    warn!("'{}' event is {:.3} ticks late @ '{}'", head.class_tag(), now - at, self.name);
                }
            }

            if (on_time && in_group && dispatching) || (!on_time && grace.is_none()) {
                // Off the queue before anyone sees it, so a re-entrant request
                // can never reach the in-flight event.
                let Some(event) = self.queue.pop_head() else {
                    break;
                };
                removed_any = true;
                last_dispatch = Some(at);
                if self.verbose {
                    info!("Dispatching event @ '{}'", self.name);
                }
                self.output.emit(event.class_tag(), event.payload(), &mut requests);

                // Arming is coalesced: this pass arms or empties the queue anyway.
                if self.apply_requests(&mut requests)?.reset {
                    return Ok(PassEnd::Settled);
                }
            } else if !on_time {
                if self.verbose {
                    warn!("Deleting expired '{}' event @ '{}'", head.class_tag(), self.name);
                }
                self.queue.pop_head();
                removed_any = true;
            } else {
                if self.verbose {
                    info!("Cueing '{}' event at {:.3} ticks @ '{}'", head.class_tag(), at, self.name);
                }
                self.schedule_next(at, now);
                return Ok(PassEnd::Settled);
            }
        }

        // Queue is empty: nothing left to wake up for.
        self.timer.cancel();
        self.expected_wake_time = None;

        if !removed_any {
            return Ok(PassEnd::Settled);
        }

        self.output.notify_done(&mut requests);
        let applied = self.apply_requests(&mut requests)?;
        if applied.arm && !self.queue.is_empty() {
            Ok(PassEnd::Rearm)
        } else {
            Ok(PassEnd::Settled)
        }
    }

    fn apply_requests(&mut self, requests: &mut Requests) -> Result<Applied> {
        let mut applied = Applied::default();
        for op in requests.take() {
            match op {
                Request::Enqueue(event) => {
                    self.enqueue_event(event)?;
                }
                Request::Arm => applied.arm = true,
                Request::Reset => {
                    self.reset();
                    applied.reset = true;
                    applied.arm = false;
                }
                Request::ConfigureExpirations(policy) => self.configure_expirations(policy),
            }
        }
        Ok(applied)
    }

    fn schedule_next(&mut self, at: f64, now: f64) {
        // A late target fires immediately, at now rather than at `at`.
        self.expected_wake_time = Some(at.max(now));
        self.timer.arm(at - now);
        self.override_now = false;
    }
}
