//! Output side of the engine
//!
//! Dispatched events, "queue empty" and scrub notifications all go to an
//! [`Output`]. Every call that can react to a dispatch gets a [`Requests`]
//! buffer; whatever it asks for is applied by the engine after the event has
//! already left the queue.

use crate::error::Result;
use crate::event::{Atom, Event};
use crate::expiration::ExpirationPolicy;

/// Receiver of everything the engine emits.
pub trait Output {
    /// Deliver a dispatched event.
    fn emit(&mut self, class_tag: &str, payload: &[Atom], requests: &mut Requests);

    /// A pass emptied the queue.
    fn notify_done(&mut self, _requests: &mut Requests) {}

    /// The queue was moved by `delta` after a scrub, in the configured unit.
    fn notify_scrub(&mut self, _delta: f64) {}
}

impl<O: Output + ?Sized> Output for Box<O> {
    fn emit(&mut self, class_tag: &str, payload: &[Atom], requests: &mut Requests) {
        (**self).emit(class_tag, payload, requests)
    }

    fn notify_done(&mut self, requests: &mut Requests) {
        (**self).notify_done(requests)
    }

    fn notify_scrub(&mut self, delta: f64) {
        (**self).notify_scrub(delta)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Request {
    Enqueue(Event),
    Arm,
    Reset,
    ConfigureExpirations(ExpirationPolicy),
}

/// Calls made back into the engine from inside an [`Output`] callback.
#[derive(Debug, Default)]
pub struct Requests {
    ops: Vec<Request>,
}

impl Requests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cue a new event. Malformed input is rejected here, before anything
    /// reaches the queue.
    pub fn enqueue(&mut self, scheduled_time: f64, class_tag: &str, payload: Vec<Atom>) -> Result<()> {
        let event = Event::new(scheduled_time, class_tag, payload)?;
        self.ops.push(Request::Enqueue(event));
        Ok(())
    }

    pub fn enqueue_event(&mut self, event: Event) {
        self.ops.push(Request::Enqueue(event));
    }

    pub fn arm(&mut self) {
        self.ops.push(Request::Arm);
    }

    pub fn reset(&mut self) {
        self.ops.push(Request::Reset);
    }

    pub fn configure_expirations(&mut self, policy: ExpirationPolicy) {
        self.ops.push(Request::ConfigureExpirations(policy));
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn take(&mut self) -> Vec<Request> {
        std::mem::take(&mut self.ops)
    }
}

/// One entry of an [`EventLog`].
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Emit { class_tag: String, payload: Vec<Atom> },
    Done,
    Scrub(f64),
}

/// Output that records everything it receives, in order.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    pub records: Vec<Record>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Class tags of emitted events, in dispatch order.
    pub fn emitted_tags(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter_map(|r| match r {
                Record::Emit { class_tag, .. } => Some(class_tag.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn emit_count(&self) -> usize {
        self.emitted_tags().len()
    }

    pub fn done_count(&self) -> usize {
        self.records.iter().filter(|r| matches!(r, Record::Done)).count()
    }

    pub fn scrubs(&self) -> Vec<f64> {
        self.records
            .iter()
            .filter_map(|r| match r {
                Record::Scrub(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl Output for EventLog {
    fn emit(&mut self, class_tag: &str, payload: &[Atom], _requests: &mut Requests) {
        self.records.push(Record::Emit {
            class_tag: class_tag.to_string(),
            payload: payload.to_vec(),
        });
    }

    fn notify_done(&mut self, _requests: &mut Requests) {
        self.records.push(Record::Done);
    }

    fn notify_scrub(&mut self, delta: f64) {
        self.records.push(Record::Scrub(delta));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CueError;

    #[test]
    fn test_requests_validate_at_intake() {
        let mut req = Requests::new();
        assert!(matches!(
            req.enqueue(f64::NAN, "midi", vec![Atom::Int(1)]),
            Err(CueError::InvalidTime(_))
        ));
        assert!(matches!(req.enqueue(1.0, "midi", vec![]), Err(CueError::InvalidPayload)));
        assert!(req.is_empty());

        req.enqueue(1.0, "midi", vec![Atom::Int(1)]).unwrap();
        req.arm();
        let ops = req.take();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[1], Request::Arm);
        assert!(req.is_empty());
    }

    #[test]
    fn test_event_log_summaries() {
        let mut log = EventLog::new();
        let mut req = Requests::new();
        log.emit("midi", &[Atom::Int(60)], &mut req);
        log.notify_scrub(-2.5);
        log.emit("ui", &[Atom::symbol("flash")], &mut req);
        log.notify_done(&mut req);

        assert_eq!(log.emitted_tags(), vec!["midi", "ui"]);
        assert_eq!(log.done_count(), 1);
        assert_eq!(log.scrubs(), vec![-2.5]);
    }
}
