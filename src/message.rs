//! Message surface
//!
//! Host-neutral form of the messages a patch or script sends to an engine:
//!
//! ```text
//! at <time> <selector> [args...]     cue an event
//! cue [at <time> <selector> ...]     optionally cue an event, then arm
//! clear                              reset
//! expirations <class> <grace> ...    replace the expirations table
//! verbose <0|1>
//! name <symbol>
//! ```

use crate::engine::CueEngine;
use crate::error::{CueError, Result};
use crate::event::{Atom, Event};
use crate::expiration::ExpirationPolicy;
use crate::output::Output;
use crate::timer::WakeTimer;
use crate::transport::Transport;

#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    At(Event),
    Cue(Option<Event>),
    Clear,
    Expirations(ExpirationPolicy),
    Verbose(bool),
    Name(String),
}

impl Message {
    /// Parse a selector and its arguments. Intake validation happens here, so
    /// a malformed `at` never reaches the queue.
    pub fn parse(selector: &str, args: &[Atom]) -> Result<Self> {
        match selector {
            "at" => Ok(Message::At(Event::from_atoms(args)?)),
            "cue" => match args.first().and_then(Atom::as_symbol) {
                Some("at") => Ok(Message::Cue(Some(Event::from_atoms(&args[1..])?))),
                _ => Ok(Message::Cue(None)),
            },
            "clear" | "stop" => Ok(Message::Clear),
            "expirations" => Ok(Message::Expirations(ExpirationPolicy::from_atoms(args)?)),
            "verbose" => {
                let on = args.first().and_then(Atom::as_f64).ok_or(CueError::InvalidPayload)?;
                Ok(Message::Verbose(on != 0.0))
            }
            "name" => {
                let name = args.first().and_then(Atom::as_symbol).ok_or(CueError::InvalidPayload)?;
                Ok(Message::Name(name.to_string()))
            }
            other => Err(CueError::UnknownMessage(other.to_string())),
        }
    }

    /// Parse a whitespace separated line such as `at 480 midi 60 100`.
    pub fn parse_line(line: &str) -> Result<Self> {
        let atoms = tokenize(line);
        let Some((selector, args)) = atoms.split_first() else {
            return Err(CueError::UnknownMessage(String::new()));
        };
        match selector {
            Atom::Symbol(s) => Message::parse(s, args),
            other => Err(CueError::UnknownMessage(other.to_string())),
        }
    }
}

/// Split a line into atoms: integers, then floats, then symbols.
pub fn tokenize(line: &str) -> Vec<Atom> {
    line.split_whitespace()
        .map(|word| {
            if let Ok(i) = word.parse::<i64>() {
                Atom::Int(i)
            } else if let Ok(f) = word.parse::<f64>() {
                Atom::Float(f)
            } else {
                Atom::Symbol(word.to_string())
            }
        })
        .collect()
}

impl<C: Transport, T: WakeTimer, O: Output> CueEngine<C, T, O> {
    pub fn handle(&mut self, message: Message) -> Result<()> {
        match message {
            Message::At(event) => self.enqueue_event(event).map(|_| ()),
            Message::Cue(event) => self.cue(event),
            Message::Clear => {
                self.reset();
                Ok(())
            }
            Message::Expirations(policy) => {
                self.configure_expirations(policy);
                Ok(())
            }
            Message::Verbose(on) => {
                self.set_verbose(on);
                Ok(())
            }
            Message::Name(name) => {
                self.set_name(name);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::EventLog;
    use crate::timer::TimerSlot;
    use crate::transport::OfflineTransport;

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("at 480 midi 60.5 x"),
            vec![
                Atom::symbol("at"),
                Atom::Int(480),
                Atom::symbol("midi"),
                Atom::Float(60.5),
                Atom::symbol("x")
            ]
        );
    }

    #[test]
    fn test_parse_at() {
        let msg = Message::parse_line("at 480 midi 60 100").unwrap();
        let Message::At(ev) = msg else {
            panic!("expected at, got {:?}", msg);
        };
        assert!((ev.scheduled_time() - 480.0).abs() < 1e-10);
        assert_eq!(ev.class_tag(), "midi");
    }

    #[test]
    fn test_parse_at_invalid() {
        assert!(matches!(
            Message::parse_line("at soon midi 60"),
            Err(CueError::InvalidTime(_))
        ));
        assert!(matches!(Message::parse_line("at 480"), Err(CueError::InvalidPayload)));
    }

    #[test]
    fn test_parse_cue() {
        assert_eq!(Message::parse_line("cue").unwrap(), Message::Cue(None));
        assert!(matches!(
            Message::parse_line("cue at 10 done 1").unwrap(),
            Message::Cue(Some(ev)) if ev.class_tag() == "done"
        ));
    }

    #[test]
    fn test_parse_misc() {
        assert_eq!(Message::parse_line("clear").unwrap(), Message::Clear);
        assert_eq!(Message::parse_line("verbose 1").unwrap(), Message::Verbose(true));
        assert_eq!(Message::parse_line("name drums").unwrap(), Message::Name("drums".into()));
        assert!(matches!(
            Message::parse_line("bang"),
            Err(CueError::UnknownMessage(s)) if s == "bang"
        ));
        assert!(Message::parse_line("   ").is_err());

        let Message::Expirations(policy) = Message::parse_line("expirations midi 5 ui 50").unwrap() else {
            panic!("expected expirations");
        };
        assert_eq!(policy.grace_for("ui"), Some(50.0));
    }

    #[test]
    fn test_handle_drives_engine() {
        let transport = OfflineTransport::running_at(0.0);
        let slot = TimerSlot::new();
        let mut engine = CueEngine::new(transport, slot.clone(), EventLog::new());

        for line in ["name lead", "expirations midi 5", "at 20 midi 62", "cue at 10 midi 60"] {
            engine.handle(Message::parse_line(line).unwrap()).unwrap();
        }
        assert_eq!(engine.name(), "lead");
        assert_eq!(engine.expirations().grace_for("midi"), Some(5.0));
        assert_eq!(engine.size(), 2);
        assert_eq!(slot.remaining(), Some(10.0));

        engine.handle(Message::Clear).unwrap();
        assert_eq!(engine.size(), 0);
        assert!(!slot.is_armed());
    }
}
