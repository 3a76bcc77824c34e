//! Events
//!
//! An event is a payload cued for a transport tick. Its class tag selects the
//! expiration rule applied when it is late.

use crate::error::{CueError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single payload value, as a host message would carry it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Atom {
    Int(i64),
    Float(f64),
    Symbol(String),
}

impl Atom {
    pub fn symbol(s: impl Into<String>) -> Self {
        Atom::Symbol(s.into())
    }

    /// Numeric value, if this atom is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Atom::Int(i) => Some(*i as f64),
            Atom::Float(f) => Some(*f),
            Atom::Symbol(_) => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Atom::Symbol(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Int(i) => write!(f, "{}", i),
            Atom::Float(x) => write!(f, "{:.3}", x),
            Atom::Symbol(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Atom {
    fn from(i: i64) -> Self {
        Atom::Int(i)
    }
}

impl From<f64> for Atom {
    fn from(x: f64) -> Self {
        Atom::Float(x)
    }
}

impl From<&str> for Atom {
    fn from(s: &str) -> Self {
        Atom::Symbol(s.to_string())
    }
}

/// A cued event.
///
/// `scheduled_time` only changes through a uniform queue shift after a scrub,
/// so it is private to the crate.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub(crate) scheduled_time: f64,
    class_tag: String,
    payload: Vec<Atom>,
}

impl Event {
    /// Build an event, rejecting non-finite times and empty payloads.
    pub fn new(scheduled_time: f64, class_tag: impl Into<String>, payload: Vec<Atom>) -> Result<Self> {
        if !scheduled_time.is_finite() {
            return Err(CueError::InvalidTime(format!("{}", scheduled_time)));
        }
        if payload.is_empty() {
            return Err(CueError::InvalidPayload);
        }
        Ok(Self {
            scheduled_time,
            class_tag: class_tag.into(),
            payload,
        })
    }

    /// Build an event from host message atoms: `<time> <selector> [args...]`.
    ///
    /// The selector becomes the class tag (`list` when the first atom after
    /// the time is not a symbol) and the payload is the whole message after
    /// the time, selector included.
    pub fn from_atoms(atoms: &[Atom]) -> Result<Self> {
        let Some(first) = atoms.first() else {
            return Err(CueError::InvalidTime("missing".to_string()));
        };
        let Some(at) = first.as_f64() else {
            return Err(CueError::InvalidTime(format!("'{}' is not a number", first)));
        };
        let message = &atoms[1..];
        let Some(selector) = message.first() else {
            return Err(CueError::InvalidPayload);
        };
        let class_tag = selector.as_symbol().unwrap_or("list").to_string();
        Event::new(at, class_tag, message.to_vec())
    }

    pub fn scheduled_time(&self) -> f64 {
        self.scheduled_time
    }

    pub fn class_tag(&self) -> &str {
        &self.class_tag
    }

    pub fn payload(&self) -> &[Atom] {
        &self.payload
    }

    pub fn into_parts(self) -> (String, Vec<Atom>) {
        (self.class_tag, self.payload)
    }
}
