//! Transport Cue
//!
//! Cue discrete messages at positions on an external transport clock:
//! - Ordered event queue with insertion-order ties
//! - Per-class grace periods: late events are dropped or still dispatched
//! - Scrub/loop detection that moves the whole queue by one quantized delta
//! - Offline (stepping) and realtime (spin_sleep) runners

pub mod config;
pub mod drift;
pub mod engine;
pub mod error;
pub mod event;
pub mod expiration;
pub mod message;
pub mod output;
pub mod queue;
pub mod runner;
pub mod timer;
pub mod transport;


pub use config::CueConfig;
pub use drift::{DriftDetector, ScrubCorrection};
pub use engine::{CueEngine, EngineState};
pub use error::{CueError, Result};
pub use event::{Atom, Event};
pub use expiration::ExpirationPolicy;
pub use message::Message;
pub use output::{EventLog, Output, Record, Requests};
pub use queue::EventQueue;
pub use runner::{OfflineRunner, RealtimeRunner};
pub use timer::{TimerSlot, WakeTimer};
pub use transport::{OfflineTransport, RealtimeTransport, Transport};
