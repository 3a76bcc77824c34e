//! Offline cue sheet renderer
//!
//! Plays a JSON cue sheet against an offline transport and prints every
//! dispatch, scrub and done notification with the transport position it
//! happened at.
//!
//! Usage:
//!   cargo run --bin cue_render -- sheet.json
//!   cargo run --bin cue_render -- sheet.json --until 4000 --verbose
//!
//! Sheet format:
//! ```json
//! {
//!   "config": { "name": "drums", "expirations": { "midi": 5 } },
//!   "events": [ { "at": 480, "class": "midi", "payload": [60, 100] } ],
//!   "messages": [ "at 960 ui bang" ],
//!   "scrubs": [ { "at_played": 700, "locate": 0 } ],
//!   "until": 2000
//! }
//! ```
//!
//! Set `RUST_LOG=info` together with `"verbose": true` to see the engine's
//! own trace.

use serde::Deserialize;
use std::env;
use transport_cue::{
    Atom, CueConfig, CueError, Message, OfflineRunner, OfflineTransport, Output, Requests, Transport,
};

#[derive(Debug, Deserialize)]
struct SheetEvent {
    at: f64,
    class: String,
    payload: Vec<Atom>,
}

#[derive(Debug, Deserialize)]
struct SheetScrub {
    /// Played ticks after which the transport jumps.
    at_played: f64,
    locate: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Sheet {
    config: CueConfig,
    events: Vec<SheetEvent>,
    messages: Vec<String>,
    scrubs: Vec<SheetScrub>,
    until: Option<f64>,
}

/// Prints each callback next to the transport position.
struct Printer {
    transport: OfflineTransport,
}

impl Printer {
    fn line(&self, what: &str) {
        println!("{:>12.3}  {}", self.transport.now_ticks(), what);
    }
}

impl Output for Printer {
    fn emit(&mut self, class_tag: &str, payload: &[Atom], _requests: &mut Requests) {
        let args: Vec<String> = payload.iter().map(|a| a.to_string()).collect();
        self.line(&format!("{} {}", class_tag, args.join(" ")));
    }

    fn notify_done(&mut self, _requests: &mut Requests) {
        self.line("done");
    }

    fn notify_scrub(&mut self, delta: f64) {
        self.line(&format!("scrub {:+.3}", delta));
    }
}

fn print_usage() {
    println!("Transport Cue - Offline Renderer");
    println!("================================");
    println!();
    println!("Usage:");
    println!("  cargo run --bin cue_render -- <sheet.json> [--until TICKS] [--verbose]");
}

fn render(sheet: Sheet, until_override: Option<f64>) -> Result<(), CueError> {
    let transport = OfflineTransport::running_at(0.0);
    let printer = Printer {
        transport: transport.clone(),
    };
    let mut runner = OfflineRunner::with_transport(transport.clone(), printer, &sheet.config)?;

    for ev in sheet.events {
        runner.engine_mut().enqueue(ev.at, &ev.class, ev.payload)?;
    }
    for line in &sheet.messages {
        let message = Message::parse_line(line)?;
        runner.engine_mut().handle(message)?;
    }
    runner.engine_mut().arm()?;

    let mut scrubs = sheet.scrubs;
    scrubs.sort_by(|a, b| a.at_played.total_cmp(&b.at_played));

    for scrub in scrubs {
        let dt = scrub.at_played - transport.played_ticks();
        runner.advance(dt)?;
        println!("{:>12.3}  -- locate {:.3}", transport.now_ticks(), scrub.locate);
        runner.locate(scrub.locate);
    }

    match until_override.or(sheet.until) {
        Some(until) => runner.advance(until - transport.played_ticks())?,
        None => {
            runner.run_until_idle(f64::INFINITY)?;
        }
    }

    println!(
        "{:>12.3}  -- end ({} pending, {:.3} ticks played)",
        transport.now_ticks(),
        runner.engine().size(),
        transport.played_ticks()
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut path: Option<String> = None;
    let mut until: Option<f64> = None;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--until" | "-u" => {
                i += 1;
                if i < args.len() {
                    until = args[i].parse().ok();
                }
            }
            "--verbose" | "-v" => {
                verbose = true;
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                path = Some(other.to_string());
            }
        }
        i += 1;
    }

    let path = match path {
        Some(p) => p,
        None => {
            print_usage();
            return Err("Missing cue sheet path".into());
        }
    };

    let text = std::fs::read_to_string(&path)?;
    let mut sheet: Sheet = serde_json::from_str(&text)?;
    sheet.config.validate()?;
    if verbose {
        sheet.config.verbose = true;
    }

    render(sheet, until)?;
    Ok(())
}
