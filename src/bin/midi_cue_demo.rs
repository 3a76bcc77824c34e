//! Real-time MIDI Demo for Transport Cue
//!
//! Cues note events against a wall-clock transport and sends them through a
//! MIDI output port.
//!
//! Usage:
//!   cargo run --features midi --bin midi_cue_demo -- --list              # List MIDI devices
//!   cargo run --features midi --bin midi_cue_demo -- --device 0 --test 1 # Run test 1 on device 0
//!
//! Test Cases:
//!   1. Metronome   - Two bars of quarter note clicks cued up front
//!   2. Loop        - A phrase re-cued from the done notification
//!   3. Scrub       - The transport jumps back a beat mid-phrase
//!   4. Expiration  - A stalled host drops late notes but keeps UI events

use midir::{MidiOutput, MidiOutputConnection};
use std::env;
use std::time::Duration;
use transport_cue::{Atom, CueConfig, Output, RealtimeRunner, Requests, Transport};

// MIDI constants
const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;

const TICKS_PER_BEAT: f64 = 480.0;

/// Wrapper for MIDI output connection with send capability
struct MidiSender {
    conn: MidiOutputConnection,
}

impl MidiSender {
    fn new(conn: MidiOutputConnection) -> Self {
        Self { conn }
    }

    fn note_on(&mut self, note: u8, velocity: u8) {
        let _ = self.conn.send(&[NOTE_ON, note, velocity]);
    }

    fn note_off(&mut self, note: u8) {
        let _ = self.conn.send(&[NOTE_OFF, note, 0]);
    }
}

fn midi_byte(atom: Option<&Atom>) -> u8 {
    atom.and_then(Atom::as_f64).map_or(0, |v| v.clamp(0.0, 127.0) as u8)
}

/// `midi <note> <velocity>` plays a note (velocity 0 releases it), `ui ...`
/// is printed. The optional loop re-cues a phrase from the done notification.
struct MidiCueOut {
    midi: MidiSender,
    phrase: Vec<(f64, i64, i64)>,
    loops_left: usize,
    next_start: f64,
    dispatched: usize,
    dones: usize,
}

impl MidiCueOut {
    fn new(midi: MidiSender) -> Self {
        Self {
            midi,
            phrase: Vec::new(),
            loops_left: 0,
            next_start: 0.0,
            dispatched: 0,
            dones: 0,
        }
    }

    fn cue_phrase(&mut self, requests: &mut Requests) {
        for &(offset, note, velocity) in &self.phrase {
            let at = self.next_start + offset;
            let _ = requests.enqueue(at, "midi", vec![Atom::Int(note), Atom::Int(velocity)]);
        }
        requests.arm();
    }
}

impl Output for MidiCueOut {
    fn emit(&mut self, class_tag: &str, payload: &[Atom], _requests: &mut Requests) {
        self.dispatched += 1;
        match class_tag {
            "midi" => {
                let note = midi_byte(payload.first());
                let velocity = midi_byte(payload.get(1));
                if velocity == 0 {
                    self.midi.note_off(note);
                } else {
                    self.midi.note_on(note, velocity);
                }
            }
            _ => {
                let args: Vec<String> = payload.iter().map(|a| a.to_string()).collect();
                println!("  [{}] {}", class_tag, args.join(" "));
            }
        }
    }

    fn notify_done(&mut self, requests: &mut Requests) {
        self.dones += 1;
        if self.loops_left > 0 {
            self.loops_left -= 1;
            self.next_start += 4.0 * TICKS_PER_BEAT;
            println!("  Loop: re-cueing phrase at {:.0} ticks", self.next_start);
            self.cue_phrase(requests);
        }
    }

    fn notify_scrub(&mut self, delta: f64) {
        println!("  Scrub detected: queue moved by {:+.2} beats", delta);
    }
}

fn list_midi_devices() -> Result<(), Box<dyn std::error::Error>> {
    let midi_out = MidiOutput::new("midi_cue_demo_list")?;
    let ports = midi_out.ports();

    if ports.is_empty() {
        println!("No MIDI output devices found.");
        return Ok(());
    }

    println!("Available MIDI output devices:");
    println!("------------------------------");
    for (i, port) in ports.iter().enumerate() {
        let name = midi_out.port_name(port).unwrap_or_else(|_| "Unknown".to_string());
        println!("  {}: {}", i, name);
    }
    println!();
    println!("Usage: cargo run --features midi --bin midi_cue_demo -- --device <N> --test <1-4>");

    Ok(())
}

fn connect_to_device(device_index: usize) -> Result<MidiSender, Box<dyn std::error::Error>> {
    let midi_out = MidiOutput::new("midi_cue_demo")?;
    let ports = midi_out.ports();

    let port = ports.get(device_index).ok_or_else(|| {
        format!(
            "Device index {} out of range. Only {} devices available.",
            device_index,
            ports.len()
        )
    })?;
    let port_name = midi_out.port_name(port)?;
    println!("Connecting to MIDI device: {}", port_name);

    let conn = midi_out.connect(port, "midi_cue_demo_conn")?;
    Ok(MidiSender::new(conn))
}

fn demo_config(name: &str) -> CueConfig {
    CueConfig {
        name: name.to_string(),
        expirations: [("midi".to_string(), 5.0)].into_iter().collect(),
        scrub_unit_ticks: TICKS_PER_BEAT,
        ticks_per_beat: TICKS_PER_BEAT,
        ..Default::default()
    }
}

/// A note at `beat` held for `length` beats, as an on/off pair.
fn note_pair(beat: f64, length: f64, note: i64, velocity: i64) -> [(f64, i64, i64); 2] {
    [
        (beat * TICKS_PER_BEAT, note, velocity),
        ((beat + length) * TICKS_PER_BEAT, note, 0),
    ]
}

fn cue_notes(
    runner: &mut RealtimeRunner<MidiCueOut>,
    notes: &[(f64, i64, i64)],
) -> Result<(), Box<dyn std::error::Error>> {
    for &(at, note, velocity) in notes {
        runner
            .engine_mut()
            .enqueue(at, "midi", vec![Atom::Int(note), Atom::Int(velocity)])?;
    }
    Ok(())
}

// ============================================================================
// Test Case 1: Metronome
// Demonstrates: Events cued ahead of time, one wake-up per tick group
// ============================================================================

fn run_metronome(midi: MidiSender) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n=== Test 1: Metronome ===");
    println!("Two bars of quarter note clicks at 120 BPM\n");

    let mut runner = RealtimeRunner::new(120.0, MidiCueOut::new(midi), &demo_config("metronome"))?;

    let mut notes = Vec::new();
    for beat in 0..8 {
        let (note, velocity) = if beat % 4 == 0 { (76, 120) } else { (72, 90) };
        notes.extend(note_pair(beat as f64, 0.1, note, velocity));
    }
    cue_notes(&mut runner, &notes)?;
    runner.engine_mut().enqueue(8.0 * TICKS_PER_BEAT, "ui", vec![Atom::symbol("metronome finished")])?;

    runner.transport().start();
    runner.engine_mut().arm()?;
    runner.run_until(|engine| engine.output().dones > 0)?;
    Ok(())
}

// ============================================================================
// Test Case 2: Loop
// Demonstrates: Re-cueing from the done notification
// ============================================================================

fn run_loop(midi: MidiSender) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n=== Test 2: Loop ===");
    println!("A one-bar arpeggio re-cued three times from the done notification\n");

    let mut out = MidiCueOut::new(midi);
    out.phrase = [60, 64, 67, 72]
        .iter()
        .enumerate()
        .flat_map(|(i, &n)| note_pair(i as f64, 0.8, n, 100))
        .collect();
    out.loops_left = 3;

    let phrase = out.phrase.clone();
    let mut runner = RealtimeRunner::new(100.0, out, &demo_config("loop"))?;
    cue_notes(&mut runner, &phrase)?;

    runner.transport().start();
    runner.engine_mut().arm()?;
    runner.run_until(|engine| engine.output().dones > 3)?;
    println!("Loop finished after {} dispatches.", runner.engine().output().dispatched);
    Ok(())
}

// ============================================================================
// Test Case 3: Scrub
// Demonstrates: A transport jump moves the whole queue, keeping note spacing
// ============================================================================

fn run_scrub(midi: MidiSender) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n=== Test 3: Scrub ===");
    println!("A scale where the transport jumps back one beat after beat 3\n");

    let mut runner = RealtimeRunner::new(120.0, MidiCueOut::new(midi), &demo_config("scrub"))?;
    let notes: Vec<(f64, i64, i64)> = [60, 62, 64, 65, 67, 69, 71, 72]
        .iter()
        .enumerate()
        .flat_map(|(i, &n)| note_pair(i as f64, 0.5, n, 100))
        .collect();
    cue_notes(&mut runner, &notes)?;

    runner.transport().start();
    runner.engine_mut().arm()?;

    let mut scrubbed = false;
    runner.run_until(|engine| {
        let now = engine.transport().now_ticks();
        if !scrubbed && now >= 3.0 * TICKS_PER_BEAT {
            scrubbed = true;
            println!("  Locating transport from {:.0} to {:.0}", now, now - TICKS_PER_BEAT);
            engine.transport().locate(now - TICKS_PER_BEAT);
        }
        engine.output().dones > 0
    })?;
    Ok(())
}

// ============================================================================
// Test Case 4: Expiration
// Demonstrates: Late `midi` events are dropped, non-expiring `ui` events are not
// ============================================================================

fn run_expiration(midi: MidiSender) -> Result<(), Box<dyn std::error::Error>> {
    println!("\n=== Test 4: Expiration ===");
    println!("The host stalls for one second during beat 2.");
    println!("Notes cued inside the stall are dropped; UI events still arrive late.\n");

    let mut runner = RealtimeRunner::new(120.0, MidiCueOut::new(midi), &demo_config("expiration"))?;
    let mut notes = Vec::new();
    for beat in 0..8 {
        notes.extend(note_pair(beat as f64 * 0.5, 0.25, 67, 100));
    }
    cue_notes(&mut runner, &notes)?;
    for beat in 0..4 {
        runner
            .engine_mut()
            .enqueue(beat as f64 * TICKS_PER_BEAT, "ui", vec![Atom::symbol("beat"), Atom::Int(beat)])?;
    }

    runner.transport().start();
    runner.engine_mut().arm()?;

    let mut stalled = false;
    runner.run_until(|engine| {
        if !stalled && engine.transport().now_ticks() >= 1.2 * TICKS_PER_BEAT {
            stalled = true;
            println!("  Stalling...");
            std::thread::sleep(Duration::from_secs(1));
        }
        engine.output().dones > 0
    })?;

    println!(
        "Dispatched {} of {} events.",
        runner.engine().output().dispatched,
        notes.len() + 4
    );
    Ok(())
}

// ============================================================================
// Main entry point
// ============================================================================

fn print_usage() {
    println!("Transport Cue - Real-time MIDI Demo");
    println!("===================================");
    println!();
    println!("Usage:");
    println!("  cargo run --features midi --bin midi_cue_demo -- --list              # List MIDI devices");
    println!("  cargo run --features midi --bin midi_cue_demo -- --device N --test T # Run test T on device N");
    println!();
    println!("Test Cases:");
    println!("  1: Metronome   - Two bars of clicks cued up front");
    println!("  2: Loop        - Phrase re-cued from the done notification");
    println!("  3: Scrub       - Transport jumps back a beat mid-phrase");
    println!("  4: Expiration  - Late notes dropped, UI events kept");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let mut list_devices = false;
    let mut device_index: Option<usize> = None;
    let mut test_case: Option<usize> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--list" | "-l" => {
                list_devices = true;
            }
            "--device" | "-d" => {
                i += 1;
                if i < args.len() {
                    device_index = args[i].parse().ok();
                }
            }
            "--test" | "-t" => {
                i += 1;
                if i < args.len() {
                    test_case = args[i].parse().ok();
                }
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    if list_devices {
        return list_midi_devices();
    }

    let device_index = match device_index {
        Some(d) => d,
        None => {
            print_usage();
            return Err("Missing --device argument".into());
        }
    };

    let test_case = match test_case {
        Some(t) if (1..=4).contains(&t) => t,
        Some(t) => {
            return Err(format!("Invalid test case {}. Must be 1-4.", t).into());
        }
        None => {
            print_usage();
            return Err("Missing --test argument".into());
        }
    };

    let midi = connect_to_device(device_index)?;
    println!("Connected successfully!\n");

    match test_case {
        1 => run_metronome(midi)?,
        2 => run_loop(midi)?,
        3 => run_scrub(midi)?,
        _ => run_expiration(midi)?,
    }

    println!("\nDemo complete. Goodbye!");
    Ok(())
}
