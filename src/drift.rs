//! Drift detection
//!
//! When a wake-up fires, the transport position is compared with the position
//! the engine expected. A mismatch beyond rounding noise means the transport
//! was scrubbed or looped, and the whole queue is moved by one quantized delta.

/// Differences at or below this are floating-point noise, not a scrub.
pub const DRIFT_TOLERANCE: f64 = 1e-6;

/// A correction to apply after a detected scrub.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrubCorrection {
    /// Amount every pending event moves by, in ticks.
    pub delta: f64,
    /// Corrected wake-up target: the old expected time plus `delta`.
    pub desired: f64,
}

impl ScrubCorrection {
    /// The corrected target is still ahead of `now`, so the pass must re-arm
    /// instead of dispatching.
    pub fn is_ahead_of(&self, now: f64) -> bool {
        self.desired > now
    }
}

pub struct DriftDetector;

impl DriftDetector {
    /// Compare `now` against the expected wake time.
    ///
    /// The corrected target keeps the sub-tick phase of the expected time and
    /// lands within one tick at or after `now`.
    pub fn check(now: f64, expected_wake_time: Option<f64>) -> Option<ScrubCorrection> {
        let expected = expected_wake_time?;
        let raw_delta = now - expected;
        if raw_delta.abs() <= DRIFT_TOLERANCE {
            return None;
        }

        // `%` on f64 keeps the sign of the dividend, like C's fmod.
        let mut desired = now.ceil() + (expected % 1.0);
        if desired > now + 1.0 {
            desired -= 1.0;
        }

        Some(ScrubCorrection {
            delta: desired - expected,
            desired,
        })
    }
}
