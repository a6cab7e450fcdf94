//! Repeat-until-noise-floor wall-clock timing.

use std::time::{Duration, Instant};

/// Accumulated time a measurement must reach before it is trusted.
pub const NOISE_FLOOR: Duration = Duration::from_millis(10);

/// Result of an adaptive measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Total elapsed time over all repetitions.
    pub total: Duration,
    /// Number of calls made, at least one.
    pub repetitions: usize,
}

impl Measurement {
    /// Mean seconds per call.
    pub fn per_call(&self) -> f64 {
        self.total.as_secs_f64() / self.repetitions as f64
    }
}

/// Run `action` until the accumulated elapsed time reaches `floor`.
///
/// Each call is timed on its own so work done between calls does not count.
/// The first error aborts the measurement.
pub fn adaptive_time<F, E>(floor: Duration, mut action: F) -> Result<Measurement, E>
where
    F: FnMut() -> Result<(), E>,
{
    let mut total = Duration::ZERO;
    let mut repetitions = 0usize;
    loop {
        let start = Instant::now();
        action()?;
        total += start.elapsed();
        repetitions += 1;
        if total >= floor {
            break;
        }
    }
    Ok(Measurement { total, repetitions })
}
