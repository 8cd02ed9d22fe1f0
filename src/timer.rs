//! Start/stop timer reported through the `log` facade.
//!
//! Durations come from the monotonic clock; the local wall-clock start time
//! is kept only for the log line.

use std::time::Instant;

use chrono::{DateTime, Local, TimeDelta};

/// A running measurement for one labelled call.
#[derive(Debug)]
pub struct Timer {
    label: String,
    started: DateTime<Local>,
    clock: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        let started = Local::now();
        log::debug!("{label}: started at {}", started.format("%H:%M:%S%.3f"));
        Timer {
            label,
            started,
            clock: Instant::now(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Local time at which the timer was started.
    pub fn started_at(&self) -> DateTime<Local> {
        self.started
    }

    /// Time elapsed so far, without stopping. Never negative.
    pub fn elapsed(&self) -> TimeDelta {
        TimeDelta::from_std(self.clock.elapsed()).unwrap_or(TimeDelta::MAX)
    }

    /// Stops the timer, logs the elapsed time and returns it.
    pub fn stop(self) -> TimeDelta {
        let elapsed = self.elapsed();
        log::info!("{}: {:.3} ms", self.label, millis(elapsed));
        elapsed
    }

    /// Stops the timer and reports a failure message through the same sink.
    pub fn fail(self, message: &dyn std::fmt::Display) -> TimeDelta {
        let elapsed = self.elapsed();
        log::error!(
            "{}: failed after {:.3} ms: {}",
            self.label,
            millis(elapsed),
            message
        );
        elapsed
    }
}

/// A `TimeDelta` as fractional milliseconds.
pub fn millis(delta: TimeDelta) -> f64 {
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000.0,
        None => delta.num_milliseconds() as f64,
    }
}
