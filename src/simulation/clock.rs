use chrono::Utc;
use parking_lot::Mutex;

/// Source of simulated time, in seconds.
pub trait Clock: Send + Sync {
    fn now_seconds(&self) -> f64;
}

/// Wall-clock time since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_seconds(&self) -> f64 {
        Utc::now().timestamp_millis() as f64 / 1000.0
    }
}

/// Externally driven clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    seconds: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start_seconds: f64) -> Self {
        Self {
            seconds: Mutex::new(start_seconds),
        }
    }

    pub fn set(&self, seconds: f64) {
        *self.seconds.lock() = seconds;
    }

    pub fn advance(&self, seconds: f64) {
        *self.seconds.lock() += seconds;
    }
}

impl Clock for ManualClock {
    fn now_seconds(&self) -> f64 {
        *self.seconds.lock()
    }
}
