use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Monotonic console clock with a wall-clock escape hatch for stamps that
/// leave the process (notifications, audit entries).
#[derive(Debug, Clone, Copy)]
pub struct TimeBase {
    start: Instant,
}

impl TimeBase {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Monotonic microseconds since the console was mounted.
    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    pub fn uptime(&self) -> Duration {
        self.start.elapsed()
    }

    /// Wall-clock microseconds since Unix epoch.
    pub fn unix_us(&self) -> u64 {
        unix_us()
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::new()
    }
}

pub fn unix_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}
