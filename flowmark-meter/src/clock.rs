use std::time::Instant;

/// Monotonic nanosecond clock driving meter bucket updates.
///
/// One clock per action instance: every bucket the instance meters shares the
/// same origin, so timestamps are directly comparable. Profiles built for
/// [`MeterClock::hz`] consume these timestamps without conversion.
#[derive(Debug, Clone)]
pub struct MeterClock {
    origin: Instant,
}

impl MeterClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    /// Nanoseconds elapsed since this clock was created.
    pub fn now(&self) -> u64 {
        // Wraps after ~584 years of uptime.
        self.origin.elapsed().as_nanos() as u64
    }

    /// Timer frequency backing [`MeterClock::now`]: 1 GHz (nanosecond ticks).
    pub const fn hz() -> u64 {
        1_000_000_000
    }
}

impl Default for MeterClock {
    fn default() -> Self {
        Self::new()
    }
}
