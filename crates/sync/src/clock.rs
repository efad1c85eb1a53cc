use std::time::Instant;

/// Monotonic local time in nanosecond ticks since the process epoch. Ticks
/// from different nodes live in different clock domains; the session
/// coordinator's offset estimate is what maps between them.
pub type Tick = i64;

/// Ticks per second.
pub const TICK_FREQUENCY: i64 = 1_000_000_000;

pub fn ticks_to_secs(ticks: Tick) -> f64 {
    ticks as f64 / TICK_FREQUENCY as f64
}

pub fn secs_to_ticks(secs: f64) -> Tick {
    (secs * TICK_FREQUENCY as f64).round() as Tick
}

pub fn secs_to_micros(secs: f64) -> i64 {
    (secs * 1_000_000.0).round() as i64
}

pub fn micros_to_secs(micros: i64) -> f64 {
    micros as f64 / 1_000_000.0
}

/// High-resolution monotonic tick source, strictly increasing for the
/// process lifetime.
#[derive(Debug, Clone)]
pub struct TickClock {
    epoch: Instant,
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    pub fn now(&self) -> Tick {
        self.epoch.elapsed().as_nanos() as Tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic() {
        let clock = TickClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(secs_to_ticks(1.5), 1_500_000_000);
        assert_eq!(ticks_to_secs(500_000_000), 0.5);
        assert_eq!(secs_to_micros(0.25), 250_000);
        assert_eq!(micros_to_secs(2_000_000), 2.0);
        assert_eq!(secs_to_ticks(-0.15), -150_000_000);
    }
}
