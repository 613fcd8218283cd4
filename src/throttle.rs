//! Violation-signal throttling.
//!
//! A sustained violation produces a signal on every inference cycle; only a
//! rate-limited subset may turn into evidence uploads. The throttler is the
//! single gate between the two, owned by the dispatcher thread so the fired
//! timestamp has exactly one writer.

use std::time::{Duration, Instant};

/// How admitted signals are spaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottleMode {
    /// Minimum gap between admitted signals, measured from the last one that
    /// fired. First signal always fires.
    Debounce,
    /// At most one admitted signal per fixed window, windows anchored at
    /// throttler creation.
    Sample,
}

/// Settings for the throttler.
#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    pub mode: ThrottleMode,
    pub min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            mode: ThrottleMode::Debounce,
            min_interval: Duration::from_secs(10),
        }
    }
}

/// Two-state gate: idle, or cooling down since the last admitted signal.
pub struct ViolationThrottler {
    config: ThrottleConfig,
    started_at: Instant,
    last_fired: Option<Instant>,
}

impl ViolationThrottler {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            started_at: Instant::now(),
            last_fired: None,
        }
    }

    /// Decide whether a signal observed now may fire.
    pub fn admit(&mut self) -> bool {
        self.admit_at(Instant::now())
    }

    /// Decide whether a signal observed at `now` may fire.
    ///
    /// The explicit timestamp exists so tests can replay signal sequences
    /// without sleeping; production code uses [`admit`].
    pub fn admit_at(&mut self, now: Instant) -> bool {
        let fire = match (self.config.mode, self.last_fired) {
            (_, None) => true,
            (ThrottleMode::Debounce, Some(last)) => {
                now.duration_since(last) >= self.config.min_interval
            }
            (ThrottleMode::Sample, Some(last)) => {
                self.window_index(now) > self.window_index(last)
            }
        };
        if fire {
            self.last_fired = Some(now);
        }
        fire
    }

    fn window_index(&self, at: Instant) -> u128 {
        let interval = self.config.min_interval.as_nanos().max(1);
        at.duration_since(self.started_at).as_nanos() / interval
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
