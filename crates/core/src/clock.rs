// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling.
//!
//! Two views of time are needed: monotonic instants for durations and
//! timeouts, and wall-clock UTC for schedule math and state file stamps.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A clock that provides the current time
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic instant, for measuring elapsed time.
    fn now(&self) -> Instant;
    /// Wall-clock time in UTC, for schedules and persisted stamps.
    fn utc(&self) -> DateTime<Utc>;
}

/// Real system clock
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fake clock for testing with controllable time
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<FakeClockState>>,
}

struct FakeClockState {
    current: Instant,
    utc: DateTime<Utc>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeClockState {
                current: Instant::now(),
                // A fixed, recognizable default so stamps are deterministic.
                utc: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap_or_default(),
            })),
        }
    }

    /// Advance both views of time by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut state = self.inner.lock();
        state.current += duration;
        state.utc += chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
    }

    /// Set the wall-clock time
    pub fn set_utc(&self, utc: DateTime<Utc>) {
        self.inner.lock().utc = utc;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.inner.lock().current
    }

    fn utc(&self) -> DateTime<Utc> {
        self.inner.lock().utc
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
