// ============================================================================
// Simulation Clock
// Wall-clock elapsed time scaled by a configurable speed multiplier
// ============================================================================

use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Per-run simulation clock.
///
/// Converts wall-clock elapsed time into simulated milliseconds using a
/// speed multiplier (speed 2 means one real second advances the
/// simulation by two seconds), and produces simulation timestamps
/// relative to a configured session base time. Every market worker gets a
/// clone; order eligibility and batch-auction scheduling are both driven
/// from here.
///
/// A manual source is available so eligibility and auction-tick logic can
/// be tested without depending on real time.
#[derive(Clone)]
pub struct SimClock {
    inner: Arc<ClockSource>,
}

enum ClockSource {
    Wall {
        started: Instant,
        speed: u32,
        base: DateTime<Utc>,
    },
    Manual {
        now_ms: AtomicI64,
        base: DateTime<Utc>,
    },
}

impl SimClock {
    /// Wall-clock-driven simulation starting now.
    pub fn start(speed: u32) -> Self {
        Self::start_at(Utc::now(), speed)
    }

    /// Wall-clock-driven simulation with an explicit session base time
    /// (all simulation timestamps are offsets from it).
    pub fn start_at(base: DateTime<Utc>, speed: u32) -> Self {
        Self {
            inner: Arc::new(ClockSource::Wall {
                started: Instant::now(),
                speed,
                base,
            }),
        }
    }

    /// Manually driven clock, frozen at 0 simulated milliseconds.
    pub fn manual() -> Self {
        Self::manual_at(Utc::now())
    }

    pub fn manual_at(base: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(ClockSource::Manual {
                now_ms: AtomicI64::new(0),
                base,
            }),
        }
    }

    /// Simulated milliseconds elapsed since the session started.
    pub fn sim_elapsed_ms(&self) -> i64 {
        match &*self.inner {
            ClockSource::Wall { started, speed, .. } => {
                started.elapsed().as_millis() as i64 * i64::from(*speed)
            },
            ClockSource::Manual { now_ms, .. } => now_ms.load(Ordering::Acquire),
        }
    }

    /// Simulation timestamp for reports and book records.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match &*self.inner {
            ClockSource::Wall { started, speed, base } => {
                let micros = started.elapsed().as_micros() as i64 * i64::from(*speed);
                *base + Duration::microseconds(micros)
            },
            ClockSource::Manual { now_ms, base } => {
                *base + Duration::milliseconds(now_ms.load(Ordering::Acquire))
            },
        }
    }

    /// Advance a manual clock by `delta_ms` simulated milliseconds.
    pub fn advance_ms(&self, delta_ms: i64) {
        match &*self.inner {
            ClockSource::Manual { now_ms, .. } => {
                now_ms.fetch_add(delta_ms, Ordering::AcqRel);
            },
            ClockSource::Wall { .. } => {
                debug_assert!(false, "advance_ms called on a wall clock");
            },
        }
    }

    /// Set a manual clock to an absolute simulated instant.
    pub fn set_elapsed_ms(&self, elapsed_ms: i64) {
        match &*self.inner {
            ClockSource::Manual { now_ms, .. } => {
                now_ms.store(elapsed_ms, Ordering::Release);
            },
            ClockSource::Wall { .. } => {
                debug_assert!(false, "set_elapsed_ms called on a wall clock");
            },
        }
    }
}
