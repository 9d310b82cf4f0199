//! Lookup counters for the geocoder client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::geocoder::LookupOutcome;

/// Counters for geocoder lookups, shared across jobs.
#[derive(Debug)]
pub struct LookupStats {
    started: Instant,
    requests: AtomicU64,
    matched: AtomicU64,
    no_result: AtomicU64,
    unavailable: AtomicU64,
    total_latency_us: AtomicU64,
}

impl LookupStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            requests: AtomicU64::new(0),
            matched: AtomicU64::new(0),
            no_result: AtomicU64::new(0),
            unavailable: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
        }
    }

    /// Record one finished lookup and how long it took.
    pub fn record(&self, outcome: &LookupOutcome, latency: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.total_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);

        let counter = match outcome {
            LookupOutcome::Matched(_) => &self.matched,
            LookupOutcome::NoResult => &self.no_result,
            LookupOutcome::Unavailable(_) => &self.unavailable,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough copy of the counters.
    pub fn snapshot(&self) -> LookupStatsSnapshot {
        let requests = self.requests.load(Ordering::Relaxed);
        let total_latency_us = self.total_latency_us.load(Ordering::Relaxed);

        LookupStatsSnapshot {
            requests,
            matched: self.matched.load(Ordering::Relaxed),
            no_result: self.no_result.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            average_latency: if requests > 0 {
                Duration::from_micros(total_latency_us / requests)
            } else {
                Duration::ZERO
            },
            uptime: self.started.elapsed(),
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.matched.store(0, Ordering::Relaxed);
        self.no_result.store(0, Ordering::Relaxed);
        self.unavailable.store(0, Ordering::Relaxed);
        self.total_latency_us.store(0, Ordering::Relaxed);
    }
}

impl Default for LookupStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`LookupStats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LookupStatsSnapshot {
    /// Lookups attempted
    pub requests: u64,
    /// Lookups that returned a feature
    pub matched: u64,
    /// Lookups answered with zero features
    pub no_result: u64,
    /// Lookups that failed (timeout, transport, status, payload)
    pub unavailable: u64,
    /// Mean lookup latency
    pub average_latency: Duration,
    /// Time since the counters were created
    pub uptime: Duration,
}

impl LookupStatsSnapshot {
    /// Share of lookups that could not reach a usable answer.
    pub fn unavailable_ratio(&self) -> f64 {
        if self.requests > 0 {
            self.unavailable as f64 / self.requests as f64
        } else {
            0.0
        }
    }

    /// Lookups per second since creation.
    pub fn requests_per_second(&self) -> f64 {
        if self.uptime.as_secs_f64() > 0.0 {
            self.requests as f64 / self.uptime.as_secs_f64()
        } else {
            0.0
        }
    }
}
