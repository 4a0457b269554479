//! Test helpers shared by unit tests, integration tests and benchmarks.
//!
//! Compiled for unit tests and behind the `test-util` feature.

pub mod scripted_client;

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::log_record::TimeProvider;

pub use scripted_client::{RecordedPut, ScriptedClient};

/// Hand-driven clock for deterministic flush-policy tests.
#[derive(Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock reading `start_ms`.
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by_ms: i64) {
        self.now_ms.fetch_add(by_ms, Ordering::SeqCst);
    }

    pub fn now(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    /// A [`TimeProvider`] reading this clock.
    pub fn provider(&self) -> TimeProvider {
        let now_ms = Arc::clone(&self.now_ms);
        Box::new(move || now_ms.load(Ordering::SeqCst))
    }
}
