use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Source of the current time for token issuance and expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Second precision.
#[derive(Debug)]
pub struct ManualClock {
    secs: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            secs: AtomicI64::new(start.timestamp()),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.secs.store(at.timestamp(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.secs.fetch_add(by.num_seconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.secs.load(Ordering::SeqCst), 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}
