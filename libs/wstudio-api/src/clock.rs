use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Millisecond timestamp source for record keys.
///
/// Issues `max(now_ms, last + 1)`: two writes landing in the same
/// millisecond still get distinct keys.
#[derive(Debug, Default)]
pub struct EventClock {
    last_ms: AtomicI64,
}

impl EventClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_ms(&self) -> i64 {
        self.next_after(wall_clock_ms())
    }

    fn next_after(&self, now_ms: i64) -> i64 {
        let mut prev = self.last_ms.load(Ordering::Relaxed);
        loop {
            let next = now_ms.max(prev + 1);
            match self
                .last_ms
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Wall clock in ms since the Unix epoch; 0 if the clock is before it.
pub fn wall_clock_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
