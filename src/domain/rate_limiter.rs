//! Request spacing shared by every fetch worker.
//!
//! The provider enforces one global request budget, so admission is serialized:
//! each caller reserves the next free slot under the lock, then sleeps outside
//! it until the slot arrives.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RateLimiter {
    spacing: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            next_slot: Mutex::new(None),
        }
    }

    /// Claim the next admission instant without waiting for it.
    pub fn reserve(&self) -> Instant {
        let now = Instant::now();
        let mut next = self.next_slot.lock();
        let slot = match *next {
            Some(at) if at > now => at,
            _ => now,
        };
        *next = Some(slot + self.spacing);
        slot
    }

    /// Block until this caller is admitted.
    pub fn acquire(&self) {
        let slot = self.reserve();
        let now = Instant::now();
        if slot > now {
            std::thread::sleep(slot - now);
        }
    }
}
