//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use apisec_sampling::clock::Clock;
use parking_lot::{Condvar, Mutex};

/// Epoch offset used by every test clock.
pub const START_SECS: u64 = 1_700_000_000;

/// A clock that worker threads can follow step by step.
///
/// The driver calls [`LockstepClock::advance`]; workers block in
/// [`LockstepClock::wait_until`] until the clock has reached the round they
/// are about to run.
#[derive(Debug)]
pub struct LockstepClock {
    secs: Mutex<u64>,
    ticked: Condvar,
}

impl LockstepClock {
    pub fn new() -> Arc<Self> {
        Arc::new(LockstepClock {
            secs: Mutex::new(START_SECS),
            ticked: Condvar::new(),
        })
    }

    pub fn secs(&self) -> u64 {
        *self.secs.lock()
    }

    pub fn advance(&self, secs: u64) {
        let mut now = self.secs.lock();
        *now += secs;
        self.ticked.notify_all();
    }

    pub fn wait_until(&self, secs: u64) {
        let mut now = self.secs.lock();
        while *now < secs {
            self.ticked.wait(&mut now);
        }
    }
}

impl Clock for LockstepClock {
    fn now(&self) -> Duration {
        Duration::from_secs(*self.secs.lock())
    }
}
