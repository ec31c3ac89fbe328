//! The shared time source the lookup/iterate expiry filter and the reaper
//! read from (spec §4.4a: "read from the shared monotonic time source,
//! `ioloop_time`-equivalent"). Abstracted so tests can pin a value instead
//! of racing the wall clock.

use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock {
    fn now_epoch_secs(&self) -> i64;
    fn now_epoch_micros(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is after the epoch")
            .as_secs() as i64
    }

    fn now_epoch_micros(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is after the epoch")
            .as_micros() as i64
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    pub secs: i64,
}

impl Clock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.secs
    }

    fn now_epoch_micros(&self) -> i64 {
        self.secs * 1_000_000
    }
}
