//! Time helpers.
//!
//! The scene runtime's `t` parameter (§4.1.1) is an application-supplied
//! `f64` seconds value, unrelated to wall-clock time; this module only
//! covers the wall-clock side: monotonic timestamps for the GPU timer query
//! (§4.1.1) and frame pacing diagnostics.

use std::time::{Duration, Instant};

#[derive(Copy, Clone, Debug)]
pub struct Timestamp(Instant);

impl Timestamp {
    pub fn now() -> Self {
        Timestamp(Instant::now())
    }

    pub fn elapsed_ns(&self, since: Timestamp) -> u64 {
        self.0.saturating_duration_since(since.0).as_nanos() as u64
    }
}

/// A monotonically increasing per-frame identifier, minted once per
/// `begin_update`/`begin_draw` pair (§9 Design Notes: "replace `visit_time`
/// with an integer frame counter").
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FrameId(pub u64);

#[derive(Default)]
pub struct FrameClock {
    next: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        FrameClock::default()
    }

    pub fn tick(&mut self) -> FrameId {
        let id = FrameId(self.next);
        self.next += 1;
        id
    }
}

pub fn duration_to_ns(d: Duration) -> u64 {
    d.as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_clock_increments() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick(), FrameId(0));
        assert_eq!(clock.tick(), FrameId(1));
    }
}
