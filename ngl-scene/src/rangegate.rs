//! Render-range gating (§4.4.3, Testable Property #6, Scenario D).
//!
//! A render-capable node may carry a sorted list of one-shot markers; at
//! `update(t)` the effective gate is the marker found by `upper_bound(t) -
//! 1`. `t` before the first marker is NORENDER — a decided Open Question
//! (see DESIGN.md), matching the reference engine's treatment of an
//! unmatched `upper_bound` as "before range".

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RangeKind {
    Continuous,
    NoRender,
}

#[derive(Copy, Clone, Debug)]
pub struct RangeMarker {
    pub kind: RangeKind,
    pub start_time: f64,
}

#[derive(Debug, Default)]
pub struct RangeList {
    markers: Vec<RangeMarker>,
}

impl RangeList {
    pub fn new() -> Self {
        RangeList { markers: Vec::new() }
    }

    /// Appends a marker. Debug-asserts the strictly-increasing `start_time`
    /// invariant (Testable Property #6); scene authoring is expected to
    /// already hand markers in order, so a release build just keeps the
    /// list as given rather than erroring.
    pub fn push(&mut self, kind: RangeKind, start_time: f64) {
        if let Some(last) = self.markers.last() {
            debug_assert!(
                start_time > last.start_time,
                "range markers must have strictly increasing start_time: {start_time} after {}",
                last.start_time
            );
        }
        self.markers.push(RangeMarker { kind, start_time });
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// The gate in effect at time `t`. No ranges at all means "always on";
    /// otherwise `t` before the first marker's `start_time` is NORENDER.
    pub fn gate_at(&self, t: f64) -> RangeKind {
        if self.markers.is_empty() {
            return RangeKind::Continuous;
        }
        // One past the last marker with start_time <= t, i.e. upper_bound(t);
        // the active marker is the one just before it.
        let idx = self.markers.partition_point(|m| m.start_time <= t);
        if idx == 0 {
            RangeKind::NoRender
        } else {
            self.markers[idx - 1].kind
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_before_first_marker_is_norender() {
        let ranges = RangeList::new();
        assert_eq!(ranges.gate_at(5.0), RangeKind::Continuous);

        let mut ranges = RangeList::new();
        ranges.push(RangeKind::Continuous, 1.0);
        assert_eq!(ranges.gate_at(0.5), RangeKind::NoRender);
        assert_eq!(ranges.gate_at(1.0), RangeKind::Continuous);
    }

    /// Scenario D.
    #[test]
    fn scenario_d_norender_continuous_norender() {
        let mut ranges = RangeList::new();
        ranges.push(RangeKind::NoRender, 0.0);
        ranges.push(RangeKind::Continuous, 1.0);
        ranges.push(RangeKind::NoRender, 3.0);

        assert_eq!(ranges.gate_at(0.5), RangeKind::NoRender);
        assert_eq!(ranges.gate_at(2.0), RangeKind::Continuous);
        assert_eq!(ranges.gate_at(4.0), RangeKind::NoRender);
    }

    #[test]
    fn monotonicity_violation_is_debug_asserted() {
        let result = std::panic::catch_unwind(|| {
            let mut ranges = RangeList::new();
            ranges.push(RangeKind::Continuous, 2.0);
            ranges.push(RangeKind::NoRender, 1.0);
        });
        if cfg!(debug_assertions) {
            assert!(result.is_err());
        }
    }
}
