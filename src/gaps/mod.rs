//! Per-station sequence gap tracking.
//!
//! A [`GapSet`] records which frame sequence numbers were never received as a
//! sorted set of disjoint inclusive ranges. Sequence numbers are compared
//! unsigned throughout. One set exists per station and has a single-writer
//! invariant: the receiving context mutates it, and periodic persistence
//! operates on a snapshot copy (see [`store::GapStore`]).
mod store;

pub use store::GapStore;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A contiguous inclusive range `[start, end]` of never-received sequence
/// numbers, stamped with its last modification time for expiration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapRange {
    pub start: u64,
    pub end: u64,
    pub modified: DateTime<Utc>,
}

/// The set of sequence gaps observed for one station.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapSet {
    min: u64,
    max: u64,
    seen_any: bool,
    gaps: Vec<GapRange>,
}

impl GapSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowest and highest sequence numbers received so far, or `None` before
    /// the first frame.
    #[must_use]
    pub fn bounds(&self) -> Option<(u64, u64)> {
        self.seen_any.then_some((self.min, self.max))
    }

    #[must_use]
    pub fn ranges(&self) -> &[GapRange] {
        &self.gaps
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.gaps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }

    /// Records a received sequence number, removing it from whichever gap
    /// currently contains it. Receiving the same number twice is a no-op the
    /// second time.
    pub fn record_received(&mut self, seq: u64) {
        if self.seen_any {
            self.min = self.min.min(seq);
            self.max = self.max.max(seq);
        } else {
            self.seen_any = true;
            self.min = seq;
            self.max = seq;
        }

        let Some(idx) = self
            .gaps
            .iter()
            .position(|g| g.start <= seq && seq <= g.end)
        else {
            return;
        };
        let now = Utc::now();
        let gap = self.gaps[idx];
        if gap.start == seq && gap.end == seq {
            self.gaps.remove(idx);
        } else if gap.start == seq {
            self.gaps[idx].start += 1;
            self.gaps[idx].modified = now;
        } else if gap.end == seq {
            self.gaps[idx].end -= 1;
            self.gaps[idx].modified = now;
        } else {
            // Split into two ranges around the received value.
            let upper = GapRange {
                start: seq + 1,
                end: gap.end,
                modified: now,
            };
            self.gaps[idx].end = seq - 1;
            self.gaps[idx].modified = now;
            self.gaps.insert(idx + 1, upper);
        }
    }

    /// Records the gap implied by jumping from `last` to `new`: when
    /// `new > last + 1` the skipped interval `[last + 1, new - 1]` becomes a
    /// gap, extending any existing ranges it overlaps or touches so the set
    /// stays sorted and disjoint. Contiguous or out-of-order pairs record
    /// nothing, as does an interval already covered by an existing gap.
    pub fn record_gap(&mut self, last: u64, new: u64) {
        if new <= last.saturating_add(1) {
            return;
        }
        let mut start = last + 1;
        let mut end = new - 1;

        // Merge the run of ranges overlapping or adjacent to [start, end].
        let lo = self.gaps.partition_point(|g| g.end.saturating_add(1) < start);
        let mut hi = lo;
        while hi < self.gaps.len() && self.gaps[hi].start <= end.saturating_add(1) {
            start = start.min(self.gaps[hi].start);
            end = end.max(self.gaps[hi].end);
            hi += 1;
        }
        let merged = GapRange {
            start,
            end,
            modified: Utc::now(),
        };
        self.gaps.splice(lo..hi, std::iter::once(merged));
    }

    /// Typical per-frame entry point: records the gap up from the current
    /// maximum, then the received number itself.
    pub fn observe(&mut self, seq: u64) {
        if self.seen_any && seq > self.max {
            self.record_gap(self.max, seq);
        }
        self.record_received(seq);
    }

    /// Drops gaps last modified before the retention window ending at `now`.
    /// A retention of zero or below disables expiration entirely.
    pub fn expire(&mut self, now: DateTime<Utc>, retention_days: i64) {
        if retention_days <= 0 {
            return;
        }
        let cutoff = now - Duration::days(retention_days);
        self.gaps.retain(|g| g.modified >= cutoff);
    }
}
