//! Ordered point store and the range mutation primitives
//!
//! Points are keyed by timestamp, so a second write at the same timestamp
//! overwrites the first. All range operations use half-open `[start, end)`
//! semantics through `TimeRange`.

use std::collections::BTreeMap;
use std::ops::Bound;

use super::types::{SampledPoint, TimeRange};

/// Time-ordered set of sampled points with unique timestamps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointStore {
    points: BTreeMap<i64, SampledPoint>,
}

impl PointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the point at its timestamp
    pub fn insert(&mut self, point: SampledPoint) {
        self.points.insert(point.timestamp, point);
    }

    /// Insert several points; later duplicates win
    pub fn insert_many<I>(&mut self, points: I)
    where
        I: IntoIterator<Item = SampledPoint>,
    {
        for point in points {
            self.insert(point);
        }
    }

    /// Remove all points in the range, returning how many were removed
    pub fn delete(&mut self, range: TimeRange) -> usize {
        if range.is_empty() {
            return 0;
        }
        if range.start == i64::MIN && range.is_unbounded() {
            let removed = self.points.len();
            self.points.clear();
            return removed;
        }

        let mut tail = self.points.split_off(&range.start);
        let mut rest = if range.is_unbounded() {
            BTreeMap::new()
        } else {
            tail.split_off(&range.end)
        };
        let removed = tail.len();
        self.points.append(&mut rest);
        removed
    }

    /// Delete the range then insert the points that fall inside it.
    ///
    /// Returns the number of points dropped for lying outside the range.
    pub fn replace<I>(&mut self, range: TimeRange, points: I) -> usize
    where
        I: IntoIterator<Item = SampledPoint>,
    {
        self.delete(range);
        let mut dropped = 0;
        for point in points {
            if range.contains(point.timestamp) {
                self.insert(point);
            } else {
                dropped += 1;
            }
        }
        dropped
    }

    /// Remove every point strictly before `end`
    pub fn delete_before(&mut self, end: i64) -> usize {
        let rest = self.points.split_off(&end);
        let removed = self.points.len();
        self.points = rest;
        removed
    }

    /// Move every point by `delta` milliseconds.
    ///
    /// Points whose new timestamp would overflow are discarded; the count of
    /// discarded points is returned.
    pub fn shift(&mut self, delta: i64) -> usize {
        if delta == 0 {
            return 0;
        }
        let old = std::mem::take(&mut self.points);
        let mut discarded = 0;
        for (timestamp, point) in old {
            match timestamp.checked_add(delta) {
                Some(shifted) => {
                    self.points.insert(shifted, point.restamped(shifted));
                }
                None => discarded += 1,
            }
        }
        discarded
    }

    pub fn get(&self, timestamp: i64) -> Option<&SampledPoint> {
        self.points.get(&timestamp)
    }

    /// Last point with `timestamp <= t`
    pub fn floor(&self, t: i64) -> Option<&SampledPoint> {
        self.points.range(..=t).next_back().map(|(_, p)| p)
    }

    /// First point with `timestamp >= t`
    pub fn ceiling(&self, t: i64) -> Option<&SampledPoint> {
        self.points.range(t..).next().map(|(_, p)| p)
    }

    /// Last point with `timestamp < t`
    pub fn before(&self, t: i64) -> Option<&SampledPoint> {
        self.points.range(..t).next_back().map(|(_, p)| p)
    }

    /// First point with `timestamp > t`
    pub fn after(&self, t: i64) -> Option<&SampledPoint> {
        self.points
            .range((Bound::Excluded(t), Bound::Unbounded))
            .next()
            .map(|(_, p)| p)
    }

    /// Points in the range, in time order
    pub fn range(&self, range: TimeRange) -> impl Iterator<Item = &SampledPoint> + '_ {
        let inner = if range.is_empty() {
            None
        } else {
            Some(self.points.range(range.bounds()).map(|(_, p)| p))
        };
        inner.into_iter().flatten()
    }

    /// First point strictly after `cursor` and inside `range`
    pub(crate) fn next_after(&self, cursor: Option<i64>, range: TimeRange) -> Option<&SampledPoint> {
        if range.is_empty() {
            return None;
        }
        let lower = match cursor {
            Some(t) if t >= range.start => Bound::Excluded(t),
            _ => Bound::Included(range.start),
        };
        let (_, upper) = range.bounds();
        if let (Bound::Excluded(l), Bound::Excluded(u)) = (lower, upper) {
            if l >= u {
                return None;
            }
        }
        self.points.range((lower, upper)).next().map(|(_, p)| p)
    }

    pub fn count_in(&self, range: TimeRange) -> usize {
        self.range(range).count()
    }

    pub fn is_empty_in(&self, range: TimeRange) -> bool {
        self.range(range).next().is_none()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SampledPoint> + '_ {
        self.points.values()
    }
}
