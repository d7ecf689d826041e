//! Bucketed reductions over stored points
//!
//! ```text
//! start                                                   end
//!   |---- bucket 0 ----|---- bucket 1 ----|-- bucket 2 --|
//!   ^ point stamped    ^                  ^  (last bucket may be shorter)
//! ```
//!
//! Bad points are removed first. Each bucket emits one `Double` point at its
//! start (two for min/max), or a bad `NaN` point if it holds no values.

use super::error::{SeriesError, SeriesResult};
use super::interpolation::bad_point;
use super::types::{ReductionMode, SampledPoint, Value};

/// Upper bound on emitted buckets for a single reduction
pub const MAX_BUCKETS: u128 = 10_000_000;

/// Running statistics for one bucket
#[derive(Debug, Default)]
struct Bucket {
    count: usize,
    sum: f64,
    min: f64,
    max: f64,
}

impl Bucket {
    fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.sum += value;
        self.count += 1;
    }

    fn emit(&self, timestamp: i64, mode: ReductionMode, out: &mut Vec<SampledPoint>) {
        if self.count == 0 {
            out.push(bad_point(timestamp));
            return;
        }
        let double = |v: f64| SampledPoint::good(timestamp, Value::Double(v));
        match mode {
            ReductionMode::Average => out.push(double(self.sum / self.count as f64)),
            ReductionMode::Minimum => out.push(double(self.min)),
            ReductionMode::Maximum => out.push(double(self.max)),
            ReductionMode::MinMax => {
                out.push(double(self.min));
                out.push(double(self.max));
            }
            ReductionMode::None => {}
        }
    }
}

/// Reduce time-ordered points of `[start, end)` into buckets of `width` ms.
///
/// `points` must already be restricted to the range and sorted by time.
pub fn reduce<'a, I>(
    points: I,
    start: i64,
    end: i64,
    width: i64,
    mode: ReductionMode,
) -> SeriesResult<Vec<SampledPoint>>
where
    I: IntoIterator<Item = &'a SampledPoint>,
{
    if width <= 0 || start > end {
        return Err(SeriesError::InvalidInterval { start, end, width });
    }

    let good: Vec<&SampledPoint> = points.into_iter().filter(|p| p.is_good()).collect();
    if good.is_empty() {
        return Ok(Vec::new());
    }
    if mode == ReductionMode::None {
        return Ok(good.into_iter().cloned().collect());
    }

    let span = end as i128 - start as i128;
    let buckets = (span + width as i128 - 1) / width as i128;
    if buckets as u128 > MAX_BUCKETS {
        return Err(SeriesError::TooManyBuckets {
            requested: buckets as u128,
            limit: MAX_BUCKETS,
        });
    }

    let mut out = Vec::with_capacity((buckets as usize).min(4096));
    let mut remaining = good.into_iter().peekable();
    let mut bucket_start = start;

    while bucket_start < end {
        let bucket_end = bucket_start.saturating_add(width).min(end);
        let mut bucket = Bucket::default();

        while let Some(point) = remaining.next_if(|p| p.timestamp < bucket_end) {
            if let Some(v) = point.value.as_f64() {
                bucket.push(v);
            }
        }
        bucket.emit(bucket_start, mode, &mut out);

        if bucket_end == end {
            break;
        }
        bucket_start = bucket_end;
    }

    Ok(out)
}
