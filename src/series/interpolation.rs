//! Interpolation between neighbouring points
//!
//! Called for timestamps without a stored point. `prev` and `next` are the
//! closest stored points strictly before and after `t`.

use tracing::debug;

use super::types::{InterpolationMode, Quality, SampledPoint, Value};

/// Derive the value at `t` from its neighbours under the given mode
pub fn interpolate(
    mode: InterpolationMode,
    prev: Option<&SampledPoint>,
    next: Option<&SampledPoint>,
    t: i64,
) -> Option<SampledPoint> {
    match mode {
        InterpolationMode::None => None,
        InterpolationMode::Steps => prev.map(|p| p.restamped(t)),
        InterpolationMode::Nearest => nearest(prev, next, t),
        InterpolationMode::Linear => {
            let (p, n) = (prev?, next?);
            linear(p, n, t)
        }
    }
}

fn nearest(prev: Option<&SampledPoint>, next: Option<&SampledPoint>, t: i64) -> Option<SampledPoint> {
    let chosen = match (prev, next) {
        (Some(p), Some(n)) => {
            let to_prev = t as i128 - p.timestamp as i128;
            let to_next = n.timestamp as i128 - t as i128;
            if to_next <= to_prev {
                n
            } else {
                p
            }
        }
        (Some(p), None) => p,
        (None, Some(n)) => n,
        (None, None) => return None,
    };
    Some(chosen.restamped(t))
}

fn linear(prev: &SampledPoint, next: &SampledPoint, t: i64) -> Option<SampledPoint> {
    let span = next.timestamp as i128 - prev.timestamp as i128;
    if span <= 0 {
        return None;
    }
    let fraction = (t as i128 - prev.timestamp as i128) as f64 / span as f64;
    let quality = prev.quality.combine(next.quality);

    match lerp(&prev.value, &next.value, fraction) {
        Some(value) => Some(SampledPoint::new(t, value, quality)),
        None => {
            debug!(
                "Cannot interpolate linearly between {} and {} values",
                prev.value.kind(),
                next.value.kind()
            );
            None
        }
    }
}

/// Linear blend of two numeric values in the arithmetic of their kind
pub(crate) fn lerp(a: &Value, b: &Value, fraction: f64) -> Option<Value> {
    let value = match (a, b) {
        (Value::Float(a), Value::Float(b)) => Value::Float(a + (b - a) * fraction as f32),
        (Value::Double(a), Value::Double(b)) => Value::Double(a + (b - a) * fraction),
        (Value::Integer(a), Value::Integer(b)) => {
            let delta = (*b as i64 - *a as i64) as f64 * fraction;
            Value::Integer((*a as i64 + delta as i64) as i32)
        }
        (Value::Long(a), Value::Long(b)) => {
            let delta = (*b as i128 - *a as i128) as f64 * fraction;
            Value::Long(a.saturating_add(delta as i64))
        }
        (a, b) => {
            let (a, b) = (a.as_f64()?, b.as_f64()?);
            Value::Double(a + (b - a) * fraction)
        }
    };
    Some(value)
}

/// Point returned when no value is defined at `t`
pub(crate) fn bad_point(t: i64) -> SampledPoint {
    SampledPoint::new(t, Value::Double(f64::NAN), Quality::Bad)
}
