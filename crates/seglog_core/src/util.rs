//! Alignment helpers for log managers sizing segments.

/// Rounds `value` down to the nearest multiple of `step`.
///
/// `nearest_multiple(9, 4) == 8`. A `step` of zero asks for no alignment
/// and returns `value` unchanged.
#[must_use]
pub const fn nearest_multiple(value: u64, step: u64) -> u64 {
    if step == 0 {
        return value;
    }
    (value / step) * step
}
