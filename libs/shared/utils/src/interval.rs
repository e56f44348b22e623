//! Half-open interval arithmetic shared by the scheduling cells.

/// Two half-open intervals `[start_a, end_a)` and `[start_b, end_b)` overlap
/// iff `start_a < end_b && start_b < end_a`. Touching endpoints do not overlap.
pub fn intervals_overlap<T: PartialOrd>(start_a: T, end_a: T, start_b: T, end_b: T) -> bool {
    start_a < end_b && start_b < end_a
}

/// `[inner_start, inner_end)` lies entirely inside `[outer_start, outer_end)`.
pub fn interval_contains<T: PartialOrd>(outer_start: T, outer_end: T, inner_start: T, inner_end: T) -> bool {
    outer_start <= inner_start && inner_end <= outer_end
}
