use glam::Vec4;

/// Scales four skin weights so their L1 (manhattan) sum is one.
///
/// A zero or non-finite sum cannot be normalized; the vertex is then bound
/// entirely to its first bone, `(1, 0, 0, 0)`.
#[must_use]
pub fn normalize_skin_weight(weights: Vec4) -> Vec4 {
    let sum = weights.abs().element_sum();
    if sum.is_finite() && sum != 0.0 {
        weights * (1.0 / sum)
    } else {
        Vec4::X
    }
}
