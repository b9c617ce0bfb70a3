use core::cmp::Ordering;

/// Stable sort key for siblings.
///
/// Ordering rules:
/// 1) explicit `z` index: ascending (back-to-front)
/// 2) fractional index: ascending; absent compares as `0.0`
/// 3) `seq`: insertion sequence, ensuring stable ordering
#[derive(Debug, Copy, Clone)]
pub struct SortKey {
    /// Explicit z-layer. Lower values are drawn first (further back).
    pub z: i32,
    /// Fractional ordering key used by collaborative reordering; sits
    /// between the z-layer and insertion order.
    pub fractional: Option<f64>,
    /// Insertion sequence within the same parent.
    pub seq: u64,
}

impl SortKey {
    #[inline]
    pub const fn new(z: i32, fractional: Option<f64>, seq: u64) -> Self {
        Self { z, fractional, seq }
    }

    #[inline]
    fn fractional_or_zero(self) -> f64 {
        self.fractional.unwrap_or(0.0)
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.z
            .cmp(&other.z)
            .then_with(|| self.fractional_or_zero().total_cmp(&other.fractional_or_zero()))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z_dominates_fractional_and_seq() {
        let a = SortKey::new(1, Some(9.0), 99);
        let b = SortKey::new(2, Some(0.0), 0);
        assert!(a < b);
    }

    #[test]
    fn fractional_breaks_z_ties() {
        let a = SortKey::new(0, Some(0.25), 5);
        let b = SortKey::new(0, Some(0.5), 1);
        assert!(a < b);
    }

    #[test]
    fn seq_breaks_full_ties() {
        let a = SortKey::new(0, None, 1);
        let b = SortKey::new(0, None, 2);
        assert!(a < b);
    }

    #[test]
    fn missing_fractional_compares_as_zero() {
        let a = SortKey::new(0, None, 9);
        let b = SortKey::new(0, Some(-0.1), 1);
        let c = SortKey::new(0, Some(0.1), 1);
        assert!(b < a);
        assert!(a < c);
    }
}
