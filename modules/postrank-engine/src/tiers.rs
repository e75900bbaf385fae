//! Ordered "highest threshold wins" lookups.
//!
//! Each scoring rule is a descending list of tiers. The first tier whose bound
//! matches awards its points; lower tiers are never added on top.

/// Upper limit of both composite scores.
pub const MAX_SCORE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    /// `value >= threshold`
    AtLeast(f64),
    /// `value > threshold`
    Above(f64),
    /// `value < threshold`
    Below(f64),
}

impl Bound {
    pub fn matches(self, value: f64) -> bool {
        match self {
            Bound::AtLeast(t) => value >= t,
            Bound::Above(t) => value > t,
            Bound::Below(t) => value < t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tier {
    pub bound: Bound,
    pub points: f64,
}

impl Tier {
    pub const fn at_least(threshold: f64, points: f64) -> Self {
        Self {
            bound: Bound::AtLeast(threshold),
            points,
        }
    }

    pub const fn above(threshold: f64, points: f64) -> Self {
        Self {
            bound: Bound::Above(threshold),
            points,
        }
    }

    pub const fn below(threshold: f64, points: f64) -> Self {
        Self {
            bound: Bound::Below(threshold),
            points,
        }
    }
}

/// Points of the first matching tier, or 0.
pub fn award(value: f64, tiers: &[Tier]) -> f64 {
    tiers
        .iter()
        .find(|t| t.bound.matches(value))
        .map_or(0.0, |t| t.points)
}

/// `award` for integer counts.
pub fn award_count(count: u32, tiers: &[Tier]) -> f64 {
    award(f64::from(count), tiers)
}

/// Clamp a sub-score into `[0, cap]`.
pub fn cap(points: f64, cap: f64) -> f64 {
    points.clamp(0.0, cap)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Final clamp applied to both composites. NaN collapses to 0.
pub fn finalize(raw: f64) -> f64 {
    if raw.is_nan() {
        return 0.0;
    }
    round2(raw.clamp(0.0, MAX_SCORE))
}

/// Zero-denominator-safe ratio: `0 / 0 == 0`.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator <= 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}
