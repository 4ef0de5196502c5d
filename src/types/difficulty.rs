//! Unbounded total-difficulty arithmetic.
//!
//! Total difficulty is the cumulative proof-of-work weight of a chain from
//! genesis. It grows without bound over the life of a chain, so it is backed
//! by a big integer rather than a fixed-width word.

use num_bigint::BigUint;
use std::fmt;
use std::sync::RwLock;

/// Cumulative proof-of-work weight of a chain.
///
/// Ordering follows plain integer ordering: a higher value means a heavier,
/// and therefore preferable, chain.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Difficulty(BigUint);

impl Difficulty {
    /// The zero difficulty, used as the initial watermark value.
    pub fn zero() -> Difficulty {
        Difficulty(BigUint::default())
    }

    /// Returns true when `other` is within 20 percent above `self`.
    ///
    /// Computed as `other <= self + self / 5` in integer arithmetic. The
    /// check is deliberately one-sided: it answers "is that chain close
    /// enough to the one we already track that switching is not worth it",
    /// so only the upward band matters. Any value below `self` is inside
    /// the band.
    pub fn in_20_percent_range(&self, other: &Difficulty) -> bool {
        other.0 <= &self.0 + &self.0 / 5u32
    }
}

impl From<u64> for Difficulty {
    fn from(value: u64) -> Self {
        Difficulty(BigUint::from(value))
    }
}

impl From<BigUint> for Difficulty {
    fn from(value: BigUint) -> Self {
        Difficulty(value)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically non-decreasing difficulty level shared between threads.
///
/// Both process-wide watermarks (the useful-difficulty floor and the highest
/// difficulty ever observed) only ever move up. Putting the guard inside the
/// type means no call site can lower them by accident.
pub struct Watermark {
    level: RwLock<Difficulty>,
}

impl Watermark {
    /// Creates a watermark at zero.
    pub fn new() -> Watermark {
        Watermark {
            level: RwLock::new(Difficulty::zero()),
        }
    }

    /// Returns the current level.
    pub fn get(&self) -> Difficulty {
        self.level.read().unwrap().clone()
    }

    /// Raises the level to `candidate` if it is higher; lower values are
    /// ignored. Returns true when the level actually moved.
    pub fn raise_to(&self, candidate: &Difficulty) -> bool {
        let mut level = self.level.write().unwrap();
        if *candidate > *level {
            *level = candidate.clone();
            true
        } else {
            false
        }
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Watermark::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(value: u64) -> Difficulty {
        Difficulty::from(value)
    }

    #[test]
    fn ordering_follows_integers() {
        assert!(d(10) < d(11));
        assert!(d(1000) > d(999));
        assert_eq!(d(42), d(42));
    }

    #[test]
    fn band_boundary_at_exactly_20_percent() {
        // 120 == 100 + 100/5, still inside
        assert!(d(100).in_20_percent_range(&d(120)));
        // one past the boundary falls outside
        assert!(!d(100).in_20_percent_range(&d(121)));
    }

    #[test]
    fn band_is_one_sided() {
        // anything at or below the base is inside
        assert!(d(100).in_20_percent_range(&d(100)));
        assert!(d(100).in_20_percent_range(&d(1)));
        assert!(d(100).in_20_percent_range(&Difficulty::zero()));
    }

    #[test]
    fn band_uses_integer_division() {
        // 7/5 == 1, so the band above 7 ends at 8
        assert!(d(7).in_20_percent_range(&d(8)));
        assert!(!d(7).in_20_percent_range(&d(9)));
    }

    #[test]
    fn watermark_never_decreases() {
        let mark = Watermark::new();
        assert!(mark.raise_to(&d(100)));
        assert!(!mark.raise_to(&d(50)));
        assert_eq!(mark.get(), d(100));
        assert!(mark.raise_to(&d(101)));
        assert_eq!(mark.get(), d(101));
    }

    #[test]
    fn watermark_ignores_equal_level() {
        let mark = Watermark::new();
        mark.raise_to(&d(10));
        assert!(!mark.raise_to(&d(10)));
    }
}
