//! Quorum arithmetic
//!
//! The threshold formula is kept bit-compatible with existing deployments:
//!
//! ```text
//! supermajority(n) = ⌊2n/3⌋ + 1   if n is even or n == 1
//!                  = ⌊2n/3⌋       otherwise
//! ```
//!
//! Note that small networks get unusual thresholds (n = 2 requires both
//! participants, n = 3 only two).

/// Every `COIN_ROUND_FREQUENCY`-th voting round falls back to a coin flip
/// when no supermajority forms.
pub const COIN_ROUND_FREQUENCY: u64 = 10;

/// Supermajority threshold for a set of `n` members.
pub fn supermajority(n: usize) -> usize {
    let base = 2 * n / 3;
    if n % 2 == 0 || n == 1 {
        base + 1
    } else {
        base
    }
}

/// Whether `count` reaches the supermajority of `n`.
pub fn is_supermajority(count: usize, n: usize) -> bool {
    count >= supermajority(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supermajority_reference_values() {
        assert_eq!(supermajority(4), 3);
        assert_eq!(supermajority(10), 7);
        assert_eq!(supermajority(3), 2);
    }

    #[test]
    fn test_supermajority_small_sets() {
        assert_eq!(supermajority(0), 1);
        assert_eq!(supermajority(1), 1);
        assert_eq!(supermajority(2), 2);
        assert_eq!(supermajority(5), 3);
        assert_eq!(supermajority(7), 4);
    }

    #[test]
    fn test_is_supermajority() {
        assert!(is_supermajority(3, 4));
        assert!(!is_supermajority(2, 4));
        assert!(is_supermajority(2, 3));
    }

    proptest::proptest! {
        #[test]
        fn test_threshold_never_exceeds_set(n in 1usize..500) {
            proptest::prop_assert!(supermajority(n) <= n);
            proptest::prop_assert!(supermajority(n) * 3 >= 2 * n - 2);
        }
    }
}
