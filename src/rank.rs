//! Mapping between a container byte budget and the factorization rank.

use crate::codec::{CHANNELS, FLOAT_BYTES, HEADER_BYTES};
use crate::{ImsvdError, Result};

/// Largest rank whose container fits in `desired` bytes.
///
/// No upper bound is applied: a budget larger than the full-rank container
/// yields `k > min(height, width)`, and clamping is the caller's job.
pub fn select_rank(desired: u64, height: usize, width: usize) -> Result<usize> {
    let size_error = || ImsvdError::Size { desired, height, width };

    let payload = desired.checked_sub(HEADER_BYTES as u64).ok_or_else(size_error)?;
    let per_rank = (CHANNELS * FLOAT_BYTES) as u64 * (height as u64 + width as u64 + 1);
    let k = payload / per_rank;
    if k < 1 {
        return Err(size_error());
    }
    usize::try_from(k).map_err(|_| size_error())
}

/// Exact byte length of a container for a `height x width` image at rank `k`.
pub fn container_size(height: usize, width: usize, k: usize) -> usize {
    HEADER_BYTES + CHANNELS * FLOAT_BYTES * (height * k + k + k * width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_exact_budget_selects_rank() {
        assert_eq!(select_rank(container_size(10, 20, 3) as u64, 10, 20).unwrap(), 3);
        assert_eq!(select_rank(container_size(10, 20, 3) as u64 - 1, 10, 20).unwrap(), 2);
        assert_eq!(container_size(10, 20, 3), 17 + 12 * (30 + 3 + 60));
    }

    #[test]
    fn test_rank_floor_is_an_error() {
        let minimal = container_size(4, 4, 1) as u64;
        assert_eq!(select_rank(minimal, 4, 4).unwrap(), 1);
        assert!(matches!(select_rank(minimal - 1, 4, 4), Err(ImsvdError::Size { .. })));
        assert!(matches!(select_rank(5, 4, 4), Err(ImsvdError::Size { .. })));
        assert!(matches!(select_rank(0, 1, 1), Err(ImsvdError::Size { .. })));
    }

    #[test]
    fn test_no_upper_clamp() {
        let k = select_rank(1_000_000, 4, 4).unwrap();
        assert!(k > 4);
    }

    proptest! {
        #[test]
        fn larger_budget_never_lowers_rank(
            a in 0u64..5_000_000,
            b in 0u64..5_000_000,
            h in 1usize..2048,
            w in 1usize..2048,
        ) {
            let (small, large) = if a <= b { (a, b) } else { (b, a) };
            let k_small = select_rank(small, h, w).unwrap_or(0);
            let k_large = select_rank(large, h, w).unwrap_or(0);
            prop_assert!(k_large >= k_small);
        }

        #[test]
        fn selected_rank_fits_budget(desired in 17u64..5_000_000, h in 1usize..512, w in 1usize..512) {
            if let Ok(k) = select_rank(desired, h, w) {
                prop_assert!(container_size(h, w, k) as u64 <= desired);
                prop_assert!(container_size(h, w, k + 1) as u64 > desired);
            }
        }
    }
}
