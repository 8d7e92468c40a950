//! Cached binomial coefficients, used by the Simon's-buckets inclusion
//! exclusion fast path. Built lazily on first use and read-only afterwards.

use std::sync::OnceLock;

const CACHE_SIZE: usize = MAX_BRICKS_PLUS_ONE;
const MAX_BRICKS_PLUS_ONE: usize = crate::geometry::MAX_BRICKS + 1;

static CACHE: OnceLock<[[u64; CACHE_SIZE]; CACHE_SIZE]> = OnceLock::new();

fn build_cache() -> [[u64; CACHE_SIZE]; CACHE_SIZE] {
    let mut cache = [[0u64; CACHE_SIZE]; CACHE_SIZE];
    for n in 0..CACHE_SIZE {
        for k in 0..=n {
            cache[n][k] = n_choose_k_slow(n as u64, k as u64);
        }
    }
    cache
}

fn n_choose_k_slow(n: u64, k: u64) -> u64 {
    let k = k.min(n - k);
    if k == 0 {
        return 1;
    }
    let mut result = 1u128;
    for i in 0..k {
        result = result * (n - i) as u128 / (i + 1) as u128;
    }
    result as u64
}

/// `C(n, k)`, falling back to a direct computation if `n`/`k` exceed the
/// cache bounds (which should not happen at the problem sizes this crate
/// targets).
pub fn n_choose_k(n: u64, k: u64) -> u64 {
    if k > n {
        return 0;
    }
    let cache = CACHE.get_or_init(build_cache);
    if (n as usize) < CACHE_SIZE && (k as usize) < CACHE_SIZE {
        cache[n as usize][k as usize]
    } else {
        tracing::warn!(n, k, "binomial coefficient cache miss, falling back to direct computation");
        n_choose_k_slow(n, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_values_match_pascals_triangle() {
        assert_eq!(n_choose_k(4, 2), 6);
        assert_eq!(n_choose_k(5, 0), 1);
        assert_eq!(n_choose_k(5, 5), 1);
        assert_eq!(n_choose_k(2, 3), 0);
    }
}
