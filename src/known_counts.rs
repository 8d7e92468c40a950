//! Fixed table of previously-validated refinement counts, used to catch
//! regressions: a present-but-mismatched entry is a hard failure, an absent
//! one is accepted and logged as a newly-seen refinement.

use crate::combination::reverse_token;
use crate::counts::Counts;
use std::collections::HashMap;
use std::sync::OnceLock;

static REGISTRY: OnceLock<HashMap<u64, Counts>> = OnceLock::new();

fn build_registry() -> HashMap<u64, Counts> {
    let mut m = HashMap::new();
    let mut put = |token: u64, all: u64, symmetric180: u64, symmetric90: u64| {
        m.insert(token, Counts::new(all, symmetric180, symmetric90));
    };
    put(11, 24, 2, 0);
    put(21, 250, 20, 0);
    put(22, 10411, 49, 0);
    put(121, 37081, 32, 0);
    put(221, 1297413, 787, 0);
    put(44, 4297589646, 34099, 122);
    put(333, 2609661915535, 52782, 0);
    m
}

fn registry() -> &'static HashMap<u64, Counts> {
    REGISTRY.get_or_init(build_registry)
}

/// Outcome of looking a token's computed counts up against the registry.
#[derive(Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    /// No registry entry for this token (or its reversal); newly seen.
    Unseen,
    /// Registry entry matches the computed counts.
    Match,
    /// Registry entry disagrees with the computed counts.
    Mismatch { expected: Counts },
}

/// Every token the registry carries, for driving a closed regression suite.
pub fn known_tokens() -> Vec<u64> {
    let mut tokens: Vec<u64> = registry().keys().copied().collect();
    tokens.sort_unstable();
    tokens
}

/// Looks `token` up (trying `reverse_token(token)` if the raw token is
/// absent) and compares against `computed`.
pub fn check_counts(token: u64, computed: Counts) -> CheckOutcome {
    let entry = registry()
        .get(&token)
        .or_else(|| registry().get(&reverse_token(token)));
    match entry {
        None => CheckOutcome::Unseen,
        Some(&expected) if expected == computed => CheckOutcome::Match,
        Some(&expected) => CheckOutcome::Mismatch { expected },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_token_matches_expected_counts() {
        let outcome = check_counts(11, Counts::new(24, 2, 0));
        assert_eq!(outcome, CheckOutcome::Match);
    }

    #[test]
    fn unknown_token_is_unseen() {
        assert_eq!(check_counts(999999, Counts::new(1, 0, 0)), CheckOutcome::Unseen);
    }

    #[test]
    fn mismatched_counts_are_reported() {
        let outcome = check_counts(21, Counts::new(1, 0, 0));
        assert_eq!(outcome, CheckOutcome::Mismatch { expected: Counts::new(250, 20, 0) });
    }
}
