//! The `Counts` triple and the token-keyed map the enumerator accumulates into.
//!
//! `all` double-counts non-symmetric assemblies during raw enumeration (the wave
//! builder is driven from both ends of the base layer); callers that want final,
//! reportable numbers must go through [`crate::builder::finalize_counts`] or
//! [`crate::builder::finalize_total`].

use std::collections::HashMap;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// `(all, symmetric180, symmetric90)` — see module docs for the double-counting caveat.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    pub all: u64,
    pub symmetric180: u64,
    pub symmetric90: u64,
}

impl Counts {
    pub const ZERO: Counts = Counts { all: 0, symmetric180: 0, symmetric90: 0 };

    pub fn new(all: u64, symmetric180: u64, symmetric90: u64) -> Self {
        Counts { all, symmetric180, symmetric90 }
    }

    pub fn is_zero(&self) -> bool {
        self.all == 0 && self.symmetric180 == 0 && self.symmetric90 == 0
    }
}

impl Add for Counts {
    type Output = Counts;
    fn add(self, rhs: Counts) -> Counts {
        Counts {
            all: self.all + rhs.all,
            symmetric180: self.symmetric180 + rhs.symmetric180,
            symmetric90: self.symmetric90 + rhs.symmetric90,
        }
    }
}

impl AddAssign for Counts {
    fn add_assign(&mut self, rhs: Counts) {
        *self = *self + rhs;
    }
}

impl Sub for Counts {
    type Output = Counts;
    fn sub(self, rhs: Counts) -> Counts {
        Counts {
            all: self.all - rhs.all,
            symmetric180: self.symmetric180 - rhs.symmetric180,
            symmetric90: self.symmetric90 - rhs.symmetric90,
        }
    }
}

impl SubAssign for Counts {
    fn sub_assign(&mut self, rhs: Counts) {
        *self = *self - rhs;
    }
}

/// Refinement-token (with connectivity-colour digits appended) to accumulated counts.
pub type CountsMap = HashMap<u64, Counts>;

pub fn add_counts_from(into: &mut CountsMap, from: &CountsMap) {
    for (token, counts) in from {
        *into.entry(*token).or_insert(Counts::ZERO) += *counts;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_sub_round_trip() {
        let a = Counts::new(10, 2, 0);
        let b = Counts::new(3, 1, 0);
        assert_eq!((a + b) - b, a);
    }

    #[test]
    fn add_counts_from_merges_maps() {
        let mut into = CountsMap::new();
        into.insert(1, Counts::new(1, 0, 0));
        let mut from = CountsMap::new();
        from.insert(1, Counts::new(2, 1, 0));
        from.insert(2, Counts::new(5, 0, 0));
        add_counts_from(&mut into, &from);
        assert_eq!(into[&1], Counts::new(3, 1, 0));
        assert_eq!(into[&2], Counts::new(5, 0, 0));
    }
}
