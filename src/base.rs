//! `Base` / `CBase`: a single-layer footprint, the seed every wave expansion
//! grows outward from, plus the reduction that collapses unreachable bricks
//! into a smaller, previously-solved base.

use crate::combination::Combination;
use crate::geometry::{Brick, MAX_LAYER_SIZE, PLANE_MID};

/// A single-layer footprint of up to `MAX_LAYER_SIZE` bricks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Base {
    pub bricks: [Brick; MAX_LAYER_SIZE],
    pub layer_size: u8,
}

impl Base {
    pub fn new() -> Self {
        Base { bricks: [Brick::first(); MAX_LAYER_SIZE], layer_size: 1 }
    }

    pub fn from_bricks(bricks: &[Brick]) -> Self {
        let mut b = Base { bricks: [Brick::first(); MAX_LAYER_SIZE], layer_size: bricks.len() as u8 };
        for (i, brick) in bricks.iter().enumerate() {
            b.bricks[i] = *brick;
        }
        b
    }

    pub fn as_slice(&self) -> &[Brick] {
        &self.bricks[..self.layer_size as usize]
    }

    fn as_slice_mut(&mut self) -> &mut [Brick] {
        let n = self.layer_size as usize;
        &mut self.bricks[..n]
    }

    pub fn has_vertical_brick(&self) -> bool {
        self.as_slice().iter().any(|b| b.is_vertical)
    }

    pub fn can_rotate_90(&self) -> bool {
        self.as_slice().iter().any(|b| !b.is_vertical)
    }

    pub fn sort_bricks(&mut self) {
        self.as_slice_mut().sort();
    }

    pub fn translate_min_to_origo(&mut self) {
        let anchor = self
            .as_slice()
            .iter()
            .filter(|b| b.is_vertical)
            .min()
            .copied()
            .unwrap_or(self.bricks[0]);
        let dx = PLANE_MID - anchor.x;
        let dy = PLANE_MID - anchor.y;
        for b in self.as_slice_mut() {
            b.x += dx;
            b.y += dy;
        }
    }

    pub fn rotate_90(&mut self) {
        for b in self.as_slice_mut() {
            let (x, y, v) = (b.x, b.y, b.is_vertical);
            b.is_vertical = !v;
            b.x = y;
            b.y = PLANE_MID - (x - PLANE_MID);
        }
        self.translate_min_to_origo();
        self.sort_bricks();
    }

    pub fn rotate_180(&mut self) {
        for b in self.as_slice_mut() {
            b.x = 2 * PLANE_MID - b.x;
            b.y = 2 * PLANE_MID - b.y;
        }
        self.translate_min_to_origo();
        self.sort_bricks();
    }

    pub fn mirror_x(&mut self) {
        for b in self.as_slice_mut() {
            b.x = 2 * PLANE_MID - b.x;
        }
        self.translate_min_to_origo();
        self.sort_bricks();
    }

    pub fn mirror_y(&mut self) {
        for b in self.as_slice_mut() {
            b.y = 2 * PLANE_MID - b.y;
        }
        self.translate_min_to_origo();
        self.sort_bricks();
    }

    pub fn normalize(&mut self) {
        if self.has_vertical_brick() {
            self.translate_min_to_origo();
            self.sort_bricks();
        } else {
            self.rotate_90();
        }
        if self.can_rotate_90() {
            let mut best = *self;
            let mut candidate = *self;
            for _ in 0..3 {
                candidate.rotate_90();
                if candidate.as_slice() < best.as_slice() {
                    best = candidate;
                }
            }
            *self = best;
        } else {
            let mut rotated = *self;
            rotated.rotate_180();
            if rotated.as_slice() < self.as_slice() {
                *self = rotated;
            }
        }
    }

    /// The sorted Manhattan distances from every non-first brick to the first.
    pub fn distance_signature(&self) -> Vec<i32> {
        let slice = self.as_slice();
        let first = slice[0];
        let mut distances: Vec<i32> = slice[1..].iter().map(|b| first.dist(b)).collect();
        distances.sort_unstable();
        distances
    }

    /// Drops bricks unreachable (within `bricks_between` intermediates) from
    /// every other brick, replacing them with synthetic far-away placeholders,
    /// carrying the surviving original indices in a companion `CBase`.
    pub fn reduce_from_unreachable(&self, bricks_between: u32) -> Option<(Base, CBase)> {
        let slice = self.as_slice();
        let n = slice.len();
        let mut reachable = vec![false; n];
        for i in 0..n {
            for j in 0..n {
                if i != j && Brick::can_reach(&slice[i], &slice[j], bricks_between) {
                    reachable[i] = true;
                    reachable[j] = true;
                }
            }
        }
        if reachable.iter().all(|&r| r) {
            return None;
        }

        let mut kept_indices: Vec<usize> = (0..n).filter(|&i| reachable[i]).collect();
        if kept_indices.is_empty() {
            kept_indices.push(0);
        }

        let mut reduced = Base::new();
        reduced.layer_size = kept_indices.len() as u8;
        for (slot, &orig) in kept_indices.iter().enumerate() {
            reduced.bricks[slot] = slice[orig];
        }

        let largest_dx = slice.iter().map(|b| (b.x - slice[0].x).unsigned_abs()).max().unwrap_or(0) as i32;
        let largest_dy = slice.iter().map(|b| (b.y - slice[0].y).unsigned_abs()).max().unwrap_or(0) as i32;
        let unreachable_dist = largest_dx + largest_dy + (n as i32 - 1) * 3 + 1;

        let mut cbase = CBase { bricks: [Brick::first(); MAX_LAYER_SIZE], original_index: [0; MAX_LAYER_SIZE], layer_size: 0 };
        for (slot, &orig) in kept_indices.iter().enumerate() {
            cbase.bricks[slot] = slice[orig];
            cbase.original_index[slot] = orig as u8;
        }
        let mut next_slot = kept_indices.len();
        let offsets = [(1i32, 0i32), (-1, 0), (0, 1), (0, -1)];
        for (i, &is_reach) in reachable.iter().enumerate() {
            if is_reach {
                continue;
            }
            let (ox, oy) = offsets[next_slot % offsets.len()];
            let placeholder = Brick::new(
                true,
                (PLANE_MID as i32 + ox * unreachable_dist) as i16,
                (PLANE_MID as i32 + oy * unreachable_dist) as i16,
            );
            if next_slot < MAX_LAYER_SIZE {
                reduced.bricks[next_slot] = placeholder;
                reduced.layer_size += 1;
                cbase.bricks[next_slot] = placeholder;
                cbase.original_index[next_slot] = i as u8;
                next_slot += 1;
            }
        }
        cbase.layer_size = next_slot as u8;

        reduced.normalize();
        Some((reduced, cbase))
    }
}

impl Default for Base {
    fn default() -> Self {
        Base::new()
    }
}

impl From<&Combination> for Base {
    fn from(c: &Combination) -> Self {
        Base::from_bricks(c.layer(0))
    }
}

/// A `Base` whose bricks additionally carry the index they held before any
/// normalising rotation/mirror, so colour remapping can recover the original
/// base's brick ordering after the writer resolves a mirror/reduced entry.
#[derive(Clone, Copy, Debug)]
pub struct CBase {
    pub bricks: [Brick; MAX_LAYER_SIZE],
    pub original_index: [u8; MAX_LAYER_SIZE],
    pub layer_size: u8,
}

impl CBase {
    pub fn as_slice(&self) -> &[Brick] {
        &self.bricks[..self.layer_size as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_signature_is_sorted() {
        let bricks = [
            Brick::first(),
            Brick::new(false, PLANE_MID + 20, PLANE_MID),
            Brick::new(false, PLANE_MID + 4, PLANE_MID),
        ];
        let base = Base::from_bricks(&bricks);
        let sig = base.distance_signature();
        assert_eq!(sig, vec![4, 20]);
    }

    #[test]
    fn fully_reachable_base_has_no_reduction() {
        let bricks = [Brick::first(), Brick::new(false, PLANE_MID + 4, PLANE_MID)];
        let base = Base::from_bricks(&bricks);
        assert!(base.reduce_from_unreachable(4).is_none());
    }
}
