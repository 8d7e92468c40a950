//! Recursive subset picker: enumerates every `k`-subset of a candidate list
//! in lexicographic index order, pruning on per-layer capacity and
//! intersection as it goes. The inner picker is a heap-allocated owning
//! child — the chain looks cyclic but is strictly a recursion stack.
//!
//! Every successful `next` leaves exactly one more set of `to_pick` bricks on
//! `combination`; every failing `next` leaves it exactly as it was on entry.

use crate::combination::Combination;
use crate::geometry::{LayerBrick, MAX_HEIGHT};

pub struct BrickPicker {
    v_idx: i32,
    to_pick: u8,
    max_layer_size: [u8; MAX_HEIGHT],
    inner: Option<Box<BrickPicker>>,
    /// Whether this level's own brick (at `v_idx`) is currently on `combination`.
    picked: bool,
}

impl BrickPicker {
    pub fn new(v_idx: usize, to_pick: u8, max_layer_size: [u8; MAX_HEIGHT]) -> Self {
        BrickPicker { v_idx: v_idx as i32 - 1, to_pick, max_layer_size, inner: None, picked: false }
    }

    fn check_v_idx(&self, v: &[LayerBrick], combination: &Combination, idx: usize) -> bool {
        let candidate = &v[idx];
        let layer = candidate.layer;
        if combination.layer_sizes[layer as usize] >= self.max_layer_size[layer as usize] {
            return false;
        }
        !combination.layer(layer).iter().any(|b| b.intersects(&candidate.brick))
    }

    fn next_v_idx(&mut self, v: &[LayerBrick], combination: &Combination) -> bool {
        loop {
            self.v_idx += 1;
            if self.v_idx as usize >= v.len() {
                return false;
            }
            if self.check_v_idx(v, combination, self.v_idx as usize) {
                return true;
            }
        }
    }

    pub fn next(&mut self, v: &[LayerBrick], combination: &mut Combination) -> bool {
        if self.to_pick == 1 {
            if self.picked {
                combination.remove_last_brick();
                self.picked = false;
            }
            if self.next_v_idx(v, combination) {
                let candidate = v[self.v_idx as usize];
                combination.add_brick(candidate.brick, candidate.layer);
                self.picked = true;
                return true;
            }
            return false;
        }

        if self.picked {
            if let Some(inner) = self.inner.as_mut() {
                if inner.next(v, combination) {
                    return true;
                }
                self.inner = None;
            }
            combination.remove_last_brick();
            self.picked = false;
        }

        loop {
            if !self.next_v_idx(v, combination) {
                return false;
            }
            let candidate = v[self.v_idx as usize];
            combination.add_brick(candidate.brick, candidate.layer);
            self.picked = true;
            let mut inner = Box::new(BrickPicker::new(self.v_idx as usize + 1, self.to_pick - 1, self.max_layer_size));
            if inner.next(v, combination) {
                self.inner = Some(inner);
                return true;
            }
            combination.remove_last_brick();
            self.picked = false;
        }
    }
}

/// Drives subset sizes `1..=k_max` over one shared candidate list from a
/// mutex-guarded inner picker, for the top-level multithreaded single
/// refinement count.
pub struct MultiBatchSizeBrickPicker {
    inner: std::sync::Mutex<MultiBatchSizeBrickPickerState>,
}

struct MultiBatchSizeBrickPickerState {
    to_pick: u8,
    k_max: u8,
    picker: BrickPicker,
    max_layer_size: [u8; MAX_HEIGHT],
}

impl MultiBatchSizeBrickPicker {
    pub fn new(k_max: u8, max_layer_size: [u8; MAX_HEIGHT]) -> Self {
        MultiBatchSizeBrickPicker {
            inner: std::sync::Mutex::new(MultiBatchSizeBrickPickerState {
                to_pick: 1,
                k_max,
                picker: BrickPicker::new(0, 1, max_layer_size),
                max_layer_size,
            }),
        }
    }

    /// Returns the subset size actually picked (bricks already added to
    /// `combination`), or 0 when every size has been exhausted.
    pub fn next(&self, v: &[LayerBrick], combination: &mut Combination) -> u8 {
        let mut state = self.inner.lock().expect("picker mutex poisoned");
        loop {
            if state.to_pick > state.k_max {
                return 0;
            }
            if state.picker.next(v, combination) {
                return state.to_pick;
            }
            state.to_pick += 1;
            if state.to_pick > state.k_max {
                return 0;
            }
            let to_pick = state.to_pick;
            let max_layer_size = state.max_layer_size;
            state.picker = BrickPicker::new(0, to_pick, max_layer_size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Brick, PLANE_MID};

    #[test]
    fn picker_yields_every_pair_once_and_cleans_up() {
        let v = vec![
            LayerBrick { brick: Brick::new(false, PLANE_MID + 4, PLANE_MID), layer: 0 },
            LayerBrick { brick: Brick::new(false, PLANE_MID + 8, PLANE_MID), layer: 0 },
            LayerBrick { brick: Brick::new(false, PLANE_MID + 12, PLANE_MID), layer: 0 },
        ];
        let mut max_layer_size = [0u8; MAX_HEIGHT];
        max_layer_size[0] = 10;
        let mut picker = BrickPicker::new(0, 2, max_layer_size);
        let mut combination = crate::combination::Combination::new();
        let mut count = 0;
        while picker.next(&v, &mut combination) {
            assert_eq!(combination.size, 3); // first brick + 2 picked
            count += 1;
        }
        assert_eq!(count, 3); // C(3,2)
        assert_eq!(combination.size, 1); // fully backtracked
    }
}
