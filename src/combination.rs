//! `Combination`: a full multi-layer assembly under construction, plus the
//! canonicalisation, symmetry, connectivity and token helpers shared by the
//! wave enumerator and the base builder.

use crate::geometry::{Brick, PLANE_MID, MAX_BRICKS, MAX_HEIGHT, MAX_LAYER_SIZE};

/// `(layer, index-within-layer)` — one entry of the insertion history stack.
pub type HistoryEntry = (u8, u8);

/// An ordered, per-layer assembly of bricks, grown and shrunk in strict LIFO
/// order via [`Combination::add_brick`] / [`Combination::remove_last_brick`].
#[derive(Clone, Debug)]
pub struct Combination {
    pub layer_sizes: [u8; MAX_HEIGHT],
    pub height: u8,
    pub size: u8,
    pub bricks: [[Brick; MAX_LAYER_SIZE]; MAX_HEIGHT],
    pub history: Vec<HistoryEntry>,
    /// Transient flood-fill colour per brick, valid only right after a
    /// `color_connected`/`color_full` pass.
    pub colors: [[u16; MAX_LAYER_SIZE]; MAX_HEIGHT],
}

impl Default for Combination {
    fn default() -> Self {
        let mut c = Combination {
            layer_sizes: [0; MAX_HEIGHT],
            height: 1,
            size: 1,
            bricks: [[Brick::first(); MAX_LAYER_SIZE]; MAX_HEIGHT],
            history: Vec::with_capacity(MAX_BRICKS),
            colors: [[0; MAX_LAYER_SIZE]; MAX_HEIGHT],
        };
        c.layer_sizes[0] = 1;
        c.history.push((0, 0));
        c
    }
}

impl Combination {
    pub fn new() -> Self {
        Combination::default()
    }

    /// Builds a placeholder combination for a refinement token: every layer
    /// is pre-filled with copies of the first brick. Used only as a template
    /// to carry `layer_sizes`/`height`/`size` around (e.g. `max_combination`).
    pub fn from_token(token: u64) -> Self {
        let layer_sizes = layer_sizes_from_token(token);
        let height = height_of_token(token);
        let mut c = Combination {
            layer_sizes: [0; MAX_HEIGHT],
            height,
            size: 0,
            bricks: [[Brick::first(); MAX_LAYER_SIZE]; MAX_HEIGHT],
            history: Vec::new(),
            colors: [[0; MAX_LAYER_SIZE]; MAX_HEIGHT],
        };
        for i in 0..height as usize {
            c.layer_sizes[i] = layer_sizes[i];
            c.size += layer_sizes[i];
        }
        c
    }

    /// Builds a one-layer combination seeded from a base's layer-0 bricks.
    pub fn from_base(base: &crate::base::Base) -> Self {
        let mut c = Combination {
            layer_sizes: [0; MAX_HEIGHT],
            height: 1,
            size: base.layer_size,
            bricks: [[Brick::first(); MAX_LAYER_SIZE]; MAX_HEIGHT],
            history: Vec::with_capacity(MAX_BRICKS),
            colors: [[0; MAX_LAYER_SIZE]; MAX_HEIGHT],
        };
        c.layer_sizes[0] = base.layer_size;
        for i in 0..base.layer_size as usize {
            c.bricks[0][i] = base.bricks[i];
            c.history.push((0, i as u8));
        }
        c
    }

    pub fn add_brick(&mut self, brick: Brick, layer: u8) {
        let idx = self.layer_sizes[layer as usize];
        self.bricks[layer as usize][idx as usize] = brick;
        self.layer_sizes[layer as usize] += 1;
        self.size += 1;
        if layer + 1 > self.height {
            self.height = layer + 1;
        }
        self.history.push((layer, idx));
    }

    pub fn remove_last_brick(&mut self) {
        let (layer, idx) = self.history.pop().expect("removeLastBrick on empty history");
        self.layer_sizes[layer as usize] -= 1;
        self.size -= 1;
        if layer + 1 == self.height && self.layer_sizes[layer as usize] == 0 && layer > 0 {
            self.height -= 1;
        }
        let _ = idx;
    }

    pub fn layer(&self, layer: u8) -> &[Brick] {
        &self.bricks[layer as usize][..self.layer_sizes[layer as usize] as usize]
    }

    fn layer_mut(&mut self, layer: u8) -> &mut [Brick] {
        let n = self.layer_sizes[layer as usize] as usize;
        &mut self.bricks[layer as usize][..n]
    }

    pub fn sort_bricks(&mut self) {
        for layer in 0..self.height {
            self.layer_mut(layer).sort();
        }
    }

    /// Translates every brick so the minimum vertical layer-0 brick sits at
    /// `(PLANE_MID, PLANE_MID)`.
    pub fn translate_min_to_origo(&mut self) {
        let layer0 = self.layer(0);
        let anchor = layer0
            .iter()
            .filter(|b| b.is_vertical)
            .min()
            .copied()
            .unwrap_or(layer0[0]);
        let dx = PLANE_MID - anchor.x;
        let dy = PLANE_MID - anchor.y;
        for layer in 0..self.height {
            for b in self.layer_mut(layer) {
                b.x += dx;
                b.y += dy;
            }
        }
    }

    pub fn has_vertical_layer0_brick(&self) -> bool {
        self.layer(0).iter().any(|b| b.is_vertical)
    }

    pub fn can_rotate_90(&self) -> bool {
        self.layer(0).iter().any(|b| !b.is_vertical)
    }

    /// Rotates every brick 90 degrees about `PLANE_MID`, then re-centres and sorts.
    pub fn rotate_90(&mut self) {
        for layer in 0..self.height {
            for b in self.layer_mut(layer) {
                let (x, y, v) = (b.x, b.y, b.is_vertical);
                b.is_vertical = !v;
                b.x = y;
                b.y = PLANE_MID - (x - PLANE_MID);
            }
        }
        self.translate_min_to_origo();
        self.sort_bricks();
    }

    /// Rotates every brick 180 degrees about `PLANE_MID`, then re-centres and sorts.
    pub fn rotate_180(&mut self) {
        for layer in 0..self.height {
            for b in self.layer_mut(layer) {
                b.x = 2 * PLANE_MID - b.x;
                b.y = 2 * PLANE_MID - b.y;
            }
        }
        self.translate_min_to_origo();
        self.sort_bricks();
    }

    pub fn mirror_x(&mut self) {
        for layer in 0..self.height {
            for b in self.layer_mut(layer) {
                b.x = 2 * PLANE_MID - b.x;
            }
        }
        self.normalize();
    }

    pub fn mirror_y(&mut self) {
        for layer in 0..self.height {
            for b in self.layer_mut(layer) {
                b.y = 2 * PLANE_MID - b.y;
            }
        }
        self.normalize();
    }

    /// Canonicalises in place: translate+sort (rotating first if the base
    /// layer has no vertical brick), then keep the lexicographically smallest
    /// of up to four rotations (two if the shape can't be rotated 90).
    pub fn normalize(&mut self) {
        if self.has_vertical_layer0_brick() {
            self.translate_min_to_origo();
            self.sort_bricks();
        } else {
            self.rotate_90();
        }

        if self.can_rotate_90() {
            let mut best = self.clone();
            let mut candidate = self.clone();
            for _ in 0..3 {
                candidate.rotate_90();
                if candidate.is_smaller_than(&best) {
                    best = candidate.clone();
                }
            }
            *self = best;
        } else {
            let mut rotated = self.clone();
            rotated.rotate_180();
            if rotated.is_smaller_than(self) {
                *self = rotated;
            }
        }
    }

    fn is_smaller_than(&self, other: &Combination) -> bool {
        for layer in 0..self.height.max(other.height) {
            let a = self.layer(layer);
            let b = other.layer(layer);
            match a.cmp(b) {
                std::cmp::Ordering::Less => return true,
                std::cmp::Ordering::Greater => return false,
                std::cmp::Ordering::Equal => {}
            }
        }
        false
    }

    /// Doubled centroid of a layer (doubled so half-integer centres are exact).
    pub fn layer_center(&self, layer: u8) -> (i32, i32) {
        let bricks = self.layer(layer);
        let mut sx = 0i32;
        let mut sy = 0i32;
        for b in bricks {
            sx += b.x as i32;
            sy += b.y as i32;
        }
        let n = bricks.len() as i32;
        (2 * sx / n, 2 * sy / n)
    }

    pub fn is_layer_symmetric(&self, layer: u8, cx: i32, cy: i32) -> bool {
        let bricks = self.layer(layer);
        let mut seen: Vec<Brick> = Vec::new();
        for b in bricks {
            let mx = cx - b.x as i32;
            let my = cy - b.y as i32;
            if mx == b.x as i32 && my == b.y as i32 {
                continue; // sits exactly on the centre; a fixed point.
            }
            let mirror = Brick::new(b.is_vertical, mx as i16, my as i16);
            if let Some(pos) = seen.iter().position(|s| *s == mirror) {
                seen.remove(pos);
            } else {
                seen.push(*b);
            }
        }
        seen.is_empty()
    }

    pub fn is_180_symmetric(&self) -> bool {
        let (cx, cy) = self.layer_center(0);
        for layer in 0..self.height {
            let (lx, ly) = self.layer_center(layer);
            if lx != cx || ly != cy {
                return false;
            }
            if !self.is_layer_symmetric(layer, cx, cy) {
                return false;
            }
        }
        true
    }

    pub fn is_90_symmetric(&self) -> bool {
        if self.size & 3 != 0 || !self.can_rotate_90() {
            return false;
        }
        for layer in 0..self.height {
            if self.layer_sizes[layer as usize] & 3 != 0 {
                return false;
            }
        }
        let mut base = self.clone();
        base.translate_min_to_origo();
        base.sort_bricks();
        let mut rotated = base.clone();
        rotated.rotate_90();
        base.layers_equal(&rotated)
    }

    fn layers_equal(&self, other: &Combination) -> bool {
        if self.height != other.height {
            return false;
        }
        for layer in 0..self.height {
            if self.layer(layer) != other.layer(layer) {
                return false;
            }
        }
        true
    }

    /// DFS flood-fill: colours every brick reachable from `(layer, idx)` with
    /// `color`, walking to adjacent layers via brick intersection.
    pub fn color_connected(&mut self, layer: u8, idx: u8, color: u16) {
        if self.colors[layer as usize][idx as usize] != 0 {
            return;
        }
        self.colors[layer as usize][idx as usize] = color;
        let brick = self.bricks[layer as usize][idx as usize];
        for neighbour_layer in [layer.checked_sub(1), Some(layer + 1)] {
            let Some(nl) = neighbour_layer else { continue };
            if nl >= self.height {
                continue;
            }
            for i in 0..self.layer_sizes[nl as usize] {
                if self.colors[nl as usize][i as usize] == 0
                    && self.bricks[nl as usize][i as usize].intersects(&brick)
                {
                    self.color_connected(nl, i, color);
                }
            }
        }
    }

    pub fn count_connected(&mut self, layer: u8, idx: u8) -> u32 {
        for row in self.colors.iter_mut() {
            row.iter_mut().for_each(|c| *c = 0);
        }
        self.color_connected(layer, idx, 1);
        let mut count = 0u32;
        for layer in 0..self.height {
            for i in 0..self.layer_sizes[layer as usize] {
                if self.colors[layer as usize][i as usize] != 0 {
                    count += 1;
                }
            }
        }
        count
    }

    pub fn is_connected(&mut self) -> bool {
        self.count_connected(0, 0) == self.size as u32
    }

    /// Colours every layer-0 brick with a distinct colour `i+1` via flood fill,
    /// used to bucket candidates by which components they would touch.
    pub fn color_full(&mut self) {
        for row in self.colors.iter_mut() {
            row.iter_mut().for_each(|c| *c = 0);
        }
        for i in 0..self.layer_sizes[0] {
            if self.colors[0][i as usize] == 0 {
                self.color_connected(0, i, i as u16 + 1);
            }
        }
    }

    /// Flood-fills layer-0 connectivity colours and appends each layer-0
    /// brick's colour as a decimal digit onto `token`.
    pub fn encode_connectivity(&mut self, token: u64) -> u64 {
        let size0 = self.layer_sizes[0];
        for row in self.colors.iter_mut() {
            row.iter_mut().for_each(|c| *c = 0);
        }
        for i in 0..size0 {
            if self.colors[0][i as usize] == 0 {
                self.color_connected(0, i, i as u16 + 1);
            }
        }
        // Ensure every layer-0 brick got some colour (last one defaults to size0).
        for i in 0..size0 {
            if self.colors[0][i as usize] == 0 {
                self.colors[0][i as usize] = size0 as u16;
            }
        }
        let mut out = token;
        for i in 0..size0 {
            out = out * 10 + self.colors[0][i as usize] as u64;
        }
        out
    }

    /// Number of intermediate bricks needed to guarantee reachability between
    /// any two bricks of `max_combination`'s shape, used by `reduce_from_unreachable`.
    pub fn count_bricks_to_bridge(max_combination: &Combination) -> u32 {
        match max_combination.height {
            2 => 2.min(max_combination.layer_sizes[1] as u32),
            3 => {
                let l2 = max_combination.layer_sizes[1] as u32;
                let l3 = max_combination.layer_sizes[2] as u32;
                let useful_l2 = l2.min(l3 + 2);
                let useful_l3 = l2.min(l3);
                useful_l2 + useful_l3
            }
            _ => (max_combination.size - max_combination.layer_sizes[0]) as u32,
        }
    }
}

pub fn reverse_token(token: u64) -> u64 {
    let mut t = token;
    let mut out = 0u64;
    while t > 0 {
        out = out * 10 + t % 10;
        t /= 10;
    }
    out
}

pub fn size_of_token(mut token: u64) -> u8 {
    let mut size = 0u8;
    while token > 0 {
        size += (token % 10) as u8;
        token /= 10;
    }
    size
}

pub fn height_of_token(mut token: u64) -> u8 {
    let mut height = 0u8;
    while token > 0 {
        height += 1;
        token /= 10;
    }
    height
}

/// Decodes the decimal digits of `token` into per-layer brick counts, base
/// layer first (digit order is reversed relative to the raw decimal digits,
/// since the token is read least-significant-digit-first while decoding).
pub fn layer_sizes_from_token(mut token: u64) -> [u8; MAX_HEIGHT] {
    let mut digits = Vec::new();
    while token > 0 {
        digits.push((token % 10) as u8);
        token /= 10;
    }
    digits.reverse();
    let mut out = [0u8; MAX_HEIGHT];
    for (i, d) in digits.into_iter().enumerate() {
        out[i] = d;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_remove_balances_history() {
        let mut c = Combination::new();
        assert_eq!(c.size, 1);
        c.add_brick(Brick::new(false, PLANE_MID + 4, PLANE_MID), 0);
        assert_eq!(c.size, 2);
        assert_eq!(c.history.len(), 2);
        c.remove_last_brick();
        assert_eq!(c.size, 1);
        assert_eq!(c.history.len(), 1);
    }

    #[test]
    fn reverse_token_is_involution() {
        assert_eq!(reverse_token(reverse_token(221)), 221);
        assert_eq!(reverse_token(121), 121);
        assert_eq!(reverse_token(21), 12);
    }

    #[test]
    fn layer_sizes_round_trip_size_and_height() {
        let token = 221u64;
        let sizes = layer_sizes_from_token(token);
        assert_eq!(sizes[0], 2);
        assert_eq!(sizes[1], 2);
        assert_eq!(sizes[2], 1);
        assert_eq!(size_of_token(token), 5);
        assert_eq!(height_of_token(token), 3);
    }

    #[test]
    fn single_brick_is_180_and_not_90_symmetric() {
        let c = Combination::new();
        assert!(c.is_180_symmetric());
        assert!(!c.is_90_symmetric());
    }
}
