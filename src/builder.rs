//! The wave-expansion enumerator. `build` grows an assembly outward from a
//! fixed first brick one wave at a time; `encode_connectivity` selects
//! between the Lemma-3 variant (tokens carry layer-0 connectivity colours)
//! and the plain top-level variant (used for a single whole-refinement
//! count), per a single flag rather than two duplicated structures.

use crate::combination::Combination;
use crate::counts::{add_counts_from, Counts, CountsMap};
use crate::geometry::{Brick, BrickPlane, LayerBrick, MAX_HEIGHT};
use crate::picker::{BrickPicker, MultiBatchSizeBrickPicker};
use std::sync::Mutex;

/// Appends (`add` > 0) or removes (`add` < 0) the current wave's footprint
/// from its own layer's neighbour bitmap.
fn add_wave_to_neighbours(
    combination: &Combination,
    wave_start: usize,
    wave_size: usize,
    neighbours: &mut [BrickPlane; MAX_HEIGHT],
    add: i16,
) {
    for &(layer, idx) in &combination.history[wave_start..wave_start + wave_size] {
        let brick = combination.bricks[layer as usize][idx as usize];
        let plane = &mut neighbours[layer as usize];
        for dx in -2..=2i16 {
            for dy in -2..=2i16 {
                plane.add(!brick.is_vertical, brick.x + dx, brick.y + dy, add);
            }
        }
        let (w, h) = if brick.is_vertical { (2i16, 4i16) } else { (4i16, 2i16) };
        for dx in -(w - 1)..w {
            for dy in -(h - 1)..h {
                plane.add(brick.is_vertical, brick.x + dx, brick.y + dy, add);
            }
        }
    }
}

fn crossing_and_parallel_positions(brick: &Brick) -> Vec<Brick> {
    let mut out = Vec::with_capacity(25 + 16);
    for dx in -2..=2i16 {
        for dy in -2..=2i16 {
            out.push(Brick::new(!brick.is_vertical, brick.x + dx, brick.y + dy));
        }
    }
    let (w, h) = if brick.is_vertical { (2i16, 4i16) } else { (4i16, 2i16) };
    for dx in -(w - 1)..w {
        for dy in -(h - 1)..h {
            out.push(Brick::new(brick.is_vertical, brick.x + dx, brick.y + dy));
        }
    }
    out
}

/// Candidate bricks that might extend the current wave onto an adjacent layer.
fn find_potential_bricks_for_next_wave(
    combination: &Combination,
    wave_start: usize,
    wave_size: usize,
    max_combination: &Combination,
    neighbours: &mut [BrickPlane; MAX_HEIGHT],
) -> Vec<LayerBrick> {
    let mut out = Vec::new();
    let wave: Vec<(u8, u8)> = combination.history[wave_start..wave_start + wave_size].to_vec();

    for (layer, idx) in wave {
        let brick = combination.bricks[layer as usize][idx as usize];
        for layer2_signed in [layer as i32 - 1, layer as i32 + 1] {
            if layer2_signed < 0 {
                continue;
            }
            let layer2 = layer2_signed as u8;
            if layer2 as usize >= max_combination.height as usize {
                continue;
            }
            if combination.layer_sizes[layer2 as usize] >= max_combination.layer_sizes[layer2 as usize] {
                continue;
            }

            for candidate in crossing_and_parallel_positions(&brick) {
                if candidate.x < 0 || candidate.y < 0 {
                    continue;
                }
                if neighbours[layer2 as usize].contains(candidate.is_vertical, candidate.x, candidate.y) {
                    continue;
                }
                if layer2 > 0
                    && neighbours[(layer2 - 1) as usize].contains(candidate.is_vertical, candidate.x, candidate.y)
                {
                    continue;
                }
                if (layer2 as usize + 1) < max_combination.height as usize
                    && neighbours[(layer2 + 1) as usize].contains(candidate.is_vertical, candidate.x, candidate.y)
                {
                    continue;
                }

                // Overlap only needs checking against bricks already placed on
                // the SAME layer; footprint overlap with the layer above/below
                // is exactly how two layers connect.
                if combination.layer(layer2).iter().any(|b| b.intersects(&candidate)) {
                    continue;
                }

                neighbours[layer2 as usize].set(candidate.is_vertical, candidate.x, candidate.y);
                out.push(LayerBrick { brick: candidate, layer: layer2 });
            }
        }
    }

    for lb in &out {
        neighbours[lb.layer as usize].unset(lb.brick.is_vertical, lb.brick.x, lb.brick.y);
    }
    out
}

/// Whether 180-degree symmetry remains achievable given the currently "full"
/// layers (those whose brick count already matches the target).
fn can_become_symmetric(combination: &Combination, max_combination: &Combination) -> bool {
    let mut reference: Option<(i32, i32)> = None;
    for layer in 0..combination.height {
        if combination.layer_sizes[layer as usize] != max_combination.layer_sizes[layer as usize] {
            continue;
        }
        let center = combination.layer_center(layer);
        match reference {
            None => {
                if !combination.is_layer_symmetric(layer, center.0, center.1) {
                    return false;
                }
                reference = Some(center);
            }
            Some(c) => {
                if c != center || !combination.is_layer_symmetric(layer, center.0, center.1) {
                    return false;
                }
            }
        }
    }
    true
}

/// Counts every k-subset of `bricks` with no pairwise intersection (bricks on
/// different layers never intersect). When no two candidates intersect at
/// all, every k-subset qualifies and the count is the closed-form
/// `C(bricks.len(), k)`; otherwise falls back to backtracking, which stays
/// cheap at these problem sizes (bounded by `MAX_LAYER_SIZE`/`MAX_BRICKS`).
fn count_independent_subsets(bricks: &[LayerBrick], k: usize) -> u64 {
    fn rec(bricks: &[LayerBrick], start: usize, k: usize, chosen: &mut Vec<LayerBrick>) -> u64 {
        if k == 0 {
            return 1;
        }
        let mut total = 0u64;
        for i in start..bricks.len() {
            if chosen.iter().any(|c| c.layer == bricks[i].layer && c.brick.intersects(&bricks[i].brick)) {
                continue;
            }
            chosen.push(bricks[i]);
            total += rec(bricks, i + 1, k - 1, chosen);
            chosen.pop();
        }
        total
    }
    if k > bricks.len() {
        return 0;
    }
    let mutually_independent = bricks.iter().enumerate().all(|(i, a)| {
        bricks[i + 1..].iter().all(|b| a.layer != b.layer || !a.brick.intersects(&b.brick))
    });
    if mutually_independent {
        return crate::binomial::n_choose_k(bricks.len() as u64, k as u64);
    }
    let mut chosen = Vec::with_capacity(k);
    rec(bricks, 0, k, &mut chosen)
}

/// The inclusion-exclusion fast path used once full rotational symmetry has
/// been ruled out: buckets candidates by which base-layer connectivity
/// colour(s) they touch, then counts valid placements per distribution of
/// picks across buckets directly (each bucket's own intersections are
/// resolved by [`count_independent_subsets`], which collapses to a cached
/// binomial coefficient whenever the bucket's candidates don't intersect).
fn simon_with_buckets(
    combination: &mut Combination,
    v: &[LayerBrick],
    r: u8,
    base_token: u64,
) -> CountsMap {
    combination.color_full();

    // Bucket key: sorted list of distinct base colours this candidate touches
    // through intersection with already-placed bricks on adjacent layers.
    // Single-colour buckets all collapse under their own colour's key,
    // multi-colour buckets keep their full touched set.
    use std::collections::BTreeMap;
    let mut buckets: BTreeMap<Vec<u16>, Vec<LayerBrick>> = BTreeMap::new();

    for lb in v {
        let mut touched: Vec<u16> = Vec::new();
        for check_layer in [lb.layer.checked_sub(1), Some(lb.layer + 1)] {
            let Some(cl) = check_layer else { continue };
            if cl as usize >= MAX_HEIGHT {
                continue;
            }
            for (i, b) in combination.layer(cl).iter().enumerate() {
                if b.intersects(&lb.brick) {
                    let color = combination.colors[cl as usize][i];
                    if color != 0 && !touched.contains(&color) {
                        touched.push(color);
                    }
                }
            }
        }
        touched.sort_unstable();
        touched.dedup();
        buckets.entry(touched).or_default().push(*lb);
    }

    let bucket_list: Vec<(Vec<u16>, Vec<LayerBrick>)> = buckets.into_iter().collect();
    let mut counts_map = CountsMap::new();

    // Enumerate every distribution (k_0, ..., k_{m-1}) of r picks across
    // buckets, skipping degenerate "0 candidates available" branches.
    fn distribute(
        bucket_list: &[(Vec<u16>, Vec<LayerBrick>)],
        idx: usize,
        remaining: u8,
        picks: &mut Vec<usize>,
        out: &mut Vec<Vec<usize>>,
    ) {
        if idx == bucket_list.len() {
            if remaining == 0 {
                out.push(picks.clone());
            }
            return;
        }
        let max_here = bucket_list[idx].1.len().min(remaining as usize);
        for k in 0..=max_here {
            picks.push(k);
            distribute(bucket_list, idx + 1, remaining - k as u8, picks, out);
            picks.pop();
        }
    }

    let mut distributions = Vec::new();
    distribute(&bucket_list, 0, r, &mut Vec::new(), &mut distributions);

    for dist in distributions {
        let mut ways = 1u64;
        let mut representative_picks: Vec<LayerBrick> = Vec::new();
        let mut skip = false;
        for (i, &k) in dist.iter().enumerate() {
            if k == 0 {
                continue;
            }
            let (_colors, bricks) = &bucket_list[i];
            let valid = count_independent_subsets(bricks, k);
            if valid == 0 {
                skip = true;
                break;
            }
            ways *= valid;
            representative_picks.push(bricks[0]);
        }
        if skip || ways == 0 {
            continue;
        }
        // token: place one representative brick per touched bucket, run the
        // connectivity encoding once, then reuse it for every size-combination
        // of this bucket selection.
        let mut probe = combination.clone();
        for lb in &representative_picks {
            probe.add_brick(lb.brick, lb.layer);
        }
        let token = probe.encode_connectivity(base_token);

        let entry = counts_map.entry(token).or_insert(Counts::ZERO);
        entry.all += ways;
    }

    counts_map
}

/// Attempts to place all `r` remaining bricks in one step. Returns `None`
/// when some not-yet-full layer has no candidate in `v` (caller falls back
/// to incremental wave expansion); otherwise returns the counts produced.
fn place_all_left_to_place(
    combination: &mut Combination,
    v: &[LayerBrick],
    r: u8,
    max_combination: &Combination,
    encode_connectivity: bool,
    encoding_locked: bool,
    base_token: u64,
) -> Option<CountsMap> {
    for layer in 0..max_combination.height {
        if combination.layer_sizes[layer as usize] < max_combination.layer_sizes[layer as usize]
            && !v.iter().any(|lb| lb.layer == layer)
        {
            return None;
        }
    }

    let can_be_symmetric = can_become_symmetric(combination, max_combination);

    if !can_be_symmetric && encode_connectivity {
        return Some(simon_with_buckets(combination, v, r, base_token));
    }

    let mut counts_map = CountsMap::new();
    let mut picker = BrickPicker::new(0, r, max_combination.layer_sizes);
    let mut cached_token: Option<u64> = None;
    while picker.next(v, combination) {
        let token = if !encode_connectivity {
            base_token
        } else if encoding_locked {
            *cached_token.get_or_insert_with(|| combination.encode_connectivity(base_token))
        } else {
            combination.encode_connectivity(base_token)
        };
        let entry = counts_map.entry(token).or_insert(Counts::ZERO);
        entry.all += 1;
        if combination.is_180_symmetric() {
            entry.symmetric180 += 1;
            if combination.is_90_symmetric() {
                entry.symmetric90 += 1;
            }
        }
    }
    Some(counts_map)
}

/// Grows `combination` (already containing the base/first wave) out to
/// `max_combination`'s full size, returning the accumulated per-token counts.
#[allow(clippy::too_many_arguments)]
pub fn build(
    combination: &mut Combination,
    wave_start: usize,
    wave_size: usize,
    encoding_locked: bool,
    encode_connectivity: bool,
    max_combination: &Combination,
    neighbours: &mut [BrickPlane; MAX_HEIGHT],
    base_token: u64,
) -> CountsMap {
    let v = find_potential_bricks_for_next_wave(combination, wave_start, wave_size, max_combination, neighbours);
    let r = max_combination.size - combination.size;

    if let Some(counts) = place_all_left_to_place(
        combination,
        &v,
        r,
        max_combination,
        encode_connectivity,
        encoding_locked,
        base_token,
    ) {
        return counts;
    }

    let mut counts_map = CountsMap::new();
    add_wave_to_neighbours(combination, wave_start, wave_size, neighbours, 1);

    for to_pick in 1..r {
        let mut picker = BrickPicker::new(0, to_pick, max_combination.layer_sizes);
        while picker.next(&v, combination) {
            let child_counts = build(
                combination,
                wave_start + wave_size,
                to_pick as usize,
                encoding_locked || to_pick == 1,
                encode_connectivity,
                max_combination,
                neighbours,
                base_token,
            );
            add_counts_from(&mut counts_map, &child_counts);
        }
    }

    add_wave_to_neighbours(combination, wave_start, wave_size, neighbours, -1);
    counts_map
}

/// Folds raw (double-counted) `all`/`symmetric*` entries into the final,
/// reportable counts. Symmetry counts are folded into `all` first
/// (`symmetric180 += symmetric90; all += symmetric90; all += symmetric180;`)
/// and only then divided: `all /= 2*s0`, `symmetric180 /= s0`,
/// `symmetric90 /= s0/2`.
pub fn finalize_counts(raw: &CountsMap, layer0_size: u8) -> CountsMap {
    let mut out = CountsMap::new();
    let s0 = layer0_size as u64;
    for (&token, &raw_counts) in raw {
        let folded_symmetric180 = raw_counts.symmetric180 + raw_counts.symmetric90;
        let folded_all = raw_counts.all + raw_counts.symmetric90 + folded_symmetric180;

        let all = folded_all / (2 * s0);
        let symmetric180 = folded_symmetric180 / s0;
        let symmetric90 = if s0 >= 2 { raw_counts.symmetric90 / (s0 / 2) } else { 0 };
        out.insert(token, Counts::new(all, symmetric180, symmetric90));
    }
    out
}

/// Sums every bucket in `raw` into a single `Counts`, then finalizes.
pub fn finalize_total(raw: &CountsMap, layer0_size: u8) -> Counts {
    let finalized = finalize_counts(raw, layer0_size);
    finalized.values().fold(Counts::ZERO, |acc, c| acc + *c)
}

/// Multi-threaded top-level driver for a single whole-refinement count.
/// `threads.max(1) - 1` (at least one) worker threads race a shared
/// [`MultiBatchSizeBrickPicker`] for successive second-wave batches grown off
/// the fixed first brick; each batch is cloned off the shared combination and
/// finished single-threaded via [`build`], so threads spend almost all their
/// time outside the shared lock.
pub fn build_parallel(max_combination: &Combination, threads: usize, encode_connectivity: bool) -> CountsMap {
    let seed = Combination::new();
    let r = max_combination.size.saturating_sub(seed.size);
    if r == 0 {
        let mut out = CountsMap::new();
        out.insert(0, Counts::new(1, 1, 1));
        return out;
    }

    let mut first_wave_neighbours: [BrickPlane; MAX_HEIGHT] = std::array::from_fn(|_| BrickPlane::new());
    add_wave_to_neighbours(&seed, 0, 1, &mut first_wave_neighbours, 1);
    let v = find_potential_bricks_for_next_wave(&seed, 0, 1, max_combination, &mut first_wave_neighbours);

    // Mirror build()'s own first move: try to finish in this one wave before
    // ever handing work to the picker/worker pool.
    let mut direct = seed.clone();
    if let Some(counts) =
        place_all_left_to_place(&mut direct, &v, r, max_combination, encode_connectivity, false, 0)
    {
        return counts;
    }

    let shared_combination = Mutex::new(seed);
    let picker = MultiBatchSizeBrickPicker::new(r - 1, max_combination.layer_sizes);
    let results = Mutex::new(CountsMap::new());
    let worker_count = threads.max(2) - 1;

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            scope.spawn(|| loop {
                let started = {
                    let mut combo = shared_combination.lock().expect("combination mutex poisoned");
                    let picked = picker.next(&v, &mut combo);
                    if picked == 0 {
                        None
                    } else {
                        let starter = combo.clone();
                        for _ in 0..picked {
                            combo.remove_last_brick();
                        }
                        Some((starter, picked))
                    }
                };
                let Some((mut starter, picked)) = started else { break };
                let mut neighbours: [BrickPlane; MAX_HEIGHT] = std::array::from_fn(|_| BrickPlane::new());
                add_wave_to_neighbours(&starter, 0, 1, &mut neighbours, 1);
                let child = build(
                    &mut starter,
                    1,
                    picked as usize,
                    picked == 1,
                    encode_connectivity,
                    max_combination,
                    &mut neighbours,
                    0,
                );
                let mut res = results.lock().expect("results mutex poisoned");
                add_counts_from(&mut res, &child);
            });
        }
    });

    results.into_inner().expect("results mutex poisoned")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Brick, PLANE_MID};

    #[test]
    fn can_become_symmetric_trivially_true_with_no_full_layers() {
        let combination = Combination::new();
        let max_combination = Combination::from_token(22);
        assert!(can_become_symmetric(&combination, &max_combination));
    }

    #[test]
    fn count_independent_subsets_excludes_overlaps() {
        let bricks = vec![
            LayerBrick { brick: Brick::new(false, PLANE_MID, PLANE_MID), layer: 0 },
            LayerBrick { brick: Brick::new(false, PLANE_MID + 1, PLANE_MID), layer: 0 }, // intersects the first
            LayerBrick { brick: Brick::new(false, PLANE_MID + 10, PLANE_MID), layer: 0 },
        ];
        assert_eq!(count_independent_subsets(&bricks, 2), 1); // only (0,2) is independent
    }

    #[test]
    fn build_single_brick_refinement_is_already_complete() {
        let mut combination = Combination::new();
        let max_combination = Combination::from_token(1);
        let mut neighbours: [BrickPlane; MAX_HEIGHT] = std::array::from_fn(|_| BrickPlane::new());
        let counts = build(&mut combination, 0, 1, false, false, &max_combination, &mut neighbours, 1);
        let total: u64 = counts.values().map(|c| c.all).sum();
        assert_eq!(total, 1);
    }
}
