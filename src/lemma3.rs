//! Lemma-3 base precomputation: for a fixed refinement, enumerate every
//! distinguishable base-layer layout at growing distance signatures, build
//! each one out to the full refinement with connectivity encoding, and
//! stream the result to a precomputation file.

use crate::base::{Base, CBase};
use crate::bitstream::{large_counts_required, BitWriter};
use crate::builder;
use crate::combination::Combination;
use crate::counts::{add_counts_from, CountsMap};
use crate::geometry::{Brick, BrickPlane, MAX_HEIGHT, PLANE_MID};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// How a base relates to the first base found with the same canonical shape.
#[derive(Clone, Debug)]
enum BaseRelation {
    Original,
    MirrorX(usize),
    MirrorY(usize),
}

struct BaseEntry {
    base: Base,
    reduction: Option<CBase>,
    relation: BaseRelation,
    is_180: bool,
    is_90: bool,
    counts: CountsMap,
}

/// Shared queue of bases still needing a wave-expansion build, plus the
/// results collected so far. One instance is shared by a pool of workers.
pub struct BaseBuilder {
    queue: Mutex<VecDeque<usize>>,
    entries: Mutex<Vec<BaseEntry>>,
    max_combination: Combination,
}

impl BaseBuilder {
    fn new(max_combination: Combination, entries: Vec<BaseEntry>) -> Self {
        let queue = (0..entries.len())
            .filter(|&i| matches!(entries[i].relation, BaseRelation::Original))
            .collect();
        BaseBuilder { queue: Mutex::new(queue), entries: Mutex::new(entries), max_combination }
    }

    /// Pops the next base index still needing work, if any.
    pub fn next_base_to_build_on(&self) -> Option<usize> {
        self.queue.lock().expect("base queue poisoned").pop_front()
    }

    /// Merges `counts` into the stored entry at `idx`.
    pub fn register_counts(&self, idx: usize, counts: CountsMap) {
        let mut entries = self.entries.lock().expect("base entries poisoned");
        add_counts_from(&mut entries[idx].counts, &counts);
    }

    fn build_one(&self, idx: usize) {
        let base = {
            let entries = self.entries.lock().expect("base entries poisoned");
            let entry = &entries[idx];
            entry.reduction.as_ref().map(|r| Base::from_bricks(r.as_slice())).unwrap_or(entry.base)
        };
        let mut combination = Combination::from_base(&base);
        let mut neighbours: [BrickPlane; MAX_HEIGHT] = std::array::from_fn(|_| BrickPlane::new());
        let wave_size = base.layer_size as usize;
        let counts = builder::build(
            &mut combination,
            0,
            wave_size,
            false,
            true,
            &self.max_combination,
            &mut neighbours,
            0,
        );
        self.register_counts(idx, counts);
    }

    /// Runs `max(1, threads - 1)` worker threads draining the queue, leaving
    /// the calling thread free to block on `join`.
    pub fn run(self, threads: usize) -> Vec<BaseEntry> {
        let worker_count = threads.max(2) - 1;
        let shared = std::sync::Arc::new(self);
        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let shared = shared.clone();
            handles.push(std::thread::spawn(move || {
                while let Some(idx) = shared.next_base_to_build_on() {
                    shared.build_one(idx);
                }
            }));
        }
        for h in handles {
            h.join().expect("lemma3 worker panicked");
        }
        std::sync::Arc::try_unwrap(shared)
            .unwrap_or_else(|_| panic!("base builder still shared after join"))
            .entries
            .into_inner()
            .expect("base entries poisoned")
    }

    /// Streams every built base to `writer`. Each base is one "batch": a
    /// leading indicator bit (`false` only at end of file), the base's own
    /// symmetry bits, optionally its geometry, an explicit entry count, then
    /// that many `(colours, counts)` entries. `total_size`/`height` describe
    /// the full refinement, used only to decide the wide counts variant.
    pub fn report<W: std::io::Write>(
        entries: &[BaseEntry],
        total_size: u8,
        height: u8,
        writer: &mut BitWriter<W>,
    ) -> Result<(), crate::error::BitStreamError> {
        let mut total_all = 0u64;
        let mut total_180 = 0u64;
        let mut total_90 = 0u64;
        let mut lines = 0u64;

        for entry in entries.iter() {
            let (counts, b) = match &entry.relation {
                BaseRelation::Original => (&entry.counts, entry.base.layer_size),
                BaseRelation::MirrorX(orig) | BaseRelation::MirrorY(orig) => {
                    (&entries[*orig].counts, entry.base.layer_size)
                }
            };

            writer.write_bit(true)?; // batch indicator: real base follows
            writer.write_bit(entry.is_180)?;
            if b % 4 == 0 {
                writer.write_bit(entry.is_90)?;
            }
            if b <= 4 {
                for brick in entry.base.as_slice()[1..].iter() {
                    writer.write_bit(brick.is_vertical)?;
                    writer.write_bits((brick.x - PLANE_MID) as i32 as u64 & 0xFFFF, 16)?;
                    writer.write_bits((brick.y - PLANE_MID) as i32 as u64 & 0xFFFF, 16)?;
                }
            }

            let large = large_counts_required(b, total_size, height);
            writer.write_bits(counts.len() as u64, 32)?;
            for (&token, &c) in counts {
                let digits = colour_digits(token, b as usize);
                for &d in &digits[1..] {
                    writer.write_bits(d as u64, 3)?;
                }
                writer.write_counts(&c, large, true)?;
                total_all += c.all;
                total_180 += c.symmetric180;
                total_90 += c.symmetric90;
                lines += 1;
            }
        }

        writer.write_bit(false)?; // end of file
        writer.write_bits(entries.len() as u64, 64)?;
        writer.write_bits(total_all, 64)?;
        writer.write_bits(total_180, 64)?;
        writer.write_bits(total_90, 64)?;
        writer.write_bits(lines, 64)?;
        Ok(())
    }
}

/// One base's decoded report contents, as read back from a precomputation file.
pub struct BaseReportEntry {
    pub is_180: bool,
    pub is_90: bool,
    pub bricks: Option<Vec<Brick>>,
    pub reports: Vec<(Vec<u16>, crate::counts::Counts)>,
}

/// Reads a precomputation file written by [`BaseBuilder::report`] back into
/// per-base entries, plus the trailing five cross-check totals
/// `(base count, sum all, sum symmetric180, sum symmetric90, line count)`.
pub fn read_report_file<R: std::io::Read>(
    reader: &mut crate::bitstream::BitReader<R>,
    b: usize,
    total_size: u8,
    height: u8,
) -> Result<(Vec<BaseReportEntry>, [u64; 5]), crate::error::BitStreamError> {
    let large = large_counts_required(b as u8, total_size, height);
    let mut entries = Vec::new();

    loop {
        if !reader.read_bit()? {
            break;
        }
        let is_180 = reader.read_bit()?;
        let is_90 = if b % 4 == 0 { reader.read_bit()? } else { false };
        let bricks = if b <= 4 {
            let mut out = vec![Brick::first()];
            for _ in 1..b {
                let is_vertical = reader.read_bit()?;
                let dx = reader.read_bits(16)? as i16;
                let dy = reader.read_bits(16)? as i16;
                out.push(Brick::new(is_vertical, PLANE_MID + dx, PLANE_MID + dy));
            }
            Some(out)
        } else {
            None
        };

        let entry_count = reader.read_bits(32)?;
        let mut reports = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let mut colors = vec![1u16];
            for _ in 1..b {
                colors.push(reader.read_bits(3)? as u16);
            }
            let counts = reader.read_counts(large, true)?;
            reports.push((colors, counts));
        }
        entries.push(BaseReportEntry { is_180, is_90, bricks, reports });
    }

    let base_count = reader.read_bits(64)?;
    let total_all = reader.read_bits(64)?;
    let total_180 = reader.read_bits(64)?;
    let total_90 = reader.read_bits(64)?;
    let lines = reader.read_bits(64)?;
    Ok((entries, [base_count, total_all, total_180, total_90, lines]))
}

/// Decodes `token`'s trailing decimal digits into `b` per-brick connectivity
/// colours, most significant (brick index 0, always colour 1) first.
fn colour_digits(mut token: u64, b: usize) -> Vec<u8> {
    let mut digits = Vec::with_capacity(b);
    while token > 0 {
        digits.push((token % 10) as u8);
        token /= 10;
    }
    while digits.len() < b {
        digits.push(0);
    }
    digits.reverse();
    digits
}

/// All lattice displacements `(dx, dy)` with `|dx| + |dy| == d`.
fn points_at_distance(d: i32) -> Vec<(i32, i32)> {
    if d == 0 {
        return vec![(0, 0)];
    }
    let mut out = Vec::new();
    for a in 0..=d {
        let b = d - a;
        for &(sx, sy) in &[(1, 1), (1, -1), (-1, 1), (-1, -1)] {
            out.push((a * sx, b * sy));
        }
    }
    out.sort_unstable();
    out.dedup();
    out
}

/// Every non-decreasing signature of length `len` whose last entry is `d`.
fn signatures_ending_at(len: usize, d: i32) -> Vec<Vec<i32>> {
    if len == 0 {
        return vec![vec![]];
    }
    fn rec(remaining: usize, max: i32, min: i32, out: &mut Vec<i32>, results: &mut Vec<Vec<i32>>) {
        if remaining == 0 {
            results.push(out.clone());
            return;
        }
        for v in min..=max {
            out.push(v);
            rec(remaining - 1, max, v, out, results);
            out.pop();
        }
    }
    let mut results = Vec::new();
    rec(len - 1, d, 2, &mut Vec::new(), &mut results);
    for sig in results.iter_mut() {
        sig.push(d);
    }
    results
}

/// Recursively places bricks `1..b` at the distances named by `signature`,
/// rejecting intersections, collecting every completed placement.
fn generate_raw_bases(b: usize, signature: &[i32]) -> Vec<Base> {
    let first = Brick::first();
    let mut out = Vec::new();
    let mut placed = vec![first];

    fn rec(b: usize, signature: &[i32], placed: &mut Vec<Brick>, out: &mut Vec<Base>) {
        if placed.len() == b {
            out.push(Base::from_bricks(placed));
            return;
        }
        let d = signature[placed.len() - 1];
        for (dx, dy) in points_at_distance(d) {
            for is_vertical in [true, false] {
                let x = PLANE_MID as i32 + dx;
                let y = PLANE_MID as i32 + dy;
                if x < 0 || y < 0 || x >= crate::geometry::PLANE_WIDTH as i32 || y >= crate::geometry::PLANE_WIDTH as i32 {
                    continue;
                }
                let candidate = Brick::new(is_vertical, x as i16, y as i16);
                if placed.iter().any(|p| p.intersects(&candidate)) {
                    continue;
                }
                placed.push(candidate);
                rec(b, signature, placed, out);
                placed.pop();
            }
        }
    }

    rec(b, signature, &mut placed, &mut out);
    out
}

/// Builds every canonical, deduplicated, non-mirror-redundant base entry for
/// one distance signature, registering reductions and mirror relations.
fn collect_bases_for_signature(
    b: usize,
    signature: &[i32],
    bridge: u32,
    seen: &mut HashMap<Vec<Brick>, usize>,
    entries: &mut Vec<BaseEntry>,
) {
    if b == 1 {
        if signature.is_empty() && seen.is_empty() {
            let base = Base::new();
            seen.insert(base.as_slice().to_vec(), entries.len());
            entries.push(BaseEntry {
                base,
                reduction: None,
                relation: BaseRelation::Original,
                is_180: true,
                is_90: false,
                counts: CountsMap::new(),
            });
        }
        return;
    }

    for raw in generate_raw_bases(b, signature) {
        let mut canonical = raw;
        canonical.normalize();
        if canonical.distance_signature().as_slice() != signature {
            continue; // belongs under a different signature's enumeration.
        }
        let key = canonical.as_slice().to_vec();
        if seen.contains_key(&key) {
            continue;
        }

        let mut mirror_x = canonical;
        mirror_x.mirror_x();
        let mirror_x_key = mirror_x.as_slice().to_vec();
        let mut mirror_y = canonical;
        mirror_y.mirror_y();
        let mirror_y_key = mirror_y.as_slice().to_vec();

        let relation = seen
            .get(&mirror_x_key)
            .map(|&i| BaseRelation::MirrorX(i))
            .or_else(|| seen.get(&mirror_y_key).map(|&i| BaseRelation::MirrorY(i)));

        seen.insert(key, entries.len());

        let is_180 = {
            let mut combo = Combination::from_base(&canonical);
            combo.is_180_symmetric()
        };
        let reduction = if is_180 {
            None
        } else {
            canonical.reduce_from_unreachable(bridge).map(|(_, cbase)| cbase)
        };

        entries.push(BaseEntry {
            base: canonical,
            reduction,
            relation: relation.unwrap_or(BaseRelation::Original),
            is_180,
            is_90: false,
            counts: CountsMap::new(),
        });
    }
}

/// Runs the wave-expansion precomputation for `refinement` out to `max_dist`,
/// writing one `d.bin` file per distance under `base_<b>_size_<n>_refinement_<refinement><suffix>/`.
pub fn precompute(
    refinement: u64,
    max_dist: i32,
    threads: usize,
    suffix: &str,
    overwrite: bool,
) -> Result<(), crate::error::BitStreamError> {
    let max_combination = Combination::from_token(refinement);
    let b = max_combination.layer_sizes[0] as usize;
    let n = max_combination.size;
    let dir = format!("base_{}_size_{}_refinement_{}{}", b, n, refinement, suffix);
    std::fs::create_dir_all(&dir)?;

    for d in 2..=max_dist {
        let path = format!("{}/d{}.bin", dir, d);
        if !overwrite && std::path::Path::new(&path).exists() {
            tracing::info!(path, "precomputation file already exists, skipping");
            continue;
        }

        let bridge = Combination::count_bricks_to_bridge(&max_combination);
        let mut seen: HashMap<Vec<Brick>, usize> = HashMap::new();
        let mut entries = Vec::new();
        for signature in signatures_ending_at(b.saturating_sub(1), d) {
            collect_bases_for_signature(b, &signature, bridge, &mut seen, &mut entries);
        }

        let base_builder = BaseBuilder::new(max_combination.clone(), entries);
        let built = base_builder.run(threads);

        let file = std::fs::File::create(&path)?;
        let mut writer = BitWriter::new(std::io::BufWriter::new(file));
        BaseBuilder::report(&built, n, max_combination.height, &mut writer)?;
        writer.finish()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_at_distance_two_has_four_points() {
        let pts = points_at_distance(2);
        assert!(pts.contains(&(2, 0)));
        assert!(pts.contains(&(0, 2)));
        assert!(pts.contains(&(1, 1)));
    }

    #[test]
    fn signatures_ending_at_respects_monotonicity() {
        let sigs = signatures_ending_at(2, 3);
        for sig in &sigs {
            assert_eq!(*sig.last().unwrap(), 3);
            assert!(sig.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn generate_raw_bases_produces_nonempty_set_for_distance_two() {
        let bases = generate_raw_bases(2, &[2]);
        assert!(!bases.is_empty());
    }
}
