//! Exact nearest-neighbor lookup over a point set via a uniform hash grid.
//!
//! Cell size targets one point per cell on average. Queries expand outward
//! shell by shell around the query's (grid-clamped) cell and stop once the
//! next shell cannot beat the best hit: a cell at Chebyshev ring `k` inside
//! the grid is at least `sqrt(d_out^2 + ((k - 1) * cell)^2)` away, where
//! `d_out` is the query's distance to the grid bounding box. Small or
//! single-cell sets fall back to a linear scan.

use std::collections::HashMap;

const BRUTE_FORCE_LIMIT: usize = 64;

pub(crate) struct GridIndex<'a> {
    points: &'a [[f64; 3]],
    cell: f64,
    lo: [f64; 3],
    hi: [f64; 3],
    /// Highest occupied cell coordinate per axis (lowest is 0).
    max_cell: [i64; 3],
    bins: HashMap<[i64; 3], Vec<u32>>,
}

impl<'a> GridIndex<'a> {
    /// Build an index over a non-empty point set.
    pub(crate) fn build(points: &'a [[f64; 3]]) -> Self {
        debug_assert!(!points.is_empty());
        let mut lo = [f64::INFINITY; 3];
        let mut hi = [f64::NEG_INFINITY; 3];
        for p in points {
            for a in 0..3 {
                lo[a] = lo[a].min(p[a]);
                hi[a] = hi[a].max(p[a]);
            }
        }
        let volume: f64 = (0..3).map(|a| (hi[a] - lo[a]).max(1e-12)).product();
        let mut cell = (volume / points.len() as f64).cbrt();
        if !cell.is_finite() || cell <= 0.0 {
            cell = 1.0;
        }

        let cell_of = |p: &[f64; 3]| [0, 1, 2].map(|a| ((p[a] - lo[a]) / cell).floor() as i64);
        let mut bins: HashMap<[i64; 3], Vec<u32>> = HashMap::new();
        for (i, p) in points.iter().enumerate() {
            bins.entry(cell_of(p)).or_default().push(i as u32);
        }
        let max_cell = cell_of(&hi);
        Self {
            points,
            cell,
            lo,
            hi,
            max_cell,
            bins,
        }
    }

    /// Index and squared distance of the nearest point to `q`.
    pub(crate) fn nearest(&self, q: [f64; 3]) -> (usize, f64) {
        if self.points.len() <= BRUTE_FORCE_LIMIT || self.bins.len() == 1 {
            return nearest_brute(self.points, q);
        }

        // Squared distance from q to the grid bounding box; zero inside.
        let d_out_sq: f64 = (0..3)
            .map(|a| (self.lo[a] - q[a]).max(q[a] - self.hi[a]).max(0.0))
            .map(|d| d * d)
            .sum();
        let qc = [0, 1, 2].map(|a| {
            let raw = ((q[a] - self.lo[a]) / self.cell).floor() as i64;
            raw.clamp(0, self.max_cell[a])
        });
        let max_ring = (0..3)
            .map(|a| qc[a].max(self.max_cell[a] - qc[a]))
            .max()
            .unwrap_or(0);

        let mut best_idx = usize::MAX;
        let mut best_sq = f64::INFINITY;
        for ring in 0..=max_ring {
            if best_sq.is_finite() {
                let lateral = (ring - 1).max(0) as f64 * self.cell;
                if d_out_sq + lateral * lateral > best_sq {
                    break;
                }
            }
            self.for_each_in_ring(qc, ring, |i| {
                let d2 = dist_sq(&self.points[i as usize], &q);
                if d2 < best_sq {
                    best_sq = d2;
                    best_idx = i as usize;
                }
            });
        }
        (best_idx, best_sq)
    }

    fn for_each_in_ring(&self, center: [i64; 3], ring: i64, mut visit: impl FnMut(u32)) {
        for dz in -ring..=ring {
            for dy in -ring..=ring {
                for dx in -ring..=ring {
                    if dz.abs().max(dy.abs()).max(dx.abs()) != ring {
                        continue;
                    }
                    let c = [center[0] + dz, center[1] + dy, center[2] + dx];
                    if (0..3).any(|a| c[a] < 0 || c[a] > self.max_cell[a]) {
                        continue;
                    }
                    if let Some(indices) = self.bins.get(&c) {
                        for &i in indices {
                            visit(i);
                        }
                    }
                }
            }
        }
    }
}

fn nearest_brute(points: &[[f64; 3]], q: [f64; 3]) -> (usize, f64) {
    let mut best_idx = 0usize;
    let mut best_sq = f64::INFINITY;
    for (i, p) in points.iter().enumerate() {
        let d2 = dist_sq(p, &q);
        if d2 < best_sq {
            best_sq = d2;
            best_idx = i;
        }
    }
    (best_idx, best_sq)
}

fn dist_sq(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dz = a[0] - b[0];
    let dy = a[1] - b[1];
    let dx = a[2] - b[2];
    dz * dz + dy * dy + dx * dx
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_points(n: usize, extent: f64, rng: &mut StdRng) -> Vec<[f64; 3]> {
        (0..n)
            .map(|_| {
                [
                    rng.gen_range(0.0..extent),
                    rng.gen_range(0.0..extent),
                    rng.gen_range(0.0..extent),
                ]
            })
            .collect()
    }

    #[test]
    fn grid_matches_brute_force_on_random_sets() {
        let mut rng = StdRng::seed_from_u64(11);
        // Above the brute-force limit so the grid path is exercised.
        let targets = random_points(500, 10.0, &mut rng);
        let queries = random_points(200, 10.0, &mut rng);
        let index = GridIndex::build(&targets);
        for q in queries {
            let (gi, gd) = index.nearest(q);
            let (bi, bd) = nearest_brute(&targets, q);
            assert_eq!(gd, bd, "distance mismatch for query {q:?}");
            // Indices may differ only on exact ties.
            if gi != bi {
                assert_eq!(dist_sq(&targets[gi], &q), dist_sq(&targets[bi], &q));
            }
        }
    }

    #[test]
    fn queries_far_outside_the_bounding_box_resolve() {
        let mut rng = StdRng::seed_from_u64(7);
        let targets = random_points(300, 1.0, &mut rng);
        let index = GridIndex::build(&targets);
        for q in [[50.0, -40.0, 12.0], [-3.0, 0.5, 0.5], [0.5, 0.5, 900.0]] {
            let (gi, gd) = index.nearest(q);
            let (bi, bd) = nearest_brute(&targets, q);
            assert_eq!(gd, bd);
            assert_eq!(gi, bi);
        }
    }

    #[test]
    fn coincident_points_do_not_degenerate() {
        let targets = vec![[1.0, 1.0, 1.0]; 100];
        let index = GridIndex::build(&targets);
        let (_, d2) = index.nearest([1.0, 1.0, 1.0]);
        assert_eq!(d2, 0.0);
        let (_, d2) = index.nearest([2.0, 1.0, 1.0]);
        assert_eq!(d2, 1.0);
    }

    #[test]
    fn anisotropic_sets_stay_exact() {
        let mut rng = StdRng::seed_from_u64(23);
        // Thin slab: spans differ by orders of magnitude.
        let targets: Vec<[f64; 3]> = (0..400)
            .map(|_| {
                [
                    rng.gen_range(0.0..0.01),
                    rng.gen_range(0.0..100.0),
                    rng.gen_range(0.0..100.0),
                ]
            })
            .collect();
        let index = GridIndex::build(&targets);
        for _ in 0..100 {
            let q = [
                rng.gen_range(-1.0..1.0),
                rng.gen_range(0.0..100.0),
                rng.gen_range(0.0..100.0),
            ];
            let (_, gd) = index.nearest(q);
            let (_, bd) = nearest_brute(&targets, q);
            assert_eq!(gd, bd);
        }
    }
}
