//! Geometric-agreement metrics between two labeled point clouds.
//!
//! Three components, each built from a directed pass in both directions
//! over one shared nearest-neighbor correspondence:
//!
//! - **Chamfer**: mean squared nearest-neighbor distance per direction,
//!   summed bidirectionally.
//! - **Normals**: mean cosine dissimilarity `1 - dot(n, n_matched)` over
//!   the same correspondence, summed bidirectionally.
//! - **Hausdorff**: the largest per-point nearest-neighbor distance, taken
//!   over both directions — worst case, not average case, so holes and
//!   outliers that the means mask stay visible.
//!
//! All components are scale-sensitive: no normalization beyond the stated
//! averaging. Normals are trusted to be unit length and are not
//! renormalized here.

mod grid;

use crate::cloud::PointCloud;
use crate::error::{Error, Result};
use grid::GridIndex;

/// Agreement metrics between two point clouds. Directional components are
/// reported individually since neither direction is dominant and asymmetric
/// coverage gaps must stay diagnosable.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ComparisonResult {
    /// Mean squared NN distance, cloud1 into cloud2.
    pub chamfer_12: f64,
    /// Mean squared NN distance, cloud2 into cloud1.
    pub chamfer_21: f64,
    /// Bidirectional Chamfer score: `chamfer_12 + chamfer_21`.
    pub chamfer: f64,
    /// Mean normal cosine dissimilarity, cloud1 against its matches.
    pub normals_12: f64,
    /// Mean normal cosine dissimilarity, cloud2 against its matches.
    pub normals_21: f64,
    /// Combined normal-disagreement score: `normals_12 + normals_21`.
    pub normals: f64,
    /// Symmetric Hausdorff distance (not squared).
    pub hausdorff: f64,
}

struct DirectedPass {
    mean_sq: f64,
    max_dist: f64,
    mean_cos_dissim: f64,
}

/// Score the geometric agreement of two non-empty point clouds.
///
/// Fails with [`Error::EmptyCloud`] when either side has no points; a
/// degenerate numeric result is never silently substituted.
pub fn compare(cloud1: &PointCloud, cloud2: &PointCloud) -> Result<ComparisonResult> {
    if cloud1.is_empty() {
        return Err(Error::EmptyCloud { side: 1 });
    }
    if cloud2.is_empty() {
        return Err(Error::EmptyCloud { side: 2 });
    }

    let pass12 = directed(cloud1, cloud2);
    let pass21 = directed(cloud2, cloud1);
    Ok(ComparisonResult {
        chamfer_12: pass12.mean_sq,
        chamfer_21: pass21.mean_sq,
        chamfer: pass12.mean_sq + pass21.mean_sq,
        normals_12: pass12.mean_cos_dissim,
        normals_21: pass21.mean_cos_dissim,
        normals: pass12.mean_cos_dissim + pass21.mean_cos_dissim,
        hausdorff: pass12.max_dist.max(pass21.max_dist),
    })
}

/// One directed pass: index `to`, query every point of `from`.
///
/// The directed Hausdorff distance is the maximum over `from` of the
/// nearest-neighbor distance into `to`, so it falls out of the same pass.
fn directed(from: &PointCloud, to: &PointCloud) -> DirectedPass {
    let index = GridIndex::build(&to.points);
    let mut sum_sq = 0.0;
    let mut max_sq = 0.0f64;
    let mut sum_cos_dissim = 0.0;
    for (p, n) in from.points.iter().zip(&from.normals) {
        let (matched, d2) = index.nearest(*p);
        sum_sq += d2;
        max_sq = max_sq.max(d2);
        let m = &to.normals[matched];
        sum_cos_dissim += 1.0 - (n[0] * m[0] + n[1] * m[1] + n[2] * m[2]);
    }
    let count = from.len() as f64;
    DirectedPass {
        mean_sq: sum_sq / count,
        max_dist: max_sq.sqrt(),
        mean_cos_dissim: sum_cos_dissim / count,
    }
}
