//! Cubic region extraction and intensity normalization.

use ndarray::Array3;

use crate::error::{Error, Result};
use crate::volume::VirtualVolume;

/// Read the cube `[center - radius, center + radius)` per axis and map raw
/// intensity into `[0, 1]` by the maximum representable value of the source
/// sample bit depth.
///
/// Fails with [`Error::OutOfBounds`] when the cube exceeds the volume
/// extents; callers are responsible for choosing centers at least `radius`
/// away from every boundary.
pub fn extract_region(
    volume: &VirtualVolume,
    center: [usize; 3],
    radius: usize,
) -> Result<Array3<f32>> {
    let extents = volume.extents();
    let in_bounds = (0..3).all(|a| center[a] >= radius && center[a] + radius <= extents[a]);
    if !in_bounds {
        let lo = [0, 1, 2].map(|a| center[a] as i64 - radius as i64);
        let hi = [0, 1, 2].map(|a| center[a] as i64 + radius as i64);
        return Err(Error::OutOfBounds { lo, hi, extents });
    }

    let raw = volume.read_region(
        center[0] - radius..center[0] + radius,
        center[1] - radius..center[1] + radius,
        center[2] - radius..center[2] + radius,
    )?;
    let max = f32::from(volume.max_sample_value());
    Ok(raw.mapv(|v| f32::from(v) / max))
}
