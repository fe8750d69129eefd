//! Virtual volume: a directory of TIFF tiles as one (Z, Y, X) array.
//!
//! Layout is detected once at open time ([`LayoutKind`]); reads never branch
//! on filenames again. Arbitrary axis-aligned sub-ranges are served without
//! materializing the whole volume: only the tiles intersecting a request are
//! decoded, through a bounded FIFO cache.

mod cache;
mod layout;

use std::fs::File;
use std::io::BufReader;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ndarray::{s, Array3};
use tiff::decoder::{Decoder, DecodingResult};

use crate::error::{Error, Result};
use cache::TileCache;
use layout::{is_tiff_name, parse_tile_name, tile_stem, TileName};

/// Default decoded-tile cache capacity (tiles, not bytes).
const DEFAULT_CACHE_TILES: usize = 64;

/// Which on-disk tile layout a volume directory follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    /// One 2D image per Z index, numeric filenames.
    Slices,
    /// A regular (Y, X, Z) grid of 3D cuboid tiles.
    Cells,
}

#[derive(Debug)]
enum TileLayout {
    Slices {
        /// Paths in ascending numeric Z order.
        paths: Vec<PathBuf>,
        /// (height, width) of every slice.
        slice_shape: [usize; 2],
    },
    Cells {
        /// Dense grid, indexed `(gz * grid[1] + gy) * grid[2] + gx`.
        paths: Vec<PathBuf>,
        /// Cell counts per logical (Z, Y, X) axis.
        grid: [usize; 3],
        /// (z, y, x) voxel shape of every cell.
        cell_shape: [usize; 3],
    },
}

/// A directory of 2D or 3D TIFF tiles, addressable as one contiguous
/// (Z, Y, X) array of scalar intensities.
///
/// Reads are side-effect-free and reentrant; the decoded-tile cache sits
/// behind a mutex so concurrent extractions from one opened volume are safe.
#[derive(Debug)]
pub struct VirtualVolume {
    layout: TileLayout,
    extents: [usize; 3],
    bits_per_sample: u8,
    cache: Mutex<TileCache>,
}

impl VirtualVolume {
    /// Open a tile directory, detecting its layout from filenames.
    ///
    /// Fails with [`Error::Configuration`] when the directory holds no TIFF
    /// tiles, mixes naming schemes, or follows neither scheme.
    pub fn open(dir: &Path) -> Result<Self> {
        Self::open_with_cache(dir, DEFAULT_CACHE_TILES)
    }

    /// Open with an explicit decoded-tile cache capacity.
    pub fn open_with_cache(dir: &Path, cache_tiles: usize) -> Result<Self> {
        let mut names: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_file() && is_tiff_name(&name) {
                names.push(name);
            }
        }
        if names.is_empty() {
            return Err(Error::Configuration(format!(
                "no .tif tiles found in {}",
                dir.display()
            )));
        }

        let mut slices: Vec<(u64, PathBuf)> = Vec::new();
        let mut cells: Vec<([usize; 3], PathBuf)> = Vec::new();
        for name in &names {
            match parse_tile_name(tile_stem(name)) {
                Some(TileName::Slice { sort_key }) => slices.push((sort_key, dir.join(name))),
                Some(TileName::Cell { y, x, z }) => cells.push(([y, x, z], dir.join(name))),
                None => {
                    return Err(Error::Configuration(format!(
                        "unrecognized tile name '{name}' in {}",
                        dir.display()
                    )))
                }
            }
        }
        if !slices.is_empty() && !cells.is_empty() {
            return Err(Error::Configuration(format!(
                "mixed slice and cell tile naming in {}",
                dir.display()
            )));
        }

        let (layout, extents, bits_per_sample) = if cells.is_empty() {
            Self::build_slice_layout(slices)?
        } else {
            Self::build_cell_layout(cells)?
        };

        tracing::debug!(
            ?extents,
            bits_per_sample,
            "opened virtual volume at {}",
            dir.display()
        );
        Ok(Self {
            layout,
            extents,
            bits_per_sample,
            cache: Mutex::new(TileCache::new(cache_tiles)),
        })
    }

    fn build_slice_layout(
        mut slices: Vec<(u64, PathBuf)>,
    ) -> Result<(TileLayout, [usize; 3], u8)> {
        slices.sort_by_key(|(key, _)| *key);
        for pair in slices.windows(2) {
            if pair[1].0 != pair[0].0 + 1 {
                return Err(Error::Configuration(format!(
                    "slice indices not contiguous: {} is followed by {}",
                    pair[0].0, pair[1].0
                )));
            }
        }
        let paths: Vec<PathBuf> = slices.into_iter().map(|(_, p)| p).collect();
        let (slice_shape, bits) = probe_slice(&paths[0])?;
        let extents = [paths.len(), slice_shape[0], slice_shape[1]];
        Ok((TileLayout::Slices { paths, slice_shape }, extents, bits))
    }

    fn build_cell_layout(cells: Vec<([usize; 3], PathBuf)>) -> Result<(TileLayout, [usize; 3], u8)> {
        // Grids in the wild are 0- or 1-based; normalize each axis to its
        // observed minimum.
        let mut min = [usize::MAX; 3];
        let mut max = [0usize; 3];
        for (yxz, _) in &cells {
            for a in 0..3 {
                min[a] = min[a].min(yxz[a]);
                max[a] = max[a].max(yxz[a]);
            }
        }
        // Filename triple is (Y, X, Z); logical grid order is (Z, Y, X).
        let grid = [
            max[2] - min[2] + 1,
            max[0] - min[0] + 1,
            max[1] - min[1] + 1,
        ];
        let mut paths: Vec<Option<PathBuf>> = vec![None; grid[0] * grid[1] * grid[2]];
        for (yxz, path) in cells {
            let gz = yxz[2] - min[2];
            let gy = yxz[0] - min[0];
            let gx = yxz[1] - min[1];
            let slot = &mut paths[(gz * grid[1] + gy) * grid[2] + gx];
            if slot.is_some() {
                return Err(Error::Configuration(format!(
                    "duplicate cell tile for grid position y={} x={} z={}",
                    yxz[0], yxz[1], yxz[2]
                )));
            }
            *slot = Some(path);
        }
        let paths: Vec<PathBuf> = paths
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                p.ok_or_else(|| {
                    Error::Configuration(format!("cell grid has a hole at linear index {i}"))
                })
            })
            .collect::<Result<_>>()?;

        let (cell_shape, bits) = probe_cell(&paths[0])?;
        let extents = [
            grid[0] * cell_shape[0],
            grid[1] * cell_shape[1],
            grid[2] * cell_shape[2],
        ];
        Ok((
            TileLayout::Cells {
                paths,
                grid,
                cell_shape,
            },
            extents,
            bits,
        ))
    }

    /// Volume extents per (Z, Y, X) axis, in voxels.
    pub fn extents(&self) -> [usize; 3] {
        self.extents
    }

    /// Bits per intensity sample of the backing tiles (8 or 16).
    pub fn bits_per_sample(&self) -> u8 {
        self.bits_per_sample
    }

    /// Maximum representable value of the source sample type.
    ///
    /// 8-bit tiles are widened to u16 on read, but this still reports 255
    /// for them so normalization tracks the source bit depth.
    pub fn max_sample_value(&self) -> u16 {
        match self.bits_per_sample {
            8 => u16::from(u8::MAX),
            _ => u16::MAX,
        }
    }

    /// Which tile layout was detected at open time.
    pub fn layout_kind(&self) -> LayoutKind {
        match self.layout {
            TileLayout::Slices { .. } => LayoutKind::Slices,
            TileLayout::Cells { .. } => LayoutKind::Cells,
        }
    }

    /// Number of backing tiles.
    pub fn tile_count(&self) -> usize {
        match &self.layout {
            TileLayout::Slices { paths, .. } => paths.len(),
            TileLayout::Cells { paths, .. } => paths.len(),
        }
    }

    /// Read an axis-aligned sub-range into a dense array.
    ///
    /// Fails with [`Error::OutOfBounds`] when any range falls outside the
    /// volume extents. Only tiles intersecting the request are decoded.
    pub fn read_region(
        &self,
        z: Range<usize>,
        y: Range<usize>,
        x: Range<usize>,
    ) -> Result<Array3<u16>> {
        let ranges = [&z, &y, &x];
        for (axis, range) in ranges.iter().enumerate() {
            if range.start > range.end || range.end > self.extents[axis] {
                return Err(Error::OutOfBounds {
                    lo: [z.start as i64, y.start as i64, x.start as i64],
                    hi: [z.end as i64, y.end as i64, x.end as i64],
                    extents: self.extents,
                });
            }
        }

        let shape = (z.len(), y.len(), x.len());
        let mut out = Array3::<u16>::zeros(shape);
        if shape.0 == 0 || shape.1 == 0 || shape.2 == 0 {
            return Ok(out);
        }

        match &self.layout {
            TileLayout::Slices { .. } => {
                for zi in z.clone() {
                    let tile = self.tile(zi)?;
                    out.slice_mut(s![zi - z.start, .., ..])
                        .assign(&tile.slice(s![0, y.clone(), x.clone()]));
                }
            }
            TileLayout::Cells {
                grid, cell_shape, ..
            } => {
                let [cz, cy, cx] = *cell_shape;
                for gz in z.start / cz..=(z.end - 1) / cz {
                    for gy in y.start / cy..=(y.end - 1) / cy {
                        for gx in x.start / cx..=(x.end - 1) / cx {
                            let tile = self.tile((gz * grid[1] + gy) * grid[2] + gx)?;
                            let z0 = z.start.max(gz * cz);
                            let z1 = z.end.min((gz + 1) * cz);
                            let y0 = y.start.max(gy * cy);
                            let y1 = y.end.min((gy + 1) * cy);
                            let x0 = x.start.max(gx * cx);
                            let x1 = x.end.min((gx + 1) * cx);
                            out.slice_mut(s![
                                z0 - z.start..z1 - z.start,
                                y0 - y.start..y1 - y.start,
                                x0 - x.start..x1 - x.start
                            ])
                            .assign(&tile.slice(s![
                                z0 - gz * cz..z1 - gz * cz,
                                y0 - gy * cy..y1 - gy * cy,
                                x0 - gx * cx..x1 - gx * cx
                            ]));
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// Fetch a decoded tile through the cache.
    fn tile(&self, index: usize) -> Result<Arc<Array3<u16>>> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tile) = cache.get(index) {
            return Ok(tile);
        }
        let tile = Arc::new(match &self.layout {
            TileLayout::Slices { paths, slice_shape } => {
                decode_slice(&paths[index], *slice_shape)?
            }
            TileLayout::Cells {
                paths, cell_shape, ..
            } => decode_cell(&paths[index], *cell_shape)?,
        });
        cache.insert(index, Arc::clone(&tile));
        Ok(tile)
    }
}

fn probe_slice(path: &Path) -> Result<([usize; 2], u8)> {
    let img = image::open(path)?;
    let bits = match img.color() {
        image::ColorType::L8 => 8,
        image::ColorType::L16 => 16,
        other => {
            return Err(Error::Configuration(format!(
                "unsupported slice sample format {other:?} in {}",
                path.display()
            )))
        }
    };
    let shape = [img.height() as usize, img.width() as usize];
    Ok((shape, bits))
}

fn decode_slice(path: &Path, slice_shape: [usize; 2]) -> Result<Array3<u16>> {
    let img = image::open(path)?;
    let (w, h) = (img.width() as usize, img.height() as usize);
    if [h, w] != slice_shape {
        return Err(Error::Configuration(format!(
            "slice {} is {h}x{w}, expected {}x{}",
            path.display(),
            slice_shape[0],
            slice_shape[1]
        )));
    }
    // No DynamicImage conversions here: to_luma16 would rescale 8-bit
    // samples, and raw values must survive untouched.
    let data: Vec<u16> = match img {
        image::DynamicImage::ImageLuma8(buf) => {
            buf.into_raw().into_iter().map(u16::from).collect()
        }
        image::DynamicImage::ImageLuma16(buf) => buf.into_raw(),
        other => {
            return Err(Error::Configuration(format!(
                "unsupported slice sample format {:?} in {}",
                other.color(),
                path.display()
            )))
        }
    };
    Array3::from_shape_vec((1, h, w), data)
        .map_err(|e| Error::Configuration(format!("slice {}: {e}", path.display())))
}

fn probe_cell(path: &Path) -> Result<([usize; 3], u8)> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    let bits = match decoder.colortype()? {
        tiff::ColorType::Gray(8) => 8,
        tiff::ColorType::Gray(16) => 16,
        other => {
            return Err(Error::Configuration(format!(
                "unsupported cell sample format {other:?} in {}",
                path.display()
            )))
        }
    };
    let (w, h) = decoder.dimensions()?;
    let mut pages = 1usize;
    while decoder.more_images() {
        decoder.next_image()?;
        pages += 1;
    }
    Ok(([pages, h as usize, w as usize], bits))
}

fn decode_cell(path: &Path, cell_shape: [usize; 3]) -> Result<Array3<u16>> {
    let [cz, cy, cx] = cell_shape;
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    let mut data: Vec<u16> = Vec::with_capacity(cz * cy * cx);
    let mut pages = 0usize;
    loop {
        let (w, h) = decoder.dimensions()?;
        if (h as usize, w as usize) != (cy, cx) {
            return Err(Error::Configuration(format!(
                "cell {} page {pages} is {h}x{w}, expected {cy}x{cx}",
                path.display()
            )));
        }
        match decoder.read_image()? {
            DecodingResult::U8(v) => data.extend(v.into_iter().map(u16::from)),
            DecodingResult::U16(v) => data.extend(v),
            _ => {
                return Err(Error::Configuration(format!(
                    "unsupported cell sample format in {}",
                    path.display()
                )))
            }
        }
        pages += 1;
        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }
    if pages != cz {
        return Err(Error::Configuration(format!(
            "cell {} has {pages} pages, expected {cz}",
            path.display()
        )));
    }
    Array3::from_shape_vec((cz, cy, cx), data)
        .map_err(|e| Error::Configuration(format!("cell {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ramp_volume, write_cell_volume, write_slice_volume};

    #[test]
    fn slices_read_back_in_numeric_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        // 12 slices so lexicographic order (0, 1, 10, 11, 2, ...) would differ.
        let mut values = Array3::<u16>::zeros((12, 3, 4));
        for z in 0..12 {
            values.slice_mut(s![z, .., ..]).fill(z as u16);
        }
        write_slice_volume(dir.path(), &values);

        let volume = VirtualVolume::open(dir.path()).expect("open");
        assert_eq!(volume.layout_kind(), LayoutKind::Slices);
        assert_eq!(volume.extents(), [12, 3, 4]);
        let read = volume.read_region(0..12, 0..3, 0..4).expect("read");
        for z in 0..12 {
            assert_eq!(read[[z, 1, 2]], z as u16, "slice {z} out of order");
        }
    }

    #[test]
    fn sub_range_reads_match_the_dense_volume() {
        let dir = tempfile::tempdir().expect("tempdir");
        let values = ramp_volume([6, 5, 7]);
        write_slice_volume(dir.path(), &values);

        let volume = VirtualVolume::open(dir.path()).expect("open");
        let read = volume.read_region(1..5, 2..5, 3..7).expect("read");
        assert_eq!(read, values.slice(s![1..5, 2..5, 3..7]).to_owned());
    }

    #[test]
    fn cell_reads_cross_tile_boundaries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let values = ramp_volume([4, 4, 6]);
        write_cell_volume(dir.path(), &values, [2, 2, 3], 0);

        let volume = VirtualVolume::open(dir.path()).expect("open");
        assert_eq!(volume.layout_kind(), LayoutKind::Cells);
        assert_eq!(volume.extents(), [4, 4, 6]);
        assert_eq!(volume.tile_count(), 8);
        let read = volume.read_region(1..4, 1..3, 2..5).expect("read");
        assert_eq!(read, values.slice(s![1..4, 1..3, 2..5]).to_owned());
    }

    #[test]
    fn one_based_cell_grids_are_accepted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let values = ramp_volume([4, 2, 2]);
        write_cell_volume(dir.path(), &values, [2, 2, 2], 1);

        let volume = VirtualVolume::open(dir.path()).expect("open");
        assert_eq!(volume.extents(), [4, 2, 2]);
        let read = volume.read_region(0..4, 0..2, 0..2).expect("read");
        assert_eq!(read, values);
    }

    #[test]
    fn mixed_naming_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let values = ramp_volume([2, 2, 2]);
        write_slice_volume(dir.path(), &values);
        std::fs::copy(
            dir.path().join("0.tif"),
            dir.path().join("cell_yxz_0_0_0.tif"),
        )
        .expect("copy");

        let err = VirtualVolume::open(dir.path()).expect_err("expected error");
        assert!(matches!(err, Error::Configuration(_)), "got {err:?}");
    }

    #[test]
    fn unrecognized_naming_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let values = ramp_volume([2, 2, 2]);
        write_slice_volume(dir.path(), &values);
        std::fs::copy(dir.path().join("0.tif"), dir.path().join("notes.tif")).expect("copy");

        let err = VirtualVolume::open(dir.path()).expect_err("expected error");
        assert!(matches!(err, Error::Configuration(_)), "got {err:?}");
    }

    #[test]
    fn empty_directory_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = VirtualVolume::open(dir.path()).expect_err("expected error");
        assert!(matches!(err, Error::Configuration(_)), "got {err:?}");
    }

    #[test]
    fn slice_gaps_are_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let values = ramp_volume([3, 2, 2]);
        write_slice_volume(dir.path(), &values);
        std::fs::remove_file(dir.path().join("1.tif")).expect("remove");

        let err = VirtualVolume::open(dir.path()).expect_err("expected error");
        assert!(matches!(err, Error::Configuration(_)), "got {err:?}");
    }

    #[test]
    fn out_of_bounds_reads_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let values = ramp_volume([3, 3, 3]);
        write_slice_volume(dir.path(), &values);

        let volume = VirtualVolume::open(dir.path()).expect("open");
        let err = volume.read_region(0..3, 0..3, 0..4).expect_err("expected error");
        assert!(matches!(err, Error::OutOfBounds { .. }), "got {err:?}");
        let err = volume.read_region(2..4, 0..3, 0..3).expect_err("expected error");
        assert!(matches!(err, Error::OutOfBounds { .. }), "got {err:?}");
    }

    #[test]
    fn small_cache_still_reads_correctly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let values = ramp_volume([6, 4, 4]);
        write_slice_volume(dir.path(), &values);

        let volume = VirtualVolume::open_with_cache(dir.path(), 2).expect("open");
        let read = volume.read_region(0..6, 0..4, 0..4).expect("read");
        assert_eq!(read, values);
        // Re-read after eviction churn.
        let read = volume.read_region(0..2, 0..4, 0..4).expect("read");
        assert_eq!(read, values.slice(s![0..2, .., ..]).to_owned());
    }
}
