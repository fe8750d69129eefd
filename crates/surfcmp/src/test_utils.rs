//! Shared test fixtures: synthetic TIFF volumes on disk and synthetic
//! point clouds.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use ndarray::{s, Array3};
use rand::rngs::StdRng;
use rand::Rng;

use crate::cloud::PointCloud;

/// Deterministic u16 ramp filling a (Z, Y, X) volume; every voxel value is
/// distinct enough to catch axis mixups and off-by-one tiling bugs.
pub(crate) fn ramp_volume(shape: [usize; 3]) -> Array3<u16> {
    let mut values = Array3::<u16>::zeros((shape[0], shape[1], shape[2]));
    for z in 0..shape[0] {
        for y in 0..shape[1] {
            for x in 0..shape[2] {
                values[[z, y, x]] = (z * 1000 + y * 50 + x + 1) as u16;
            }
        }
    }
    values
}

/// Write one 16-bit grayscale TIFF per Z index, named `{z}.tif`.
pub(crate) fn write_slice_volume(dir: &Path, values: &Array3<u16>) {
    let (nz, h, w) = values.dim();
    for z in 0..nz {
        let data: Vec<u16> = values.slice(s![z, .., ..]).iter().copied().collect();
        let buf =
            image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, data)
                .expect("slice buffer");
        buf.save(dir.join(format!("{z}.tif"))).expect("write slice");
    }
}

/// Write one 8-bit grayscale TIFF per Z index, named `{z}.tif`.
/// Values must fit in u8.
pub(crate) fn write_slice_volume_u8(dir: &Path, values: &Array3<u16>) {
    let (nz, h, w) = values.dim();
    for z in 0..nz {
        let data: Vec<u8> = values
            .slice(s![z, .., ..])
            .iter()
            .map(|&v| u8::try_from(v).expect("value fits u8"))
            .collect();
        let buf =
            image::ImageBuffer::<image::Luma<u8>, Vec<u8>>::from_raw(w as u32, h as u32, data)
                .expect("slice buffer");
        buf.save(dir.join(format!("{z}.tif"))).expect("write slice");
    }
}

/// Write a (Z, Y, X) volume as a grid of multi-page 16-bit TIFF cells named
/// `cell_yxz_{Y}_{X}_{Z}.tif`. Volume shape must divide evenly by
/// `cell_shape`; `grid_base` selects 0- or 1-based grid indices.
pub(crate) fn write_cell_volume(
    dir: &Path,
    values: &Array3<u16>,
    cell_shape: [usize; 3],
    grid_base: usize,
) {
    let (nz, ny, nx) = values.dim();
    let [cz, cy, cx] = cell_shape;
    assert_eq!(nz % cz, 0);
    assert_eq!(ny % cy, 0);
    assert_eq!(nx % cx, 0);
    for gz in 0..nz / cz {
        for gy in 0..ny / cy {
            for gx in 0..nx / cx {
                let name = format!(
                    "cell_yxz_{}_{}_{}.tif",
                    gy + grid_base,
                    gx + grid_base,
                    gz + grid_base
                );
                let file = File::create(dir.join(name)).expect("create cell");
                let mut encoder =
                    tiff::encoder::TiffEncoder::new(BufWriter::new(file)).expect("tiff encoder");
                for z in gz * cz..(gz + 1) * cz {
                    let page: Vec<u16> = values
                        .slice(s![z, gy * cy..(gy + 1) * cy, gx * cx..(gx + 1) * cx])
                        .iter()
                        .copied()
                        .collect();
                    encoder
                        .write_image::<tiff::encoder::colortype::Gray16>(
                            cx as u32, cy as u32, &page,
                        )
                        .expect("write cell page");
                }
            }
        }
    }
}

/// Random point cloud with unit normals, points in `[0, extent)^3`.
pub(crate) fn random_cloud(n: usize, extent: f64, rng: &mut StdRng) -> PointCloud {
    let mut cloud = PointCloud::with_capacity(n);
    for _ in 0..n {
        let p = [
            rng.gen_range(0.0..extent),
            rng.gen_range(0.0..extent),
            rng.gen_range(0.0..extent),
        ];
        let raw: [f64; 3] = [
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        ];
        let norm = (raw[0] * raw[0] + raw[1] * raw[1] + raw[2] * raw[2]).sqrt();
        let n = if norm > 1e-9 {
            [raw[0] / norm, raw[1] / norm, raw[2] / norm]
        } else {
            [0.0, 0.0, 1.0]
        };
        cloud.push(p, n);
    }
    cloud
}
