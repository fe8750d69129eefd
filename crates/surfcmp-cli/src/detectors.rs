//! Reference detection collaborator for the CLI.
//!
//! The production detection methods live outside this repository; this
//! baseline exists so the pipeline can be exercised end to end. It marks
//! voxels whose smoothed intensity gradient exceeds `threshold_der` and
//! orients each gradient normal into the hemisphere of the configured
//! reference vector. Only a subset of the tunables applies to it
//! (`blur_size`, `threshold_der`, `global_reference_vector`).

use ndarray::Array3;
use surfcmp::{Detection, Error, MethodTunables, PointCloud, Result, SurfaceDetector};

pub struct GradientShellDetector;

impl SurfaceDetector for GradientShellDetector {
    fn detect(
        &self,
        region: &Array3<f32>,
        tunables: &MethodTunables,
        device: &str,
    ) -> Result<Detection> {
        if device != "cpu" {
            return Err(Error::Detection(format!(
                "unsupported device '{device}': the reference detector runs on cpu only"
            )));
        }

        let smoothed = if tunables.blur_size > 1 {
            box_blur(region, tunables.blur_size)
        } else {
            region.clone()
        };

        let reference = tunables.global_reference_vector.map(f64::from);
        let (nz, ny, nx) = smoothed.dim();
        let mut labels = Array3::<f32>::zeros(smoothed.dim());
        let mut cloud = PointCloud::new();
        let threshold = f64::from(tunables.threshold_der);
        for z in 1..nz.saturating_sub(1) {
            for y in 1..ny.saturating_sub(1) {
                for x in 1..nx.saturating_sub(1) {
                    let g = [
                        f64::from(smoothed[[z + 1, y, x]] - smoothed[[z - 1, y, x]]) / 2.0,
                        f64::from(smoothed[[z, y + 1, x]] - smoothed[[z, y - 1, x]]) / 2.0,
                        f64::from(smoothed[[z, y, x + 1]] - smoothed[[z, y, x - 1]]) / 2.0,
                    ];
                    let mag = (g[0] * g[0] + g[1] * g[1] + g[2] * g[2]).sqrt();
                    if mag < threshold {
                        continue;
                    }
                    let mut normal = [g[0] / mag, g[1] / mag, g[2] / mag];
                    let aligned = normal[0] * reference[0]
                        + normal[1] * reference[1]
                        + normal[2] * reference[2];
                    if aligned < 0.0 {
                        normal = [-normal[0], -normal[1], -normal[2]];
                    }
                    labels[[z, y, x]] = 1.0;
                    cloud.push([z as f64, y as f64, x as f64], normal);
                }
            }
        }
        Ok(Detection { labels, cloud })
    }
}

/// Separable box blur with clamped borders; `size` is forced odd.
fn box_blur(volume: &Array3<f32>, size: usize) -> Array3<f32> {
    let half = (size / 2) as isize;
    let dims = volume.dim();
    let (nz, ny, nx) = dims;
    let clamp = |v: isize, n: usize| v.clamp(0, n as isize - 1) as usize;

    let mut pass = volume.clone();
    let mut out = Array3::<f32>::zeros(dims);
    let window = (2 * half + 1) as f32;

    // Axis Z.
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let mut acc = 0.0;
                for d in -half..=half {
                    acc += pass[[clamp(z as isize + d, nz), y, x]];
                }
                out[[z, y, x]] = acc / window;
            }
        }
    }
    std::mem::swap(&mut pass, &mut out);
    // Axis Y.
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let mut acc = 0.0;
                for d in -half..=half {
                    acc += pass[[z, clamp(y as isize + d, ny), x]];
                }
                out[[z, y, x]] = acc / window;
            }
        }
    }
    std::mem::swap(&mut pass, &mut out);
    // Axis X.
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let mut acc = 0.0;
                for d in -half..=half {
                    acc += pass[[z, y, clamp(x as isize + d, nx)]];
                }
                out[[z, y, x]] = acc / window;
            }
        }
    }
    out
}
