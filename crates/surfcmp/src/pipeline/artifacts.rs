//! Output artifacts of a pipeline run.
//!
//! Artifacts are keyed by the experiment key so unrelated concurrent
//! comparisons cannot collide, and so a comparison's outputs can be joined
//! back to it later: point clouds as `clouds/{key}_{ordinal}.ply`,
//! volumetric masks as `volumes/{key}_{label}.nrrd`.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::Array3;

use crate::cloud::PointCloud;
use crate::error::Result;

/// Filesystem sink for run artifacts, rooted at one output directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the point-cloud artifact for a run ordinal.
    pub fn cloud_path(&self, key: &str, ordinal: u8) -> PathBuf {
        self.root.join("clouds").join(format!("{key}_{ordinal}.ply"))
    }

    /// Path of a volumetric artifact; `label` is `volume` for the raw
    /// region or the run ordinal for a detection mask.
    pub fn volume_path(&self, key: &str, label: &str) -> PathBuf {
        self.root
            .join("volumes")
            .join(format!("{key}_{label}.nrrd"))
    }

    pub fn write_cloud(&self, key: &str, ordinal: u8, cloud: &PointCloud) -> Result<PathBuf> {
        let path = self.cloud_path(key, ordinal);
        ensure_parent(&path)?;
        cloud.write_ply(&path)?;
        Ok(path)
    }

    pub fn write_volume(&self, key: &str, label: &str, volume: &Array3<f32>) -> Result<PathBuf> {
        let path = self.volume_path(key, label);
        ensure_parent(&path)?;
        write_nrrd(&path, volume)?;
        Ok(path)
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Write a (Z, Y, X) float array as raw little-endian NRRD.
///
/// `sizes` lists axes fastest-first, so the C-order (Z, Y, X) array is
/// declared as `x y z`.
fn write_nrrd(path: &Path, volume: &Array3<f32>) -> Result<()> {
    let (nz, ny, nx) = volume.dim();
    let mut out = BufWriter::new(fs::File::create(path)?);
    writeln!(out, "NRRD0004")?;
    writeln!(out, "type: float")?;
    writeln!(out, "dimension: 3")?;
    writeln!(out, "sizes: {nx} {ny} {nz}")?;
    writeln!(out, "endian: little")?;
    writeln!(out, "encoding: raw")?;
    writeln!(out)?;
    for value in volume.iter() {
        out.write_all(&value.to_le_bytes())?;
    }
    out.flush()?;
    Ok(())
}
