//! One method's run lifecycle: `Created → Loaded → Extracted → Detected →
//! Exported`.
//!
//! Each transition consumes the previous stage, so re-entering a prior
//! state is unrepresentable; a fresh run requires a fresh runner. The
//! detection algorithm itself is behind the [`SurfaceDetector`] capability
//! trait — this module never assumes a concrete implementation, and
//! detector failures propagate untouched with no internal retry.

mod artifacts;

pub use artifacts::ArtifactWriter;

use std::path::PathBuf;

use ndarray::Array3;

use crate::cloud::PointCloud;
use crate::error::{Error, Result};
use crate::experiment::{ExperimentConfig, MethodTunables};
use crate::region::extract_region;
use crate::volume::VirtualVolume;

/// External detection collaborator contract.
///
/// Consumes a normalized region in `[0, 1]`, the method tunables, and a
/// device selector; produces a labeled volume mask of the same shape plus a
/// point set with matching unit normals. Implementations must be
/// deterministic for fixed inputs to keep comparisons reproducible.
pub trait SurfaceDetector {
    fn detect(
        &self,
        region: &Array3<f32>,
        tunables: &MethodTunables,
        device: &str,
    ) -> Result<Detection>;
}

/// Raw detector output, validated by [`ExtractedRun::detect`].
#[derive(Debug)]
pub struct Detection {
    /// Voxel labels, same shape as the input region; values above 0.5 are
    /// treated as surface.
    pub labels: Array3<f32>,
    /// Detected surface points with unit normals.
    pub cloud: PointCloud,
}

/// Entry stage: a configured run that has not touched the volume yet.
pub struct PipelineRunner {
    config: ExperimentConfig,
    volume_dir: PathBuf,
}

impl PipelineRunner {
    pub fn new(config: ExperimentConfig, volume_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            volume_dir: volume_dir.into(),
        }
    }

    /// Open the virtual volume.
    pub fn load(self) -> Result<LoadedRun> {
        tracing::info!(
            method = %self.config.method,
            ordinal = self.config.ordinal,
            "loading volume at {}",
            self.volume_dir.display()
        );
        let volume = VirtualVolume::open(&self.volume_dir)?;
        Ok(LoadedRun {
            config: self.config,
            volume,
        })
    }
}

/// The volume is open; the region has not been read.
pub struct LoadedRun {
    config: ExperimentConfig,
    volume: VirtualVolume,
}

impl LoadedRun {
    pub fn volume(&self) -> &VirtualVolume {
        &self.volume
    }

    /// Extract and normalize the configured region.
    pub fn extract(self) -> Result<ExtractedRun> {
        let region = extract_region(&self.volume, self.config.center, self.config.radius)?;
        tracing::debug!(
            center = ?self.config.center,
            radius = self.config.radius,
            "extracted region of shape {:?}",
            region.dim()
        );
        Ok(ExtractedRun {
            config: self.config,
            region,
        })
    }
}

/// A normalized region is in memory, owned by this run alone.
pub struct ExtractedRun {
    config: ExperimentConfig,
    region: Array3<f32>,
}

impl ExtractedRun {
    pub fn region(&self) -> &Array3<f32> {
        &self.region
    }

    /// Invoke the detection collaborator and validate its output shape.
    ///
    /// The call is opaque and blocking; timeouts and cancellation are a
    /// caller concern.
    pub fn detect(self, detector: &dyn SurfaceDetector) -> Result<DetectedRun> {
        let detection = detector.detect(&self.region, &self.config.tunables, &self.config.device)?;
        if detection.labels.dim() != self.region.dim() {
            return Err(Error::Detection(format!(
                "label mask shape {:?} does not match region shape {:?}",
                detection.labels.dim(),
                self.region.dim()
            )));
        }
        if detection.cloud.points.len() != detection.cloud.normals.len() {
            return Err(Error::Detection(format!(
                "point/normal cardinality mismatch: {} points, {} normals",
                detection.cloud.points.len(),
                detection.cloud.normals.len()
            )));
        }
        tracing::info!(
            method = %self.config.method,
            ordinal = self.config.ordinal,
            points = detection.cloud.len(),
            "detection complete"
        );
        Ok(DetectedRun {
            config: self.config,
            region: self.region,
            labels: detection.labels,
            cloud: detection.cloud,
        })
    }
}

/// Detection output is validated and owned; artifacts not yet written.
#[derive(Debug)]
pub struct DetectedRun {
    config: ExperimentConfig,
    region: Array3<f32>,
    labels: Array3<f32>,
    cloud: PointCloud,
}

impl DetectedRun {
    pub fn cloud(&self) -> &PointCloud {
        &self.cloud
    }

    /// Write the point cloud, the raw region, and the detection mask.
    ///
    /// The mask is the region with labeled voxels forced to full intensity,
    /// so raw context and detection overlay render from one file pair.
    pub fn export(self, artifacts: &ArtifactWriter) -> Result<RunArtifacts> {
        let key = &self.config.key;
        let cloud_path = artifacts.write_cloud(key, self.config.ordinal, &self.cloud)?;
        let region_path = artifacts.write_volume(key, "volume", &self.region)?;

        let mut mask = self.region.clone();
        mask.zip_mut_with(&self.labels, |v, &label| {
            if label > 0.5 {
                *v = 1.0;
            }
        });
        let mask_path =
            artifacts.write_volume(key, &self.config.ordinal.to_string(), &mask)?;

        tracing::info!(
            ordinal = self.config.ordinal,
            "exported artifacts to {}",
            cloud_path.display()
        );
        Ok(RunArtifacts {
            config: self.config,
            cloud: self.cloud,
            cloud_path,
            region_path,
            mask_path,
        })
    }
}

/// Terminal stage: everything a completed run leaves behind.
pub struct RunArtifacts {
    pub config: ExperimentConfig,
    pub cloud: PointCloud,
    pub cloud_path: PathBuf,
    pub region_path: PathBuf,
    pub mask_path: PathBuf,
}
