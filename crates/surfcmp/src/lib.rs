//! surfcmp — compare volumetric surface-detection methods on one scan region.
//!
//! Given a directory of TIFF tiles forming a large 3D scan, the pipeline
//! stages are:
//!
//! 1. **Volume** – present the tile directory as one lazily-decoded
//!    (Z, Y, X) array ([`VirtualVolume`]).
//! 2. **Experiment** – derive a deterministic key from the shared region
//!    parameters so two runs over the same region correlate
//!    ([`SharedParams`], [`derive_key`]).
//! 3. **Region** – carve a cube of side `2 * radius` around the center and
//!    normalize intensity into `[0, 1]` ([`extract_region`]).
//! 4. **Pipeline** – run one method's `load → extract → detect → export`
//!    lifecycle against a [`SurfaceDetector`] collaborator
//!    ([`PipelineRunner`]).
//! 5. **Metrics** – score two labeled point clouds: bidirectional Chamfer
//!    distance, normal cosine dissimilarity, symmetric Hausdorff distance
//!    ([`compare`]).
//!
//! The detection algorithm itself is external: anything implementing
//! [`SurfaceDetector`] can be plugged into the pipeline. [`run_comparison`]
//! wires two runs plus the scoring into one call.

mod cloud;
mod comparison;
mod error;
mod experiment;
mod metrics;
mod pipeline;
mod region;
mod volume;

#[cfg(test)]
pub(crate) mod test_utils;

pub use cloud::PointCloud;
pub use comparison::{run_comparison, ComparisonOutcome};
pub use error::{Error, Result};
pub use experiment::{derive_key, ExperimentConfig, MethodTable, MethodTunables, SharedParams};
pub use metrics::{compare, ComparisonResult};
pub use pipeline::{
    ArtifactWriter, DetectedRun, Detection, ExtractedRun, LoadedRun, PipelineRunner, RunArtifacts,
    SurfaceDetector,
};
pub use region::extract_region;
pub use volume::{LayoutKind, VirtualVolume};
