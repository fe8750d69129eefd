//! Two-method comparison orchestration: config pair → two pipeline runs →
//! agreement metrics.
//!
//! The two runs are independent once each owns its normalized region copy;
//! they execute sequentially here with per-run wall-clock timing of the
//! detect phase, which is the cost that varies by method. A parallel
//! implementation would produce identical results since neither run
//! mutates shared state.

use std::path::Path;
use std::time::Instant;

use crate::error::Result;
use crate::experiment::{ExperimentConfig, MethodTable, SharedParams};
use crate::metrics::{compare, ComparisonResult};
use crate::pipeline::{ArtifactWriter, PipelineRunner, RunArtifacts, SurfaceDetector};

/// Everything a caller receives from one comparison.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ComparisonOutcome {
    /// Experiment key shared by both runs.
    pub key: String,
    pub config1: ExperimentConfig,
    pub config2: ExperimentConfig,
    /// Wall-clock duration of each run's detect phase, in seconds.
    pub detect_seconds: [f64; 2],
    pub metrics: ComparisonResult,
}

/// Run two methods over the identical region and score their agreement.
///
/// Both runs complete their full lifecycle (including artifact export)
/// before scoring; any stage failure aborts the whole comparison.
#[allow(clippy::too_many_arguments)]
pub fn run_comparison(
    volume_dir: &Path,
    method_a: &str,
    method_b: &str,
    shared: &SharedParams,
    device: &str,
    table: &MethodTable,
    detector: &dyn SurfaceDetector,
    artifacts: &ArtifactWriter,
) -> Result<ComparisonOutcome> {
    let (config1, config2) = ExperimentConfig::pair(method_a, method_b, shared, device, table)?;
    let key = config1.key.clone();
    tracing::info!(%key, method_a, method_b, "starting comparison");

    let (run1, time1) = run_one(volume_dir, config1.clone(), detector, artifacts)?;
    let (run2, time2) = run_one(volume_dir, config2.clone(), detector, artifacts)?;

    let metrics = compare(&run1.cloud, &run2.cloud)?;
    tracing::info!(
        %key,
        chamfer = metrics.chamfer,
        hausdorff = metrics.hausdorff,
        "comparison complete"
    );
    Ok(ComparisonOutcome {
        key,
        config1,
        config2,
        detect_seconds: [time1, time2],
        metrics,
    })
}

fn run_one(
    volume_dir: &Path,
    config: ExperimentConfig,
    detector: &dyn SurfaceDetector,
    artifacts: &ArtifactWriter,
) -> Result<(RunArtifacts, f64)> {
    let extracted = PipelineRunner::new(config, volume_dir).load()?.extract()?;
    let started = Instant::now();
    let detected = extracted.detect(detector)?;
    let elapsed = started.elapsed().as_secs_f64();
    let run = detected.export(artifacts)?;
    tracing::debug!(
        ordinal = run.config.ordinal,
        seconds = elapsed,
        "detect phase timed"
    );
    Ok((run, elapsed))
}
