//! Experiment identity and per-method run configuration.
//!
//! Two runs are comparable only when they processed the identical region, so
//! the experiment key is derived from the *shared* parameters alone (center,
//! radius): two different methods run at the same location collide to the
//! same key, which is exactly what makes the key usable for caching and for
//! joining a comparison to its stored artifacts.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// The parameters shared between two comparable runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SharedParams {
    /// Region center as (Z, Y, X) voxel coordinates.
    pub center: [usize; 3],
    /// Region radius in voxels; the extracted cube has side `2 * radius`.
    pub radius: usize,
}

/// Deterministic hex digest over the shared parameters.
///
/// The digest is SHA-256 of a canonical serialization (sorted keys, compact
/// separators) and is a pure function of its inputs: no salt, no timestamp,
/// stable across processes and runs. Method tunables are excluded by
/// construction.
pub fn derive_key(shared: &SharedParams) -> String {
    let canonical = format!(
        "{{\"center\":[{},{},{}],\"radius\":{}}}",
        shared.center[0], shared.center[1], shared.center[2], shared.radius
    );
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// Method-specific tunables handed to the detection collaborator.
///
/// Defaults mirror the reference surface-detection configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MethodTunables {
    /// Pre-blur kernel size in voxels.
    pub blur_size: usize,
    /// Number of chunks for the gradient pass.
    pub sobel_chunks: usize,
    /// Overlap between gradient chunks, in voxels.
    pub sobel_overlap: usize,
    /// Window size for derivative aggregation.
    pub window_size: usize,
    /// Stride between evaluated windows.
    pub stride: usize,
    /// First-derivative acceptance threshold.
    pub threshold_der: f32,
    /// Second-derivative acceptance threshold.
    pub threshold_der2: f32,
    /// Reference orientation used to disambiguate normal hemispheres.
    pub global_reference_vector: [f32; 3],
}

impl Default for MethodTunables {
    fn default() -> Self {
        Self {
            blur_size: 3,
            sobel_chunks: 4,
            sobel_overlap: 3,
            window_size: 20,
            stride: 20,
            threshold_der: 0.1,
            threshold_der2: 0.001,
            global_reference_vector: [0.0, -1.0, 0.0],
        }
    }
}

/// Named method configurations, typically loaded from a JSON file mapping
/// method name to [`MethodTunables`].
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MethodTable {
    methods: HashMap<String, MethodTunables>,
}

impl MethodTable {
    /// Load a method table from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            Error::Configuration(format!("invalid method table {}: {e}", path.display()))
        })
    }

    /// Build a table holding default tunables for the given method names.
    pub fn with_defaults(names: &[&str]) -> Self {
        let methods = names
            .iter()
            .map(|&name| (name.to_string(), MethodTunables::default()))
            .collect();
        Self { methods }
    }

    /// Register or replace a method entry.
    pub fn insert(&mut self, name: impl Into<String>, tunables: MethodTunables) {
        self.methods.insert(name.into(), tunables);
    }

    /// Look up a method; unknown names are a configuration error.
    pub fn get(&self, name: &str) -> Result<&MethodTunables> {
        self.methods
            .get(name)
            .ok_or_else(|| Error::Configuration(format!("unknown method '{name}'")))
    }
}

/// One method's run parameters within a comparison.
///
/// The two configs of a comparison share `center`, `radius`, and `key` by
/// construction (see [`ExperimentConfig::pair`]); they differ in method name
/// and tunables, and carry a run-local ordinal (1 or 2) used only to
/// disambiguate output artifacts.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExperimentConfig {
    /// Detection method name (a [`MethodTable`] entry).
    pub method: String,
    /// Region center as (Z, Y, X) voxel coordinates.
    pub center: [usize; 3],
    /// Region radius in voxels.
    pub radius: usize,
    /// Compute device selector handed to the detector.
    pub device: String,
    /// Run-local ordinal, 1 or 2.
    pub ordinal: u8,
    /// Experiment key shared by both runs of the comparison.
    pub key: String,
    /// Method-specific tunables (excluded from the key).
    pub tunables: MethodTunables,
}

impl ExperimentConfig {
    /// Build both configs of a comparison from one [`SharedParams`].
    ///
    /// Routing both configs through a single shared-parameter value is what
    /// guarantees they describe the identical region; comparing configs
    /// built from differing regions is a caller error this constructor makes
    /// unrepresentable.
    pub fn pair(
        method_a: &str,
        method_b: &str,
        shared: &SharedParams,
        device: &str,
        table: &MethodTable,
    ) -> Result<(Self, Self)> {
        let key = derive_key(shared);
        let build = |method: &str, ordinal: u8, tunables: &MethodTunables| Self {
            method: method.to_string(),
            center: shared.center,
            radius: shared.radius,
            device: device.to_string(),
            ordinal,
            key: key.clone(),
            tunables: tunables.clone(),
        };
        let config1 = build(method_a, 1, table.get(method_a)?);
        let config2 = build(method_b, 2, table.get(method_b)?);
        Ok((config1, config2))
    }

    /// Shared parameters this config was built from.
    pub fn shared(&self) -> SharedParams {
        SharedParams {
            center: self.center,
            radius: self.radius,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic() {
        let shared = SharedParams {
            center: [4000, 3000, 2000],
            radius: 50,
        };
        let a = derive_key(&shared);
        let b = derive_key(&shared);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn key_changes_with_center_and_radius() {
        let base = SharedParams {
            center: [1, 2, 3],
            radius: 50,
        };
        let keys = [
            derive_key(&base),
            derive_key(&SharedParams {
                center: [3, 2, 1],
                radius: 50,
            }),
            derive_key(&SharedParams {
                center: [2, 1, 3],
                radius: 50,
            }),
            derive_key(&SharedParams {
                center: [1, 2, 3],
                radius: 51,
            }),
        ];
        for i in 0..keys.len() {
            for j in i + 1..keys.len() {
                assert_ne!(keys[i], keys[j], "keys {i} and {j} collide");
            }
        }
    }

    #[test]
    fn pair_shares_key_and_region_but_not_tunables() {
        let mut table = MethodTable::with_defaults(&["alpha"]);
        table.insert(
            "beta",
            MethodTunables {
                blur_size: 7,
                ..MethodTunables::default()
            },
        );
        let shared = SharedParams {
            center: [100, 100, 100],
            radius: 25,
        };
        let (c1, c2) = ExperimentConfig::pair("alpha", "beta", &shared, "cpu", &table)
            .expect("pair");
        assert_eq!(c1.key, c2.key);
        assert_eq!(c1.key, derive_key(&shared));
        assert_eq!(c1.center, c2.center);
        assert_eq!(c1.radius, c2.radius);
        assert_eq!((c1.ordinal, c2.ordinal), (1, 2));
        assert_ne!(c1.tunables, c2.tunables);
    }

    #[test]
    fn unknown_method_is_a_configuration_error() {
        let table = MethodTable::with_defaults(&["alpha"]);
        let shared = SharedParams {
            center: [10, 10, 10],
            radius: 5,
        };
        let err = ExperimentConfig::pair("alpha", "gamma", &shared, "cpu", &table)
            .expect_err("expected error");
        assert!(matches!(err, crate::Error::Configuration(_)), "got {err:?}");
    }

    #[test]
    fn tunables_deserialize_with_defaults() {
        let t: MethodTunables = serde_json::from_str(r#"{"blur_size": 5}"#).expect("parse");
        assert_eq!(t.blur_size, 5);
        assert_eq!(t.window_size, 20);
        assert_eq!(t.global_reference_vector, [0.0, -1.0, 0.0]);
    }
}
