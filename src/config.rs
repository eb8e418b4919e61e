//! Tunable settings of the collision pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CollisionError, Result};

/// Tolerances and limits used by the broad phase, narrow phase and contact caching.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionSettings {
    /// General numerical tolerance for geometric predicates.
    pub epsilon: f32,
    /// Contacts closer than this are considered the same contact when a contact set is refreshed.
    pub contact_position_tolerance: f32,
    /// Separated features closer than this still generate (speculative) contacts.
    pub contact_margin: f32,
    /// Upper bound on the number of contacts a reduced contact set keeps.
    pub max_contacts_per_set: usize,
    /// Margin added to bounds stored in the adaptive tree so small motions don't touch the tree.
    pub aabb_enlargement: f32,
    /// The adaptive tree rebuilds when its cost grows beyond this multiple of the cost after the last rebuild.
    pub rebuild_cost_ratio: f32,
    /// Iteration cap for GJK.
    pub gjk_max_iterations: usize,
    /// Iteration cap for EPA.
    pub epa_max_iterations: usize,
    /// The narrow phase dispatches to worker threads once a frame has at least this many candidate pairs.
    pub parallel_pair_threshold: usize,
    /// Number of workers used for parallel narrow phase batches. Zero uses the available parallelism.
    pub worker_count: usize,
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            contact_position_tolerance: 0.01,
            contact_margin: 0.0,
            max_contacts_per_set: 4,
            aabb_enlargement: 0.05,
            rebuild_cost_ratio: 2.0,
            gjk_max_iterations: 64,
            epa_max_iterations: 64,
            parallel_pair_threshold: 256,
            worker_count: 0,
        }
    }
}

impl CollisionSettings {
    /// Parses settings from TOML. Missing keys fall back to their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let settings: Self =
            toml::from_str(contents).map_err(|e| CollisionError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serializes the settings to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| CollisionError::Config(e.to_string()))
    }

    /// Loads settings from a TOML file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Saves settings to a TOML file.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = self.to_toml_string()?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Checks that every value is in its valid range.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("epsilon", self.epsilon),
            ("contact_position_tolerance", self.contact_position_tolerance),
            ("contact_margin", self.contact_margin),
            ("aabb_enlargement", self.aabb_enlargement),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(CollisionError::Config(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        if self.epsilon == 0.0 {
            return Err(CollisionError::Config("epsilon must be positive".into()));
        }
        if !self.rebuild_cost_ratio.is_finite() || self.rebuild_cost_ratio < 1.0 {
            return Err(CollisionError::Config(format!(
                "rebuild_cost_ratio must be at least 1, got {}",
                self.rebuild_cost_ratio
            )));
        }
        if self.max_contacts_per_set == 0 {
            return Err(CollisionError::Config(
                "max_contacts_per_set must be at least 1".into(),
            ));
        }
        if self.gjk_max_iterations == 0 || self.epa_max_iterations == 0 {
            return Err(CollisionError::Config(
                "iteration limits must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Number of workers the narrow phase should use.
    pub fn resolved_worker_count(&self) -> usize {
        if self.worker_count > 0 {
            self.worker_count
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}
