//! Configuration for graph construction, search, and PQ training.
//!
//! Layered resolution, highest priority first:
//!
//! 1. Runtime overrides (explicit struct field assignment)
//! 2. Environment variables (`ANNGRAPH_*`)
//! 3. Configuration file (`anngraph.toml`)
//! 4. Defaults below

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration-loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file or environment could not be parsed into
    /// [`GraphConfig`].
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A field in the resolved configuration violates a documented
    /// invariant (e.g. `alpha < 1.0`).
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// The offending field name.
        key: String,
        /// Human-readable explanation.
        message: String,
    },
}

/// Search presets trading recall for latency, mirroring the beam-width
/// knob described for the graph searcher (C6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Small beam, fastest, lowest recall.
    Fast,
    /// Default beam width.
    #[default]
    Balanced,
    /// Wide beam, highest recall short of exhaustive search.
    Accurate,
}

impl SearchMode {
    /// Beam width (`rerank_k` floor) associated with this preset.
    #[must_use]
    pub fn beam_width(self) -> usize {
        match self {
            Self::Fast => 32,
            Self::Balanced => 100,
            Self::Accurate => 256,
        }
    }
}

/// Graph construction parameters (C5 inputs).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Max neighbors retained per node per layer after `enforce_degree`.
    pub max_degree: usize,
    /// Beam width used while collecting insertion candidates.
    pub beam_width: usize,
    /// Diversity relaxation factor (`alpha >= 1.0`).
    pub alpha: f32,
    /// Temporary over-allocation factor for neighbor lists during
    /// construction (`overflow_ratio >= 1.0`).
    pub neighbor_overflow: f32,
    /// Whether to sample per-node levels and build sparse upper layers.
    pub add_hierarchy: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_degree: 32,
            beam_width: 100,
            alpha: 1.2,
            neighbor_overflow: 1.2,
            add_hierarchy: true,
        }
    }
}

impl BuildConfig {
    /// Validates the documented invariants (`alpha >= 1.0`,
    /// `neighbor_overflow >= 1.0`, `max_degree > 0`, `beam_width > 0`).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.alpha < 1.0 {
            return Err(ConfigError::InvalidValue {
                key: "alpha".into(),
                message: "must be >= 1.0".into(),
            });
        }
        if self.neighbor_overflow < 1.0 {
            return Err(ConfigError::InvalidValue {
                key: "neighbor_overflow".into(),
                message: "must be >= 1.0".into(),
            });
        }
        if self.max_degree == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_degree".into(),
                message: "must be > 0".into(),
            });
        }
        if self.beam_width == 0 {
            return Err(ConfigError::InvalidValue {
                key: "beam_width".into(),
                message: "must be > 0".into(),
            });
        }
        Ok(())
    }
}

/// Search-time parameters (C6 inputs).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Default search mode when `rerank_k` is not set explicitly.
    pub default_mode: SearchMode,
    /// Explicit override for the result buffer / beam size.
    pub rerank_k: Option<usize>,
    /// Enable the exact-score rerank phase.
    pub rerank: bool,
    /// Enable dynamic-threshold pruning during beam expansion.
    pub pruning: bool,
    /// Optional visited-node budget; `0` means unbounded.
    pub visited_budget: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_mode: SearchMode::Balanced,
            rerank_k: None,
            rerank: true,
            pruning: true,
            visited_budget: 0,
        }
    }
}

/// Product-quantization training parameters (C2 inputs).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PqConfig {
    /// Number of subspaces `M`.
    pub subspaces: usize,
    /// Cluster count per subspace `K` (must be `<= 256`).
    pub clusters: usize,
    /// Anisotropic loss threshold; `None` runs unweighted k-means.
    pub anisotropic_threshold: Option<f32>,
    /// Maximum Lloyd iterations per subspace.
    pub max_iterations: usize,
    /// Subtract the dataset mean before encoding.
    pub use_global_centroid: bool,
}

impl Default for PqConfig {
    fn default() -> Self {
        Self {
            subspaces: 8,
            clusters: 256,
            anisotropic_threshold: None,
            max_iterations: 25,
            use_global_centroid: true,
        }
    }
}

/// Top-level configuration combining build, search, and PQ sections.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GraphConfig {
    /// Graph construction parameters.
    pub build: BuildConfig,
    /// Search-time parameters.
    pub search: SearchConfig,
    /// Product quantization training parameters.
    pub pq: PqConfig,
}

impl GraphConfig {
    /// Loads configuration layering defaults, an optional TOML file, and
    /// `ANNGRAPH_*` environment variables, in that priority order.
    pub fn load(toml_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = toml_path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("ANNGRAPH_").split("_"));
        let config: Self = figment.extract().map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.build.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = GraphConfig::default();
        cfg.build.validate().unwrap();
    }

    #[test]
    fn rejects_sub_unity_alpha() {
        let mut build = BuildConfig::default();
        build.alpha = 0.5;
        assert!(build.validate().is_err());
    }

    #[test]
    fn search_mode_beam_width_ordering() {
        assert!(SearchMode::Fast.beam_width() < SearchMode::Balanced.beam_width());
        assert!(SearchMode::Balanced.beam_width() < SearchMode::Accurate.beam_width());
    }
}
