use crate::error::{QuiverError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    #[serde(default = "default_max_nq")]
    pub max_nq: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    #[serde(default = "default_nlist")]
    pub default_nlist: usize,
    #[serde(default = "default_nprobe")]
    pub default_nprobe: usize,
    #[serde(default = "default_max_nprobe")]
    pub max_nprobe: usize,
    #[serde(default = "default_kmeans_max_iterations")]
    pub kmeans_max_iterations: usize,
    #[serde(default = "default_kmeans_convergence_epsilon")]
    pub kmeans_convergence_epsilon: f64,
    /// Fixed k-means++ seed; random when unset.
    #[serde(default)]
    pub kmeans_seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_max_concurrent_queries() -> usize {
    std::env::var("QUIVER_MAX_CONCURRENT_QUERIES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(64)
}
fn default_max_top_k() -> usize {
    std::env::var("QUIVER_MAX_TOP_K")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(16_384)
}
fn default_max_nq() -> usize {
    std::env::var("QUIVER_MAX_NQ")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(16_384)
}
fn default_nlist() -> usize {
    std::env::var("QUIVER_DEFAULT_NLIST")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(256)
}
fn default_nprobe() -> usize {
    std::env::var("QUIVER_DEFAULT_NPROBE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(16)
}
fn default_max_nprobe() -> usize {
    128
}
fn default_kmeans_max_iterations() -> usize {
    25
}
fn default_kmeans_convergence_epsilon() -> f64 {
    1e-4
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    std::env::var("QUIVER_LOG_FORMAT").unwrap_or_else(|_| "text".to_string())
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_queries: default_max_concurrent_queries(),
            max_top_k: default_max_top_k(),
            max_nq: default_max_nq(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            default_nlist: default_nlist(),
            default_nprobe: default_nprobe(),
            max_nprobe: default_max_nprobe(),
            kmeans_max_iterations: default_kmeans_max_iterations(),
            kmeans_convergence_epsilon: default_kmeans_convergence_epsilon(),
            kmeans_seed: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load config from a TOML file, falling back to defaults.
    /// After loading, env var overrides are applied so that:
    /// env var > TOML file > defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p).map_err(|e| {
                    QuiverError::Config(format!("failed to read config file {p}: {e}"))
                })?;
                toml::from_str(&content)
                    .map_err(|e| QuiverError::Config(format!("failed to parse config: {e}")))?
            }
            None => Config::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.engine.max_concurrent_queries == 0 {
            return Err(QuiverError::Config(
                "engine.max_concurrent_queries must be > 0".into(),
            ));
        }
        if self.indexing.default_nprobe == 0 || self.indexing.max_nprobe == 0 {
            return Err(QuiverError::Config("nprobe limits must be > 0".into()));
        }
        if self.indexing.default_nlist == 0 {
            return Err(QuiverError::Config(
                "indexing.default_nlist must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides on top of file/default values.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Overrides read through `var`; unset or unparsable values are ignored.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        let parsed = |key: &str| -> Option<usize> { var(key).and_then(|v| v.parse().ok()) };

        // Engine
        if let Some(v) = parsed("QUIVER_MAX_CONCURRENT_QUERIES") {
            self.engine.max_concurrent_queries = v;
        }
        if let Some(v) = parsed("QUIVER_MAX_TOP_K") {
            self.engine.max_top_k = v;
        }
        if let Some(v) = parsed("QUIVER_MAX_NQ") {
            self.engine.max_nq = v;
        }

        // Indexing
        if let Some(v) = parsed("QUIVER_DEFAULT_NLIST") {
            self.indexing.default_nlist = v;
        }
        if let Some(v) = parsed("QUIVER_DEFAULT_NPROBE") {
            self.indexing.default_nprobe = v;
        }
        if let Some(v) = parsed("QUIVER_MAX_NPROBE") {
            self.indexing.max_nprobe = v;
        }
        if let Some(v) = parsed("QUIVER_KMEANS_MAX_ITERATIONS") {
            self.indexing.kmeans_max_iterations = v;
        }
        if let Some(v) = var("QUIVER_KMEANS_CONVERGENCE_EPSILON").and_then(|v| v.parse().ok()) {
            self.indexing.kmeans_convergence_epsilon = v;
        }
        if let Some(v) = var("QUIVER_KMEANS_SEED").and_then(|v| v.parse().ok()) {
            self.indexing.kmeans_seed = Some(v);
        }

        // Logging
        if let Some(v) = var("QUIVER_LOG_FORMAT") {
            self.logging.format = v;
        }
    }
}
