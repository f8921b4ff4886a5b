//! Process bootstrap: config discovery, logging, and engine assembly.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::engine::QueryEngine;
use crate::index::Catalog;

/// Resolve the configuration file path.
///
/// Priority:
/// 1. `QUIVER_CONFIG` environment variable
/// 2. `./quiver.toml` if it exists
/// 3. None (use defaults)
pub fn resolve_config_path() -> Option<String> {
    std::env::var("QUIVER_CONFIG").ok().or_else(|| {
        let default = "quiver.toml";
        std::path::Path::new(default)
            .exists()
            .then(|| default.to_string())
    })
}

/// Initialize tracing subscriber from logging config.
///
/// Supports JSON and plain text formats. Uses `RUST_LOG` env var if set,
/// otherwise falls back to `config.logging.level`. A second call is a
/// no-op, so tests and embedders may call it freely.
pub fn init_logging(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let result = match config.logging.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };
    if result.is_err() {
        tracing::debug!("global subscriber already installed");
    }
}

/// Register metrics and build an engine over an empty catalog.
pub fn build_engine(config: &Config) -> QueryEngine {
    tracing::info!(
        max_concurrent_queries = config.engine.max_concurrent_queries,
        max_top_k = config.engine.max_top_k,
        max_nq = config.engine.max_nq,
        default_nprobe = config.indexing.default_nprobe,
        max_nprobe = config.indexing.max_nprobe,
        default_nlist = config.indexing.default_nlist,
        "configuration loaded"
    );

    crate::metrics::init();

    QueryEngine::new(Arc::new(Catalog::new()), config)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_config_path() {
        let original_env = std::env::var("QUIVER_CONFIG").ok();
        let original_dir = std::env::current_dir().unwrap();

        std::env::set_var("QUIVER_CONFIG", "foo.toml");
        let from_env = resolve_config_path();

        // No env var and no ./quiver.toml.
        std::env::remove_var("QUIVER_CONFIG");
        let temp_dir = tempfile::tempdir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();
        let missing = resolve_config_path();

        // ./quiver.toml present.
        std::fs::write(temp_dir.path().join("quiver.toml"), "").unwrap();
        let local = resolve_config_path();

        std::env::set_current_dir(original_dir).unwrap();
        if let Some(v) = original_env {
            std::env::set_var("QUIVER_CONFIG", v);
        }

        assert_eq!(from_env, Some("foo.toml".to_string()));
        assert_eq!(missing, None);
        assert_eq!(local, Some("quiver.toml".to_string()));
    }

    #[test]
    fn test_init_logging_twice() {
        let config = Config::default();
        init_logging(&config);
        init_logging(&config);
    }

    #[test]
    fn test_build_engine_starts_empty() {
        let engine = build_engine(&Config::default());
        assert!(engine.catalog().list().is_empty());
    }
}
