//! Process bootstrap: config discovery, logging and engine construction.
//!
//! Kept out of the engine so embedding applications can reuse the same
//! startup path and tests can drive it with the in-memory or local backends.

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::engine::{RawDataSource, VectorDataEngine};
use crate::error::Result;

/// Resolve the configuration file path.
///
/// Priority:
/// 1. `VECTORLAKE_CONFIG` environment variable
/// 2. `./vectorlake.toml` if it exists
/// 3. None (use defaults)
pub fn resolve_config_path() -> Option<String> {
    std::env::var("VECTORLAKE_CONFIG").ok().or_else(|| {
        let default = "vectorlake.toml";
        std::path::Path::new(default)
            .exists()
            .then(|| default.to_string())
    })
}

/// Initialize the tracing subscriber from logging config.
///
/// Supports JSON and plain text formats. Uses `RUST_LOG` if set, otherwise
/// `config.logging.level`. A subscriber installed earlier (by the host
/// application or another test) is left in place.
pub fn init_logging(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let _ = match config.logging.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };
}

/// Register metrics and open `namespace` with the native backend.
pub async fn build_engine(
    config: &Config,
    namespace: &str,
    raw: Option<RawDataSource>,
) -> Result<VectorDataEngine> {
    tracing::info!(
        namespace,
        bucket = %config.storage.bucket,
        backend = %config.storage.backend,
        cache_dir = %config.cache.dir.display(),
        ivf_nlist = config.indexing.ivf_nlist,
        ivf_nprobe = config.indexing.ivf_nprobe,
        "configuration loaded"
    );

    crate::metrics::init();
    VectorDataEngine::new(namespace, config, raw).await
}
