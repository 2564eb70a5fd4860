use crate::error::{Result, VectorLakeError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which `object_store` implementation backs the blob store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// AWS S3 or any S3-compatible endpoint (MinIO, R2, IBM COS HMAC).
    S3,
    /// Local filesystem rooted at `bucket`.
    Local,
    /// Process-local in-memory store; contents vanish with the process.
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::S3 => write!(f, "s3"),
            StorageBackend::Local => write!(f, "local"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = VectorLakeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "s3" | "minio" => Ok(StorageBackend::S3),
            "local" => Ok(StorageBackend::Local),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(VectorLakeError::Config(format!(
                "unsupported storage backend: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default)]
    pub s3_region: Option<String>,
    #[serde(default)]
    pub s3_endpoint: Option<String>,
    #[serde(default)]
    pub s3_access_key_id: Option<String>,
    #[serde(default)]
    pub s3_secret_access_key: Option<String>,
    #[serde(default)]
    pub s3_allow_http: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root of the local artifact cache.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

/// Static per-variant build parameters. Fixed for a deployment, never
/// supplied per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    #[serde(default = "default_lsh_bits_per_dimension")]
    pub lsh_bits_per_dimension: usize,
    #[serde(default = "default_hnsw_m")]
    pub hnsw_m: usize,
    #[serde(default = "default_hnsw_ef_search")]
    pub hnsw_ef_search: usize,
    #[serde(default = "default_hnsw_ef_construction")]
    pub hnsw_ef_construction: usize,
    #[serde(default = "default_ivf_nlist")]
    pub ivf_nlist: usize,
    #[serde(default = "default_ivf_nprobe")]
    pub ivf_nprobe: usize,
    #[serde(default = "default_pq_m")]
    pub pq_m: usize,
    #[serde(default = "default_pq_nbits")]
    pub pq_nbits: usize,
    #[serde(default = "default_pq_m")]
    pub ivfpq_m: usize,
    #[serde(default = "default_pq_nbits")]
    pub ivfpq_nbits: usize,
    #[serde(default = "default_kmeans_max_iterations")]
    pub kmeans_max_iterations: usize,
    #[serde(default = "default_kmeans_convergence_epsilon")]
    pub kmeans_convergence_epsilon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

// Default value functions
fn default_backend() -> StorageBackend {
    env_parse("STORAGE_BACKEND").unwrap_or(StorageBackend::S3)
}
fn default_bucket() -> String {
    std::env::var("S3_BUCKET").unwrap_or_else(|_| "vectorlake".to_string())
}
fn default_cache_dir() -> PathBuf {
    std::env::var("VECTORLAKE_CACHE_DIR")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./.vectorlake"))
}
fn default_lsh_bits_per_dimension() -> usize {
    8
}
fn default_hnsw_m() -> usize {
    env_parse("VECTORLAKE_HNSW_M").unwrap_or(64)
}
fn default_hnsw_ef_search() -> usize {
    32
}
fn default_hnsw_ef_construction() -> usize {
    64
}
fn default_ivf_nlist() -> usize {
    env_parse("VECTORLAKE_IVF_NLIST").unwrap_or(128)
}
fn default_ivf_nprobe() -> usize {
    env_parse("VECTORLAKE_IVF_NPROBE").unwrap_or(4)
}
fn default_pq_m() -> usize {
    env_parse("VECTORLAKE_PQ_M").unwrap_or(8)
}
fn default_pq_nbits() -> usize {
    8
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
    std::env::var("VECTORLAKE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            bucket: default_bucket(),
            s3_region: std::env::var("AWS_REGION").ok(),
            s3_endpoint: std::env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
            s3_access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
            s3_secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
            s3_allow_http: std::env::var("S3_ALLOW_HTTP")
                .ok()
                .map(|v| v == "true")
                .unwrap_or(false),
        }
    }
}

impl StorageConfig {
    /// In-memory storage; used by tests and throwaway engines.
    pub fn memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            bucket: "memory".to_string(),
            s3_region: None,
            s3_endpoint: None,
            s3_access_key_id: None,
            s3_secret_access_key: None,
            s3_allow_http: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            lsh_bits_per_dimension: default_lsh_bits_per_dimension(),
            hnsw_m: default_hnsw_m(),
            hnsw_ef_search: default_hnsw_ef_search(),
            hnsw_ef_construction: default_hnsw_ef_construction(),
            ivf_nlist: default_ivf_nlist(),
            ivf_nprobe: default_ivf_nprobe(),
            pq_m: default_pq_m(),
            pq_nbits: default_pq_nbits(),
            ivfpq_m: default_pq_m(),
            ivfpq_nbits: default_pq_nbits(),
            kmeans_max_iterations: default_kmeans_max_iterations(),
            kmeans_convergence_epsilon: default_kmeans_convergence_epsilon(),
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
    /// Env var overrides are applied afterwards: env > TOML file > defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p).map_err(|e| {
                    VectorLakeError::Config(format!("failed to read config file {p}: {e}"))
                })?;
                Self::from_toml(&content)?
            }
            None => Config::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a TOML document without consulting the environment.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| VectorLakeError::Config(format!("failed to parse config: {e}")))
    }

    fn apply_env_overrides(&mut self) {
        // Storage
        if let Some(v) = env_parse("STORAGE_BACKEND") {
            self.storage.backend = v;
        }
        if let Ok(v) = std::env::var("S3_BUCKET") {
            self.storage.bucket = v;
        }
        if let Ok(v) = std::env::var("AWS_REGION") {
            self.storage.s3_region = Some(v);
        }
        if let Some(v) = std::env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()) {
            self.storage.s3_endpoint = Some(v);
        }
        if let Ok(v) = std::env::var("AWS_ACCESS_KEY_ID") {
            self.storage.s3_access_key_id = Some(v);
        }
        if let Ok(v) = std::env::var("AWS_SECRET_ACCESS_KEY") {
            self.storage.s3_secret_access_key = Some(v);
        }
        if let Ok(v) = std::env::var("S3_ALLOW_HTTP") {
            self.storage.s3_allow_http = v == "true";
        }

        // Cache
        if let Ok(v) = std::env::var("VECTORLAKE_CACHE_DIR") {
            self.cache.dir = PathBuf::from(v);
        }

        // Indexing
        if let Some(v) = env_parse("VECTORLAKE_HNSW_M") {
            self.indexing.hnsw_m = v;
        }
        if let Some(v) = env_parse("VECTORLAKE_IVF_NLIST") {
            self.indexing.ivf_nlist = v;
        }
        if let Some(v) = env_parse("VECTORLAKE_IVF_NPROBE") {
            self.indexing.ivf_nprobe = v;
        }
        if let Some(v) = env_parse("VECTORLAKE_PQ_M") {
            self.indexing.pq_m = v;
            self.indexing.ivfpq_m = v;
        }

        // Logging
        if let Ok(v) = std::env::var("VECTORLAKE_LOG_FORMAT") {
            self.logging.format = v;
        }
    }
}
