//! vectorlake: object-store-backed vector datasets and ANN indexes.

pub mod artifact;
pub mod cache;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod metrics;
pub mod startup;
pub mod storage;
pub mod types;

pub use engine::{CacheReport, RawDataSource, VectorDataEngine, DEFAULT_TOP_K};
pub use error::{Result, VectorLakeError};
pub use types::{IndexVariant, Neighbors};
