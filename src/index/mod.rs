//! Index module for vectorlake.
//!
//! Provides the [`IndexBackend`] seam the caches build and query through,
//! the static per-variant parameter registry, and the pure-Rust
//! [`NativeBackend`] implementation of every variant.

pub mod backend;
pub mod native;
pub mod registry;

pub use backend::IndexBackend;
pub use native::{NativeBackend, NativeHandle, NativeIndex};
pub use registry::{IndexRegistry, VariantParams};
