//! Deterministic artifact naming.
//!
//! A project namespace plus an artifact kind maps to one relative path
//! `<namespace>/<file>`. Remote keys live under [`ARTIFACT_ROOT`], local
//! copies under the configured cache root, so both layouts mirror each other.

use crate::codec::FVECS_EXTENSION;
use crate::error::{Result, VectorLakeError};
use crate::types::IndexVariant;

/// Top-level prefix for every remote artifact key.
pub const ARTIFACT_ROOT: &str = "vector_data";

/// A validated, sanitized project namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// Validate `raw` and sanitize it (spaces become underscores).
    ///
    /// Rejects empty names, `..`, path separators and control characters so a
    /// namespace can never address anything outside its own directory.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| VectorLakeError::InvalidNamespace {
            namespace: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.trim().is_empty() {
            return Err(invalid("must not be empty"));
        }
        if raw.contains("..") {
            return Err(invalid("must not contain '..'"));
        }
        if raw.contains(['/', '\\']) {
            return Err(invalid("must not contain path separators"));
        }
        if raw.chars().any(char::is_control) {
            return Err(invalid("must not contain control characters"));
        }
        if raw == "." {
            return Err(invalid("must not be '.'"));
        }

        Ok(Self(raw.replace(' ', "_")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    RawData,
    Index(IndexVariant),
}

impl ArtifactKind {
    /// File name of the artifact inside its namespace directory.
    pub fn file_name(self) -> String {
        match self {
            ArtifactKind::RawData => format!("data.{FVECS_EXTENSION}"),
            ArtifactKind::Index(variant) => format!("{}.index", variant.name()),
        }
    }
}

/// `(namespace, kind)` pair naming one durable artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    namespace: Namespace,
    kind: ArtifactKind,
}

impl ArtifactKey {
    pub fn new(namespace: &Namespace, kind: ArtifactKind) -> Self {
        Self {
            namespace: namespace.clone(),
            kind,
        }
    }

    /// `<namespace>/<file>`, shared by the remote and local layouts.
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.namespace, self.kind.file_name())
    }

    /// Object key inside the bucket: `vector_data/<namespace>/<file>`.
    pub fn remote_key(&self) -> String {
        format!("{ARTIFACT_ROOT}/{}", self.relative_path())
    }
}

/// Storage path for `(namespace, kind)`; pure and deterministic.
pub fn path_for(namespace: &str, kind: ArtifactKind) -> Result<String> {
    Ok(ArtifactKey::new(&Namespace::parse(namespace)?, kind).remote_key())
}
