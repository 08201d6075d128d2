//! Typed failures returned by registry queries.
//!
//! Catalog construction problems are reported through `anyhow` by the
//! builder; everything a caller can trigger with user input after the registry
//! exists lands in `DataModelError` so it can be matched on.

use thiserror::Error;

/// Resolution failure for a release, property, bintype, template or bitmask.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataModelError {
    /// Release or version string not present in the release table.
    #[error("unknown release or version '{0}'")]
    UnknownVersion(String),

    /// No property or channel matches the query.
    #[error("no property matches '{0}'")]
    PropertyNotFound(String),

    /// More than one (property, channel) pair matches a partial query.
    #[error("'{query}' is ambiguous, candidates: {}", .candidates.join(", "))]
    AmbiguousMatch {
        query: String,
        candidates: Vec<String>,
    },

    /// Bintype name not defined for the version.
    #[error("invalid bintype '{name}', valid bintypes are: {}", .valid.join(", "))]
    InvalidBinType { name: String, valid: Vec<String> },

    /// Template name not defined for the version.
    #[error("invalid template '{name}', valid templates are: {}", .valid.join(", "))]
    InvalidTemplate { name: String, valid: Vec<String> },

    /// Bitmask schema not defined for the version.
    #[error("unknown bitmask schema '{schema}', available schemas are: {}", .valid.join(", "))]
    UnknownBitmaskSchema { schema: String, valid: Vec<String> },

    /// Flag label not defined in a bitmask schema.
    #[error("bitmask {schema} has no flag '{label}'")]
    UnknownFlag { schema: String, label: String },

    /// A version read from a data product header disagrees with the release.
    #[error("{field} mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        field: &'static str,
        expected: String,
        found: String,
    },
}

/// Result alias for registry queries.
pub type Result<T> = std::result::Result<T, DataModelError>;
