//! Error types for the refinement pipeline.

use std::time::Duration;

use crate::pipeline::types::{OriginKind, ResourceId};

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failures reported by a `ResourceDownloader`.
///
/// These come from the collaborator that actually talks to the content
/// server; the engine never constructs them itself.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Resource {resource_id} not found")]
    NotFound { resource_id: String },

    #[error("Transport failure fetching {resource_id}: {reason}")]
    Transport { resource_id: String, reason: String },

    #[error("Failed to decode resource {resource_id}: {reason}")]
    Decode { resource_id: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that abort a refinement pass.
#[derive(Debug, thiserror::Error)]
pub enum RefineError {
    #[error("Failed to fetch {kind} resource {resource_id}: {source}")]
    ResourceFetch {
        kind: OriginKind,
        resource_id: ResourceId,
        #[source]
        source: DownloadError,
    },

    #[error("Fetching {kind} resource {resource_id} timed out after {timeout:?}")]
    Timeout {
        kind: OriginKind,
        resource_id: ResourceId,
        timeout: Duration,
    },

    /// A variant kept producing refinable output past the depth limit.
    /// This is a defect in a variant, not a data problem.
    #[error("Refinement exceeded depth limit {limit} after {rounds} rounds")]
    DepthExceeded { limit: u32, rounds: usize },
}

impl RefineError {
    /// Resource id of the failing fetch, if the error came from one.
    pub fn resource_id(&self) -> Option<&ResourceId> {
        match self {
            Self::ResourceFetch { resource_id, .. } | Self::Timeout { resource_id, .. } => {
                Some(resource_id)
            }
            Self::DepthExceeded { .. } => None,
        }
    }

    /// Variant kind of the failing fetch, if the error came from one.
    pub fn kind(&self) -> Option<OriginKind> {
        match self {
            Self::ResourceFetch { kind, .. } | Self::Timeout { kind, .. } => Some(*kind),
            Self::DepthExceeded { .. } => None,
        }
    }
}
