use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Pipeline stage a failure is reported against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Upload,
    Build,
    Retrieval,
    Generation,
    Query,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Config => "config",
            Stage::Upload => "upload",
            Stage::Build => "build",
            Stage::Retrieval => "retrieval",
            Stage::Generation => "generation",
            Stage::Query => "query",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Could not extract text from '{document}': {reason}")]
    Extraction { document: String, reason: String },

    #[error("Unsupported media type '{media_type}' for '{document}'")]
    UnsupportedMedia { document: String, media_type: String },

    #[error("Index build failed: {0}")]
    IndexBuild(String),

    #[error("No index found at {0}; build the index first")]
    IndexNotFound(String),

    #[error("Index was built with embedding model '{index}' but the current model is '{current}'; rebuild the index")]
    EmbeddingModelMismatch { index: String, current: String },

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("{service} did not respond within {timeout:?}")]
    CollaboratorTimeout { service: String, timeout: Duration },

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Model output is not in the expected format ({reason}); raw output: {raw}")]
    MalformedResponse { reason: String, raw: String },

    #[error("Generated query rejected: {reason}; query: {sql}")]
    QueryRejected { reason: String, sql: String },

    #[error("Query failed: {0}")]
    Query(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stage named in the user-facing message for this failure.
    pub fn stage(&self) -> Stage {
        match self {
            Error::InvalidConfig(_) => Stage::Config,
            Error::Extraction { .. } | Error::UnsupportedMedia { .. } | Error::Io(_) => Stage::Upload,
            Error::IndexBuild(_) => Stage::Build,
            Error::IndexNotFound(_) | Error::EmbeddingModelMismatch { .. } | Error::Retrieval(_) => {
                Stage::Retrieval
            }
            Error::CollaboratorTimeout { .. } | Error::Generation(_) | Error::MalformedResponse { .. } => {
                Stage::Generation
            }
            Error::QueryRejected { .. } | Error::Query(_) => Stage::Query,
        }
    }

    /// Same error, re-labelled as a build failure unless it is a timeout.
    ///
    /// Used when a collaborator error surfaces while building the index.
    pub fn into_build(self) -> Self {
        match self {
            Error::CollaboratorTimeout { .. } | Error::IndexBuild(_) => self,
            other => Error::IndexBuild(other.to_string()),
        }
    }

    /// Same error, re-labelled as a retrieval failure unless it is a timeout
    /// or already belongs to retrieval.
    pub fn into_retrieval(self) -> Self {
        match self {
            Error::CollaboratorTimeout { .. }
            | Error::IndexNotFound(_)
            | Error::EmbeddingModelMismatch { .. }
            | Error::Retrieval(_) => self,
            other => Error::Retrieval(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_labels() {
        assert_eq!(Error::IndexNotFound("idx".into()).stage(), Stage::Retrieval);
        assert_eq!(Error::Generation("empty".into()).stage(), Stage::Generation);
        assert_eq!(Stage::Build.to_string(), "build");
    }

    #[test]
    fn into_build_keeps_timeouts() {
        let t = Error::CollaboratorTimeout { service: "embedding".into(), timeout: Duration::from_secs(5) }.into_build();
        assert!(matches!(t, Error::CollaboratorTimeout { .. }));
        let g = Error::Generation("boom".into()).into_build();
        assert!(matches!(g, Error::IndexBuild(m) if m.contains("boom")));
    }

    #[test]
    fn into_retrieval_wraps_collaborator_failures() {
        let g = Error::Generation("429".into()).into_retrieval();
        assert_eq!(g.stage(), Stage::Retrieval);
        let nf = Error::IndexNotFound("idx".into()).into_retrieval();
        assert!(matches!(nf, Error::IndexNotFound(_)));
    }
}
