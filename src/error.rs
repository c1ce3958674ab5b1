use std::path::PathBuf;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Fetch failed for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Insufficient snapshot history: need 2 dated snapshots, found {found}")]
    InsufficientHistory { found: usize },

    #[error("Summary stats block not found on page")]
    StatsUnavailable,

    #[error("Unknown project: {0}")]
    UnknownProject(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl PipelineError {
    /// Per-item failures the caller skips instead of aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::Parse(_) | PipelineError::InsufficientHistory { .. }
        )
    }

    pub(crate) fn fetch(url: &str, source: impl Into<BoxError>) -> Self {
        PipelineError::Fetch {
            url: url.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        PipelineError::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
