use thiserror::Error;

/// Request-level failure of an ingestion run.
///
/// Per-line problems never show up here; they are reported as
/// [`ParseError`](crate::protocol::ParseError) through the batch summary.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<IngestError>,
    },
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl IngestError {
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost I/O error kind, looking through context wrappers.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::Io(err) => Some(err.kind()),
            Self::Context { source, .. } => source.io_kind(),
            Self::Other(_) => None,
        }
    }
}
