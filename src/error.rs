use thiserror::Error;

/// Failure reported by a record sink.
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    /// The sink could not be reached or timed out
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Per-line failure. The `Display` output is the reason stored in the error sample.
#[derive(Debug, Clone, Error)]
pub enum RecordError {
    /// Malformed record structure
    #[error("decode error: {0}")]
    Decode(String),

    /// Structurally valid but semantically rejected
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Anything escaping per-line handling. Forces the job to `failed`.
#[derive(Debug, Error)]
pub enum JobFault {
    #[error("I/O error reading {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid job options: {0}")]
    InvalidOptions(String),

    #[error("ingestion job panicked: {0}")]
    Panicked(String),
}
