// src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("{0}")]
    Config(String),

    #[error("Connection to {destination} failed")]
    Connection { destination: String },

    #[error("SSH tunnel error: {0}")]
    Tunnel(String),

    #[error("Invalid CSV file.")]
    MalformedRow,

    #[error("CSV error: Missing id column \"{column}\" on line \"{line}\".")]
    MissingIdColumn { column: String, line: u64 },

    #[error("Could not decode value of type array. Value: '{value}'")]
    ValueDecode { value: String },

    #[error("Export failed.")]
    BulkWriteFailed,

    #[error("{0}")]
    InvalidSource(String),

    /// A table-level failure, carrying the `Table x - ` / `File y - ` prefix.
    #[error("{prefix}{source}")]
    Table {
        prefix: String,
        #[source]
        source: Box<WriterError>,
    },

    #[error("CSV read error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unexpected response from {endpoint}: {detail}")]
    UnexpectedResponse { endpoint: String, detail: String },
}

impl WriterError {
    /// User-actionable errors exit with code 1, everything else with 2.
    pub fn is_user_error(&self) -> bool {
        match self {
            WriterError::Config(_)
            | WriterError::Connection { .. }
            | WriterError::Tunnel(_)
            | WriterError::MalformedRow
            | WriterError::MissingIdColumn { .. }
            | WriterError::ValueDecode { .. }
            | WriterError::BulkWriteFailed
            | WriterError::InvalidSource(_) => true,
            WriterError::Table { source, .. } => source.is_user_error(),
            WriterError::Csv(e) => !matches!(e.kind(), csv::ErrorKind::Io(_)),
            WriterError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            WriterError::Http(_)
            | WriterError::Json(_)
            | WriterError::Yaml(_)
            | WriterError::UnexpectedResponse { .. } => false,
        }
    }

    /// Prefixes a table failure with the table or file identity.
    pub fn in_table(self, prefix: &str) -> Self {
        WriterError::Table {
            prefix: prefix.to_string(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, WriterError>;
