use thiserror::Error;

#[derive(Error, Debug)]
pub enum CleanerError {
    #[error("Source file unavailable: {path}: {source}")]
    SourceUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV processing encountered too many errors, giving up. Rows: {total_rows}; errors: {anomalies}; max bad: {max_allowed}; error percent: {error_percent:.2}%")]
    AggregateAnomalyExceeded {
        total_rows: usize,
        anomalies: usize,
        max_allowed: usize,
        error_percent: f64,
    },

    #[error("Sink error for table '{table}': {message}")]
    SinkFailure { table: String, message: String },

    #[error("Unknown source profile: {0}")]
    UnknownProfile(String),

    #[error("Input has no header row")]
    MissingHeader,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CleanerError>;
