use thiserror::Error;

/// Shown whenever a failed call leaves nothing more specific to say.
pub const GENERIC_FAILURE: &str = "An unexpected error occurred.";

/// Shown for every confusion-matrix failure, whatever the cause.
pub const IMAGE_FETCH_FAILURE: &str = "Failed to load confusion matrix image.";

#[derive(Error, Debug)]
pub enum CapitalIqError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Settings error: {0}")]
    Settings(String),

    /// Rejected before any request was sent.
    #[error("{0}")]
    Validation(String),

    #[error("{}", remote_message(.message, .details))]
    RemoteAnalysis {
        message: String,
        details: Option<String>,
    },

    #[error("Failed to load confusion matrix image.")]
    ImageFetch,

    #[error("{message}")]
    Query { message: String },

    #[error("{message}")]
    Simulation { message: String },

    #[error("{0}")]
    Other(String),
}

fn remote_message(message: &str, details: &Option<String>) -> String {
    match details {
        Some(d) if !d.is_empty() => format!("{message}: {d}"),
        _ => message.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, CapitalIqError>;
