use thiserror::Error;

pub type PaperResult<T> = Result<T, PaperError>;

#[derive(Error, Debug)]
pub enum PaperError {
    #[error("Parent node for '{uuid}' not found (parent: {})", parent.as_deref().unwrap_or("<root>"))]
    ParentMissing {
        uuid: String,
        parent: Option<String>,
    },

    #[error("Invalid match pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid navigation url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Rendering surface rejected {operation}: {message}")]
    Surface {
        operation: &'static str,
        message: String,
    },

    #[error("Entity reached from '{from}' is already being evaluated")]
    EntityBusy { from: String },

    #[error("Scene evaluation already in flight")]
    SceneBusy,

    #[error("Invalid paper descriptor: {0}")]
    Descriptor(#[source] serde_json::Error),

    #[error("Invalid scene configuration: {0}")]
    Config(#[source] serde_json::Error),
}

impl PaperError {
    pub fn surface(operation: &'static str, message: impl Into<String>) -> Self {
        PaperError::Surface {
            operation,
            message: message.into(),
        }
    }
}
