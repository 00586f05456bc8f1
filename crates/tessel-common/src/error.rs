use thiserror::Error;

/// Errors raised by a browser session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not ready")]
    NotReady,

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Element {id} not interactable: {reason}")]
    NotInteractable { id: u32, reason: String },

    #[error("Element {0} is no longer attached to the page")]
    StaleElement(u32),

    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Session error: {0}")]
    Other(String),
}

impl SessionError {
    /// Whether a retry with a fresh snapshot could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionError::NotInteractable { .. }
                | SessionError::StaleElement(_)
                | SessionError::Timeout(_)
                | SessionError::Script(_)
        )
    }
}
