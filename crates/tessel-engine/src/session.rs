use async_trait::async_trait;
use std::path::PathBuf;
pub use tessel_common::error::SessionError;
use tessel_common::protocol::{ElementNode, PageSnapshot};
use tessel_common::scenario::Interaction;

/// Browser capability a test run drives. One run owns one session.
#[async_trait]
pub trait Session: Send + Sync {
    /// Start the browser (launch a process, connect to a remote, etc.)
    async fn launch(&mut self) -> Result<(), SessionError> {
        Ok(())
    }

    /// Tear the browser down. Must be safe to call after a failed launch.
    async fn close(&mut self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Capture the current page. Always a fresh capture.
    async fn snapshot(&mut self) -> Result<PageSnapshot, SessionError>;

    /// Perform one interaction. `element` is `None` for viewport-level actions.
    async fn perform(
        &mut self,
        element: Option<&ElementNode>,
        interaction: &Interaction,
    ) -> Result<(), SessionError>;

    /// Save a screenshot and return where it was written.
    async fn capture_screenshot(&mut self, _label: &str) -> Result<PathBuf, SessionError> {
        Err(SessionError::NotSupported("capture_screenshot".into()))
    }

    /// Suspend for `millis`. The only way the engine waits, so test doubles
    /// can substitute a virtual clock.
    async fn wait_millis(&mut self, millis: u64) {
        tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
    }
}
