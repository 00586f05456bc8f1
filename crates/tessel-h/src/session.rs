use crate::cdp::CdpClient;
use crate::inject::{self, ActionReply};
use async_trait::async_trait;
use chromiumoxide::page::ScreenshotParams;
use std::path::PathBuf;
use tessel_engine::protocol::{ElementNode, PageSnapshot};
use tessel_engine::scenario::Interaction;
use tessel_engine::session::{Session, SessionError};
use tracing::{debug, info};

/// Session backed by a local Chromium driven over CDP.
pub struct HeadlessSession {
    client: Option<CdpClient>,
    visible: bool,
    screenshot_dir: PathBuf,
}

impl HeadlessSession {
    pub fn new() -> Self {
        Self {
            client: None,
            visible: false,
            screenshot_dir: PathBuf::from("screenshots"),
        }
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = dir.into();
        self
    }

    fn client(&self) -> Result<&CdpClient, SessionError> {
        self.client.as_ref().ok_or(SessionError::NotReady)
    }
}

impl Default for HeadlessSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Session for HeadlessSession {
    async fn launch(&mut self) -> Result<(), SessionError> {
        if self.client.is_some() {
            return Ok(());
        }
        info!("Launching headless session (Chromium)");
        let client = CdpClient::launch(self.visible)
            .await
            .map_err(|e| SessionError::Other(e.to_string()))?;
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| SessionError::Other(e.to_string()))?;
        }
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        let client = self.client()?;
        info!("Navigating to: {}", url);
        client
            .page
            .goto(url)
            .await
            .map_err(|e| SessionError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<PageSnapshot, SessionError> {
        let client = self.client()?;
        let raw = inject::call(&client.page, "window.__tessel.snapshot()").await?;
        let snapshot: PageSnapshot = serde_json::from_str(&raw)?;
        debug!(
            "Captured {} elements from {}",
            snapshot.elements.len(),
            snapshot.url
        );
        Ok(snapshot)
    }

    async fn perform(
        &mut self,
        element: Option<&ElementNode>,
        interaction: &Interaction,
    ) -> Result<(), SessionError> {
        let client = self.client()?;
        let id = element.map(|e| e.id).unwrap_or(0);
        let payload = serde_json::to_string(interaction)?;
        let raw = inject::call(
            &client.page,
            &format!("window.__tessel.perform({id}, {payload})"),
        )
        .await?;
        let reply: ActionReply = serde_json::from_str(&raw)?;
        reply.into_result(id)
    }

    async fn capture_screenshot(&mut self, label: &str) -> Result<PathBuf, SessionError> {
        let client = self.client()?;
        let bytes = client
            .page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| SessionError::Screenshot(e.to_string()))?;

        tokio::fs::create_dir_all(&self.screenshot_dir).await?;
        let path = self.screenshot_dir.join(format!("{label}.png"));
        tokio::fs::write(&path, bytes).await?;
        debug!("Screenshot saved to {}", path.display());
        Ok(path)
    }
}
