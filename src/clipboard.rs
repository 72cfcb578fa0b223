//! System clipboard access for `/copy`.
//!
//! Some platforms (Wayland, X11 without a manager) only serve clipboard
//! contents while the owning handle is alive, so the handle is opened once
//! and kept for the whole session.

use anyhow::{Context, Result};
use arboard::Clipboard;

#[derive(Default)]
pub struct ClipboardHandle {
    inner: Option<Clipboard>,
}

impl ClipboardHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a system clipboard has been opened
    pub fn is_attached(&self) -> bool {
        self.inner.is_some()
    }

    fn clipboard(&mut self) -> Result<&mut Clipboard> {
        if self.inner.is_none() {
            let clipboard = Clipboard::new()
                .inspect_err(|e| tracing::warn!("No system clipboard available: {e}"))
                .context("No system clipboard available")?;
            self.inner = Some(clipboard);
        }
        self.inner.as_mut().context("No system clipboard available")
    }

    /// Place `text` on the clipboard. The handle stays open afterwards.
    pub fn copy(&mut self, text: &str) -> Result<()> {
        self.clipboard()?
            .set_text(text.to_string())
            .inspect_err(|e| tracing::warn!("Clipboard rejected the text: {e}"))
            .context("Could not place text on the clipboard")?;

        tracing::debug!(chars = text.chars().count(), "Copied to clipboard");
        Ok(())
    }
}
