//! The window host seen as a capability.
//!
//! Controllers only talk to windows through [`WindowHost`]; the production
//! implementation is [`crate::acme::AcmeHost`]. Every error returned here is a
//! resource fault and ends the loop that hit it.

use std::fmt;

use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Handle of a live window. Valid from creation until deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw event-file byte stream of one window.
pub type EventStream = Box<dyn AsyncRead + Send + Unpin>;

#[async_trait]
pub trait WindowHost: Send + Sync {
    async fn create_window(&self) -> anyhow::Result<WindowId>;
    async fn delete_window(&self, id: WindowId) -> anyhow::Result<()>;

    /// Set the window name and mark it as a scratch window.
    async fn set_name(&self, id: WindowId, name: &str) -> anyhow::Result<()>;
    /// Append command words to the window tag.
    async fn set_tags(&self, id: WindowId, tags: &str) -> anyhow::Result<()>;

    /// Body length in runes.
    async fn body_length(&self, id: WindowId) -> anyhow::Result<usize>;
    async fn clear_body(&self, id: WindowId) -> anyhow::Result<()>;
    /// Append text to the body.
    async fn write_body(&self, id: WindowId, text: &str) -> anyhow::Result<()>;
    /// Replace the text at `addr` (an address expression such as `1` or `,`).
    async fn write_addressed(&self, id: WindowId, addr: &str, text: &str) -> anyhow::Result<()>;
    /// Move the selection to `addr` and scroll it into view.
    async fn set_selection(&self, id: WindowId, addr: &str) -> anyhow::Result<()>;
    /// Read the runes in `[start, end)` of the body.
    async fn read_addressed_text(&self, id: WindowId, start: usize, end: usize)
        -> anyhow::Result<String>;

    async fn open_event_stream(&self, id: WindowId) -> anyhow::Result<EventStream>;
}
