//! Song information windows.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::host::{WindowHost, WindowId};

pub const INFO_WINDOW_NAME: &str = "songinfo:";

/// Shows details of a single library file.
#[async_trait]
pub trait InfoViewer: Send + Sync {
    async fn show(&self, uri: &str) -> anyhow::Result<()>;
}

/// Opens a fresh window per song and fills it with the output of an external
/// command run with the file's library uri.
pub struct SongInfo {
    host: Arc<dyn WindowHost>,
    command: String,
}

impl SongInfo {
    pub fn new(host: Arc<dyn WindowHost>, command: impl Into<String>) -> Self {
        Self {
            host,
            command: command.into(),
        }
    }

    async fn describe(&self, uri: &str) -> String {
        let output = tokio::process::Command::new(&self.command)
            .arg(uri)
            .output()
            .await;
        match output {
            Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).into_owned(),
            Ok(out) => {
                warn!("info: {} exited with {}", self.command, out.status);
                format!(
                    "{}\n{}",
                    uri,
                    String::from_utf8_lossy(&out.stderr).trim_end()
                )
            }
            Err(e) => {
                warn!("info: cannot run {}: {}", self.command, e);
                format!("{}\n", uri)
            }
        }
    }

    async fn open_window(&self) -> anyhow::Result<WindowId> {
        let id = self.host.create_window().await?;
        self.host.set_name(id, INFO_WINDOW_NAME).await?;
        self.host.set_tags(id, " Del").await?;
        Ok(id)
    }
}

#[async_trait]
impl InfoViewer for SongInfo {
    async fn show(&self, uri: &str) -> anyhow::Result<()> {
        debug!("info: {}", uri);
        let text = self.describe(uri).await;
        let id = self
            .open_window()
            .await
            .context("opening song info window")?;
        self.host.write_body(id, &text).await?;
        self.host.set_selection(id, "#0").await?;
        Ok(())
    }
}
