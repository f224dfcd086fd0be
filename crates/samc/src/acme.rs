//! [`WindowHost`] over the editor's mounted file tree.
//!
//! ```text
//!   <mount>/new/ctl      read → creates a window, yields its ctl line
//!   <mount>/<id>/ctl     ctl messages; field 3 of a read is the body length
//!   <mount>/<id>/tag     appended to the tag
//!   <mount>/<id>/body    appended to the body (backspace runes erase)
//!   <mount>/<id>/addr    address used by the next data access
//!   <mount>/<id>/data    text at the current address
//!   <mount>/<id>/event   event records
//! ```
//!
//! The address is per window and shared by every opener, so an address write
//! and the data access that depends on it run under one lock.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

use crate::host::{EventStream, WindowHost, WindowId};

const BACKSPACE: char = '\u{8}';

pub struct AcmeHost {
    mount: PathBuf,
    addr_lock: Mutex<()>,
}

impl AcmeHost {
    pub fn new(mount: impl Into<PathBuf>) -> Self {
        Self {
            mount: mount.into(),
            addr_lock: Mutex::new(()),
        }
    }

    fn window_file(&self, id: WindowId, name: &str) -> PathBuf {
        self.mount.join(id.to_string()).join(name)
    }

    async fn open_append(&self, id: WindowId, name: &str) -> anyhow::Result<File> {
        let path = self.window_file(id, name);
        OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("opening {}", path.display()))
    }

    async fn write_file(&self, id: WindowId, name: &str, text: &str) -> anyhow::Result<()> {
        let mut file = self.open_append(id, name).await?;
        write_all(&mut file, text)
            .await
            .with_context(|| format!("writing window {} {}", id, name))
    }

    async fn read_ctl(&self, path: &Path) -> anyhow::Result<Vec<String>> {
        let ctl = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(ctl.split_whitespace().map(str::to_string).collect())
    }
}

async fn write_all(file: &mut File, text: &str) -> std::io::Result<()> {
    file.write_all(text.as_bytes()).await?;
    file.flush().await
}

#[async_trait]
impl WindowHost for AcmeHost {
    async fn create_window(&self) -> anyhow::Result<WindowId> {
        let fields = self.read_ctl(&self.mount.join("new").join("ctl")).await?;
        let id: u32 = fields
            .first()
            .and_then(|f| f.parse().ok())
            .context("new window ctl did not start with an id")?;
        debug!("acme: created window {}", id);
        Ok(WindowId(id))
    }

    async fn delete_window(&self, id: WindowId) -> anyhow::Result<()> {
        debug!("acme: deleting window {}", id);
        self.write_file(id, "ctl", "delete\n").await
    }

    async fn set_name(&self, id: WindowId, name: &str) -> anyhow::Result<()> {
        self.write_file(id, "ctl", &format!("name {}\nscratch\nnoscroll\n", name))
            .await
    }

    async fn set_tags(&self, id: WindowId, tags: &str) -> anyhow::Result<()> {
        self.write_file(id, "tag", tags).await
    }

    async fn body_length(&self, id: WindowId) -> anyhow::Result<usize> {
        let fields = self.read_ctl(&self.window_file(id, "ctl")).await?;
        fields
            .get(2)
            .and_then(|f| f.parse().ok())
            .with_context(|| format!("window {} ctl has no body length", id))
    }

    async fn clear_body(&self, id: WindowId) -> anyhow::Result<()> {
        let len = self.body_length(id).await?;
        if len == 0 {
            return Ok(());
        }
        let erase: String = std::iter::repeat(BACKSPACE).take(len).collect();
        self.write_file(id, "body", &erase).await
    }

    async fn write_body(&self, id: WindowId, text: &str) -> anyhow::Result<()> {
        self.write_file(id, "body", text).await
    }

    async fn write_addressed(&self, id: WindowId, addr: &str, text: &str) -> anyhow::Result<()> {
        let _guard = self.addr_lock.lock().await;
        let mut addr_file = self.open_append(id, "addr").await?;
        write_all(&mut addr_file, addr)
            .await
            .with_context(|| format!("setting address {:?} in window {}", addr, id))?;
        let mut data = self.open_append(id, "data").await?;
        write_all(&mut data, text)
            .await
            .with_context(|| format!("writing data at {:?} in window {}", addr, id))
    }

    async fn set_selection(&self, id: WindowId, addr: &str) -> anyhow::Result<()> {
        let _guard = self.addr_lock.lock().await;
        let mut addr_file = self.open_append(id, "addr").await?;
        write_all(&mut addr_file, addr)
            .await
            .with_context(|| format!("setting address {:?} in window {}", addr, id))?;
        self.write_file(id, "ctl", "dot=addr\nshow\n").await
    }

    async fn read_addressed_text(
        &self,
        id: WindowId,
        start: usize,
        end: usize,
    ) -> anyhow::Result<String> {
        let _guard = self.addr_lock.lock().await;
        let mut addr_file = self.open_append(id, "addr").await?;
        write_all(&mut addr_file, &format!("#{}", start))
            .await
            .with_context(|| format!("setting address #{} in window {}", start, id))?;

        let path = self.window_file(id, "data");
        let mut data = File::open(&path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        let mut raw = Vec::new();
        data.read_to_end(&mut raw)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(String::from_utf8_lossy(&raw)
            .chars()
            .take(end.saturating_sub(start))
            .collect())
    }

    async fn open_event_stream(&self, id: WindowId) -> anyhow::Result<EventStream> {
        let path = self.window_file(id, "event");
        let file = File::open(&path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        Ok(Box::new(file))
    }
}
