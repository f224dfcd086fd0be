//! Single authoritative player session with reconnect-once semantics.
//!
//! Every call runs against the current session. When it fails because the
//! connection went away, exactly one fresh session is opened, swapped in for
//! everyone, and the call is retried once against it. Semantic failures are
//! returned as-is. Replies are decoded into typed records here.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use samc_proto::player::{attr, Entry, Song, Status};
use tracing::{debug, info, warn};

use crate::session::{Connector, PlayerSession, SessionResult};

type SharedSession = Arc<Box<dyn PlayerSession>>;

pub struct SessionGateway {
    session: ArcSwap<Box<dyn PlayerSession>>,
    connector: Box<dyn Connector>,
    reconnects: AtomicUsize,
}

impl SessionGateway {
    /// Open the first session.
    pub async fn connect(connector: Box<dyn Connector>) -> SessionResult<Self> {
        let session = connector.connect().await?;
        Ok(Self::with_session(session, connector))
    }

    pub fn with_session(session: Box<dyn PlayerSession>, connector: Box<dyn Connector>) -> Self {
        Self {
            session: ArcSwap::from_pointee(session),
            connector,
            reconnects: AtomicUsize::new(0),
        }
    }

    /// Number of sessions opened to replace a dead one.
    pub fn reconnect_count(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }

    /// Run `call` against the current session, reconnecting and retrying once
    /// when the transport is gone.
    pub async fn invoke<T, F, Fut>(&self, what: &str, call: F) -> SessionResult<T>
    where
        F: Fn(SharedSession) -> Fut,
        Fut: Future<Output = SessionResult<T>>,
    {
        let used = self.session.load_full();
        let err = match call(used.clone()).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transport_closed() => e,
            Err(e) => {
                debug!("gateway: {} failed: {}", what, e);
                return Err(e);
            }
        };

        warn!("gateway: {} lost the connection ({}), reconnecting", what, err);
        let fresh = self.replace(&used).await?;
        call(fresh).await.map_err(|e| {
            warn!("gateway: {} failed again after reconnect: {}", what, e);
            e
        })
    }

    /// Swap in a fresh session unless another caller already replaced `dead`.
    async fn replace(&self, dead: &SharedSession) -> SessionResult<SharedSession> {
        let current = self.session.load_full();
        if !Arc::ptr_eq(&current, dead) {
            debug!("gateway: session already replaced");
            return Ok(current);
        }

        let fresh: SharedSession = Arc::new(self.connector.connect().await?);
        let previous = self.session.compare_and_swap(dead, fresh.clone());
        if !Arc::ptr_eq(&*previous, dead) {
            // lost the race; use the winner's session
            return Ok(self.session.load_full());
        }
        let n = self.reconnects.fetch_add(1, Ordering::SeqCst) + 1;
        info!("gateway: reconnected (#{})", n);
        Ok(fresh)
    }

    // ── typed operations ──────────────────────────────────────────────────────

    pub async fn list_directory(&self, uri: &str) -> SessionResult<Vec<Entry>> {
        let records = self
            .invoke("lsinfo", |s| async move { s.list_directory(uri).await })
            .await?;
        Ok(records.iter().filter_map(|r| Entry::from_attrs(r)).collect())
    }

    pub async fn queue(&self) -> SessionResult<Vec<Song>> {
        let records = self
            .invoke("playlistinfo", |s| async move { s.playlist_info(None).await })
            .await?;
        Ok(records.iter().map(|r| Song::from_attrs(r)).collect())
    }

    pub async fn queue_entry(&self, pos: u32) -> SessionResult<Option<Song>> {
        let records = self
            .invoke("playlistinfo", |s| async move {
                s.playlist_info(Some(pos)).await
            })
            .await?;
        Ok(records.first().map(|r| Song::from_attrs(r)))
    }

    pub async fn status(&self) -> SessionResult<Status> {
        let attrs = self
            .invoke("status", |s| async move { s.status().await })
            .await?;
        Ok(Status::from_attrs(&attrs))
    }

    pub async fn play(&self, pos: Option<u32>) -> SessionResult<()> {
        self.invoke("play", |s| async move { s.play(pos).await })
            .await
    }

    pub async fn pause(&self) -> SessionResult<()> {
        self.invoke("pause", |s| async move { s.pause(true).await })
            .await
    }

    pub async fn stop(&self) -> SessionResult<()> {
        self.invoke("stop", |s| async move { s.stop().await }).await
    }

    pub async fn next(&self) -> SessionResult<()> {
        self.invoke("next", |s| async move { s.next().await }).await
    }

    pub async fn clear(&self) -> SessionResult<()> {
        self.invoke("clear", |s| async move { s.clear().await }).await
    }

    pub async fn add(&self, uri: &str) -> SessionResult<()> {
        self.invoke("add", |s| async move { s.add(uri).await }).await
    }

    pub async fn delete(&self, pos: u32) -> SessionResult<()> {
        self.invoke("delete", |s| async move { s.delete(pos, None).await })
            .await
    }

    /// Delete queue positions `start..end`.
    pub async fn delete_range(&self, start: u32, end: u32) -> SessionResult<()> {
        self.invoke("delete", |s| async move { s.delete(start, Some(end)).await })
            .await
    }

    pub async fn move_song(&self, from: u32, to: u32) -> SessionResult<()> {
        self.invoke("move", |s| async move { s.move_song(from, to).await })
            .await
    }

    pub async fn shuffle(&self) -> SessionResult<()> {
        self.invoke("shuffle", |s| async move { s.shuffle().await })
            .await
    }

    pub async fn consume(&self, on: bool) -> SessionResult<()> {
        self.invoke("consume", |s| async move { s.consume(on).await })
            .await
    }

    pub async fn set_volume(&self, volume: u8) -> SessionResult<()> {
        self.invoke("setvol", |s| async move { s.set_volume(volume).await })
            .await
    }

    /// Start a library rescan below `uri`, returning the daemon's job id.
    pub async fn update(&self, uri: &str) -> SessionResult<Option<u32>> {
        let attrs = self
            .invoke("update", |s| async move { s.update(uri).await })
            .await?;
        Ok(attr(&attrs, "updating_db").and_then(|id| id.parse().ok()))
    }

    /// Songs whose title contains `needle`.
    pub async fn search_title(&self, needle: &str) -> SessionResult<Vec<Song>> {
        let records = self
            .invoke("search", |s| async move { s.search("title", needle).await })
            .await?;
        Ok(records.iter().map(|r| Song::from_attrs(r)).collect())
    }
}
