//! The player daemon seen as a capability.
//!
//! A [`PlayerSession`] is one live connection. It returns replies as raw
//! attribute records; typed decoding happens in the gateway. A [`Connector`]
//! knows how to open fresh sessions with fixed connection parameters.

use async_trait::async_trait;
use samc_proto::player::{Attrs, SessionError};

pub type SessionResult<T> = Result<T, SessionError>;

#[async_trait]
pub trait PlayerSession: Send + Sync {
    /// Records of the directory at `uri` (`""` is the library root).
    async fn list_directory(&self, uri: &str) -> SessionResult<Vec<Attrs>>;
    /// Whole queue, or the single entry at `pos`.
    async fn playlist_info(&self, pos: Option<u32>) -> SessionResult<Vec<Attrs>>;
    async fn status(&self) -> SessionResult<Attrs>;

    /// Start playback, at `pos` if given.
    async fn play(&self, pos: Option<u32>) -> SessionResult<()>;
    async fn pause(&self, paused: bool) -> SessionResult<()>;
    async fn stop(&self) -> SessionResult<()>;
    async fn next(&self) -> SessionResult<()>;

    async fn clear(&self) -> SessionResult<()>;
    async fn add(&self, uri: &str) -> SessionResult<()>;
    /// Delete queue positions `start..end`, or only `start` when `end` is `None`.
    async fn delete(&self, start: u32, end: Option<u32>) -> SessionResult<()>;
    async fn move_song(&self, from: u32, to: u32) -> SessionResult<()>;
    async fn shuffle(&self) -> SessionResult<()>;
    async fn consume(&self, on: bool) -> SessionResult<()>;
    async fn set_volume(&self, volume: u8) -> SessionResult<()>;

    /// Rescan the library below `uri`.
    async fn update(&self, uri: &str) -> SessionResult<Attrs>;
    /// Songs whose `tag` contains `needle`.
    async fn search(&self, tag: &str, needle: &str) -> SessionResult<Vec<Attrs>>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> SessionResult<Box<dyn PlayerSession>>;
}
