//! Typed view of the player daemon's replies.
//!
//! The daemon answers every command with flat `key: value` pairs. Sessions
//! hand those back untouched as [`Attrs`]; they are decoded into the records
//! below exactly once, at the gateway.

use std::fmt;

use thiserror::Error;

/// One reply record: ordered `key: value` pairs.
pub type Attrs = Vec<(String, String)>;

/// Keys that open a new record in a listing reply.
pub const LISTING_KEYS: [&str; 3] = ["directory", "file", "playlist"];

/// Keys that open a new record in a song-list reply.
pub const SONG_KEYS: [&str; 1] = ["file"];

/// Look up the first value stored under `key`.
pub fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Split a flat reply into records, starting a new record at every key in
/// `starts`. Pairs before the first record key are dropped.
pub fn split_records(pairs: Attrs, starts: &[&str]) -> Vec<Attrs> {
    let mut records: Vec<Attrs> = Vec::new();
    for (key, value) in pairs {
        if starts.contains(&key.as_str()) {
            records.push(vec![(key, value)]);
        } else if let Some(current) = records.last_mut() {
            current.push((key, value));
        }
    }
    records
}

// ── errors ────────────────────────────────────────────────────────────────────

/// Failure of a single player call.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The daemon closed the connection (stream end, hang-up).
    #[error("connection closed: {0}")]
    Closed(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The daemon rejected the command (`ACK ...`).
    #[error("player error: {0}")]
    Server(String),
    /// The reply did not follow the line protocol.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SessionError {
    /// True when the failure means the connection is gone and a fresh one
    /// may succeed. Everything else is a semantic failure.
    pub fn is_transport_closed(&self) -> bool {
        use std::io::ErrorKind;
        match self {
            SessionError::Closed(_) => true,
            SessionError::Io(e) => matches!(
                e.kind(),
                ErrorKind::UnexpectedEof
                    | ErrorKind::BrokenPipe
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::NotConnected
            ),
            SessionError::Server(_) | SessionError::Protocol(_) => false,
        }
    }
}

// ── records ───────────────────────────────────────────────────────────────────

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Directory(String),
    File(String),
    Playlist(String),
}

impl Entry {
    pub fn from_attrs(attrs: &[(String, String)]) -> Option<Self> {
        let (key, value) = attrs.first()?;
        match key.as_str() {
            "directory" => Some(Entry::Directory(value.clone())),
            "file" => Some(Entry::File(value.clone())),
            "playlist" => Some(Entry::Playlist(value.clone())),
            _ => None,
        }
    }

    /// Library URI of the entry.
    pub fn uri(&self) -> &str {
        match self {
            Entry::Directory(p) | Entry::File(p) | Entry::Playlist(p) => p,
        }
    }
}

/// A song, either in the queue or in search results.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Song {
    pub file: String,
    pub artist: Option<String>,
    pub title: Option<String>,
    /// Whole seconds, `0` when unknown.
    pub duration: u32,
    /// Queue position, only set for queue entries.
    pub position: Option<u32>,
}

impl Song {
    pub fn from_attrs(attrs: &[(String, String)]) -> Self {
        let non_empty = |key: &str| attr(attrs, key).filter(|v| !v.is_empty()).map(str::to_string);
        let duration = attr(attrs, "Time")
            .and_then(|t| t.parse::<u32>().ok())
            .or_else(|| attr(attrs, "duration").and_then(parse_seconds))
            .unwrap_or(0);
        Self {
            file: attr(attrs, "file").unwrap_or_default().to_string(),
            artist: non_empty("Artist"),
            title: non_empty("Title"),
            duration,
            position: attr(attrs, "Pos").and_then(|p| p.parse().ok()),
        }
    }

    /// `artist - title` when both are known, the file path otherwise.
    pub fn label(&self) -> String {
        match (&self.artist, &self.title) {
            (Some(artist), Some(title)) => format!("{} - {}", artist, title),
            _ => self.file.clone(),
        }
    }
}

/// Transport state as reported by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlayState {
    Play,
    Pause,
    Stop,
    #[default]
    Unknown,
}

impl PlayState {
    fn parse(s: &str) -> Self {
        match s {
            "play" => PlayState::Play,
            "pause" => PlayState::Pause,
            "stop" => PlayState::Stop,
            _ => PlayState::Unknown,
        }
    }
}

impl fmt::Display for PlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlayState::Play => "play",
            PlayState::Pause => "pause",
            PlayState::Stop => "stop",
            PlayState::Unknown => "",
        };
        f.write_str(s)
    }
}

/// Transport status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Status {
    pub state: PlayState,
    /// Queue index of the current song.
    pub song: Option<u32>,
    pub elapsed: u32,
    pub total: u32,
    /// `None` when the daemon has no mixer (`volume: -1`).
    pub volume: Option<u8>,
    pub consume: bool,
}

impl Status {
    pub fn from_attrs(attrs: &[(String, String)]) -> Self {
        let (elapsed, total) = attr(attrs, "time")
            .and_then(|t| {
                let (e, t) = t.split_once(':')?;
                Some((e.parse().ok()?, t.parse().ok()?))
            })
            .unwrap_or_else(|| {
                (
                    attr(attrs, "elapsed").and_then(parse_seconds).unwrap_or(0),
                    attr(attrs, "duration").and_then(parse_seconds).unwrap_or(0),
                )
            });
        Self {
            state: attr(attrs, "state").map(PlayState::parse).unwrap_or_default(),
            song: attr(attrs, "song").and_then(|s| s.parse().ok()),
            elapsed,
            total,
            volume: attr(attrs, "volume")
                .and_then(|v| v.parse::<i32>().ok())
                .and_then(|v| u8::try_from(v).ok()),
            consume: attr(attrs, "consume") == Some("1"),
        }
    }
}

fn parse_seconds(s: &str) -> Option<u32> {
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u32)
}

/// `m:ss` rendering used for elapsed/total times.
pub fn clock(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
