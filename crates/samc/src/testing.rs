//! In-memory window host and player library for controller tests.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use samc_proto::player::{Attrs, SessionError};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, DuplexStream, ReadBuf};

use crate::gateway::SessionGateway;
use crate::host::{EventStream, WindowHost, WindowId};
use crate::session::{Connector, PlayerSession, SessionResult};

pub fn closed() -> SessionError {
    SessionError::Closed("EOF".to_string())
}

struct BrokenStream;

impl AsyncRead for BrokenStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Poll::Ready(Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            "event file gone",
        )))
    }
}

/// Event stream that yields `records` and then fails.
pub fn broken_stream(records: &str) -> EventStream {
    Box::new(std::io::Cursor::new(records.as_bytes().to_vec()).chain(BrokenStream))
}

fn pairs(raw: &[(&str, &str)]) -> Attrs {
    raw.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// ── window host ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct FakeWindow {
    pub name: String,
    pub tags: String,
    pub body: String,
    pub selection: Option<String>,
}

#[derive(Default)]
struct HostState {
    next_id: u32,
    windows: BTreeMap<WindowId, FakeWindow>,
    deleted: Vec<WindowId>,
    /// Streams handed out instead of a live duplex on the next open.
    streams: HashMap<WindowId, EventStream>,
}

#[derive(Default)]
pub struct FakeHost {
    state: Mutex<HostState>,
    writers: tokio::sync::Mutex<HashMap<WindowId, DuplexStream>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window(&self, id: WindowId) -> Option<FakeWindow> {
        self.state.lock().unwrap().windows.get(&id).cloned()
    }

    pub fn body(&self, id: WindowId) -> String {
        self.window(id)
            .unwrap_or_else(|| panic!("window {} is not open", id))
            .body
    }

    pub fn live_windows(&self) -> Vec<WindowId> {
        self.state.lock().unwrap().windows.keys().copied().collect()
    }

    pub fn deleted(&self) -> Vec<WindowId> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn set_event_stream(&self, id: WindowId, stream: EventStream) {
        self.state.lock().unwrap().streams.insert(id, stream);
    }

    /// Append raw event records to the window's event stream.
    pub async fn push_event(&self, id: WindowId, records: &str) {
        let mut writers = self.writers.lock().await;
        let writer = writers
            .get_mut(&id)
            .unwrap_or_else(|| panic!("window {} has no open event stream", id));
        writer.write_all(records.as_bytes()).await.unwrap();
    }

    fn with_window<T>(
        &self,
        id: WindowId,
        f: impl FnOnce(&mut FakeWindow) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut state = self.state.lock().unwrap();
        let window = state
            .windows
            .get_mut(&id)
            .ok_or_else(|| anyhow!("window {} does not exist", id))?;
        f(window)
    }
}

/// Byte range of 1-based line `n`, including its newline.
fn line_range(body: &str, n: usize) -> Option<std::ops::Range<usize>> {
    let mut start = 0;
    for (i, line) in body.split_inclusive('\n').enumerate() {
        if i + 1 == n {
            return Some(start..start + line.len());
        }
        start += line.len();
    }
    None
}

#[async_trait]
impl WindowHost for FakeHost {
    async fn create_window(&self) -> anyhow::Result<WindowId> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = WindowId(state.next_id);
        state.windows.insert(id, FakeWindow::default());
        Ok(id)
    }

    async fn delete_window(&self, id: WindowId) -> anyhow::Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if state.windows.remove(&id).is_none() {
                bail!("window {} does not exist", id);
            }
            state.deleted.push(id);
        }
        self.writers.lock().await.remove(&id);
        Ok(())
    }

    async fn set_name(&self, id: WindowId, name: &str) -> anyhow::Result<()> {
        self.with_window(id, |w| {
            w.name = name.to_string();
            Ok(())
        })
    }

    async fn set_tags(&self, id: WindowId, tags: &str) -> anyhow::Result<()> {
        self.with_window(id, |w| {
            w.tags.push_str(tags);
            Ok(())
        })
    }

    async fn body_length(&self, id: WindowId) -> anyhow::Result<usize> {
        self.with_window(id, |w| Ok(w.body.chars().count()))
    }

    async fn clear_body(&self, id: WindowId) -> anyhow::Result<()> {
        self.with_window(id, |w| {
            w.body.clear();
            Ok(())
        })
    }

    async fn write_body(&self, id: WindowId, text: &str) -> anyhow::Result<()> {
        self.with_window(id, |w| {
            w.body.push_str(text);
            Ok(())
        })
    }

    async fn write_addressed(&self, id: WindowId, addr: &str, text: &str) -> anyhow::Result<()> {
        self.with_window(id, |w| {
            if addr == "," {
                w.body = text.to_string();
                return Ok(());
            }
            let n: usize = addr.parse()?;
            let range = line_range(&w.body, n)
                .ok_or_else(|| anyhow!("address out of range: {}", addr))?;
            w.body.replace_range(range, text);
            Ok(())
        })
    }

    async fn set_selection(&self, id: WindowId, addr: &str) -> anyhow::Result<()> {
        self.with_window(id, |w| {
            w.selection = Some(addr.to_string());
            Ok(())
        })
    }

    async fn read_addressed_text(
        &self,
        id: WindowId,
        start: usize,
        end: usize,
    ) -> anyhow::Result<String> {
        self.with_window(id, |w| {
            Ok(w.body
                .chars()
                .skip(start)
                .take(end.saturating_sub(start))
                .collect())
        })
    }

    async fn open_event_stream(&self, id: WindowId) -> anyhow::Result<EventStream> {
        self.with_window(id, |_| Ok(()))?;
        let canned = self.state.lock().unwrap().streams.remove(&id);
        if let Some(stream) = canned {
            return Ok(stream);
        }
        let (writer, reader) = tokio::io::duplex(64 * 1024);
        self.writers.lock().await.insert(id, writer);
        Ok(Box::new(reader))
    }
}

// ── player library ────────────────────────────────────────────────────────────

#[derive(Default)]
struct LibraryState {
    /// directory uri → listing records
    dirs: BTreeMap<String, Vec<Attrs>>,
    /// file uri → song attributes
    files: BTreeMap<String, Attrs>,
    queue: Vec<Attrs>,
    state: String,
    song: Option<u32>,
    volume: Option<u8>,
    consume: bool,
    updates: u32,
    failures: VecDeque<SessionError>,
    refuse: bool,
    /// Also the id of the newest session.
    connects: usize,
    /// Sessions whose connection has gone away.
    dead: HashSet<usize>,
    calls: Vec<String>,
    /// Successful calls with the id of the session that served them.
    served: Vec<(String, usize)>,
}

impl LibraryState {
    fn bad_index(&self, pos: u32) -> SessionResult<usize> {
        let pos = pos as usize;
        if pos < self.queue.len() {
            Ok(pos)
        } else {
            Err(SessionError::Server(format!("[2@0] Bad song index {}", pos)))
        }
    }
}

/// Shared fake daemon. Every session opened from it sees the same state.
#[derive(Clone, Default)]
pub struct FakeLibrary {
    state: Arc<Mutex<LibraryState>>,
}

impl FakeLibrary {
    pub fn new() -> Self {
        let lib = Self::default();
        {
            let mut state = lib.state.lock().unwrap();
            state.state = "stop".to_string();
            state.dirs.insert(String::new(), Vec::new());
        }
        lib
    }

    /// Gateway over a first session of this library.
    pub fn gateway(&self) -> SessionGateway {
        let id = {
            let mut state = self.state.lock().unwrap();
            state.connects += 1;
            state.connects
        };
        SessionGateway::with_session(
            Box::new(FakeSession {
                lib: self.clone(),
                id,
            }),
            Box::new(FakeConnector { lib: self.clone() }),
        )
    }

    /// Register a directory with its child directories and files. Files are
    /// registered as untagged 60 second songs unless added via [`add_song`].
    pub fn add_dir(&self, uri: &str, dirs: &[&str], files: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let mut records: Vec<Attrs> = dirs
            .iter()
            .map(|d| pairs(&[("directory", d)]))
            .collect();
        for file in files {
            records.push(pairs(&[("file", file)]));
            state
                .files
                .entry(file.to_string())
                .or_insert_with(|| pairs(&[("file", file), ("Time", "60")]));
        }
        for d in dirs {
            state.dirs.entry(d.to_string()).or_default();
        }
        state.dirs.insert(uri.to_string(), records);
    }

    pub fn add_song(&self, uri: &str, artist: Option<&str>, title: Option<&str>, secs: u32) {
        let mut attrs = pairs(&[("file", uri)]);
        if let Some(artist) = artist {
            attrs.push(("Artist".to_string(), artist.to_string()));
        }
        if let Some(title) = title {
            attrs.push(("Title".to_string(), title.to_string()));
        }
        attrs.push(("Time".to_string(), secs.to_string()));
        self.state.lock().unwrap().files.insert(uri.to_string(), attrs);
    }

    pub fn enqueue(&self, uri: &str) {
        let mut state = self.state.lock().unwrap();
        let song = state.files.get(uri).cloned().expect("unknown song");
        state.queue.push(song);
    }

    pub fn set_volume(&self, volume: u8) {
        self.state.lock().unwrap().volume = Some(volume);
    }

    pub fn volume(&self) -> Option<u8> {
        self.state.lock().unwrap().volume
    }

    pub fn player_state(&self) -> String {
        self.state.lock().unwrap().state.clone()
    }

    pub fn queue_files(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .queue
            .iter()
            .map(|s| s[0].1.clone())
            .collect()
    }

    /// Make the next call fail with `err`.
    pub fn fail_next(&self, err: SessionError) {
        self.state.lock().unwrap().failures.push_back(err);
    }

    /// Every session opened so far fails all further calls as closed.
    pub fn drop_connections(&self) {
        let mut state = self.state.lock().unwrap();
        let open = 1..=state.connects;
        state.dead.extend(open);
    }

    pub fn served(&self) -> Vec<(String, usize)> {
        self.state.lock().unwrap().served.clone()
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().unwrap().refuse = refuse;
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    /// Names of the calls received so far, failed ones included.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn begin(
        &self,
        session: usize,
        call: &str,
    ) -> SessionResult<std::sync::MutexGuard<'_, LibraryState>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.to_string());
        if state.dead.contains(&session) {
            return Err(closed());
        }
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }
        state.served.push((call.to_string(), session));
        Ok(state)
    }
}

struct FakeSession {
    lib: FakeLibrary,
    id: usize,
}

#[async_trait]
impl PlayerSession for FakeSession {
    async fn list_directory(&self, uri: &str) -> SessionResult<Vec<Attrs>> {
        let state = self.lib.begin(self.id, "lsinfo")?;
        if let Some(records) = state.dirs.get(uri) {
            return Ok(records.clone());
        }
        match state.files.get(uri) {
            Some(song) => Ok(vec![song.clone()]),
            None => Err(SessionError::Server(format!(
                "[50@0] {{lsinfo}} No such directory: {}",
                uri
            ))),
        }
    }

    async fn playlist_info(&self, pos: Option<u32>) -> SessionResult<Vec<Attrs>> {
        let state = self.lib.begin(self.id, "playlistinfo")?;
        let with_pos = |i: usize| {
            let mut song = state.queue[i].clone();
            song.push(("Pos".to_string(), i.to_string()));
            song
        };
        match pos {
            Some(pos) => Ok(vec![with_pos(state.bad_index(pos)?)]),
            None => Ok((0..state.queue.len()).map(with_pos).collect()),
        }
    }

    async fn status(&self) -> SessionResult<Attrs> {
        let state = self.lib.begin(self.id, "status")?;
        let mut attrs = pairs(&[("state", state.state.as_str())]);
        let volume = state.volume.map(|v| v.to_string()).unwrap_or("-1".into());
        attrs.push(("volume".to_string(), volume));
        attrs.push((
            "consume".to_string(),
            if state.consume { "1" } else { "0" }.to_string(),
        ));
        if let Some(song) = state.song {
            attrs.push(("song".to_string(), song.to_string()));
            let total = state
                .queue
                .get(song as usize)
                .and_then(|s| s.iter().find(|(k, _)| k == "Time"))
                .map(|(_, v)| v.clone())
                .unwrap_or_else(|| "0".into());
            attrs.push(("time".to_string(), format!("0:{}", total)));
        }
        Ok(attrs)
    }

    async fn play(&self, pos: Option<u32>) -> SessionResult<()> {
        let mut state = self.lib.begin(self.id, "play")?;
        let pos = match pos {
            Some(pos) => state.bad_index(pos)? as u32,
            None => state.song.unwrap_or(0),
        };
        state.song = Some(pos);
        state.state = "play".to_string();
        Ok(())
    }

    async fn pause(&self, paused: bool) -> SessionResult<()> {
        let mut state = self.lib.begin(self.id, "pause")?;
        state.state = if paused { "pause" } else { "play" }.to_string();
        Ok(())
    }

    async fn stop(&self) -> SessionResult<()> {
        let mut state = self.lib.begin(self.id, "stop")?;
        state.state = "stop".to_string();
        Ok(())
    }

    async fn next(&self) -> SessionResult<()> {
        let mut state = self.lib.begin(self.id, "next")?;
        state.song = state.song.map(|s| s + 1);
        Ok(())
    }

    async fn clear(&self) -> SessionResult<()> {
        let mut state = self.lib.begin(self.id, "clear")?;
        state.queue.clear();
        state.song = None;
        Ok(())
    }

    async fn add(&self, uri: &str) -> SessionResult<()> {
        let mut state = self.lib.begin(self.id, "add")?;
        if let Some(song) = state.files.get(uri).cloned() {
            state.queue.push(song);
            return Ok(());
        }
        if !state.dirs.contains_key(uri) {
            return Err(SessionError::Server(format!("[50@0] {{add}} No such directory: {}", uri)));
        }
        let prefix = format!("{}/", uri);
        let songs: Vec<Attrs> = state
            .files
            .iter()
            .filter(|(file, _)| uri.is_empty() || file.starts_with(&prefix))
            .map(|(_, song)| song.clone())
            .collect();
        state.queue.extend(songs);
        Ok(())
    }

    async fn delete(&self, start: u32, end: Option<u32>) -> SessionResult<()> {
        let mut state = self.lib.begin(self.id, "delete")?;
        let start = state.bad_index(start)?;
        let end = match end {
            Some(end) if end as usize <= state.queue.len() && end as usize > start => end as usize,
            Some(end) => return Err(SessionError::Server(format!("[2@0] Bad song index {}", end))),
            None => start + 1,
        };
        state.queue.drain(start..end);
        Ok(())
    }

    async fn move_song(&self, from: u32, to: u32) -> SessionResult<()> {
        let mut state = self.lib.begin(self.id, "move")?;
        let from = state.bad_index(from)?;
        let to = state.bad_index(to)?;
        let song = state.queue.remove(from);
        state.queue.insert(to, song);
        Ok(())
    }

    async fn shuffle(&self) -> SessionResult<()> {
        let mut state = self.lib.begin(self.id, "shuffle")?;
        state.queue.reverse();
        Ok(())
    }

    async fn consume(&self, on: bool) -> SessionResult<()> {
        let mut state = self.lib.begin(self.id, "consume")?;
        state.consume = on;
        Ok(())
    }

    async fn set_volume(&self, volume: u8) -> SessionResult<()> {
        let mut state = self.lib.begin(self.id, "setvol")?;
        state.volume = Some(volume);
        Ok(())
    }

    async fn update(&self, _uri: &str) -> SessionResult<Attrs> {
        let mut state = self.lib.begin(self.id, "update")?;
        state.updates += 1;
        Ok(pairs(&[("updating_db", state.updates.to_string().as_str())]))
    }

    async fn search(&self, tag: &str, needle: &str) -> SessionResult<Vec<Attrs>> {
        let state = self.lib.begin(self.id, "search")?;
        let key = match tag {
            "title" => "Title",
            other => other,
        };
        let needle = needle.to_lowercase();
        Ok(state
            .files
            .values()
            .filter(|song| {
                song.iter()
                    .any(|(k, v)| k == key && v.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect())
    }
}

struct FakeConnector {
    lib: FakeLibrary,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> SessionResult<Box<dyn PlayerSession>> {
        // a real dial suspends; lets concurrent callers overlap
        tokio::task::yield_now().await;
        let id = {
            let mut state = self.lib.state.lock().unwrap();
            if state.refuse {
                return Err(SessionError::Io(std::io::Error::from(
                    std::io::ErrorKind::ConnectionRefused,
                )));
            }
            state.connects += 1;
            state.connects
        };
        Ok(Box::new(FakeSession {
            lib: self.lib.clone(),
            id,
        }))
    }
}
