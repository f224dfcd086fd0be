//! The optional browse window: a directory listing of the library.
//!
//! At most one browse window exists. Its state (window, current path) lives
//! behind one async lock held for each whole operation, so navigation from
//! the playlist window and from the browse window's own loop never
//! interleave. Navigation is all-or-nothing: the new path is adopted only
//! after its listing succeeded.

use std::sync::Arc;

use samc_proto::codec::{decode, encode};
use samc_proto::path::{absolute, basename, library_uri};
use samc_proto::player::{Entry, Song};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::events::EventPump;
use crate::gateway::SessionGateway;
use crate::host::{WindowHost, WindowId};
use crate::info::InfoViewer;
use crate::playlist::Refresh;

pub const BROWSE_WINDOW_NAME: &str = "browse:";
const BROWSE_TAGS: &str = " Close Update Info Search";
const ROOT: &str = "/";

/// Executed text inside the browse window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseCommand {
    Close,
    Update,
    /// Show details of a path relative to the current directory.
    Info(String),
    Search(String),
    /// Anything else: one path per line to append to the queue.
    Add(String),
}

impl BrowseCommand {
    /// Parse already decoded text.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let (word, rest) = text
            .split_once(char::is_whitespace)
            .map(|(w, r)| (w, r.trim()))
            .unwrap_or((text, ""));
        match word {
            "Del" | "Close" if rest.is_empty() => BrowseCommand::Close,
            "Update" if rest.is_empty() => BrowseCommand::Update,
            "Info" => BrowseCommand::Info(rest.to_string()),
            "Search" => BrowseCommand::Search(rest.to_string()),
            _ => BrowseCommand::Add(text.to_string()),
        }
    }
}

/// Body of a directory listing: header line plus one encoded basename per
/// entry, in listing order.
pub fn render_listing(path: &str, entries: &[Entry]) -> String {
    let mut body = format!("current path: /{}\n", encode(library_uri(path)));
    for entry in entries {
        body.push_str(&encode(basename(entry.uri())));
        body.push('\n');
    }
    body
}

/// Body of a search result: one absolute, encoded file path per line.
pub fn render_search(songs: &[Song]) -> String {
    songs
        .iter()
        .map(|s| format!("/{}\n", encode(library_uri(&s.file))))
        .collect()
}

struct OpenWindow {
    id: WindowId,
    token: CancellationToken,
    task: JoinHandle<anyhow::Result<()>>,
}

struct BrowseState {
    window: Option<OpenWindow>,
    current_path: String,
}

pub struct BrowseController {
    host: Arc<dyn WindowHost>,
    gateway: Arc<SessionGateway>,
    info: Arc<dyn InfoViewer>,
    refresh: mpsc::UnboundedSender<Refresh>,
    parent: CancellationToken,
    state: Mutex<BrowseState>,
}

impl BrowseController {
    pub fn new(
        host: Arc<dyn WindowHost>,
        gateway: Arc<SessionGateway>,
        info: Arc<dyn InfoViewer>,
        refresh: mpsc::UnboundedSender<Refresh>,
        parent: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            host,
            gateway,
            info,
            refresh,
            parent,
            state: Mutex::new(BrowseState {
                window: None,
                current_path: ROOT.to_string(),
            }),
        })
    }

    /// Window id while open.
    pub async fn window(&self) -> Option<WindowId> {
        self.state.lock().await.window.as_ref().map(|w| w.id)
    }

    /// Current path while open.
    pub async fn current_path(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.window.as_ref().map(|_| state.current_path.clone())
    }

    /// Navigate to `target`, relative to the current path (root when
    /// closed). Opens the window on first successful listing. A target that
    /// names a single file opens its info window instead.
    pub async fn navigate(self: &Arc<Self>, target: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let wd = match state.window {
            Some(_) => state.current_path.clone(),
            None => ROOT.to_string(),
        };
        let path = absolute(&wd, target);
        let uri = library_uri(&path);

        let entries = match self.gateway.list_directory(uri).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("browse: cannot list {}: {}", path, e);
                return Ok(());
            }
        };
        if let [Entry::File(file)] = entries.as_slice() {
            if file == uri {
                return self.info.show(file).await;
            }
        }

        let id = self.ensure_window(&mut state).await?;
        state.current_path = if path.is_empty() { ROOT.to_string() } else { path };
        debug!("browse: {} ({} entries)", state.current_path, entries.len());
        self.host.clear_body(id).await?;
        self.host
            .write_body(id, &render_listing(&state.current_path, &entries))
            .await?;
        self.host.set_selection(id, "#0").await?;
        Ok(())
    }

    /// Replace the window body with search results, opening the window at
    /// root if needed. The current path is kept.
    pub async fn show_search_results(self: &Arc<Self>, songs: &[Song]) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let id = self.ensure_window(&mut state).await?;
        self.host.clear_body(id).await?;
        self.host.write_body(id, &render_search(songs)).await?;
        self.host.set_selection(id, "#0").await?;
        Ok(())
    }

    /// Close the window without waiting for its loop. Safe to call from the
    /// loop itself.
    pub async fn close(&self) -> anyhow::Result<()> {
        let window = self.state.lock().await.window.take();
        if let Some(window) = window {
            window.token.cancel();
            self.host.delete_window(window.id).await?;
            debug!("browse: closed window {}", window.id);
        }
        Ok(())
    }

    /// Close the window and wait for its loop to finish.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        let window = self.state.lock().await.window.take();
        let Some(window) = window else {
            return Ok(());
        };
        window.token.cancel();
        self.host.delete_window(window.id).await?;
        window
            .task
            .await
            .map_err(|e| anyhow::anyhow!("browse loop panicked: {}", e))?
    }

    async fn ensure_window(self: &Arc<Self>, state: &mut BrowseState) -> anyhow::Result<WindowId> {
        if let Some(window) = &state.window {
            return Ok(window.id);
        }
        let id = self.host.create_window().await?;
        self.host.set_name(id, BROWSE_WINDOW_NAME).await?;
        self.host.set_tags(id, BROWSE_TAGS).await?;

        let token = self.parent.child_token();
        let pump = EventPump::spawn(self.host.clone(), id, token.clone()).await?;
        let task = self.spawn_loop(id, token.clone(), pump);
        state.window = Some(OpenWindow { id, token, task });
        state.current_path = ROOT.to_string();
        info!("browse: opened window {}", id);
        Ok(id)
    }

    fn spawn_loop(
        self: &Arc<Self>,
        id: WindowId,
        token: CancellationToken,
        pump: EventPump,
    ) -> JoinHandle<anyhow::Result<()>> {
        let this = self.clone();
        tokio::spawn(async move {
            let result = this.run(id, &token, pump).await;
            if !token.is_cancelled() {
                this.forget(id).await;
            }
            if let Err(e) = &result {
                error!("browse: window {} stopped: {:#}", id, e);
            }
            result
        })
    }

    async fn run(
        self: &Arc<Self>,
        id: WindowId,
        token: &CancellationToken,
        mut pump: EventPump,
    ) -> anyhow::Result<()> {
        loop {
            let intent = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                intent = pump.intents.recv() => intent,
            };
            let Some(intent) = intent else { break };

            let text = decode(intent.text());
            let result = if intent.is_command {
                self.execute(BrowseCommand::parse(&text)).await
            } else {
                self.navigate(&text).await
            };
            if let Err(e) = result {
                // the window may have been deleted under a cancelled loop
                if token.is_cancelled() {
                    return Ok(());
                }
                return Err(e);
            }
        }
        pump.finish().await
    }

    /// Mark the window closed if it is still `id`.
    async fn forget(&self, id: WindowId) {
        let mut state = self.state.lock().await;
        if state.window.as_ref().is_some_and(|w| w.id == id) {
            state.window = None;
            debug!("browse: window {} went away", id);
        }
    }

    pub async fn execute(self: &Arc<Self>, command: BrowseCommand) -> anyhow::Result<()> {
        debug!("browse: {:?}", command);
        match command {
            BrowseCommand::Close => self.close().await,
            BrowseCommand::Update => {
                let path = self.state.lock().await.current_path.clone();
                match self.gateway.update(library_uri(&path)).await {
                    Ok(job) => info!("browse: updating {} (job {:?})", path, job),
                    Err(e) => warn!("browse: update of {} failed: {}", path, e),
                }
                Ok(())
            }
            BrowseCommand::Info(rel) => {
                if rel.is_empty() {
                    return Ok(());
                }
                let path = absolute(&self.state.lock().await.current_path, &rel);
                self.info.show(library_uri(&path)).await
            }
            BrowseCommand::Search(words) => {
                if words.is_empty() {
                    return Ok(());
                }
                match self.gateway.search_title(&words).await {
                    Ok(songs) => self.show_search_results(&songs).await,
                    Err(e) => {
                        warn!("browse: search for {:?} failed: {}", words, e);
                        Ok(())
                    }
                }
            }
            BrowseCommand::Add(lines) => {
                self.add_lines(&lines).await;
                Ok(())
            }
        }
    }

    /// Add every non-blank line to the queue. The queue is refreshed when at
    /// least one add succeeded.
    async fn add_lines(&self, lines: &str) {
        let wd = self.state.lock().await.current_path.clone();
        let mut added = 0;
        for line in lines.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let path = absolute(&wd, line);
            match self.gateway.add(library_uri(&path)).await {
                Ok(()) => added += 1,
                Err(e) => warn!("browse: cannot add {}: {}", path, e),
            }
        }
        if added > 0 {
            let _ = self.refresh.send(Refresh::Full);
        }
    }
}
