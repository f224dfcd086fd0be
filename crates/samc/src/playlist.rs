//! The playlist window: queue, transport status and playback commands.
//!
//! The window lives for the whole process. It supervises the browse window
//! and receives refresh requests from it over a channel.

use std::sync::Arc;

use samc_proto::event::Intent;
use samc_proto::path::containing_dir;
use samc_proto::player::{clock, Song, Status};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::browse::BrowseController;
use crate::events::EventPump;
use crate::gateway::SessionGateway;
use crate::host::{WindowHost, WindowId};
use crate::info::InfoViewer;

pub const PLAYLIST_WINDOW_NAME: &str = "samc:";
const PLAYLIST_TAGS: &str = " Clear Play Pause Stop Next Shuffle Browse Refresh Search";

/// How much of the playlist window went stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// Queue and status.
    Full,
    /// Status line only.
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistCommand {
    Play(Option<u32>),
    Pause,
    Stop,
    Next,
    Clear,
    Shuffle,
    Consume(bool),
    Refresh,
    Browse,
    Quit,
    Move { from: u32, to: u32 },
    Delete(u32),
    /// Positions `start..end`.
    DeleteRange { start: u32, end: u32 },
    Volume(u8),
    Search(String),
}

/// Words that start a playlist command.
const COMMAND_WORDS: [&str; 17] = [
    "Play", "Pause", "Stop", "Next", "Clear", "Shuffle", "Consume", "NoConsume", "Refresh",
    "Browse", "Del", "Quit", "Move", "Rm", "rRm", "Volume", "Search",
];

impl PlaylistCommand {
    /// Whether `text` starts with a command word, parseable or not.
    pub fn is_command_word(text: &str) -> bool {
        text.split_whitespace()
            .next()
            .is_some_and(|word| COMMAND_WORDS.contains(&word))
    }

    /// Parse executed text. Unknown words and malformed arguments give `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut words = text.split_whitespace();
        let word = words.next()?;
        let args: Vec<&str> = words.collect();
        let num = |i: usize| args.get(i).and_then(|a| a.parse::<u32>().ok());

        let command = match (word, args.len()) {
            ("Play", 0) => PlaylistCommand::Play(None),
            ("Pause", 0) => PlaylistCommand::Pause,
            ("Stop", 0) => PlaylistCommand::Stop,
            ("Next", 0) => PlaylistCommand::Next,
            ("Clear", 0) => PlaylistCommand::Clear,
            ("Shuffle", 0) => PlaylistCommand::Shuffle,
            ("Consume", 0) => PlaylistCommand::Consume(true),
            ("NoConsume", 0) => PlaylistCommand::Consume(false),
            ("Refresh", 0) => PlaylistCommand::Refresh,
            ("Browse", 0) => PlaylistCommand::Browse,
            ("Del" | "Quit", 0) => PlaylistCommand::Quit,
            ("Move", 2) => PlaylistCommand::Move {
                from: num(0)?,
                to: num(1)?,
            },
            ("Rm", 1) => PlaylistCommand::Delete(num(0)?),
            ("rRm", 2) => {
                let (start, end) = (num(0)?, num(1)?);
                if end <= start {
                    return None;
                }
                PlaylistCommand::DeleteRange { start, end }
            }
            ("Volume", 1) => {
                PlaylistCommand::Volume(args[0].parse::<u8>().ok().filter(|v| *v <= 100)?)
            }
            ("Search", n) if n > 0 => PlaylistCommand::Search(args.join(" ")),
            (pos, 0) => PlaylistCommand::Play(Some(pos.parse().ok()?)),
            _ => return None,
        };
        Some(command)
    }

    /// Refresh owed after the command succeeded.
    pub fn refresh(&self) -> Option<Refresh> {
        match self {
            PlaylistCommand::Play(_)
            | PlaylistCommand::Pause
            | PlaylistCommand::Stop
            | PlaylistCommand::Next
            | PlaylistCommand::Consume(_)
            | PlaylistCommand::Volume(_) => Some(Refresh::Status),
            PlaylistCommand::Clear
            | PlaylistCommand::Shuffle
            | PlaylistCommand::Refresh
            | PlaylistCommand::Move { .. }
            | PlaylistCommand::Delete(_)
            | PlaylistCommand::DeleteRange { .. } => Some(Refresh::Full),
            PlaylistCommand::Browse | PlaylistCommand::Quit | PlaylistCommand::Search(_) => None,
        }
    }
}

/// `State: play Song: 3 Time: 1:05/4:10 Volume 42 Consume`
pub fn status_line(status: &Status) -> String {
    let song = status
        .song
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut line = format!(
        "State: {} Song: {} Time: {}/{}",
        status.state,
        song,
        clock(status.elapsed),
        clock(status.total)
    );
    if let Some(volume) = status.volume {
        line.push_str(&format!(" Volume {}", volume));
    }
    if status.consume {
        line.push_str(" Consume");
    }
    line
}

/// One `# pos # label # mm:ss` line per song and a trailing total.
pub fn render_queue(songs: &[Song]) -> String {
    let mut body = String::new();
    for (idx, song) in songs.iter().enumerate() {
        body.push_str(&format!(
            "# {} # {} # {:02}:{:02}\n",
            song.position.unwrap_or(idx as u32),
            song.label(),
            song.duration / 60,
            song.duration % 60
        ));
    }
    let total: u32 = songs.iter().map(|s| s.duration).sum();
    body.push_str(&format!("TOTAL: {}\n", clock(total)));
    body
}

enum Wake {
    Quit,
    Refresh(Refresh),
    Intent(Option<Intent>),
}

pub struct PlaylistController {
    host: Arc<dyn WindowHost>,
    gateway: Arc<SessionGateway>,
    browse: Arc<BrowseController>,
    window: WindowId,
    refresh_rx: mpsc::UnboundedReceiver<Refresh>,
    shutdown: CancellationToken,
}

impl PlaylistController {
    /// Create and render the playlist window.
    pub async fn open(
        host: Arc<dyn WindowHost>,
        gateway: Arc<SessionGateway>,
        info: Arc<dyn InfoViewer>,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Self> {
        let window = host.create_window().await?;
        host.set_name(window, PLAYLIST_WINDOW_NAME).await?;
        host.set_tags(window, PLAYLIST_TAGS).await?;

        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let browse = BrowseController::new(
            host.clone(),
            gateway.clone(),
            info,
            refresh_tx,
            shutdown.clone(),
        );
        let controller = Self {
            host,
            gateway,
            browse,
            window,
            refresh_rx,
            shutdown,
        };
        controller.refresh(Refresh::Full).await?;
        info!("playlist: window {}", window);
        Ok(controller)
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    /// Process events until quit, then tear down every window.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut pump =
            EventPump::spawn(self.host.clone(), self.window, self.shutdown.child_token()).await?;

        let result = loop {
            let wake = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => Wake::Quit,
                Some(kind) = self.refresh_rx.recv() => Wake::Refresh(kind),
                intent = pump.intents.recv() => Wake::Intent(intent),
            };
            let step = match wake {
                Wake::Quit => break Ok(()),
                Wake::Refresh(kind) => self.refresh(kind).await,
                Wake::Intent(Some(intent)) => self.handle(intent).await,
                Wake::Intent(None) => {
                    info!("playlist: window {} closed", self.window);
                    break Ok(());
                }
            };
            if let Err(e) = step {
                break Err(e);
            }
        };

        self.teardown().await;
        pump.finish().await?;
        result
    }

    async fn teardown(&self) {
        self.shutdown.cancel();
        if let Err(e) = self.browse.shutdown().await {
            warn!("playlist: closing browse window: {:#}", e);
        }
        if let Err(e) = self.host.delete_window(self.window).await {
            debug!("playlist: deleting window {}: {:#}", self.window, e);
        }
    }

    async fn handle(&self, intent: Intent) -> anyhow::Result<()> {
        let text = intent.text();
        if intent.is_command {
            return match PlaylistCommand::parse(text) {
                Some(command) => self.execute(command).await,
                None if PlaylistCommand::is_command_word(text) => {
                    warn!("playlist: rejected malformed command {:?}", text);
                    Ok(())
                }
                None => {
                    debug!("playlist: ignoring {:?}", text);
                    Ok(())
                }
            };
        }
        match text.parse::<u32>() {
            Ok(pos) => self.reveal(pos).await,
            Err(_) => Ok(()),
        }
    }

    pub async fn execute(&self, command: PlaylistCommand) -> anyhow::Result<()> {
        debug!("playlist: {:?}", command);
        let gateway = &self.gateway;
        let result = match &command {
            PlaylistCommand::Play(pos) => gateway.play(*pos).await,
            PlaylistCommand::Pause => gateway.pause().await,
            PlaylistCommand::Stop => gateway.stop().await,
            PlaylistCommand::Next => gateway.next().await,
            PlaylistCommand::Clear => gateway.clear().await,
            PlaylistCommand::Shuffle => gateway.shuffle().await,
            PlaylistCommand::Consume(on) => gateway.consume(*on).await,
            PlaylistCommand::Move { from, to } => gateway.move_song(*from, *to).await,
            PlaylistCommand::Delete(pos) => gateway.delete(*pos).await,
            PlaylistCommand::DeleteRange { start, end } => gateway.delete_range(*start, *end).await,
            PlaylistCommand::Volume(volume) => gateway.set_volume(*volume).await,
            PlaylistCommand::Refresh => Ok(()),
            PlaylistCommand::Browse => return self.browse.navigate(".").await,
            PlaylistCommand::Search(words) => {
                return match gateway.search_title(words).await {
                    Ok(songs) => self.browse.show_search_results(&songs).await,
                    Err(e) => {
                        warn!("playlist: search for {:?} failed: {}", words, e);
                        Ok(())
                    }
                };
            }
            PlaylistCommand::Quit => {
                info!("playlist: quit");
                self.shutdown.cancel();
                return Ok(());
            }
        };

        match result {
            Ok(()) => match command.refresh() {
                Some(kind) => self.refresh(kind).await,
                None => Ok(()),
            },
            Err(e) => {
                warn!("playlist: {:?} failed: {}", command, e);
                Ok(())
            }
        }
    }

    /// Open the browse window at the directory of queue position `pos`.
    async fn reveal(&self, pos: u32) -> anyhow::Result<()> {
        match self.gateway.queue_entry(pos).await {
            Ok(Some(song)) => self.browse.navigate(&containing_dir(&song.file)).await,
            Ok(None) => Ok(()),
            Err(e) => {
                warn!("playlist: no queue entry {}: {}", pos, e);
                Ok(())
            }
        }
    }

    /// Rewrite the window. Backend failures leave the content untouched.
    pub async fn refresh(&self, kind: Refresh) -> anyhow::Result<()> {
        let status = match self.gateway.status().await {
            Ok(status) => status,
            Err(e) => {
                warn!("playlist: status failed: {}", e);
                return Ok(());
            }
        };
        let line = status_line(&status);
        if kind == Refresh::Status {
            return self
                .host
                .write_addressed(self.window, "1", &format!("{}\n", line))
                .await;
        }

        let songs = match self.gateway.queue().await {
            Ok(songs) => songs,
            Err(e) => {
                warn!("playlist: queue failed: {}", e);
                return Ok(());
            }
        };
        self.host.clear_body(self.window).await?;
        self.host
            .write_body(self.window, &format!("{}\n{}", line, render_queue(&songs)))
            .await
    }
}
