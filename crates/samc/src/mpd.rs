//! Line-protocol session with the player daemon.
//!
//! ```text
//!   → lsinfo "music/jazz"\n
//!   ← directory: music/jazz/Coltrane\n
//!   ← file: music/jazz/a.flac\n
//!   ← OK\n                         (or  ACK [50@0] {lsinfo} No such directory)
//! ```
//!
//! One request is in flight at a time; the connection is held behind a mutex
//! for the whole request/response exchange.

use async_trait::async_trait;
use samc_proto::config::MpdConfig;
use samc_proto::player::{split_records, Attrs, SessionError, LISTING_KEYS, SONG_KEYS};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::session::{Connector, PlayerSession, SessionResult};

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn read_line(&mut self) -> SessionResult<String> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(SessionError::Closed("EOF".to_string()));
        }
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }

    async fn command(&mut self, name: &str, args: &[&str]) -> SessionResult<Attrs> {
        let request = format_command(name, args);
        debug!("mpd: → {}", request.trim_end());
        self.writer.write_all(request.as_bytes()).await?;

        let mut pairs = Attrs::new();
        loop {
            let line = self.read_line().await?;
            if line == "OK" {
                return Ok(pairs);
            }
            if let Some(ack) = line.strip_prefix("ACK ") {
                debug!("mpd: ← ACK {}", ack);
                return Err(SessionError::Server(ack.to_string()));
            }
            match line.split_once(": ") {
                Some((key, value)) => pairs.push((key.to_string(), value.to_string())),
                None => {
                    return Err(SessionError::Protocol(format!(
                        "unexpected reply line {:?}",
                        line
                    )))
                }
            }
        }
    }
}

fn quote(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn format_command(name: &str, args: &[&str]) -> String {
    let mut line = name.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&quote(arg));
    }
    line.push('\n');
    line
}

pub struct MpdSession {
    conn: Mutex<Connection>,
}

impl MpdSession {
    pub async fn connect(config: &MpdConfig) -> SessionResult<Self> {
        let stream = TcpStream::connect((config.host.as_str(), config.port)).await?;
        let (read_half, writer) = stream.into_split();
        let mut conn = Connection {
            reader: BufReader::new(read_half),
            writer,
        };

        let greeting = conn.read_line().await?;
        if !greeting.starts_with("OK MPD") {
            return Err(SessionError::Protocol(format!(
                "unexpected greeting {:?}",
                greeting
            )));
        }
        if let Some(password) = &config.password {
            conn.command("password", &[password.as_str()]).await?;
        }
        info!("mpd: connected to {} ({})", config.address(), greeting);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    async fn command(&self, name: &str, args: &[&str]) -> SessionResult<Attrs> {
        self.conn.lock().await.command(name, args).await
    }

    async fn simple(&self, name: &str, args: &[&str]) -> SessionResult<()> {
        self.command(name, args).await.map(|_| ())
    }
}

fn flag(on: bool) -> &'static str {
    if on {
        "1"
    } else {
        "0"
    }
}

#[async_trait]
impl PlayerSession for MpdSession {
    async fn list_directory(&self, uri: &str) -> SessionResult<Vec<Attrs>> {
        let pairs = if uri.is_empty() {
            self.command("lsinfo", &[]).await?
        } else {
            self.command("lsinfo", &[uri]).await?
        };
        Ok(split_records(pairs, &LISTING_KEYS))
    }

    async fn playlist_info(&self, pos: Option<u32>) -> SessionResult<Vec<Attrs>> {
        let pairs = match pos {
            Some(pos) => self.command("playlistinfo", &[pos.to_string().as_str()]).await?,
            None => self.command("playlistinfo", &[]).await?,
        };
        Ok(split_records(pairs, &SONG_KEYS))
    }

    async fn status(&self) -> SessionResult<Attrs> {
        self.command("status", &[]).await
    }

    async fn play(&self, pos: Option<u32>) -> SessionResult<()> {
        match pos {
            Some(pos) => self.simple("play", &[pos.to_string().as_str()]).await,
            None => self.simple("play", &[]).await,
        }
    }

    async fn pause(&self, paused: bool) -> SessionResult<()> {
        self.simple("pause", &[flag(paused)]).await
    }

    async fn stop(&self) -> SessionResult<()> {
        self.simple("stop", &[]).await
    }

    async fn next(&self) -> SessionResult<()> {
        self.simple("next", &[]).await
    }

    async fn clear(&self) -> SessionResult<()> {
        self.simple("clear", &[]).await
    }

    async fn add(&self, uri: &str) -> SessionResult<()> {
        self.simple("add", &[uri]).await
    }

    async fn delete(&self, start: u32, end: Option<u32>) -> SessionResult<()> {
        let range = match end {
            Some(end) => format!("{}:{}", start, end),
            None => start.to_string(),
        };
        self.simple("delete", &[range.as_str()]).await
    }

    async fn move_song(&self, from: u32, to: u32) -> SessionResult<()> {
        let (from, to) = (from.to_string(), to.to_string());
        self.simple("move", &[from.as_str(), to.as_str()]).await
    }

    async fn shuffle(&self) -> SessionResult<()> {
        self.simple("shuffle", &[]).await
    }

    async fn consume(&self, on: bool) -> SessionResult<()> {
        self.simple("consume", &[flag(on)]).await
    }

    async fn set_volume(&self, volume: u8) -> SessionResult<()> {
        self.simple("setvol", &[volume.to_string().as_str()]).await
    }

    async fn update(&self, uri: &str) -> SessionResult<Attrs> {
        if uri.is_empty() {
            self.command("update", &[]).await
        } else {
            self.command("update", &[uri]).await
        }
    }

    async fn search(&self, tag: &str, needle: &str) -> SessionResult<Vec<Attrs>> {
        let pairs = self.command("search", &[tag, needle]).await?;
        Ok(split_records(pairs, &SONG_KEYS))
    }
}

/// Opens [`MpdSession`]s with fixed connection parameters.
pub struct MpdConnector {
    config: MpdConfig,
}

impl MpdConnector {
    pub fn new(config: MpdConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for MpdConnector {
    async fn connect(&self) -> SessionResult<Box<dyn PlayerSession>> {
        let session = MpdSession::connect(&self.config).await?;
        Ok(Box::new(session))
    }
}
