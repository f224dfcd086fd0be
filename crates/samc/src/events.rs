//! Turns a window's event stream into [`Intent`]s.
//!
//! [`EventReader`] decodes UTF-8 runes from the raw stream, feeds them to the
//! [`EventParser`] and resolves overflow records by reading the addressed text
//! back from the window. [`EventPump`] runs a reader on its own task and
//! forwards intents over a channel, so controller loops can `select!` on it
//! without losing half-read records.

use std::sync::Arc;

use samc_proto::event::{EventParser, Intent, Parsed};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::host::{EventStream, WindowHost, WindowId};

pub struct EventReader {
    stream: BufReader<EventStream>,
    parser: EventParser,
    host: Arc<dyn WindowHost>,
    window: WindowId,
}

impl EventReader {
    pub fn new(stream: EventStream, host: Arc<dyn WindowHost>, window: WindowId) -> Self {
        Self {
            stream: BufReader::new(stream),
            parser: EventParser::new(),
            host,
            window,
        }
    }

    /// Next rune, `None` at end of stream. Malformed sequences decode to
    /// U+FFFD without consuming the byte that broke them.
    async fn read_rune(&mut self) -> std::io::Result<Option<char>> {
        let mut buf = [0u8; 4];
        if self.stream.read(&mut buf[..1]).await? == 0 {
            return Ok(None);
        }
        let width = utf8_width(buf[0]);
        for slot in buf.iter_mut().take(width).skip(1) {
            let next = self.stream.fill_buf().await?.first().copied();
            match next {
                Some(byte) if is_continuation(byte) => {
                    *slot = byte;
                    self.stream.consume(1);
                }
                _ => return Ok(Some(char::REPLACEMENT_CHARACTER)),
            }
        }
        Ok(Some(
            std::str::from_utf8(&buf[..width])
                .ok()
                .and_then(|s| s.chars().next())
                .unwrap_or(char::REPLACEMENT_CHARACTER),
        ))
    }

    /// Next usable intent, `None` once the stream ends.
    pub async fn next_intent(&mut self) -> anyhow::Result<Option<Intent>> {
        loop {
            let Some(rune) = self.read_rune().await? else {
                return Ok(None);
            };
            match self.parser.push(rune) {
                None => {}
                Some(Parsed::Inline(intent)) => return Ok(Some(intent)),
                Some(Parsed::Overflow {
                    is_command,
                    start,
                    end,
                }) => {
                    let text = self
                        .host
                        .read_addressed_text(self.window, start, end)
                        .await?;
                    if let Some(intent) = Intent::new(is_command, text) {
                        return Ok(Some(intent));
                    }
                }
            }
        }
    }
}

fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

fn utf8_width(lead: u8) -> usize {
    match lead {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    }
}

/// Event reader running on its own task.
pub struct EventPump {
    pub intents: mpsc::Receiver<Intent>,
    task: JoinHandle<anyhow::Result<()>>,
}

impl EventPump {
    /// Open the window's event stream and start forwarding intents until the
    /// stream ends or `token` is cancelled.
    pub async fn spawn(
        host: Arc<dyn WindowHost>,
        window: WindowId,
        token: CancellationToken,
    ) -> anyhow::Result<Self> {
        let stream = host.open_event_stream(window).await?;
        let mut reader = EventReader::new(stream, host, window);
        let (tx, intents) = mpsc::channel(32);

        let task = tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = token.cancelled() => return Ok(()),
                    next = reader.next_intent() => next,
                };
                match next {
                    Ok(Some(intent)) => {
                        debug!("window {}: {:?}", window, intent);
                        if tx.send(intent).await.is_err() {
                            return Ok(());
                        }
                    }
                    Ok(None) => {
                        debug!("window {}: event stream ended", window);
                        return Ok(());
                    }
                    // the window went away underneath a cancelled reader
                    Err(_) if token.is_cancelled() => return Ok(()),
                    Err(e) => return Err(e.context(format!("reading events of window {}", window))),
                }
            }
        });

        Ok(Self { intents, task })
    }

    /// Wait for the pump task and surface its read error, if any.
    pub async fn finish(self) -> anyhow::Result<()> {
        drop(self.intents);
        self.task
            .await
            .map_err(|e| anyhow::anyhow!("event pump panicked: {}", e))?
    }
}
