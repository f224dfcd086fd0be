//! Event-file grammar of the window host.
//!
//! Every user action inside a window produces one record on the window's
//! event file:
//!
//! ```text
//!   <origin><kind><q0> <q1> <flag> <nr> <text>\n
//! ```
//!
//! `origin`/`kind` classify the action (`Mx`/`MX` = executed with the
//! command chord, `Ml`/`ML` = looked-up/navigated), `q0`/`q1` delimit the
//! affected rune range and `nr` is the rune length of the inline `text`.
//! Text longer than [`INLINE_TEXT_LIMIT`] runes is not sent inline: `nr` is
//! then `0` and the text has to be read back from the window by address.
//!
//! [`EventParser`] is fed one rune at a time and never fails. Records of
//! other classes (keyboard, body edits) are consumed including their payload,
//! which may span lines; malformed records are skipped up to the next newline.

/// Maximum number of runes the host sends inline in an event record.
pub const INLINE_TEXT_LIMIT: usize = 256;

/// One parsed user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    /// `true` for the execute chord, `false` for navigate/select.
    pub is_command: bool,
    pub payload: String,
}

impl Intent {
    /// Build an intent; blank payloads are rejected.
    pub fn new(is_command: bool, payload: impl Into<String>) -> Option<Self> {
        let payload = payload.into();
        if payload.trim().is_empty() {
            None
        } else {
            Some(Self {
                is_command,
                payload,
            })
        }
    }

    /// Payload with surrounding whitespace removed.
    pub fn text(&self) -> &str {
        self.payload.trim()
    }
}

/// Result of a completed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// Payload was carried inline.
    Inline(Intent),
    /// Payload must be fetched from the window body in `[start, end)`.
    Overflow {
        is_command: bool,
        start: usize,
        end: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Reading space-delimited header fields.
    Fields,
    /// Reading `remaining` payload runes verbatim.
    Payload { remaining: usize },
    /// Discarding runes up to the end of the record.
    Skip,
}

/// Incremental parser over the event rune stream.
#[derive(Debug)]
pub struct EventParser {
    state: State,
    field: String,
    fields_read: usize,
    /// Class is one of the mouse chords; other records are consumed silently.
    known: bool,
    is_command: bool,
    start: Option<usize>,
    end: Option<usize>,
    payload: String,
}

impl Default for EventParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EventParser {
    pub fn new() -> Self {
        Self {
            state: State::Fields,
            field: String::new(),
            fields_read: 0,
            known: false,
            is_command: false,
            start: None,
            end: None,
            payload: String::new(),
        }
    }

    /// Feed one rune. Returns a value when it completes a usable record.
    pub fn push(&mut self, rune: char) -> Option<Parsed> {
        match self.state {
            State::Payload { remaining } => {
                self.payload.push(rune);
                if remaining > 1 {
                    self.state = State::Payload {
                        remaining: remaining - 1,
                    };
                    return None;
                }
                self.state = State::Skip;
                let payload = std::mem::take(&mut self.payload);
                if !self.known {
                    return None;
                }
                Intent::new(self.is_command, payload).map(Parsed::Inline)
            }
            _ if rune == '\n' => {
                self.reset();
                None
            }
            State::Skip => None,
            State::Fields if rune == ' ' => {
                self.fields_read += 1;
                let field = std::mem::take(&mut self.field);
                self.end_field(&field)
            }
            State::Fields => {
                self.field.push(rune);
                None
            }
        }
    }

    /// Feed a string, collecting every completed record.
    pub fn feed(&mut self, text: &str) -> Vec<Parsed> {
        text.chars().filter_map(|c| self.push(c)).collect()
    }

    fn reset(&mut self) {
        self.state = State::Fields;
        self.field.clear();
        self.fields_read = 0;
        self.known = false;
        self.is_command = false;
        self.start = None;
        self.end = None;
        self.payload.clear();
    }

    fn end_field(&mut self, field: &str) -> Option<Parsed> {
        match self.fields_read {
            1 => {
                let mut chars = field.chars();
                let class = match (chars.next(), chars.next()) {
                    (Some('M'), Some('x' | 'X')) => Some(true),
                    (Some('M'), Some('l' | 'L')) => Some(false),
                    _ => None,
                };
                // unknown classes still declare a payload length that must be consumed
                if let Some(is_command) = class {
                    self.known = true;
                    self.is_command = is_command;
                    self.start = chars.as_str().parse().ok();
                }
                None
            }
            2 => {
                self.end = field.parse().ok();
                None
            }
            // flag: not used
            3 => None,
            4 => {
                let Ok(len) = field.parse::<usize>() else {
                    self.state = State::Skip;
                    return None;
                };
                if len > 0 {
                    self.state = State::Payload { remaining: len };
                    return None;
                }
                self.state = State::Skip;
                if !self.known {
                    return None;
                }
                match (self.start, self.end) {
                    (Some(start), Some(end))
                        if end >= start && end - start >= INLINE_TEXT_LIMIT =>
                    {
                        Some(Parsed::Overflow {
                            is_command: self.is_command,
                            start,
                            end,
                        })
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }
}
