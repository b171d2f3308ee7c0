//! Renders the client-to-server direction's parser callbacks as log lines.

use std::io::Write;
use std::path::Path;

use mcrelay_protocol::{Chat, ParserCallbacks, PlayerPos};

use crate::clock::{Clock, SystemClock};
use crate::format::{strip_color_codes, timestamp_prefix};
use crate::Result;

/// Position updates are rate-gated to this many seconds apart, unless the
/// player has moved far enough to warrant an immediate line.
const POSITION_INTERVAL_SECS: i64 = 60;
/// Manhattan distance (in blocks) that bypasses the rate gate.
const POSITION_JUMP_THRESHOLD: i64 = 50;

#[derive(Debug, Clone, Copy)]
pub struct ClientLogFlags {
    pub chat_text: bool,
    pub player_pos: bool,
}

impl Default for ClientLogFlags {
    fn default() -> Self {
        Self { chat_text: true, player_pos: true }
    }
}

/// Decodes the client stream's parser callbacks into timestamped lines on
/// `sink`. `PlayerPos` is rate-gated: at most one line per
/// [`POSITION_INTERVAL_SECS`] seconds, unless the player has moved by at
/// least [`POSITION_JUMP_THRESHOLD`] Manhattan blocks since the last
/// emitted position.
pub struct ClientLogger {
    sink: Box<dyn Write>,
    clock: Box<dyn Clock>,
    flags: ClientLogFlags,
    next_emit_at: Option<i64>,
    last_emitted: Option<(i32, i32, i32)>,
}

impl ClientLogger {
    pub fn new(sink: Box<dyn Write>, clock: Box<dyn Clock>, flags: ClientLogFlags) -> Self {
        Self { sink, clock, flags, next_emit_at: None, last_emitted: None }
    }

    /// Opens (creating, append-mode) `path` as the log sink and wraps it
    /// with the real clock.
    pub fn to_path(path: impl AsRef<Path>, flags: ClientLogFlags) -> Result<Self> {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(Box::new(file), Box::new(SystemClock), flags))
    }

    fn write_line(&mut self, marker: &str, text: &str) {
        let prefix = timestamp_prefix(self.clock.now());
        let line = format!("{prefix} {marker}{text}\n");
        if let Err(err) = self.sink.write_all(line.as_bytes()).and_then(|()| self.sink.flush()) {
            tracing::error!("failed to write client log line: {err}");
        }
        tracing::info!(target: "mcrelay::client_log", "{}", line.trim_end());
    }
}

fn manhattan(a: (i32, i32, i32), b: (i32, i32, i32)) -> i64 {
    (i64::from(a.0) - i64::from(b.0)).abs()
        + (i64::from(a.1) - i64::from(b.1)).abs()
        + (i64::from(a.2) - i64::from(b.2)).abs()
}

impl ParserCallbacks for ClientLogger {
    fn on_chat(&mut self, event: Chat) {
        if !self.flags.chat_text {
            return;
        }
        let stripped = strip_color_codes(&event.text).into_owned();
        self.write_line(">> ", &stripped);
    }

    fn on_player_pos(&mut self, event: PlayerPos) {
        if !self.flags.player_pos {
            return;
        }
        let pos = (event.x, event.y, event.z);
        let now = self.clock.now().unix_timestamp();
        let jumped = self.last_emitted.is_some_and(|last| manhattan(pos, last) >= POSITION_JUMP_THRESHOLD);
        if let Some(next) = self.next_emit_at {
            if now < next && !jumped {
                return;
            }
        }
        self.next_emit_at = Some(now + POSITION_INTERVAL_SECS);
        self.last_emitted = Some(pos);
        self.write_line(" *** ", &format!("({}, {}, {})", event.x, event.y, event.z));
    }
}
