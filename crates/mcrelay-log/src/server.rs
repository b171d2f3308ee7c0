//! Renders the server-to-client direction's parser callbacks as log lines,
//! and optionally captures map-chunk patches into `maplog` files.

use std::io::Write;
use std::path::{Path, PathBuf};

use mcrelay_protocol::{Chat, MapChunk, ParserCallbacks, PlayerHealth, PlayerPos, ServerInfo, TimeUpdate};
use mcrelay_region::{append_record, decode_wire_chunk};

use crate::clock::{Clock, SystemClock};
use crate::format::{strip_color_codes, timestamp_prefix};
use crate::Result;

/// Which event kinds this logger renders to text. All default on, matching
/// the source's opt-out-by-flag design.
#[derive(Debug, Clone, Copy)]
pub struct ServerLogFlags {
    pub chat_text: bool,
    pub time_update: bool,
    pub player_pos: bool,
    pub player_health: bool,
}

impl Default for ServerLogFlags {
    fn default() -> Self {
        Self { chat_text: true, time_update: true, player_pos: true, player_health: true }
    }
}

/// Where to write `r.<rx>.<rz>.maplog` captures, and the single dimension
/// this session should capture chunks for (map data from other dimensions
/// on the same connection, e.g. after a respawn into the Nether, is
/// dropped).
#[derive(Debug, Clone)]
pub struct MapCapture {
    pub dir: PathBuf,
    pub dimension: i32,
}

/// Decodes the server stream's parser callbacks into timestamped lines on
/// `sink`, rate-gating `TimeUpdate` to one line per in-game hour.
pub struct ServerLogger {
    sink: Box<dyn Write>,
    clock: Box<dyn Clock>,
    flags: ServerLogFlags,
    capture: Option<MapCapture>,
    dimension: Option<i32>,
    last_hour: i64,
}

impl ServerLogger {
    pub fn new(
        sink: Box<dyn Write>,
        clock: Box<dyn Clock>,
        flags: ServerLogFlags,
        capture: Option<MapCapture>,
    ) -> Self {
        Self { sink, clock, flags, capture, dimension: None, last_hour: -1 }
    }

    /// Opens (creating, append-mode) `path` as the log sink and wraps it
    /// with the real clock. One session's log file per proxy session, per
    /// the specification's `output_template` CLI surface.
    pub fn to_path(path: impl AsRef<Path>, flags: ServerLogFlags, capture: Option<MapCapture>) -> Result<Self> {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(Box::new(file), Box::new(SystemClock), flags, capture))
    }

    fn write_line(&mut self, marker: &str, text: &str) {
        let prefix = timestamp_prefix(self.clock.now());
        let line = format!("{prefix} {marker}{text}\n");
        if let Err(err) = self.sink.write_all(line.as_bytes()).and_then(|()| self.sink.flush()) {
            tracing::error!("failed to write server log line: {err}");
        }
        tracing::info!(target: "mcrelay::server_log", "{}", line.trim_end());
    }

    fn capture_map_chunk(&mut self, event: &MapChunk) {
        let Some(capture) = &self.capture else { return };
        if self.dimension != Some(capture.dimension) {
            return;
        }
        let sections = match decode_wire_chunk(event.primary_bitmap, &event.payload) {
            Ok(sections) => sections,
            Err(err) => {
                tracing::warn!("dropping unreadable map chunk ({}, {}): {err}", event.chunk_x, event.chunk_z);
                return;
            }
        };
        let region_x = event.chunk_x >> 9;
        let region_z = event.chunk_z >> 9;
        let path = capture.dir.join(format!("r.{region_x}.{region_z}.maplog"));
        let file = match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(err) => {
                tracing::error!("failed to open maplog capture file {}: {err}", path.display());
                return;
            }
        };
        let mut writer = std::io::BufWriter::new(file);
        for section in sections {
            if let Err(err) =
                append_record(&mut writer, event.chunk_x, section.y0, event.chunk_z, 16, 16, 16, &section.data)
            {
                tracing::error!("failed to append maplog record to {}: {err}", path.display());
                return;
            }
        }
        if let Err(err) = writer.flush() {
            tracing::error!("failed to flush maplog capture file {}: {err}", path.display());
        }
    }
}

impl ParserCallbacks for ServerLogger {
    fn on_server_info(&mut self, event: ServerInfo) {
        self.write_line(
            " ### ",
            &format!(
                "server info: wtype={:?}, mode={}, dim={}, diff={}, height={}",
                event.world_type, event.mode, event.dimension, event.difficulty, event.height
            ),
        );
        self.dimension = Some(event.dimension);
    }

    fn on_chat(&mut self, event: Chat) {
        if !self.flags.chat_text {
            return;
        }
        let stripped = strip_color_codes(&event.text).into_owned();
        self.write_line("", &stripped);
    }

    fn on_time_update(&mut self, event: TimeUpdate) {
        if !self.flags.time_update {
            return;
        }
        let day = event.ticks.div_euclid(24000);
        let in_day = event.ticks.rem_euclid(24000);
        let hour = in_day / 1000;
        if self.last_hour == hour {
            return;
        }
        self.last_hour = hour;
        self.write_line(" === ", &format!("day {day}, {}:00", (hour + 8) % 24));
    }

    fn on_player_pos(&mut self, event: PlayerPos) {
        if !self.flags.player_pos {
            return;
        }
        self.write_line(" *** ", &format!("({}, {}, {})", event.x, event.y, event.z));
    }

    fn on_player_health(&mut self, event: PlayerHealth) {
        if !self.flags.player_health {
            return;
        }
        self.write_line(
            " +++ ",
            &format!("hp={}, food={}, sat={:.1}", event.health, event.food, event.saturation),
        );
    }

    fn on_map_chunk(&mut self, event: MapChunk) {
        self.capture_map_chunk(&event);
    }
}
