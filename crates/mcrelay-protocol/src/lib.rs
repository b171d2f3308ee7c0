//! Byte-stream recognizer for the Minecraft 1.2 / protocol version 29 wire
//! format.
//!
//! [`Parser`] consumes bytes one at a time (or in arbitrarily sized chunks —
//! the two are equivalent) and drives a [`ParserCallbacks`] implementation as
//! it recognizes complete fields. There is no framing byte in this protocol:
//! packet boundaries exist only as a consequence of correctly decoding every
//! opcode's payload, so the parser tracks its position as a stack of frame
//! records, each binding a byte-consuming action to an accumulator and a
//! remaining-byte count. This replaces the bound-method-per-state design of
//! the program this crate is descended from with a `match` over a frame enum;
//! see `SPEC_FULL.md` for the rationale.

mod error;
mod events;


use std::collections::HashSet;

use byteorder::{BigEndian, ReadBytesExt};
pub use error::ProtocolError;
pub use events::{Chat, LoginInfo, MapChunk, MobSpawn, PlayerHealth, PlayerPos, ServerInfo, TimeUpdate};
use once_cell::sync::Lazy;

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Item ids that carry an enchantment-level short after their count/damage
/// fields. Mirrors the wire's slot layout; see `SPEC_FULL.md` §4.B.
static ENCHANTABLE_ITEMS: Lazy<HashSet<i16>> = Lazy::new(|| {
    [
        0x103, 0x105, 0x15A, 0x167, // flint & steel, bow, fishing rod, shears
        0x10C, 0x10D, 0x10E, 0x10F, 0x122, // wood tools
        0x110, 0x111, 0x112, 0x113, 0x123, // stone tools
        0x10B, 0x100, 0x101, 0x102, 0x124, // iron tools
        0x114, 0x115, 0x116, 0x117, 0x125, // diamond tools
        0x11B, 0x11C, 0x11D, 0x11E, 0x126, // gold tools
        0x12A, 0x12B, 0x12C, 0x12D, // leather armor
        0x12E, 0x12F, 0x130, 0x131, // chain armor
        0x132, 0x133, 0x134, 0x135, // iron armor
        0x136, 0x137, 0x138, 0x139, // diamond armor
        0x13A, 0x13B, 0x13C, 0x13D, // gold armor
    ]
    .into_iter()
    .collect()
});

fn is_enchantable(item_id: i16) -> bool {
    ENCHANTABLE_ITEMS.contains(&item_id)
}

/// Observer for packets the parser has fully decoded. All methods default to
/// doing nothing, so implementors only need to override the events they
/// care about.
pub trait ParserCallbacks {
    fn on_login_info(&mut self, _event: LoginInfo) {}
    fn on_server_info(&mut self, _event: ServerInfo) {}
    fn on_chat(&mut self, _event: Chat) {}
    fn on_time_update(&mut self, _event: TimeUpdate) {}
    fn on_player_pos(&mut self, _event: PlayerPos) {}
    fn on_player_health(&mut self, _event: PlayerHealth) {}
    fn on_mob_spawn(&mut self, _event: MobSpawn) {}
    fn on_map_chunk(&mut self, _event: MapChunk) {}
}

/// Fans out every event to each callback in order. Lets a single direction of
/// traffic feed more than one observer (a logger and a capture writer, say)
/// without the parser knowing about either.
#[derive(Default)]
pub struct Multiplex {
    targets: Vec<Box<dyn ParserCallbacks>>,
}

impl Multiplex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, target: Box<dyn ParserCallbacks>) {
        self.targets.push(target);
    }
}

impl ParserCallbacks for Multiplex {
    fn on_login_info(&mut self, event: LoginInfo) {
        for target in &mut self.targets {
            target.on_login_info(event.clone());
        }
    }
    fn on_server_info(&mut self, event: ServerInfo) {
        for target in &mut self.targets {
            target.on_server_info(event.clone());
        }
    }
    fn on_chat(&mut self, event: Chat) {
        for target in &mut self.targets {
            target.on_chat(event.clone());
        }
    }
    fn on_time_update(&mut self, event: TimeUpdate) {
        for target in &mut self.targets {
            target.on_time_update(event);
        }
    }
    fn on_player_pos(&mut self, event: PlayerPos) {
        for target in &mut self.targets {
            target.on_player_pos(event);
        }
    }
    fn on_player_health(&mut self, event: PlayerHealth) {
        for target in &mut self.targets {
            target.on_player_health(event);
        }
    }
    fn on_mob_spawn(&mut self, event: MobSpawn) {
        for target in &mut self.targets {
            target.on_mob_spawn(event);
        }
    }
    fn on_map_chunk(&mut self, event: MapChunk) {
        for target in &mut self.targets {
            target.on_map_chunk(event.clone());
        }
    }
}

/// What to do once a [`Frame::Collect`] has accumulated its target number of
/// bytes. Carries whatever earlier fields of the same packet still need to be
/// combined with the newly collected bytes.
enum OnDone {
    StrLen(StrThen),
    StrBody(StrThen),
    LoginEid,
    LoginFixed { eid: i32, username: String, world_type: String },
    TimeUpdate,
    SpawnPos,
    Health,
    RespawnFixed,
    PlayerPosDouble,
    PlayerPosLook,
    VehicleFlag,
    MobSpawnFixed,
    MapChunkHeader,
    MapChunkPayload { x: i32, z: i32, ground_up_contiguous: bool, primary_bitmap: u16, add_bitmap: u16 },
    MultiBlockLen,
    ExplosionLen,
    WindowItemsCount,
    ItemDataLen,
    PluginMsgLen,
    SlotId,
    SlotExtraLen,
}

/// What a completed Str16 read should feed into. `Skip` means nothing in this
/// crate ever inspects the string's content (window titles, sign lines, and
/// the like carry no event).
enum StrThen {
    Skip,
    LoginUsername { eid: i32 },
    LoginWorldType { eid: i32, username: String },
    ChatText,
    RespawnWorldType { dim: i32, diff: i8, mode: i8, height: i16 },
}

enum Frame {
    /// Sentinel: always present at the bottom of the stack. Consumes exactly
    /// one byte, the next opcode.
    Main,
    /// Discards exactly `remaining` more bytes.
    Skip(u32),
    /// Accumulates exactly `remaining` more bytes into `buf`, then dispatches
    /// `on_done` with the finished buffer.
    Collect { buf: Vec<u8>, remaining: u32, on_done: OnDone },
    /// Entity metadata: reads one tag byte at a time, pushing a field frame
    /// sized by the tag's upper bits, until a `0x7f` terminator is seen. The
    /// frame stays resident across each field (it never pops itself except on
    /// the terminator), mirroring the fact that fields don't nest.
    Metadata,
    /// The count field of a window-items packet drives `remaining` more
    /// slot reads. This frame never consumes a byte itself — it only decides
    /// whether to push another slot read or end the loop.
    SlotRepeat { remaining: u16 },
}

/// Recognizes packets in a byte stream without knowing anything about the
/// transport the bytes arrived over. Feed it bytes as they arrive; it is
/// indifferent to how they were chunked.
pub struct Parser<C> {
    stack: Vec<Frame>,
    active: bool,
    safe_mode: bool,
    pos: u64,
    pub callbacks: C,
}

impl<C: ParserCallbacks> Parser<C> {
    #[must_use]
    pub fn new(safe_mode: bool, callbacks: C) -> Self {
        Self {
            stack: vec![Frame::Main],
            active: true,
            safe_mode,
            pos: 0,
            callbacks,
        }
    }

    /// Bytes recognized so far. Only advances for bytes that were actually
    /// consumed by a frame transition (a handful of internal transitions,
    /// such as `SlotRepeat` deciding whether to loop, inspect a byte without
    /// consuming it).
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.pos
    }

    /// Whether the parser is still accepting bytes. Only ever goes from
    /// `true` to `false`, when a safe-mode parser meets a protocol error.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Feeds a chunk of bytes, in any size down to one byte at a time, with
    /// identical results either way. On a protocol error: in safe mode, the
    /// parser disables itself and returns `Ok(())`, discarding the rest of
    /// this call's bytes; otherwise the error is returned and the caller
    /// decides what to do with the connection.
    pub fn feed(&mut self, data: &[u8]) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        let mut i = 0;
        while i < data.len() {
            match self.step(data[i]) {
                Ok(true) => {
                    i += 1;
                    self.pos += 1;
                }
                Ok(false) => {}
                Err(err) => {
                    if self.safe_mode {
                        self.active = false;
                        return Ok(());
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Advances the state machine by one byte. Returns whether the byte was
    /// consumed; `Ok(false)` means the same byte must be offered again to the
    /// new top-of-stack frame.
    fn step(&mut self, byte: u8) -> Result<bool> {
        let frame = self.stack.pop().expect("Main is never popped");
        match frame {
            Frame::Main => {
                self.stack.push(Frame::Main);
                self.dispatch_opcode(byte)?;
                Ok(true)
            }
            Frame::Skip(remaining) => {
                let remaining = remaining - 1;
                if remaining > 0 {
                    self.stack.push(Frame::Skip(remaining));
                }
                Ok(true)
            }
            Frame::Collect { mut buf, remaining, on_done } => {
                buf.push(byte);
                let remaining = remaining - 1;
                if remaining == 0 {
                    self.on_collect_complete(on_done, buf)?;
                } else {
                    self.stack.push(Frame::Collect { buf, remaining, on_done });
                }
                Ok(true)
            }
            Frame::Metadata => {
                if byte == 0x7f {
                    // Popped already; the loop ends here.
                } else {
                    self.stack.push(Frame::Metadata);
                    self.push_metadata_field(byte)?;
                }
                Ok(true)
            }
            Frame::SlotRepeat { remaining } => {
                if remaining > 0 {
                    self.stack.push(Frame::SlotRepeat { remaining: remaining - 1 });
                    self.push_collect(2, OnDone::SlotId)?;
                }
                Ok(false)
            }
        }
    }

    /// Resolves a zero-length read immediately instead of pushing a frame
    /// that would underflow `remaining` on the next byte (mirrors the
    /// original's `elif 0 == arg[0]: self._pop(); return False`).
    fn push_collect(&mut self, remaining: u32, on_done: OnDone) -> Result<()> {
        if remaining == 0 {
            self.on_collect_complete(on_done, Vec::new())
        } else {
            self.stack.push(Frame::Collect { buf: Vec::with_capacity(remaining as usize), remaining, on_done });
            Ok(())
        }
    }

    fn push_str16(&mut self, then: StrThen) -> Result<()> {
        self.push_collect(2, OnDone::StrLen(then))
    }

    /// Never pushes a `Skip(0)`, which would underflow on the next byte.
    fn push_skip(&mut self, remaining: u32) {
        if remaining > 0 {
            self.stack.push(Frame::Skip(remaining));
        }
    }

    fn push_metadata_field(&mut self, tag: u8) -> Result<()> {
        match tag >> 5 {
            0 => self.stack.push(Frame::Skip(1)),
            1 => self.stack.push(Frame::Skip(2)),
            2 | 3 => self.stack.push(Frame::Skip(4)),
            4 => self.push_str16(StrThen::Skip)?,
            5 => self.stack.push(Frame::Skip(5)),
            6 => self.stack.push(Frame::Skip(12)),
            _ => return Err(ProtocolError::InvalidMetadata(tag)),
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn dispatch_opcode(&mut self, opcode: u8) -> Result<()> {
        match opcode {
            0x00 => self.stack.push(Frame::Skip(4)),
            0x01 => self.push_collect(4, OnDone::LoginEid)?,
            0x02 => self.push_str16(StrThen::Skip)?,
            0x03 => self.push_str16(StrThen::ChatText)?,
            0x04 => self.push_collect(8, OnDone::TimeUpdate)?,
            0x05 => self.stack.push(Frame::Skip(10)),
            0x06 => self.push_collect(12, OnDone::SpawnPos)?,
            0x07 => self.stack.push(Frame::Skip(9)),
            0x08 => self.push_collect(8, OnDone::Health)?,
            0x09 => self.push_collect(8, OnDone::RespawnFixed)?,
            0x0a => self.stack.push(Frame::Skip(1)),
            0x0b => self.push_collect(33, OnDone::PlayerPosDouble)?,
            0x0c => self.stack.push(Frame::Skip(9)),
            0x0d => self.push_collect(41, OnDone::PlayerPosLook)?,
            0x0e => self.stack.push(Frame::Skip(11)),
            0x0f => {
                self.push_collect(2, OnDone::SlotId)?;
                self.stack.push(Frame::Skip(10));
            }
            0x10 => self.stack.push(Frame::Skip(2)),
            0x11 => self.stack.push(Frame::Skip(14)),
            0x12 | 0x13 => self.stack.push(Frame::Skip(5)),
            0x14 => {
                self.stack.push(Frame::Skip(16));
                self.push_str16(StrThen::Skip)?;
                self.stack.push(Frame::Skip(4));
            }
            0x15 => self.stack.push(Frame::Skip(24)),
            0x16 => self.stack.push(Frame::Skip(8)),
            0x17 => {
                self.push_collect(4, OnDone::VehicleFlag)?;
                self.stack.push(Frame::Skip(17));
            }
            0x18 => {
                self.stack.push(Frame::Metadata);
                self.push_collect(20, OnDone::MobSpawnFixed)?;
            }
            0x19 => {
                self.stack.push(Frame::Skip(16));
                self.push_str16(StrThen::Skip)?;
                self.stack.push(Frame::Skip(4));
            }
            0x1a | 0x1b => self.stack.push(Frame::Skip(18)),
            0x1c => self.stack.push(Frame::Skip(10)),
            0x1d | 0x1e => self.stack.push(Frame::Skip(4)),
            0x1f => self.stack.push(Frame::Skip(7)),
            0x20 => self.stack.push(Frame::Skip(6)),
            0x21 => self.stack.push(Frame::Skip(9)),
            0x22 => self.stack.push(Frame::Skip(18)),
            0x23 => self.stack.push(Frame::Skip(5)),
            0x26 => self.stack.push(Frame::Skip(5)),
            0x27 => self.stack.push(Frame::Skip(8)),
            0x28 => {
                self.stack.push(Frame::Metadata);
                self.stack.push(Frame::Skip(4));
            }
            0x29 => self.stack.push(Frame::Skip(8)),
            0x2a => self.stack.push(Frame::Skip(5)),
            0x2b => self.stack.push(Frame::Skip(8)),
            0x32 => self.stack.push(Frame::Skip(9)),
            0x33 => self.push_collect(21, OnDone::MapChunkHeader)?,
            0x34 => {
                self.push_collect(4, OnDone::MultiBlockLen)?;
                self.stack.push(Frame::Skip(10));
            }
            0x35 => self.stack.push(Frame::Skip(11)),
            0x36 => self.stack.push(Frame::Skip(12)),
            0x3c => {
                self.push_collect(4, OnDone::ExplosionLen)?;
                self.stack.push(Frame::Skip(28));
            }
            0x3d => self.stack.push(Frame::Skip(17)),
            0x46 => self.stack.push(Frame::Skip(2)),
            0x47 => self.stack.push(Frame::Skip(17)),
            0x64 => {
                self.stack.push(Frame::Skip(1));
                self.push_str16(StrThen::Skip)?;
                self.stack.push(Frame::Skip(2));
            }
            0x65 => self.stack.push(Frame::Skip(1)),
            0x66 => {
                self.push_collect(2, OnDone::SlotId)?;
                self.stack.push(Frame::Skip(7));
            }
            0x67 => {
                self.push_collect(2, OnDone::SlotId)?;
                self.stack.push(Frame::Skip(3));
            }
            0x68 => {
                self.push_collect(2, OnDone::WindowItemsCount)?;
                self.stack.push(Frame::Skip(1));
            }
            0x69 => self.stack.push(Frame::Skip(5)),
            0x6a => self.stack.push(Frame::Skip(4)),
            0x6b => {
                self.push_collect(2, OnDone::SlotId)?;
                self.stack.push(Frame::Skip(2));
            }
            0x6c => self.stack.push(Frame::Skip(2)),
            0x82 => {
                self.push_str16(StrThen::Skip)?;
                self.push_str16(StrThen::Skip)?;
                self.push_str16(StrThen::Skip)?;
                self.push_str16(StrThen::Skip)?;
                self.stack.push(Frame::Skip(10));
            }
            0x83 => {
                self.push_collect(1, OnDone::ItemDataLen)?;
                self.stack.push(Frame::Skip(4));
            }
            0x84 => self.stack.push(Frame::Skip(23)),
            0xc8 => self.stack.push(Frame::Skip(5)),
            0xc9 => {
                self.stack.push(Frame::Skip(3));
                self.push_str16(StrThen::Skip)?;
            }
            0xca => self.stack.push(Frame::Skip(4)),
            0xfa => {
                self.push_collect(2, OnDone::PluginMsgLen)?;
                self.push_str16(StrThen::Skip)?;
            }
            0xfe => {}
            0xff => self.push_str16(StrThen::Skip)?,
            other => return Err(ProtocolError::UnknownOpcode(other)),
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn on_collect_complete(&mut self, on_done: OnDone, buf: Vec<u8>) -> Result<()> {
        match on_done {
            OnDone::StrLen(then) => {
                let len = be_u16(&buf);
                self.push_collect(u32::from(len) * 2, OnDone::StrBody(then))?;
            }
            OnDone::StrBody(then) => {
                let text = decode_utf16be(&buf)?;
                match then {
                    StrThen::Skip => {}
                    StrThen::LoginUsername { eid } => {
                        self.callbacks.on_login_info(LoginInfo { entity_id: eid, username: text.clone() });
                        self.push_str16(StrThen::LoginWorldType { eid, username: text })?;
                    }
                    StrThen::LoginWorldType { eid, username } => {
                        self.push_collect(11, OnDone::LoginFixed { eid, username, world_type: text })?;
                    }
                    StrThen::ChatText => {
                        self.callbacks.on_chat(Chat { text });
                    }
                    StrThen::RespawnWorldType { dim, diff, mode, height } => {
                        self.callbacks.on_server_info(ServerInfo {
                            world_type: text,
                            mode: i32::from(mode),
                            dimension: dim,
                            difficulty: diff,
                            height: i32::from(height),
                        });
                    }
                }
            }
            OnDone::LoginEid => {
                let eid = be_i32(&buf);
                self.push_str16(StrThen::LoginUsername { eid })?;
            }
            OnDone::LoginFixed { eid: _eid, username: _username, world_type } => {
                let mode = be_i32(&buf[0..4]);
                let dim = be_i32(&buf[4..8]);
                let diff = buf[8] as i8;
                let height = buf[9];
                self.callbacks.on_server_info(ServerInfo {
                    world_type,
                    mode,
                    dimension: dim,
                    difficulty: diff,
                    height: i32::from(height),
                });
            }
            OnDone::TimeUpdate => {
                self.callbacks.on_time_update(TimeUpdate { ticks: be_i64(&buf) });
            }
            OnDone::SpawnPos => {
                let x = be_i32(&buf[0..4]);
                let y = be_i32(&buf[4..8]);
                let z = be_i32(&buf[8..12]);
                self.callbacks.on_player_pos(PlayerPos { x, y, z });
            }
            OnDone::Health => {
                let health = be_i16(&buf[0..2]);
                let food = be_i16(&buf[2..4]);
                let saturation = be_f32(&buf[4..8]);
                self.callbacks.on_player_health(PlayerHealth { health, food, saturation });
            }
            OnDone::RespawnFixed => {
                let dim = be_i32(&buf[0..4]);
                let diff = buf[4] as i8;
                let mode = buf[5] as i8;
                let height = be_i16(&buf[6..8]);
                self.push_str16(StrThen::RespawnWorldType { dim, diff, mode, height })?;
            }
            OnDone::PlayerPosDouble => {
                let x = be_f64(&buf[0..8]);
                let y = be_f64(&buf[8..16]);
                let z = be_f64(&buf[24..32]);
                self.callbacks.on_player_pos(PlayerPos { x: x as i32, y: y as i32, z: z as i32 });
            }
            OnDone::PlayerPosLook => {
                let x = be_f64(&buf[0..8]);
                let y = be_f64(&buf[8..16]);
                let z = be_f64(&buf[24..32]);
                self.callbacks.on_player_pos(PlayerPos { x: x as i32, y: y as i32, z: z as i32 });
            }
            OnDone::VehicleFlag => {
                if be_i32(&buf) > 0 {
                    self.stack.push(Frame::Skip(6));
                }
            }
            OnDone::MobSpawnFixed => {
                let eid = be_i32(&buf[0..4]);
                let kind = buf[4] as i8;
                let x = be_i32(&buf[5..9]);
                let y = be_i32(&buf[9..13]);
                let z = be_i32(&buf[13..17]);
                self.callbacks.on_mob_spawn(MobSpawn {
                    entity_id: eid,
                    kind,
                    x: f64::from(x) / 32.0,
                    y: f64::from(y) / 32.0,
                    z: f64::from(z) / 32.0,
                });
            }
            OnDone::MapChunkHeader => {
                let x = be_i32(&buf[0..4]);
                let z = be_i32(&buf[4..8]);
                let ground_up_contiguous = buf[8] != 0;
                let primary_bitmap = be_u16(&buf[9..11]);
                let add_bitmap = be_u16(&buf[11..13]);
                let nbytes = be_i32(&buf[13..17]);
                if nbytes < 0 {
                    return Err(ProtocolError::NegativeMapChunkLength(nbytes));
                }
                self.push_collect(
                    nbytes as u32,
                    OnDone::MapChunkPayload { x, z, ground_up_contiguous, primary_bitmap, add_bitmap },
                )?;
            }
            OnDone::MapChunkPayload { x, z, ground_up_contiguous, primary_bitmap, add_bitmap } => {
                self.callbacks.on_map_chunk(MapChunk {
                    chunk_x: x,
                    chunk_z: z,
                    ground_up_contiguous,
                    primary_bitmap,
                    add_bitmap,
                    payload: bytes::Bytes::from(buf),
                });
            }
            OnDone::MultiBlockLen => {
                let n = be_i32(&buf);
                self.push_skip(n.max(0) as u32);
            }
            OnDone::ExplosionLen => {
                let n = be_i32(&buf);
                self.push_skip(n.max(0) as u32 * 3);
            }
            OnDone::WindowItemsCount => {
                let count = be_i16(&buf);
                self.stack.push(Frame::SlotRepeat { remaining: count.max(0) as u16 });
            }
            OnDone::ItemDataLen => {
                self.push_skip(u32::from(buf[0]));
            }
            OnDone::PluginMsgLen => {
                let n = be_u16(&buf);
                self.push_skip(u32::from(n));
            }
            OnDone::SlotId => {
                let id = be_i16(&buf);
                if id >= 0 {
                    if is_enchantable(id) {
                        self.push_collect(2, OnDone::SlotExtraLen)?;
                    }
                    self.stack.push(Frame::Skip(3));
                }
            }
            OnDone::SlotExtraLen => {
                let n = be_i16(&buf);
                if n > 0 {
                    self.push_skip(u32::from(n as u16));
                }
            }
        }
        Ok(())
    }
}

fn be_u16(buf: &[u8]) -> u16 {
    (&buf[0..2]).read_u16::<BigEndian>().expect("2-byte buffer")
}
fn be_i16(buf: &[u8]) -> i16 {
    (&buf[0..2]).read_i16::<BigEndian>().expect("2-byte buffer")
}
fn be_i32(buf: &[u8]) -> i32 {
    (&buf[0..4]).read_i32::<BigEndian>().expect("4-byte buffer")
}
fn be_i64(buf: &[u8]) -> i64 {
    (&buf[0..8]).read_i64::<BigEndian>().expect("8-byte buffer")
}
fn be_f32(buf: &[u8]) -> f32 {
    (&buf[0..4]).read_f32::<BigEndian>().expect("4-byte buffer")
}
fn be_f64(buf: &[u8]) -> f64 {
    (&buf[0..8]).read_f64::<BigEndian>().expect("8-byte buffer")
}

/// Decodes a UTF-16BE byte run, as carried by every `Str16` field on the
/// wire.
fn decode_utf16be(buf: &[u8]) -> Result<String> {
    let units: Vec<u16> = buf.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
    String::from_utf16(&units).map_err(|_| ProtocolError::InvalidString)
}
