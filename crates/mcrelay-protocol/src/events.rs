use bytes::Bytes;

/// Sent once per connection, carrying the entity id and chosen username.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginInfo {
    pub entity_id: i32,
    pub username: String,
}

/// Emitted by both the initial login handshake and every respawn.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerInfo {
    pub world_type: String,
    pub mode: i32,
    pub dimension: i32,
    pub difficulty: i8,
    pub height: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chat {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUpdate {
    pub ticks: i64,
}

/// A position observed either as whole-block ints (spawn position) or as
/// doubles truncated toward zero (player position/look).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerHealth {
    pub health: i16,
    pub food: i16,
    pub saturation: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MobSpawn {
    pub entity_id: i32,
    pub kind: i8,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A decoded map-chunk packet. `payload` is the still-compressed section
/// data exactly as it appeared on the wire; [`crate`] users that need the
/// decoded sections reach for `mcrelay-region`.
#[derive(Debug, Clone, PartialEq)]
pub struct MapChunk {
    pub chunk_x: i32,
    pub chunk_z: i32,
    pub ground_up_contiguous: bool,
    pub primary_bitmap: u16,
    pub add_bitmap: u16,
    pub payload: Bytes,
}
