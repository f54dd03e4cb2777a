use serde::{Deserialize, Serialize};

use crate::entity::fsm::FsmSnapshot;
use crate::util::vec2::Vec2;

/// Clip ids below this limit are canonical pose clips; ids at or above it
/// are effect or custom clips and never become the player's resting
/// animation.
pub const CANONICAL_CLIP_LIMIT: u16 = 252;

/// Inbound packet kinds, as tagged on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpdateKind {
    HelloServer = 0,
    PlayerEnterScene = 1,
    PlayerLeaveScene = 2,
    PlayerUpdate = 3,
    PlayerMapUpdate = 4,
    EntitySpawn = 5,
    EntityUpdate = 6,
    PlayerDisconnect = 7,
    PlayerDeath = 8,
    PlayerTeamUpdate = 9,
    PlayerSkinUpdate = 10,
    ChatMessage = 11,
}

impl UpdateKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::HelloServer),
            1 => Some(Self::PlayerEnterScene),
            2 => Some(Self::PlayerLeaveScene),
            3 => Some(Self::PlayerUpdate),
            4 => Some(Self::PlayerMapUpdate),
            5 => Some(Self::EntitySpawn),
            6 => Some(Self::EntityUpdate),
            7 => Some(Self::PlayerDisconnect),
            8 => Some(Self::PlayerDeath),
            9 => Some(Self::PlayerTeamUpdate),
            10 => Some(Self::PlayerSkinUpdate),
            11 => Some(Self::ChatMessage),
            _ => None,
        }
    }
}

/// Messages from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientUpdate {
    /// First message after an accepted login
    HelloServer(HelloServerData),
    /// Player moved into a scene
    PlayerEnterScene(EnterSceneData),
    /// Player left their scene without entering a new one
    PlayerLeaveScene,
    /// Pose and map-marker changes, any subset present
    PlayerUpdate(PlayerUpdateData),
    /// Map icon visibility changed
    PlayerMapUpdate { has_icon: bool },
    /// Scene host spawned an entity
    EntitySpawn(EntitySpawnData),
    /// Entity state changed, any subset present
    EntityUpdate(EntityUpdateData),
    /// Graceful client-initiated disconnect
    PlayerDisconnect,
    /// Player died in their scene
    PlayerDeath,
    /// Player switched team
    PlayerTeamUpdate { team: u8 },
    /// Player switched skin
    PlayerSkinUpdate { skin_id: u8 },
    /// Chat line typed by the player
    ChatMessage { message: String },
}

impl ClientUpdate {
    pub fn kind(&self) -> UpdateKind {
        match self {
            Self::HelloServer(_) => UpdateKind::HelloServer,
            Self::PlayerEnterScene(_) => UpdateKind::PlayerEnterScene,
            Self::PlayerLeaveScene => UpdateKind::PlayerLeaveScene,
            Self::PlayerUpdate(_) => UpdateKind::PlayerUpdate,
            Self::PlayerMapUpdate { .. } => UpdateKind::PlayerMapUpdate,
            Self::EntitySpawn(_) => UpdateKind::EntitySpawn,
            Self::EntityUpdate(_) => UpdateKind::EntityUpdate,
            Self::PlayerDisconnect => UpdateKind::PlayerDisconnect,
            Self::PlayerDeath => UpdateKind::PlayerDeath,
            Self::PlayerTeamUpdate { .. } => UpdateKind::PlayerTeamUpdate,
            Self::PlayerSkinUpdate { .. } => UpdateKind::PlayerSkinUpdate,
            Self::ChatMessage { .. } => UpdateKind::ChatMessage,
        }
    }

    /// Decode a payload tagged with a raw packet kind byte
    pub fn from_tagged(kind: u8, payload: &[u8]) -> Result<Self, DecodeError> {
        let kind = UpdateKind::from_u8(kind)
            .ok_or_else(|| DecodeError(format!("unknown packet kind {}", kind)))?;

        Ok(match kind {
            UpdateKind::HelloServer => Self::HelloServer(decode(payload)?),
            UpdateKind::PlayerEnterScene => Self::PlayerEnterScene(decode(payload)?),
            UpdateKind::PlayerLeaveScene => Self::PlayerLeaveScene,
            UpdateKind::PlayerUpdate => Self::PlayerUpdate(decode(payload)?),
            UpdateKind::PlayerMapUpdate => Self::PlayerMapUpdate {
                has_icon: decode(payload)?,
            },
            UpdateKind::EntitySpawn => Self::EntitySpawn(decode(payload)?),
            UpdateKind::EntityUpdate => Self::EntityUpdate(decode(payload)?),
            UpdateKind::PlayerDisconnect => Self::PlayerDisconnect,
            UpdateKind::PlayerDeath => Self::PlayerDeath,
            UpdateKind::PlayerTeamUpdate => Self::PlayerTeamUpdate {
                team: decode(payload)?,
            },
            UpdateKind::PlayerSkinUpdate => Self::PlayerSkinUpdate {
                skin_id: decode(payload)?,
            },
            UpdateKind::ChatMessage => Self::ChatMessage {
                message: decode(payload)?,
            },
        })
    }
}

/// Payload of the first post-login message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloServerData {
    /// Echo of the login username; the login-validated name stays
    /// authoritative
    pub username: String,
    pub scene: String,
    pub position: Vec2,
    pub scale: bool,
    pub animation_id: u16,
}

/// Payload of a scene entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnterSceneData {
    pub scene: String,
    pub position: Vec2,
    pub scale: bool,
    pub animation_id: u16,
}

/// One frame of a player animation burst
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationFrame {
    pub clip_id: u16,
    pub frame: u8,
    pub effect_info: Vec<u8>,
}

/// Player state changes; each `None`/empty field was absent from the wire
/// bit-set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerUpdateData {
    pub position: Option<Vec2>,
    pub scale: Option<bool>,
    pub map_position: Option<Vec2>,
    /// Ordered, non-empty when present
    pub animation: Vec<AnimationFrame>,
}

/// The canonical resting clip of an animation burst: the last entry below
/// [`CANONICAL_CLIP_LIMIT`]
pub fn canonical_clip(frames: &[AnimationFrame]) -> Option<u16> {
    frames
        .iter()
        .rev()
        .find(|f| f.clip_id < CANONICAL_CLIP_LIMIT)
        .map(|f| f.clip_id)
}

/// Payload of a scene-host entity spawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpawnData {
    pub entity_id: u16,
    pub spawning_type: u8,
    pub spawned_type: u8,
}

/// Entity animation with its wrap mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityAnimation {
    pub id: u8,
    pub wrap_mode: u8,
}

/// Discriminator for opaque entity data blobs.
///
/// Rotation and collider values replace the previous value of the same
/// kind; every other kind accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityDataKind(pub u8);

impl EntityDataKind {
    pub const ROTATION: EntityDataKind = EntityDataKind(0);
    pub const COLLIDER: EntityDataKind = EntityDataKind(1);

    /// Whether a later value replaces an earlier one of the same kind
    pub fn replaces(&self) -> bool {
        matches!(*self, Self::ROTATION | Self::COLLIDER)
    }
}

/// Opaque entity data blob; the server relays it without interpretation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityData {
    pub kind: EntityDataKind,
    pub payload: Vec<u8>,
}

/// Entity state changes; each `None`/empty field was absent from the wire
/// bit-set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityUpdateData {
    pub entity_id: u16,
    pub position: Option<Vec2>,
    pub scale: Option<bool>,
    pub animation: Option<EntityAnimation>,
    pub is_active: Option<bool>,
    pub data: Vec<EntityData>,
    pub host_fsm: Vec<(u8, FsmSnapshot)>,
}

/// Identity and pose of a player as replayed to scene peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSceneProfile {
    pub id: u16,
    pub username: String,
    pub position: Vec2,
    pub scale: bool,
    pub team: u8,
    pub skin_id: u8,
    pub animation_id: u16,
}

/// Encode a message using bincode
/// Uses legacy config for fixed-size integers (stable wire layout)
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| EncodeError(e.to_string()))
}

/// Decode a message using bincode
/// Uses legacy config for fixed-size integers (stable wire layout)
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(pub(crate) String);
