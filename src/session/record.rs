use crate::net::protocol::PlayerSceneProfile;
use crate::util::vec2::Vec2;

/// Where a record sits in the connect flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Login accepted, first hello not yet received. Invisible to every
    /// peer list and broadcast.
    Reserved,
    /// Hello received, currently between scenes
    Greeted,
    /// Occupying the scene named by `current_scene`
    InScene,
}

/// Authoritative per-client state
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    /// Server-assigned, unique for the session lifetime
    pub id: u16,
    /// Printable network address, used for ban matching
    pub remote_address: String,
    /// Case-insensitively unique across active records
    pub username: String,
    /// Opaque bearer token presented at login
    pub auth_key: String,
    pub state: LifecycleState,
    /// Empty means between scenes; non-empty iff state is InScene
    pub current_scene: String,
    pub position: Vec2,
    pub scale: bool,
    pub animation_id: u16,
    pub team: u8,
    pub skin_id: u8,
    pub map_position: Option<Vec2>,
    pub has_map_icon: bool,
    /// True for at most one record per non-empty scene
    pub is_scene_host: bool,
}

impl PlayerRecord {
    /// Fresh record in the Reserved state, as created on login-accept
    pub fn new(
        id: u16,
        remote_address: impl Into<String>,
        username: impl Into<String>,
        auth_key: impl Into<String>,
    ) -> Self {
        Self {
            id,
            remote_address: remote_address.into(),
            username: username.into(),
            auth_key: auth_key.into(),
            state: LifecycleState::Reserved,
            current_scene: String::new(),
            position: Vec2::ZERO,
            scale: false,
            animation_id: 0,
            team: 0,
            skin_id: 0,
            map_position: None,
            has_map_icon: false,
            is_scene_host: false,
        }
    }

    /// True once the first hello has arrived
    pub fn is_active(&self) -> bool {
        self.state != LifecycleState::Reserved
    }

    pub fn is_in_scene(&self, scene: &str) -> bool {
        self.state == LifecycleState::InScene && self.current_scene == scene
    }

    /// Identity and pose as replayed to scene peers
    pub fn profile(&self) -> PlayerSceneProfile {
        PlayerSceneProfile {
            id: self.id,
            username: self.username.clone(),
            position: self.position,
            scale: self.scale,
            team: self.team,
            skin_id: self.skin_id,
            animation_id: self.animation_id,
        }
    }
}
