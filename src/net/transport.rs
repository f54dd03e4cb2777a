//! Transport capability consumed by the core.
//!
//! Packet framing, acknowledgement, and retransmission live behind this
//! boundary. The core only enqueues outbound updates through [`Outbox`]
//! handles and receives inbound frames through the router.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::addon::AddonInfo;
use crate::config::ServerSettings;
use crate::entity::fsm::FsmSnapshot;
use crate::net::protocol::{EntityData, EntitySpawnData, EntityUpdateData, PlayerSceneProfile};
use crate::util::vec2::Vec2;

/// Credentials and addon set presented at login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub auth_key: String,
    pub addons: Vec<AddonInfo>,
}

/// Synchronous answer to a login request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoginResponse {
    /// Admitted; carries the server-side numeric ids of the client's addons
    /// in presentation order
    Success { addon_order: Vec<u8> },
    /// Addon set mismatch; echoes the server's full networked addon set
    InvalidAddons { server_addons: Vec<AddonInfo> },
    NotWhiteListed,
    Banned,
    InvalidUsername,
}

/// Reason attached to a server-initiated disconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    Shutdown,
    Kicked,
    Banned,
    InvalidAddons,
    NotWhiteListed,
    InvalidUsername,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport already started")]
    AlreadyStarted,
    #[error("failed to bind port {port}: {message}")]
    Bind { port: u16, message: String },
}

/// Per-client outbound frame builder.
///
/// Every method is a non-blocking enqueue onto the client's next outbound
/// frame; the transport coalesces reliable and unreliable updates.
pub trait Outbox: Send + Sync {
    fn set_login_response(&self, response: LoginResponse);
    fn set_hello_client_data(&self, players: Vec<(u16, String)>);
    fn add_player_connect_data(&self, id: u16, username: &str);
    fn add_player_disconnect_data(&self, id: u16, username: &str, timed_out: bool);
    fn add_player_enter_scene_data(&self, profile: &PlayerSceneProfile);
    fn add_player_leave_scene_data(&self, id: u16);
    fn add_player_already_in_scene_data(
        &self,
        peers: &[PlayerSceneProfile],
        entity_spawns: &[EntitySpawnData],
        entity_updates: &[EntityUpdateData],
        scene_host: bool,
    );
    fn add_player_death_data(&self, id: u16);
    fn add_player_team_update_data(&self, id: u16, team: u8);
    fn add_player_skin_update_data(&self, id: u16, skin_id: u8);
    fn add_chat_message(&self, message: &str);
    fn update_player_position(&self, id: u16, position: Vec2);
    fn update_player_scale(&self, id: u16, scale: bool);
    fn update_player_map_icon(&self, id: u16, has_icon: bool);
    fn update_player_map_position(&self, id: u16, position: Vec2);
    fn update_player_animation(&self, id: u16, clip_id: u16, frame: u8, effect_info: &[u8]);
    fn set_entity_spawn(&self, id: u16, spawning_type: u8, spawned_type: u8);
    fn update_entity_position(&self, id: u16, position: Vec2);
    fn update_entity_scale(&self, id: u16, scale: bool);
    fn update_entity_animation(&self, id: u16, animation_id: u8, wrap_mode: u8);
    fn update_entity_is_active(&self, id: u16, active: bool);
    fn add_entity_data(&self, id: u16, data: &[EntityData]);
    fn add_entity_host_fsm_data(&self, id: u16, fsm_index: u8, snapshot: &FsmSnapshot);
    fn set_scene_host_transfer(&self);
    fn update_server_settings(&self, settings: &ServerSettings);
    fn set_disconnect(&self, reason: DisconnectReason);
}

/// The listening side of the transport
pub trait Transport: Send + Sync {
    fn start_listening(&self, port: u16) -> Result<(), TransportError>;
    fn stop(&self);
    fn is_started(&self) -> bool;

    /// Outbox for one client; `None` when no such client is connected
    fn outbox_for(&self, id: u16) -> Option<Arc<dyn Outbox>>;

    /// Invoke the closure with every connected client's outbox
    fn for_each_outbox(&self, f: &mut dyn FnMut(&dyn Outbox));
}
