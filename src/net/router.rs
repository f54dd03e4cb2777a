//! Inbound dispatch: one handler per packet kind.
//!
//! The transport's worker threads hand every decoded frame to
//! [`UpdateRouter::dispatch`]; frames that fail to decode or reference an
//! unknown kind are logged and dropped so the per-client frame loop keeps
//! running.

use std::sync::Arc;

use tracing::warn;

use crate::net::protocol::ClientUpdate;
use crate::server::manager::ServerManager;

pub struct UpdateRouter {
    manager: Arc<ServerManager>,
}

impl UpdateRouter {
    pub fn new(manager: Arc<ServerManager>) -> Self {
        Self { manager }
    }

    /// Route a decoded update to its handler
    pub fn dispatch(&self, id: u16, update: ClientUpdate) {
        match update {
            ClientUpdate::HelloServer(data) => self.manager.on_hello(id, data),
            ClientUpdate::PlayerEnterScene(data) => self.manager.on_enter_scene(id, data),
            ClientUpdate::PlayerLeaveScene => self.manager.on_leave_scene(id),
            ClientUpdate::PlayerUpdate(data) => self.manager.on_player_update(id, data),
            ClientUpdate::PlayerMapUpdate { has_icon } => {
                self.manager.on_player_map_update(id, has_icon)
            }
            ClientUpdate::EntitySpawn(data) => self.manager.on_entity_spawn(id, data),
            ClientUpdate::EntityUpdate(data) => self.manager.on_entity_update(id, data),
            ClientUpdate::PlayerDisconnect => self.manager.on_client_disconnect(id),
            ClientUpdate::PlayerDeath => self.manager.on_player_death(id),
            ClientUpdate::PlayerTeamUpdate { team } => self.manager.on_player_team_update(id, team),
            ClientUpdate::PlayerSkinUpdate { skin_id } => {
                self.manager.on_player_skin_update(id, skin_id)
            }
            ClientUpdate::ChatMessage { message } => self.manager.on_chat_message(id, &message),
        }
    }

    /// Decode a raw tagged frame and route it
    pub fn dispatch_raw(&self, id: u16, kind: u8, payload: &[u8]) {
        match ClientUpdate::from_tagged(kind, payload) {
            Ok(update) => self.dispatch(id, update),
            Err(e) => warn!("Dropping undecodable frame from client {}: {}", id, e),
        }
    }
}
