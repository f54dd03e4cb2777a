use std::sync::Arc;

use crate::config::ServerSettings;
use crate::net::transport::DisconnectReason;
use crate::server::events::{
    PlayerChatEvent, PlayerConnectEvent, PlayerDisconnectEvent, SubscriberHandle,
};
use crate::server::manager::{ServerError, ServerManager};

/// Narrow view of the manager handed to the addon system.
///
/// Addons hold only this facade, never the manager itself, which keeps the
/// manager ↔ addon dependency one-directional.
#[derive(Clone)]
pub struct ServerApi {
    manager: Arc<ServerManager>,
}

impl ServerApi {
    pub fn new(manager: Arc<ServerManager>) -> Self {
        Self { manager }
    }

    pub fn player_count(&self) -> usize {
        self.manager.player_count()
    }

    pub fn broadcast_message(&self, message: &str) -> Result<(), ServerError> {
        self.manager.broadcast_message(message)
    }

    pub fn disconnect_player(&self, id: u16, reason: DisconnectReason) -> Result<(), ServerError> {
        self.manager.disconnect_player(id, reason)
    }

    pub fn settings(&self) -> ServerSettings {
        self.manager.settings()
    }

    pub fn apply_server_settings(&self, settings: ServerSettings) {
        self.manager.apply_server_settings(settings);
    }

    pub fn subscribe_connect(
        &self,
        callback: impl Fn(&PlayerConnectEvent) + Send + Sync + 'static,
    ) -> SubscriberHandle {
        self.manager.events().subscribe_connect(callback)
    }

    pub fn subscribe_disconnect(
        &self,
        callback: impl Fn(&PlayerDisconnectEvent) + Send + Sync + 'static,
    ) -> SubscriberHandle {
        self.manager.events().subscribe_disconnect(callback)
    }

    pub fn subscribe_chat(
        &self,
        callback: impl Fn(&mut PlayerChatEvent) + Send + Sync + 'static,
    ) -> SubscriberHandle {
        self.manager.events().subscribe_chat(callback)
    }

    pub fn unsubscribe(&self, handle: SubscriberHandle) {
        self.manager.events().unsubscribe(handle)
    }
}
