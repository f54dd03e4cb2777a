use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::access::AccessLists;
use crate::addon::AddonRegistry;
use crate::config::ServerSettings;
use crate::entity::cache::EntityCache;
use crate::net::transport::{
    DisconnectReason, LoginRequest, LoginResponse, Outbox, Transport,
};
use crate::server::chat::{send_chat_lines, ChatRouter, CommandBus, MAX_MESSAGE_LENGTH};
use crate::server::events::{PlayerDisconnectEvent, ServerEvents};
use crate::session::admission::AdmissionController;
use crate::session::table::{SceneExit, SessionTable};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("no client with id {0}")]
    UnknownClient(u16),
    #[error("message is empty")]
    EmptyMessage,
    #[error("message exceeds {MAX_MESSAGE_LENGTH} characters")]
    MessageTooLong,
}

/// The relay core: session lifecycle, admission, scene-filtered fan-out,
/// and host election, driven by the transport's worker threads.
///
/// Every entry point takes `&self`; shared stores carry their own locks.
pub struct ServerManager {
    pub(crate) table: SessionTable,
    pub(crate) entities: EntityCache,
    pub(crate) admission: AdmissionController,
    pub(crate) chat: ChatRouter,
    pub(crate) events: ServerEvents,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) access: Arc<dyn AccessLists>,
    settings: RwLock<ServerSettings>,
}

impl ServerManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        access: Arc<dyn AccessLists>,
        addons: Arc<dyn AddonRegistry>,
        commands: Arc<dyn CommandBus>,
        settings: ServerSettings,
    ) -> Self {
        Self {
            table: SessionTable::new(),
            entities: EntityCache::new(),
            admission: AdmissionController::new(access.clone(), addons),
            chat: ChatRouter::new(commands),
            events: ServerEvents::new(),
            transport,
            access,
            settings: RwLock::new(settings),
        }
    }

    pub fn events(&self) -> &ServerEvents {
        &self.events
    }

    /// Active player count (Reserved records excluded)
    pub fn player_count(&self) -> usize {
        self.table.active_ids(None).len()
    }

    pub fn settings(&self) -> ServerSettings {
        self.settings.read().clone()
    }

    /// Evaluate a login; the return value tells the transport whether to
    /// keep the connection
    pub fn on_login_request(
        &self,
        id: u16,
        remote_address: &str,
        request: &LoginRequest,
        outbox: &dyn Outbox,
    ) -> bool {
        let response = self
            .admission
            .evaluate(&self.table, id, remote_address, request);
        let rejection = rejection_reason(&response);
        let accepted = rejection.is_none();

        outbox.set_login_response(response);
        match rejection {
            Some(reason) => outbox.set_disconnect(reason),
            None => outbox.update_server_settings(&self.settings.read()),
        }
        accepted
    }

    /// The transport closed the connection
    pub fn on_client_disconnect(&self, id: u16) {
        self.handle_disconnect(id, false);
    }

    /// The transport timed the client out; it has already closed the
    /// connection itself
    pub fn on_client_timeout(&self, id: u16) {
        self.handle_disconnect(id, true);
    }

    pub(crate) fn handle_disconnect(&self, id: u16, timed_out: bool) {
        let Some((username, active)) = self.table.read(id, |r| (r.username.clone(), r.is_active()))
        else {
            // Already removed; disconnect and timeout can race
            debug!("Disconnect for unknown client {}", id);
            return;
        };

        if let Some(exit) = self.table.exit_scene(id) {
            // Scene peers learn about the departure through the global
            // disconnect frame below
            self.after_scene_exit(&exit);
        }

        if active {
            self.for_each_active(Some(id), |outbox| {
                outbox.add_player_disconnect_data(id, &username, timed_out);
            });
        }

        self.table.remove(id);
        info!("Client {} ('{}') disconnected", id, username);
        self.events.emit_disconnect(&PlayerDisconnectEvent {
            id,
            username,
            timed_out,
        });
    }

    /// Host transfer and empty-scene purge shared by every exit path.
    /// The exit has already cleared the leaver's scene, so the purge can
    /// never race an insertion attributed to it.
    pub(crate) fn after_scene_exit(&self, exit: &SceneExit) {
        if let Some(successor) = exit.successor {
            if let Some(outbox) = self.transport.outbox_for(successor) {
                outbox.set_scene_host_transfer();
            }
            info!("Scene host of '{}' transferred to client {}", exit.scene, successor);
        }
        if exit.scene_empty {
            let purged = self.entities.purge_scene(&exit.scene);
            if purged > 0 {
                debug!("Purged {} entities of emptied scene '{}'", purged, exit.scene);
            }
        }
    }

    /// Shutdown: tell every client, then drop all state
    pub fn on_shutdown(&self) {
        info!("Shutting down; notifying {} clients", self.table.len());
        self.transport
            .for_each_outbox(&mut |outbox| outbox.set_disconnect(DisconnectReason::Shutdown));
        self.table.clear();
        self.entities.clear();
    }

    /// Push new settings to every client; a value-equal struct is a no-op
    pub fn apply_server_settings(&self, new: ServerSettings) {
        {
            let current = self.settings.read();
            if *current == new {
                return;
            }
        }
        *self.settings.write() = new.clone();
        self.transport
            .for_each_outbox(&mut |outbox| outbox.update_server_settings(&new));
    }

    /// Server-initiated disconnect of one client
    pub fn disconnect_player(&self, id: u16, reason: DisconnectReason) -> Result<(), ServerError> {
        if !self.table.contains(id) {
            return Err(ServerError::UnknownClient(id));
        }
        if let Some(outbox) = self.transport.outbox_for(id) {
            outbox.set_disconnect(reason);
        }
        self.handle_disconnect(id, false);
        Ok(())
    }

    /// Server-originated chat to every active client
    pub fn broadcast_message(&self, message: &str) -> Result<(), ServerError> {
        if message.is_empty() {
            return Err(ServerError::EmptyMessage);
        }
        if message.len() > MAX_MESSAGE_LENGTH {
            return Err(ServerError::MessageTooLong);
        }
        self.for_each_active(None, |outbox| send_chat_lines(outbox, message));
        Ok(())
    }

    /// Offer an outbox call to every occupant of a scene except one
    pub(crate) fn for_each_in_scene(&self, scene: &str, excluding: u16, f: impl Fn(&dyn Outbox)) {
        for id in self.table.ids_in_scene(scene, excluding) {
            if let Some(outbox) = self.transport.outbox_for(id) {
                f(outbox.as_ref());
            }
        }
    }

    /// Offer an outbox call to every active record, optionally skipping one
    pub(crate) fn for_each_active(&self, excluding: Option<u16>, f: impl Fn(&dyn Outbox)) {
        for id in self.table.active_ids(excluding) {
            if let Some(outbox) = self.transport.outbox_for(id) {
                f(outbox.as_ref());
            }
        }
    }
}

fn rejection_reason(response: &LoginResponse) -> Option<DisconnectReason> {
    match response {
        LoginResponse::Success { .. } => None,
        LoginResponse::InvalidAddons { .. } => Some(DisconnectReason::InvalidAddons),
        LoginResponse::NotWhiteListed => Some(DisconnectReason::NotWhiteListed),
        LoginResponse::Banned => Some(DisconnectReason::Banned),
        LoginResponse::InvalidUsername => Some(DisconnectReason::InvalidUsername),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::harness;
    use super::*;
    use crate::net::transport::testing::Frame;
    use crate::util::vec2::Vec2;

    #[test]
    fn test_login_reject_sets_response_and_disconnect() {
        let h = harness();
        h.access.ban_key("bad-key");
        let outbox = h.transport.connect(7);

        let accepted = h.manager.on_login_request(
            7,
            "10.0.0.7:555",
            &LoginRequest {
                username: "Mallory".to_string(),
                auth_key: "bad-key".to_string(),
                addons: Vec::new(),
            },
            outbox.as_ref(),
        );

        assert!(!accepted);
        assert_eq!(
            outbox.frames(),
            vec![
                Frame::LoginResponse(LoginResponse::Banned),
                Frame::Disconnect(DisconnectReason::Banned),
            ]
        );
        assert!(h.manager.table.is_empty());
    }

    #[test]
    fn test_login_accept_pushes_settings() {
        let h = harness();
        let outbox = h.transport.connect(7);

        let accepted = h.manager.on_login_request(
            7,
            "10.0.0.7:555",
            &LoginRequest {
                username: "Alice".to_string(),
                auth_key: "key-7".to_string(),
                addons: Vec::new(),
            },
            outbox.as_ref(),
        );

        assert!(accepted);
        assert_eq!(
            outbox.frames(),
            vec![
                Frame::LoginResponse(LoginResponse::Success { addon_order: vec![] }),
                Frame::Settings(ServerSettings::default()),
            ]
        );
        // Reserved until the hello arrives
        assert_eq!(h.manager.player_count(), 0);
        assert!(h.manager.table.contains(7));
    }

    #[test]
    fn test_disconnect_broadcasts_then_removes() {
        let h = harness();
        h.join(7, "Alice", "Town", Vec2::new(1.0, 2.0));
        h.join(8, "Bob", "Forest", Vec2::ZERO);
        h.transport.take_frames(8);

        h.manager.on_client_disconnect(7);

        assert!(!h.manager.table.contains(7));
        assert_eq!(
            h.transport.frames(8),
            vec![Frame::PlayerDisconnect {
                id: 7,
                username: "Alice".to_string(),
                timed_out: false,
            }]
        );
    }

    #[test]
    fn test_timeout_marks_frame() {
        let h = harness();
        h.join(7, "Alice", "Town", Vec2::ZERO);
        h.join(8, "Bob", "Town", Vec2::ZERO);
        h.transport.take_frames(8);

        h.manager.on_client_timeout(7);

        let frames = h.transport.frames(8);
        assert!(frames.contains(&Frame::PlayerDisconnect {
            id: 7,
            username: "Alice".to_string(),
            timed_out: true,
        }));
    }

    #[test]
    fn test_disconnect_twice_is_noop() {
        let h = harness();
        h.join(7, "Alice", "Town", Vec2::ZERO);
        h.join(8, "Bob", "Town", Vec2::ZERO);

        h.manager.on_client_disconnect(7);
        h.transport.take_frames(8);
        h.manager.on_client_disconnect(7);

        assert!(h.transport.frames(8).is_empty());
    }

    #[test]
    fn test_disconnect_of_reserved_record_is_silent() {
        let h = harness();
        let outbox = h.transport.connect(7);
        h.manager.on_login_request(
            7,
            "addr",
            &LoginRequest {
                username: "Alice".to_string(),
                auth_key: "key".to_string(),
                addons: Vec::new(),
            },
            outbox.as_ref(),
        );
        h.join(8, "Bob", "Town", Vec2::ZERO);
        h.transport.take_frames(8);

        h.manager.on_client_disconnect(7);

        assert!(!h.manager.table.contains(7));
        assert!(h.transport.frames(8).is_empty());
    }

    #[test]
    fn test_disconnect_player_requires_known_id() {
        let h = harness();
        let result = h.manager.disconnect_player(99, DisconnectReason::Kicked);
        assert!(matches!(result, Err(ServerError::UnknownClient(99))));
    }

    #[test]
    fn test_disconnect_player_kick() {
        let h = harness();
        let outbox = h.join(7, "Alice", "Town", Vec2::ZERO);
        outbox.take_frames();

        h.manager
            .disconnect_player(7, DisconnectReason::Kicked)
            .unwrap();

        assert_eq!(
            outbox.frames(),
            vec![Frame::Disconnect(DisconnectReason::Kicked)]
        );
        assert!(!h.manager.table.contains(7));
    }

    #[test]
    fn test_broadcast_message_validation() {
        let h = harness();
        assert!(matches!(
            h.manager.broadcast_message(""),
            Err(ServerError::EmptyMessage)
        ));
        assert!(matches!(
            h.manager.broadcast_message(&"x".repeat(MAX_MESSAGE_LENGTH + 1)),
            Err(ServerError::MessageTooLong)
        ));
    }

    #[test]
    fn test_broadcast_message_splits_lines() {
        let h = harness();
        let outbox = h.join(7, "Alice", "Town", Vec2::ZERO);
        outbox.take_frames();

        h.manager.broadcast_message("restart soon\nsave your game").unwrap();

        assert_eq!(
            outbox.frames(),
            vec![
                Frame::Chat("restart soon".to_string()),
                Frame::Chat("save your game".to_string()),
            ]
        );
    }

    #[test]
    fn test_apply_equal_settings_is_noop() {
        let h = harness();
        let outbox = h.join(7, "Alice", "Town", Vec2::ZERO);
        outbox.take_frames();

        h.manager.apply_server_settings(ServerSettings::default());

        assert!(outbox.frames().is_empty());
    }

    #[test]
    fn test_apply_changed_settings_fans_out() {
        let h = harness();
        let outbox = h.join(7, "Alice", "Town", Vec2::ZERO);
        outbox.take_frames();

        let new = ServerSettings {
            always_show_map_icons: true,
            ..Default::default()
        };
        h.manager.apply_server_settings(new.clone());

        assert_eq!(outbox.frames(), vec![Frame::Settings(new.clone())]);
        assert_eq!(h.manager.settings(), new);
    }

    #[test]
    fn test_shutdown_notifies_and_clears() {
        let h = harness();
        let alice = h.join(7, "Alice", "Town", Vec2::ZERO);
        alice.take_frames();

        h.manager.on_shutdown();

        assert_eq!(
            alice.frames(),
            vec![Frame::Disconnect(DisconnectReason::Shutdown)]
        );
        assert!(h.manager.table.is_empty());
        assert!(h.manager.entities.is_empty());
    }
}
