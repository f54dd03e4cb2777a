//! Connect, hello, enter/leave-scene flows.

use tracing::{info, warn};

use crate::net::protocol::{EnterSceneData, EntitySpawnData, EntityUpdateData, HelloServerData};
use crate::server::events::PlayerConnectEvent;
use crate::server::manager::ServerManager;
use crate::session::record::LifecycleState;
use crate::util::vec2::Vec2;

impl ServerManager {
    /// First message after an accepted login: the record becomes visible,
    /// peers learn about it, and the player drops into its hello scene.
    pub fn on_hello(&self, id: u16, data: HelloServerData) {
        let Some(username) = self.table.with_record(id, |record| {
            record.state = LifecycleState::Greeted;
            record.position = data.position;
            record.scale = data.scale;
            record.animation_id = data.animation_id;
            record.username.clone()
        }) else {
            warn!("Hello from unknown client {}", id);
            return;
        };
        info!("Client {} ('{}') greeted, entering '{}'", id, username, data.scene);

        self.for_each_active(Some(id), |outbox| {
            outbox.add_player_connect_data(id, &username);
        });

        let others: Vec<(u16, String)> = self
            .table
            .snapshot()
            .into_iter()
            .filter(|r| r.id != id && r.is_active())
            .map(|r| (r.id, r.username))
            .collect();
        if let Some(outbox) = self.transport.outbox_for(id) {
            outbox.set_hello_client_data(others);
        }

        self.events
            .emit_connect(&PlayerConnectEvent { id, username });

        self.enter_scene_internal(id, &data.scene, data.position, data.scale, data.animation_id);
    }

    /// Scene transition requested by the client
    pub fn on_enter_scene(&self, id: u16, data: EnterSceneData) {
        self.enter_scene_internal(id, &data.scene, data.position, data.scale, data.animation_id);
    }

    /// The client left its scene without entering a new one
    pub fn on_leave_scene(&self, id: u16) {
        if !self.table.contains(id) {
            warn!("Leave-scene from unknown client {}", id);
            return;
        }
        self.leave_current_scene(id);
    }

    pub(crate) fn enter_scene_internal(
        &self,
        id: u16,
        scene: &str,
        position: Vec2,
        scale: bool,
        animation_id: u16,
    ) {
        if scene.is_empty() {
            warn!("Client {} tried to enter an unnamed scene", id);
            return;
        }

        // A transition out of a previous scene runs the full leave flow
        // before the new scene sees the player
        self.leave_current_scene(id);

        let Some(entry) = self.table.enter_scene(id, scene, position, scale, animation_id) else {
            warn!("Enter-scene from unknown client {}", id);
            return;
        };
        let Some(profile) = self.table.read(id, |r| r.profile()) else {
            return;
        };

        for peer in &entry.peers {
            if let Some(outbox) = self.transport.outbox_for(peer.id) {
                outbox.add_player_enter_scene_data(&profile);
            }
        }

        let mut entity_spawns: Vec<EntitySpawnData> = Vec::new();
        let mut entity_updates: Vec<EntityUpdateData> = Vec::new();
        for (key, state) in self.entities.snapshot_scene(scene) {
            if state.spawned {
                entity_spawns.push(EntitySpawnData {
                    entity_id: key.entity_id,
                    spawning_type: state.spawning_type,
                    spawned_type: state.spawned_type,
                });
            }
            entity_updates.push(state.to_replay_update(key.entity_id));
        }

        if let Some(outbox) = self.transport.outbox_for(id) {
            outbox.add_player_already_in_scene_data(
                &entry.peers,
                &entity_spawns,
                &entity_updates,
                entry.is_host,
            );
        }
        if entry.is_host {
            info!("Client {} is now hosting scene '{}'", id, scene);
        }
    }

    /// Leave side effects shared by transitions and explicit leaves: notify
    /// the old scene, hand off the host flag, purge the scene if emptied.
    pub(crate) fn leave_current_scene(&self, id: u16) {
        let Some(exit) = self.table.exit_scene(id) else {
            return;
        };
        for peer in &exit.peer_ids {
            if let Some(outbox) = self.transport.outbox_for(*peer) {
                outbox.add_player_leave_scene_data(id);
            }
        }
        self.after_scene_exit(&exit);
    }
}

#[cfg(test)]
mod tests {
    use crate::net::protocol::{
        EnterSceneData, EntitySpawnData, EntityUpdateData, PlayerSceneProfile,
    };
    use crate::net::transport::testing::Frame;
    use crate::server::manager::testing::harness;
    use crate::util::vec2::Vec2;

    fn alice_profile() -> PlayerSceneProfile {
        PlayerSceneProfile {
            id: 7,
            username: "Alice".to_string(),
            position: Vec2::new(1.0, 2.0),
            scale: true,
            team: 0,
            skin_id: 0,
            animation_id: 10,
        }
    }

    #[test]
    fn test_first_connect_becomes_scene_host() {
        let h = harness();
        let outbox = h.join(7, "Alice", "Town", Vec2::new(1.0, 2.0));

        let frames = outbox.frames();
        // Login response, settings, hello-client data, bootstrap
        assert!(frames.contains(&Frame::HelloClient(vec![])));
        assert!(frames.contains(&Frame::AlreadyInScene {
            peers: vec![],
            entity_spawns: vec![],
            entity_updates: vec![],
            scene_host: true,
        }));
        assert_eq!(h.manager.table.read(7, |r| r.is_scene_host), Some(true));
    }

    #[test]
    fn test_second_connect_same_scene() {
        let h = harness();
        let alice = h.join(7, "Alice", "Town", Vec2::new(1.0, 2.0));
        alice.take_frames();

        let bob = h.join(8, "Bob", "Town", Vec2::new(3.0, 4.0));

        // Bob sees Alice in the already-in-scene list and is not host
        let bob_frames = bob.frames();
        assert!(bob_frames.contains(&Frame::HelloClient(vec![(7, "Alice".to_string())])));
        assert!(bob_frames.contains(&Frame::AlreadyInScene {
            peers: vec![alice_profile()],
            entity_spawns: vec![],
            entity_updates: vec![],
            scene_host: false,
        }));

        // Alice gets connect then enter-scene, in that order
        let alice_frames = alice.frames();
        assert_eq!(
            alice_frames[0],
            Frame::PlayerConnect {
                id: 8,
                username: "Bob".to_string(),
            }
        );
        assert!(matches!(&alice_frames[1], Frame::PlayerEnterScene(p) if p.id == 8));
    }

    #[test]
    fn test_hello_in_different_scenes_does_not_leak() {
        let h = harness();
        let alice = h.join(7, "Alice", "Town", Vec2::ZERO);
        alice.take_frames();

        let bob = h.join(8, "Bob", "Forest", Vec2::ZERO);

        // Alice learns of the connect but no scene entry
        assert_eq!(
            alice.frames(),
            vec![Frame::PlayerConnect {
                id: 8,
                username: "Bob".to_string(),
            }]
        );
        // Both are hosts of their own scenes
        assert_eq!(h.manager.table.read(7, |r| r.is_scene_host), Some(true));
        assert_eq!(h.manager.table.read(8, |r| r.is_scene_host), Some(true));
        assert!(bob
            .frames()
            .contains(&Frame::AlreadyInScene {
                peers: vec![],
                entity_spawns: vec![],
                entity_updates: vec![],
                scene_host: true,
            }));
    }

    #[test]
    fn test_host_handoff_on_disconnect() {
        let h = harness();
        h.join(7, "Alice", "Town", Vec2::ZERO);
        let bob = h.join(8, "Bob", "Town", Vec2::ZERO);
        bob.take_frames();

        h.manager.on_client_disconnect(7);

        let frames = bob.frames();
        assert!(frames.contains(&Frame::SceneHostTransfer));
        assert!(frames.contains(&Frame::PlayerDisconnect {
            id: 7,
            username: "Alice".to_string(),
            timed_out: false,
        }));
        // No leave-scene frame on the disconnect path
        assert!(!frames.contains(&Frame::PlayerLeaveScene { id: 7 }));
        assert_eq!(h.manager.table.read(8, |r| r.is_scene_host), Some(true));
    }

    #[test]
    fn test_scene_transition_notifies_both_scenes() {
        let h = harness();
        let alice = h.join(7, "Alice", "Town", Vec2::ZERO);
        let cara = h.join(9, "Cara", "Forest", Vec2::ZERO);
        let bob = h.join(8, "Bob", "Town", Vec2::ZERO);
        alice.take_frames();
        cara.take_frames();
        bob.take_frames();

        h.manager.on_enter_scene(
            8,
            EnterSceneData {
                scene: "Forest".to_string(),
                position: Vec2::new(5.0, 0.0),
                scale: false,
                animation_id: 2,
            },
        );

        assert_eq!(alice.frames(), vec![Frame::PlayerLeaveScene { id: 8 }]);
        assert!(matches!(&cara.frames()[..], [Frame::PlayerEnterScene(p)] if p.id == 8));
        assert_eq!(
            h.manager.table.read(8, |r| r.current_scene.clone()),
            Some("Forest".to_string())
        );
    }

    #[test]
    fn test_transition_host_handoff_and_purge() {
        let h = harness();
        // Alice hosts Town and spawns an entity there, then Bob joins
        h.join(7, "Alice", "Town", Vec2::ZERO);
        h.manager.on_entity_spawn(
            7,
            EntitySpawnData {
                entity_id: 42,
                spawning_type: 1,
                spawned_type: 2,
            },
        );
        let bob = h.join(8, "Bob", "Town", Vec2::ZERO);
        bob.take_frames();

        // Alice disconnects: Bob inherits the host flag, the entity stays
        h.manager.on_client_disconnect(7);
        assert_eq!(h.manager.table.read(8, |r| r.is_scene_host), Some(true));
        assert_eq!(h.manager.entities.len(), 1);

        // Bob leaves too: Town empties and the entity is purged
        h.manager.on_enter_scene(
            8,
            EnterSceneData {
                scene: "Forest".to_string(),
                position: Vec2::ZERO,
                scale: false,
                animation_id: 0,
            },
        );

        assert!(h.manager.entities.is_empty());
        assert_eq!(h.manager.table.read(8, |r| r.is_scene_host), Some(true));
    }

    #[test]
    fn test_entity_replay_for_late_joiner() {
        let h = harness();
        h.join(7, "Alice", "Town", Vec2::ZERO);
        h.manager.on_entity_spawn(
            7,
            EntitySpawnData {
                entity_id: 42,
                spawning_type: 1,
                spawned_type: 2,
            },
        );
        h.manager.on_entity_update(
            7,
            EntityUpdateData {
                entity_id: 42,
                position: Some(Vec2::new(5.0, 5.0)),
                ..Default::default()
            },
        );

        let bob = h.join(8, "Bob", "Town", Vec2::ZERO);

        let expected_update = EntityUpdateData {
            entity_id: 42,
            position: Some(Vec2::new(5.0, 5.0)),
            ..Default::default()
        };
        let found = bob.frames().into_iter().find_map(|frame| match frame {
            Frame::AlreadyInScene {
                entity_spawns,
                entity_updates,
                scene_host,
                ..
            } => Some((entity_spawns, entity_updates, scene_host)),
            _ => None,
        });
        let (spawns, updates, scene_host) = found.expect("bootstrap frame missing");
        assert_eq!(
            spawns,
            vec![EntitySpawnData {
                entity_id: 42,
                spawning_type: 1,
                spawned_type: 2,
            }]
        );
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].entity_id, expected_update.entity_id);
        assert_eq!(updates[0].position, expected_update.position);
        assert!(updates[0].scale.is_none());
        assert!(!scene_host);
    }

    #[test]
    fn test_leave_scene_without_destination() {
        let h = harness();
        let alice = h.join(7, "Alice", "Town", Vec2::ZERO);
        h.join(8, "Bob", "Town", Vec2::ZERO);
        alice.take_frames();

        h.manager.on_leave_scene(8);

        assert_eq!(alice.frames(), vec![Frame::PlayerLeaveScene { id: 8 }]);
        assert_eq!(
            h.manager.table.read(8, |r| r.current_scene.clone()),
            Some(String::new())
        );
        // Bob is still connected and active
        assert_eq!(h.manager.player_count(), 2);
    }
}
