//! Per-field player update handlers and the entity relay entry points.

use tracing::warn;

use crate::entity::relay;
use crate::net::protocol::{canonical_clip, EntitySpawnData, EntityUpdateData, PlayerUpdateData};
use crate::server::manager::ServerManager;

impl ServerManager {
    /// Pose and map-marker changes; each present sub-field updates the
    /// record and fans out to the matching audience
    pub fn on_player_update(&self, id: u16, data: PlayerUpdateData) {
        let Some((scene, has_map_icon)) = self.table.with_record(id, |record| {
            if let Some(position) = data.position {
                record.position = position;
            }
            if let Some(scale) = data.scale {
                record.scale = scale;
            }
            if let Some(map_position) = data.map_position {
                record.map_position = Some(map_position);
            }
            if let Some(clip) = canonical_clip(&data.animation) {
                record.animation_id = clip;
            }
            (record.current_scene.clone(), record.has_map_icon)
        }) else {
            warn!("Player update from unknown client {}", id);
            return;
        };

        if let Some(position) = data.position {
            self.for_each_in_scene(&scene, id, |outbox| {
                outbox.update_player_position(id, position);
            });
        }
        if let Some(scale) = data.scale {
            self.for_each_in_scene(&scene, id, |outbox| {
                outbox.update_player_scale(id, scale);
            });
        }
        if !data.animation.is_empty() {
            self.for_each_in_scene(&scene, id, |outbox| {
                for frame in &data.animation {
                    outbox.update_player_animation(id, frame.clip_id, frame.frame, &frame.effect_info);
                }
            });
        }
        if let Some(map_position) = data.map_position {
            // Map markers cross scene boundaries: the fan-out is global,
            // gated on the settings and the sender's icon
            if self.settings().map_broadcast_enabled() && has_map_icon {
                self.for_each_active(Some(id), |outbox| {
                    outbox.update_player_map_position(id, map_position);
                });
            }
        }
    }

    /// Map icon toggled; when it turns on, replay the cached position
    pub fn on_player_map_update(&self, id: u16, has_icon: bool) {
        let Some(map_position) = self.table.with_record(id, |record| {
            record.has_map_icon = has_icon;
            record.map_position
        }) else {
            warn!("Map update from unknown client {}", id);
            return;
        };

        self.for_each_active(Some(id), |outbox| {
            outbox.update_player_map_icon(id, has_icon);
        });
        if has_icon {
            if let Some(position) = map_position {
                self.for_each_active(Some(id), |outbox| {
                    outbox.update_player_map_position(id, position);
                });
            }
        }
    }

    /// Death is visible to the in-scene audience only
    pub fn on_player_death(&self, id: u16) {
        let Some(scene) = self.table.read(id, |r| r.current_scene.clone()) else {
            warn!("Death from unknown client {}", id);
            return;
        };
        self.for_each_in_scene(&scene, id, |outbox| {
            outbox.add_player_death_data(id);
        });
    }

    /// Team identity shows on the world map, so the fan-out is global
    pub fn on_player_team_update(&self, id: u16, team: u8) {
        if self.table.with_record(id, |record| record.team = team).is_none() {
            warn!("Team update from unknown client {}", id);
            return;
        }
        self.for_each_active(Some(id), |outbox| {
            outbox.add_player_team_update_data(id, team);
        });
    }

    /// Skins are an in-scene concern; unchanged skins are not re-broadcast
    pub fn on_player_skin_update(&self, id: u16, skin_id: u8) {
        let Some((scene, changed)) = self.table.with_record(id, |record| {
            let changed = record.skin_id != skin_id;
            record.skin_id = skin_id;
            (record.current_scene.clone(), changed)
        }) else {
            warn!("Skin update from unknown client {}", id);
            return;
        };
        if !changed {
            return;
        }
        self.for_each_in_scene(&scene, id, |outbox| {
            outbox.add_player_skin_update_data(id, skin_id);
        });
    }

    pub fn on_chat_message(&self, id: u16, message: &str) {
        self.chat.route(
            &self.table,
            self.transport.as_ref(),
            self.access.as_ref(),
            &self.events,
            id,
            message,
        );
    }

    pub fn on_entity_spawn(&self, id: u16, data: EntitySpawnData) {
        relay::handle_entity_spawn(&self.table, &self.entities, self.transport.as_ref(), id, data);
    }

    pub fn on_entity_update(&self, id: u16, data: EntityUpdateData) {
        relay::handle_entity_update(&self.table, &self.entities, self.transport.as_ref(), id, data);
    }
}
