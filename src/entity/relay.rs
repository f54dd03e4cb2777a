//! Applies and forwards entity spawn and update streams.
//!
//! Spawns are accepted only from the scene host. Updates are accepted from
//! any occupant of the entity's scene to tolerate frames still in flight
//! during a host hand-off.

use tracing::{debug, warn};

use crate::entity::cache::{EntityCache, EntityKey};
use crate::net::protocol::{EntitySpawnData, EntityUpdateData};
use crate::net::transport::Transport;
use crate::session::table::SessionTable;

pub(crate) fn handle_entity_spawn(
    table: &SessionTable,
    cache: &EntityCache,
    transport: &dyn Transport,
    sender: u16,
    data: EntitySpawnData,
) {
    let Some((scene, is_host)) = table.read(sender, |r| (r.current_scene.clone(), r.is_scene_host))
    else {
        warn!("Entity spawn from unknown client {}", sender);
        return;
    };
    if scene.is_empty() || !is_host {
        warn!(
            "Entity spawn for {} from client {} which is not a scene host",
            data.entity_id, sender
        );
        return;
    }

    cache.update(EntityKey::new(&scene, data.entity_id), |state| {
        state.mark_spawned(data.spawning_type, data.spawned_type);
    });

    for peer in table.ids_in_scene(&scene, sender) {
        if let Some(outbox) = transport.outbox_for(peer) {
            outbox.set_entity_spawn(data.entity_id, data.spawning_type, data.spawned_type);
        }
    }
}

pub(crate) fn handle_entity_update(
    table: &SessionTable,
    cache: &EntityCache,
    transport: &dyn Transport,
    sender: u16,
    data: EntityUpdateData,
) {
    let Some(scene) = table.read(sender, |r| r.current_scene.clone()) else {
        warn!("Entity update from unknown client {}", sender);
        return;
    };
    if scene.is_empty() {
        debug!("Entity update from client {} outside any scene", sender);
        return;
    }

    cache.update(EntityKey::new(&scene, data.entity_id), |state| {
        state.apply_update(&data);
    });

    for peer in table.ids_in_scene(&scene, sender) {
        let Some(outbox) = transport.outbox_for(peer) else {
            continue;
        };
        if let Some(position) = data.position {
            outbox.update_entity_position(data.entity_id, position);
        }
        if let Some(scale) = data.scale {
            outbox.update_entity_scale(data.entity_id, scale);
        }
        if let Some(animation) = data.animation {
            outbox.update_entity_animation(data.entity_id, animation.id, animation.wrap_mode);
        }
        if let Some(active) = data.is_active {
            outbox.update_entity_is_active(data.entity_id, active);
        }
        if !data.data.is_empty() {
            outbox.add_entity_data(data.entity_id, &data.data);
        }
        for (fsm_index, snapshot) in &data.host_fsm {
            outbox.add_entity_host_fsm_data(data.entity_id, *fsm_index, snapshot);
        }
    }
}
