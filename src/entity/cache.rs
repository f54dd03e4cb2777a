use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::entity::fsm::FsmSnapshot;
use crate::net::protocol::{EntityAnimation, EntityData, EntityUpdateData};
use crate::util::vec2::Vec2;

/// Identity of a networked entity. The same numeric id in two scenes names
/// two distinct entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub scene: String,
    pub entity_id: u16,
}

impl EntityKey {
    pub fn new(scene: impl Into<String>, entity_id: u16) -> Self {
        Self {
            scene: scene.into(),
            entity_id,
        }
    }
}

/// Accumulated replicated state of one entity, used to bootstrap late
/// joiners
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityState {
    pub spawned: bool,
    pub spawning_type: u8,
    pub spawned_type: u8,
    pub position: Option<Vec2>,
    pub scale: Option<bool>,
    pub animation: Option<EntityAnimation>,
    pub is_active: Option<bool>,
    pub generic_data: Vec<EntityData>,
    pub host_fsm_data: HashMap<u8, FsmSnapshot>,
}

impl EntityState {
    /// Record a spawn from the scene host
    pub fn mark_spawned(&mut self, spawning_type: u8, spawned_type: u8) {
        self.spawned = true;
        self.spawning_type = spawning_type;
        self.spawned_type = spawned_type;
    }

    /// Fold an update into the cached state.
    ///
    /// Pose fields are last-writer-wins. Rotation and collider data replace
    /// in place; other data kinds append. FSM snapshots merge per index.
    pub fn apply_update(&mut self, update: &EntityUpdateData) {
        if let Some(position) = update.position {
            self.position = Some(position);
        }
        if let Some(scale) = update.scale {
            self.scale = Some(scale);
        }
        if let Some(animation) = update.animation {
            self.animation = Some(animation);
        }
        if let Some(active) = update.is_active {
            self.is_active = Some(active);
        }
        for data in &update.data {
            self.apply_data(data);
        }
        for (fsm_index, snapshot) in &update.host_fsm {
            self.host_fsm_data
                .entry(*fsm_index)
                .or_default()
                .merge(snapshot);
        }
    }

    fn apply_data(&mut self, data: &EntityData) {
        if data.kind.replaces() {
            if let Some(existing) = self.generic_data.iter_mut().find(|d| d.kind == data.kind) {
                existing.payload = data.payload.clone();
                return;
            }
        }
        self.generic_data.push(data.clone());
    }

    /// Rebuild the update that replays exactly the cached sub-fields
    pub fn to_replay_update(&self, entity_id: u16) -> EntityUpdateData {
        EntityUpdateData {
            entity_id,
            position: self.position,
            scale: self.scale,
            animation: self.animation,
            is_active: self.is_active,
            data: self.generic_data.clone(),
            host_fsm: self
                .host_fsm_data
                .iter()
                .map(|(idx, snap)| (*idx, snap.clone()))
                .collect(),
        }
    }
}

/// Replicated entity state per (scene, entity id)
#[derive(Default)]
pub struct EntityCache {
    states: RwLock<HashMap<EntityKey, EntityState>>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-create the state for a key and mutate it under one lock
    pub fn update<R>(&self, key: EntityKey, f: impl FnOnce(&mut EntityState) -> R) -> R {
        let mut states = self.states.write();
        f(states.entry(key).or_default())
    }

    /// Read one entity's state
    pub fn get(&self, key: &EntityKey) -> Option<EntityState> {
        self.states.read().get(key).cloned()
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.states.read().contains_key(key)
    }

    /// Drop every entity belonging to a scene. Called once the scene's last
    /// occupant has had its record's scene cleared.
    pub fn purge_scene(&self, scene: &str) -> usize {
        let mut states = self.states.write();
        let before = states.len();
        states.retain(|key, _| key.scene != scene);
        before - states.len()
    }

    /// All entities of one scene, for late-joiner bootstrap
    pub fn snapshot_scene(&self, scene: &str) -> Vec<(EntityKey, EntityState)> {
        self.states
            .read()
            .iter()
            .filter(|(key, _)| key.scene == scene)
            .map(|(key, state)| (key.clone(), state.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }

    pub fn clear(&self) {
        self.states.write().clear();
    }
}
