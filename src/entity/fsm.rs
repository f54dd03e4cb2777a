use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::util::vec2::{Vec2, Vec3};

/// Replicated snapshot of one state machine on a scene-host entity.
///
/// Keys are FSM variable indices. Snapshots accumulate: merging takes the
/// union of keys, and each key keeps the most recently received value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FsmSnapshot {
    pub current_state: Option<String>,
    pub floats: HashMap<u8, f32>,
    pub ints: HashMap<u8, i32>,
    pub bools: HashMap<u8, bool>,
    pub strings: HashMap<u8, String>,
    pub vec2s: HashMap<u8, Vec2>,
    pub vec3s: HashMap<u8, Vec3>,
}

impl FsmSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a later snapshot into this one; later values win per key
    pub fn merge(&mut self, incoming: &FsmSnapshot) {
        if let Some(state) = &incoming.current_state {
            self.current_state = Some(state.clone());
        }
        self.floats.extend(incoming.floats.iter().map(|(k, v)| (*k, *v)));
        self.ints.extend(incoming.ints.iter().map(|(k, v)| (*k, *v)));
        self.bools.extend(incoming.bools.iter().map(|(k, v)| (*k, *v)));
        self.strings
            .extend(incoming.strings.iter().map(|(k, v)| (*k, v.clone())));
        self.vec2s.extend(incoming.vec2s.iter().map(|(k, v)| (*k, *v)));
        self.vec3s.extend(incoming.vec3s.iter().map(|(k, v)| (*k, *v)));
    }

    /// True when nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.current_state.is_none()
            && self.floats.is_empty()
            && self.ints.is_empty()
            && self.bools.is_empty()
            && self.strings.is_empty()
            && self.vec2s.is_empty()
            && self.vec3s.is_empty()
    }
}
