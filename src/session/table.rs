use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::net::protocol::PlayerSceneProfile;
use crate::session::host::SceneHostElector;
use crate::session::record::{LifecycleState, PlayerRecord};
use crate::util::vec2::Vec2;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("client id {0} already has a record")]
    IdInUse(u16),
}

/// Result of an atomic scene entry
#[derive(Debug)]
pub struct SceneEntry {
    /// Profiles of the players already occupying the scene
    pub peers: Vec<PlayerSceneProfile>,
    /// True when the entrant was granted the scene-host flag
    pub is_host: bool,
}

/// Result of an atomic scene exit
#[derive(Debug)]
pub struct SceneExit {
    /// The scene that was left
    pub scene: String,
    /// Occupants remaining in the scene
    pub peer_ids: Vec<u16>,
    /// Peer that inherited the scene-host flag, when the leaver held it
    pub successor: Option<u16>,
    /// True when the scene has no occupants left
    pub scene_empty: bool,
}

/// Concurrent client id → record mapping.
///
/// Scene membership queries are a lazy filter over the same map, so they
/// can never disagree with the records. Scene transitions and host
/// election run under a single write lock.
#[derive(Default)]
pub struct SessionTable {
    records: RwLock<HashMap<u16, PlayerRecord>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record; fails when the id already has one
    pub fn insert(&self, record: PlayerRecord) -> Result<(), SessionError> {
        let mut records = self.records.write();
        if records.contains_key(&record.id) {
            return Err(SessionError::IdInUse(record.id));
        }
        records.insert(record.id, record);
        Ok(())
    }

    pub fn remove(&self, id: u16) -> Option<PlayerRecord> {
        self.records.write().remove(&id)
    }

    pub fn contains(&self, id: u16) -> bool {
        self.records.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }

    pub fn ids(&self) -> Vec<u16> {
        self.records.read().keys().copied().collect()
    }

    /// Read one record under the shared lock
    pub fn read<R>(&self, id: u16, f: impl FnOnce(&PlayerRecord) -> R) -> Option<R> {
        self.records.read().get(&id).map(f)
    }

    /// Mutate one record under the exclusive lock
    pub fn with_record<R>(&self, id: u16, f: impl FnOnce(&mut PlayerRecord) -> R) -> Option<R> {
        self.records.write().get_mut(&id).map(f)
    }

    /// Consistent cloned view of every record
    pub fn snapshot(&self) -> Vec<PlayerRecord> {
        self.records.read().values().cloned().collect()
    }

    /// Case-insensitive username scan over every record, Reserved included
    pub fn username_taken(&self, username: &str) -> bool {
        let records = self.records.read();
        records
            .values()
            .any(|r| r.username.eq_ignore_ascii_case(username))
    }

    /// Ids of active records, optionally excluding one
    pub fn active_ids(&self, excluding: Option<u16>) -> Vec<u16> {
        self.records
            .read()
            .values()
            .filter(|r| r.is_active() && Some(r.id) != excluding)
            .map(|r| r.id)
            .collect()
    }

    /// Profiles of the occupants of a scene, excluding one id
    pub fn peers_in_scene(&self, scene: &str, excluding: u16) -> Vec<PlayerSceneProfile> {
        if scene.is_empty() {
            return Vec::new();
        }
        self.records
            .read()
            .values()
            .filter(|r| r.id != excluding && r.is_in_scene(scene))
            .map(|r| r.profile())
            .collect()
    }

    /// Ids of the occupants of a scene, excluding one id
    pub fn ids_in_scene(&self, scene: &str, excluding: u16) -> Vec<u16> {
        if scene.is_empty() {
            return Vec::new();
        }
        self.records
            .read()
            .values()
            .filter(|r| r.id != excluding && r.is_in_scene(scene))
            .map(|r| r.id)
            .collect()
    }

    pub fn is_scene_empty(&self, scene: &str) -> bool {
        scene.is_empty()
            || !self
                .records
                .read()
                .values()
                .any(|r| r.is_in_scene(scene))
    }

    /// Move a record into a scene, collect its peers, and grant the
    /// scene-host flag when it arrives alone. One write lock end to end.
    pub fn enter_scene(
        &self,
        id: u16,
        scene: &str,
        position: Vec2,
        scale: bool,
        animation_id: u16,
    ) -> Option<SceneEntry> {
        let mut records = self.records.write();

        let peers: Vec<PlayerSceneProfile> = records
            .values()
            .filter(|r| r.id != id && r.is_in_scene(scene))
            .map(|r| r.profile())
            .collect();
        let is_host = SceneHostElector::entrant_becomes_host(&records, scene, id);

        let record = records.get_mut(&id)?;
        record.current_scene = scene.to_string();
        record.state = LifecycleState::InScene;
        record.position = position;
        record.scale = scale;
        record.animation_id = animation_id;
        record.is_scene_host = is_host;

        Some(SceneEntry { peers, is_host })
    }

    /// Take a record out of its scene and hand the scene-host flag to the
    /// first remaining occupant. One write lock end to end, so no observer
    /// sees an occupied scene without a host.
    pub fn exit_scene(&self, id: u16) -> Option<SceneExit> {
        let mut records = self.records.write();

        let record = records.get_mut(&id)?;
        if record.state != LifecycleState::InScene {
            return None;
        }
        let scene = std::mem::take(&mut record.current_scene);
        let was_host = std::mem::replace(&mut record.is_scene_host, false);
        record.state = LifecycleState::Greeted;

        let peer_ids: Vec<u16> = records
            .values()
            .filter(|r| r.id != id && r.is_in_scene(&scene))
            .map(|r| r.id)
            .collect();

        let successor = if was_host {
            let successor = SceneHostElector::pick_successor(&records, &scene, id);
            if let Some(successor_id) = successor {
                if let Some(r) = records.get_mut(&successor_id) {
                    r.is_scene_host = true;
                }
            }
            successor
        } else {
            None
        };

        let scene_empty = peer_ids.is_empty();
        Some(SceneExit {
            scene,
            peer_ids,
            successor,
            scene_empty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_record(id: u16, username: &str) -> PlayerRecord {
        let mut record = PlayerRecord::new(id, "addr", username, "key");
        record.state = LifecycleState::Greeted;
        record
    }

    fn table_with(records: Vec<PlayerRecord>) -> SessionTable {
        let table = SessionTable::new();
        for record in records {
            table.insert(record).unwrap();
        }
        table
    }

    #[test]
    fn test_insert_and_get() {
        let table = table_with(vec![active_record(7, "Alice")]);
        assert_eq!(table.len(), 1);
        assert!(table.contains(7));
        assert_eq!(table.read(7, |r| r.username.clone()), Some("Alice".to_string()));
    }

    #[test]
    fn test_insert_duplicate_id_fails() {
        let table = table_with(vec![active_record(7, "Alice")]);
        let result = table.insert(active_record(7, "Bob"));
        assert!(matches!(result, Err(SessionError::IdInUse(7))));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove_twice() {
        let table = table_with(vec![active_record(7, "Alice")]);
        assert!(table.remove(7).is_some());
        assert!(table.remove(7).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_username_taken_case_insensitive() {
        let table = table_with(vec![active_record(7, "Alice")]);
        assert!(table.username_taken("alice"));
        assert!(table.username_taken("ALICE"));
        assert!(!table.username_taken("Bob"));
    }

    #[test]
    fn test_username_taken_includes_reserved() {
        let table = table_with(vec![PlayerRecord::new(7, "addr", "Alice", "key")]);
        assert!(table.username_taken("alice"));
    }

    #[test]
    fn test_snapshot_ids_match_records() {
        let table = table_with(vec![active_record(1, "A"), active_record(2, "B")]);
        for record in table.snapshot() {
            assert_eq!(table.read(record.id, |r| r.id), Some(record.id));
        }
    }

    #[test]
    fn test_active_ids_skip_reserved() {
        let table = table_with(vec![
            active_record(1, "A"),
            PlayerRecord::new(2, "addr", "B", "key"),
        ]);
        assert_eq!(table.active_ids(None), vec![1]);
        assert!(table.active_ids(Some(1)).is_empty());
    }

    #[test]
    fn test_enter_scene_alone_becomes_host() {
        let table = table_with(vec![active_record(7, "Alice")]);

        let entry = table
            .enter_scene(7, "Town", Vec2::new(1.0, 2.0), true, 10)
            .unwrap();

        assert!(entry.peers.is_empty());
        assert!(entry.is_host);
        assert_eq!(table.read(7, |r| r.is_scene_host), Some(true));
        assert_eq!(table.read(7, |r| r.current_scene.clone()), Some("Town".to_string()));
    }

    #[test]
    fn test_enter_scene_with_peers() {
        let table = table_with(vec![active_record(7, "Alice"), active_record(8, "Bob")]);
        table.enter_scene(7, "Town", Vec2::ZERO, false, 0).unwrap();

        let entry = table
            .enter_scene(8, "Town", Vec2::new(3.0, 4.0), false, 11)
            .unwrap();

        assert_eq!(entry.peers.len(), 1);
        assert_eq!(entry.peers[0].id, 7);
        assert!(!entry.is_host);
        assert_eq!(table.read(8, |r| r.is_scene_host), Some(false));
    }

    #[test]
    fn test_peers_in_scene_filters() {
        let table = table_with(vec![
            active_record(1, "A"),
            active_record(2, "B"),
            active_record(3, "C"),
        ]);
        table.enter_scene(1, "Town", Vec2::ZERO, false, 0).unwrap();
        table.enter_scene(2, "Town", Vec2::ZERO, false, 0).unwrap();
        table.enter_scene(3, "Forest", Vec2::ZERO, false, 0).unwrap();

        let peers = table.peers_in_scene("Town", 1);
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].id, 2);

        assert!(table.peers_in_scene("", 1).is_empty());
    }

    #[test]
    fn test_exit_scene_transfers_host() {
        let table = table_with(vec![active_record(7, "Alice"), active_record(8, "Bob")]);
        table.enter_scene(7, "Town", Vec2::ZERO, false, 0).unwrap();
        table.enter_scene(8, "Town", Vec2::ZERO, false, 0).unwrap();

        let exit = table.exit_scene(7).unwrap();

        assert_eq!(exit.scene, "Town");
        assert_eq!(exit.successor, Some(8));
        assert!(!exit.scene_empty);
        assert_eq!(table.read(7, |r| r.is_scene_host), Some(false));
        assert_eq!(table.read(8, |r| r.is_scene_host), Some(true));
    }

    #[test]
    fn test_exit_scene_last_occupant() {
        let table = table_with(vec![active_record(7, "Alice")]);
        table.enter_scene(7, "Town", Vec2::ZERO, false, 0).unwrap();

        let exit = table.exit_scene(7).unwrap();

        assert!(exit.successor.is_none());
        assert!(exit.scene_empty);
        assert!(table.is_scene_empty("Town"));
        assert_eq!(table.read(7, |r| r.current_scene.clone()), Some(String::new()));
    }

    #[test]
    fn test_exit_scene_non_host_keeps_host() {
        let table = table_with(vec![active_record(7, "Alice"), active_record(8, "Bob")]);
        table.enter_scene(7, "Town", Vec2::ZERO, false, 0).unwrap();
        table.enter_scene(8, "Town", Vec2::ZERO, false, 0).unwrap();

        let exit = table.exit_scene(8).unwrap();

        assert!(exit.successor.is_none());
        assert_eq!(table.read(7, |r| r.is_scene_host), Some(true));
    }

    #[test]
    fn test_exit_scene_when_not_in_scene() {
        let table = table_with(vec![active_record(7, "Alice")]);
        assert!(table.exit_scene(7).is_none());
        assert!(table.exit_scene(99).is_none());
    }

    #[test]
    fn test_host_uniqueness_across_transitions() {
        let table = table_with(vec![
            active_record(1, "A"),
            active_record(2, "B"),
            active_record(3, "C"),
        ]);
        table.enter_scene(1, "Town", Vec2::ZERO, false, 0).unwrap();
        table.enter_scene(2, "Town", Vec2::ZERO, false, 0).unwrap();
        table.enter_scene(3, "Town", Vec2::ZERO, false, 0).unwrap();
        table.exit_scene(1).unwrap();

        let hosts: Vec<u16> = table
            .snapshot()
            .into_iter()
            .filter(|r| r.is_in_scene("Town") && r.is_scene_host)
            .map(|r| r.id)
            .collect();
        assert_eq!(hosts.len(), 1);
    }
}
