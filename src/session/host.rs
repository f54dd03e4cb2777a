use hashbrown::HashMap;

use crate::session::record::PlayerRecord;

/// Scene-host election policy.
///
/// Runs only inside [`SessionTable`](crate::session::table::SessionTable)'s
/// write lock so that an observer never sees a non-empty scene without a
/// host between hand-offs.
pub struct SceneHostElector;

impl SceneHostElector {
    /// Whether a player entering `scene` becomes its host: true when no
    /// other active record occupies it.
    pub(crate) fn entrant_becomes_host(
        records: &HashMap<u16, PlayerRecord>,
        scene: &str,
        entrant: u16,
    ) -> bool {
        !records
            .values()
            .any(|r| r.id != entrant && r.is_in_scene(scene))
    }

    /// First remaining occupant of `scene` besides the leaver, in table
    /// iteration order. `None` when the scene is now empty.
    pub(crate) fn pick_successor(
        records: &HashMap<u16, PlayerRecord>,
        scene: &str,
        leaver: u16,
    ) -> Option<u16> {
        records
            .values()
            .find(|r| r.id != leaver && r.is_in_scene(scene))
            .map(|r| r.id)
    }
}
