//! Networked addon registry consumed by admission control.

use serde::{Deserialize, Serialize};

/// Identity of a networked addon as presented at login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonInfo {
    pub identifier: String,
    pub version: String,
}

impl AddonInfo {
    pub fn new(identifier: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            version: version.into(),
        }
    }
}

/// The server's set of networked addons and their numeric wire ids
pub trait AddonRegistry: Send + Sync {
    /// The full networked addon set, echoed to clients on addon mismatch
    fn networked_addons(&self) -> Vec<AddonInfo>;

    /// Numeric id for an exact (identifier, version) match, if the server
    /// numbers that addon
    fn addon_id(&self, identifier: &str, version: &str) -> Option<u8>;
}

/// Registry over a fixed addon list; ids are assigned by position.
#[derive(Default)]
pub struct FixedAddonRegistry {
    addons: Vec<AddonInfo>,
}

impl FixedAddonRegistry {
    pub fn new(addons: Vec<AddonInfo>) -> Self {
        Self { addons }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl AddonRegistry for FixedAddonRegistry {
    fn networked_addons(&self) -> Vec<AddonInfo> {
        self.addons.clone()
    }

    fn addon_id(&self, identifier: &str, version: &str) -> Option<u8> {
        self.addons
            .iter()
            .position(|a| a.identifier == identifier && a.version == version)
            .map(|idx| idx as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry() {
        let registry = FixedAddonRegistry::empty();
        assert!(registry.networked_addons().is_empty());
        assert!(registry.addon_id("anything", "1.0").is_none());
    }

    #[test]
    fn test_addon_id_by_position() {
        let registry = FixedAddonRegistry::new(vec![
            AddonInfo::new("maps", "1.2"),
            AddonInfo::new("emotes", "0.9"),
        ]);

        assert_eq!(registry.addon_id("maps", "1.2"), Some(0));
        assert_eq!(registry.addon_id("emotes", "0.9"), Some(1));
    }

    #[test]
    fn test_addon_id_requires_exact_version() {
        let registry = FixedAddonRegistry::new(vec![AddonInfo::new("maps", "1.2")]);
        assert!(registry.addon_id("maps", "1.3").is_none());
    }
}
