//! Access-list capability consumed by admission control and chat.
//!
//! Persistent storage of these lists belongs to the surrounding program;
//! the core only queries and promotes through this trait.

use hashbrown::HashSet;
use parking_lot::RwLock;

/// Ban, whitelist, pre-list, and authorized-key queries
pub trait AccessLists: Send + Sync {
    /// True when either the network address or the auth key is banned
    fn is_banned(&self, address: &str, auth_key: &str) -> bool;

    /// Whether whitelist enforcement is active
    fn whitelist_enabled(&self) -> bool;

    /// True when the auth key is on the whitelist
    fn is_whitelisted(&self, auth_key: &str) -> bool;

    /// True when the username is on the whitelist pre-list
    fn is_pre_listed(&self, username: &str) -> bool;

    /// Move the auth key onto the whitelist and drop the username from the
    /// pre-list. The promotion must survive restarts.
    fn promote_pre_listed(&self, username: &str, auth_key: &str);

    /// True when the auth key grants elevated command privileges
    fn is_authorized(&self, auth_key: &str) -> bool;
}

/// In-memory access lists.
///
/// Suitable for embedding and tests; a persistent implementation wraps the
/// same trait around its storage.
#[derive(Default)]
pub struct InMemoryAccessLists {
    banned_addresses: RwLock<HashSet<String>>,
    banned_keys: RwLock<HashSet<String>>,
    whitelist_enabled: RwLock<bool>,
    whitelist: RwLock<HashSet<String>>,
    pre_list: RwLock<HashSet<String>>,
    authorized: RwLock<HashSet<String>>,
}

impl InMemoryAccessLists {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ban_address(&self, address: &str) {
        self.banned_addresses.write().insert(address.to_string());
    }

    pub fn unban_address(&self, address: &str) {
        self.banned_addresses.write().remove(address);
    }

    pub fn ban_key(&self, auth_key: &str) {
        self.banned_keys.write().insert(auth_key.to_string());
    }

    pub fn unban_key(&self, auth_key: &str) {
        self.banned_keys.write().remove(auth_key);
    }

    pub fn set_whitelist_enabled(&self, enabled: bool) {
        *self.whitelist_enabled.write() = enabled;
    }

    pub fn add_to_whitelist(&self, auth_key: &str) {
        self.whitelist.write().insert(auth_key.to_string());
    }

    pub fn remove_from_whitelist(&self, auth_key: &str) {
        self.whitelist.write().remove(auth_key);
    }

    /// Pre-list a username: the first login bearing it is admitted and its
    /// auth key promoted onto the whitelist.
    pub fn add_to_pre_list(&self, username: &str) {
        self.pre_list.write().insert(username.to_lowercase());
    }

    pub fn authorize_key(&self, auth_key: &str) {
        self.authorized.write().insert(auth_key.to_string());
    }

    pub fn revoke_key(&self, auth_key: &str) {
        self.authorized.write().remove(auth_key);
    }
}

impl AccessLists for InMemoryAccessLists {
    fn is_banned(&self, address: &str, auth_key: &str) -> bool {
        self.banned_addresses.read().contains(address) || self.banned_keys.read().contains(auth_key)
    }

    fn whitelist_enabled(&self) -> bool {
        *self.whitelist_enabled.read()
    }

    fn is_whitelisted(&self, auth_key: &str) -> bool {
        self.whitelist.read().contains(auth_key)
    }

    fn is_pre_listed(&self, username: &str) -> bool {
        self.pre_list.read().contains(&username.to_lowercase())
    }

    fn promote_pre_listed(&self, username: &str, auth_key: &str) {
        self.pre_list.write().remove(&username.to_lowercase());
        self.whitelist.write().insert(auth_key.to_string());
    }

    fn is_authorized(&self, auth_key: &str) -> bool {
        self.authorized.read().contains(auth_key)
    }
}
