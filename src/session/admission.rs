use std::sync::Arc;

use tracing::{info, warn};

use crate::access::AccessLists;
use crate::addon::AddonRegistry;
use crate::net::transport::{LoginRequest, LoginResponse};
use crate::session::record::PlayerRecord;
use crate::session::table::SessionTable;

/// Login evaluation: bans, whitelist, username rules, addon-set match.
///
/// The first failing check wins. On success a Reserved record is inserted;
/// the record stays invisible to peers until the client's first hello.
pub struct AdmissionController {
    access: Arc<dyn AccessLists>,
    addons: Arc<dyn AddonRegistry>,
}

impl AdmissionController {
    pub fn new(access: Arc<dyn AccessLists>, addons: Arc<dyn AddonRegistry>) -> Self {
        Self { access, addons }
    }

    /// Evaluate a login request and, when admitted, insert the new record
    pub fn evaluate(
        &self,
        table: &SessionTable,
        id: u16,
        remote_address: &str,
        request: &LoginRequest,
    ) -> LoginResponse {
        if self.access.is_banned(remote_address, &request.auth_key) {
            info!("Login from {} rejected: banned", remote_address);
            return LoginResponse::Banned;
        }

        if self.access.whitelist_enabled() && !self.access.is_whitelisted(&request.auth_key) {
            if self.access.is_pre_listed(&request.username) {
                self.access
                    .promote_pre_listed(&request.username, &request.auth_key);
                info!(
                    "Pre-listed username '{}' promoted onto the whitelist",
                    request.username
                );
            } else {
                info!("Login '{}' rejected: not whitelisted", request.username);
                return LoginResponse::NotWhiteListed;
            }
        }

        if !is_valid_username(&request.username) {
            info!("Login rejected: invalid username '{}'", request.username);
            return LoginResponse::InvalidUsername;
        }

        if table.username_taken(&request.username) {
            info!("Login rejected: username '{}' already in use", request.username);
            return LoginResponse::InvalidUsername;
        }

        if !self.addon_set_matches(&request.addons) {
            info!("Login '{}' rejected: addon set mismatch", request.username);
            return LoginResponse::InvalidAddons {
                server_addons: self.addons.networked_addons(),
            };
        }

        let addon_order = self.addon_order(request);

        if table.contains(id) {
            // The transport reused an id without surfacing a disconnect;
            // the stale record loses.
            warn!("Replacing stale record for client {}", id);
            table.remove(id);
        }
        let record = PlayerRecord::new(id, remote_address, &request.username, &request.auth_key);
        if let Err(e) = table.insert(record) {
            warn!("Failed to insert record for client {}: {}", id, e);
        }

        info!("Client {} admitted as '{}'", id, request.username);
        LoginResponse::Success { addon_order }
    }

    /// Exact set match: same cardinality and every (identifier, version)
    /// present on the server
    fn addon_set_matches(&self, client_addons: &[crate::addon::AddonInfo]) -> bool {
        let server_addons = self.addons.networked_addons();
        if client_addons.len() != server_addons.len() {
            return false;
        }
        client_addons.iter().all(|addon| {
            server_addons
                .iter()
                .any(|s| s.identifier == addon.identifier && s.version == addon.version)
        })
    }

    /// Server-side numeric ids in the order the client presented the
    /// addons, skipping addons the server does not number
    fn addon_order(&self, request: &LoginRequest) -> Vec<u8> {
        request
            .addons
            .iter()
            .filter_map(|addon| self.addons.addon_id(&addon.identifier, &addon.version))
            .collect()
    }
}

/// Non-empty, ASCII letters and digits only
fn is_valid_username(username: &str) -> bool {
    !username.is_empty() && username.bytes().all(|b| b.is_ascii_alphanumeric())
}
