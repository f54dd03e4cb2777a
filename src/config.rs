use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port the transport should listen on
    pub port: u16,
    /// Gameplay settings pushed to clients
    pub settings: ServerSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 26950,
            settings: ServerSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                if parsed > 0 {
                    config.port = parsed;
                } else {
                    tracing::warn!("PORT must be > 0, using default");
                }
            } else {
                tracing::warn!("Invalid PORT '{}', using default", port);
            }
        }

        if let Ok(value) = std::env::var("ALWAYS_SHOW_MAP_ICONS") {
            if let Ok(parsed) = value.parse::<bool>() {
                config.settings.always_show_map_icons = parsed;
            } else {
                tracing::warn!("Invalid ALWAYS_SHOW_MAP_ICONS '{}', using default", value);
            }
        }

        if let Ok(value) = std::env::var("MAP_ICON_REQUIRES_COMPASS") {
            if let Ok(parsed) = value.parse::<bool>() {
                config.settings.only_broadcast_map_icon_with_wayward_compass = parsed;
            } else {
                tracing::warn!("Invalid MAP_ICON_REQUIRES_COMPASS '{}', using default", value);
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port cannot be 0".to_string());
        }
        Ok(())
    }
}

/// The subset of server settings replicated to every client.
///
/// Compared by value when pushed: applying an equal settings struct produces
/// no outbound frames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Show every player's map icon regardless of item ownership
    pub always_show_map_icons: bool,
    /// Broadcast map icons only for players carrying the wayward compass
    pub only_broadcast_map_icon_with_wayward_compass: bool,
}

impl ServerSettings {
    /// True when map positions should fan out at all
    pub fn map_broadcast_enabled(&self) -> bool {
        self.always_show_map_icons || self.only_broadcast_map_icon_with_wayward_compass
    }
}
