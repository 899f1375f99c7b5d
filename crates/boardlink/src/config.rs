//! Host configuration.

use boardlink_lobby::LobbyConfig;
use boardlink_session::SyncConfig;
use serde::{Deserialize, Serialize};

/// Everything a host needs before it binds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Address the host listens on.
    pub bind_addr: String,
    pub sync: SyncConfig,
    pub lobby: LobbyConfig,
    /// Capacity of the orchestration command channel.
    pub command_buffer: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5555".to_string(),
            sync: SyncConfig::default(),
            lobby: LobbyConfig::default(),
            command_buffer: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_config_from_partial_json() {
        let config: HostConfig = serde_json::from_str(
            r#"{ "bind_addr": "127.0.0.1:7000", "lobby": { "max_players": 2 } }"#,
        )
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:7000");
        assert_eq!(config.lobby.max_players, 2);
        assert_eq!(config.lobby.name_max_chars, 16);
        assert_eq!(config.sync, SyncConfig::default());
        assert_eq!(config.command_buffer, 256);
    }
}
