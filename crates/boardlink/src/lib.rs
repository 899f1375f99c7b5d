//! # Boardlink
//!
//! Host/remote state synchronization for turn-based board games.
//!
//! One process runs the authoritative game behind a [`RulesEngine`] and
//! hosts it with [`Host`]. Other processes join with [`RemoteClient`],
//! claim seats in the lobby, send button presses, and mirror every
//! snapshot the host broadcasts.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use boardlink::prelude::*;
//!
//! // Implement RulesEngine (and SnapshotSource) for your game, then:
//! // let host = HostBuilder::new()
//! //     .bind("0.0.0.0:5555")
//! //     .build(MyGame::default())
//! //     .await?;
//! // let handle = host.handle();
//! // tokio::spawn(host.run());
//! //
//! // let mut remote = RemoteClient::connect("127.0.0.1:5555", &SyncConfig::default()).await?;
//! // remote.request_slot(0, "Kim").await?;
//! ```

mod config;
mod error;
mod handler;
mod host;
mod remote;
mod rules;

pub use config::HostConfig;
pub use error::BoardlinkError;
pub use handler::HostEvent;
pub use host::{Host, HostBuilder, HostHandle};
pub use remote::{RemoteClient, RemoteEvent};
pub use rules::RulesEngine;

pub use boardlink_lobby as lobby;
pub use boardlink_protocol as protocol;
pub use boardlink_session as session;
pub use boardlink_snapshot as snapshot;
pub use boardlink_transport as transport;

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

/// Everything a game needs to host or join.
pub mod prelude {
    pub use crate::{
        BoardlinkError, Host, HostBuilder, HostConfig, HostEvent, HostHandle,
        RemoteClient, RemoteEvent, RulesEngine, init_tracing,
    };
    pub use boardlink_lobby::{LobbyConfig, LobbyError, LobbyPhase};
    pub use boardlink_protocol::{
        DialogAction, DialogChoice, DialogCommand, DialogKind, DialogResponse,
        DialogSync, DialogView, LobbyStateView, ParticipantId, PlayerAction,
        SlotAssignment, SlotStatus, SlotView,
    };
    pub use boardlink_session::{LinkError, SyncConfig};
    pub use boardlink_snapshot::{
        ButtonStates, CitySnapshot, DiceRender, MirrorTarget, MirroredBoard,
        PlayerSnapshot, Snapshot, SnapshotMirror, SnapshotSource,
        TouristSpotSnapshot,
    };
}
