//! Application services layer.
//!
//! This module contains the playback coordinator, the handle request
//! handlers use to reach it, and catalog search routing.

pub mod bridge;
pub mod coordinator;
pub mod search;

pub use bridge::{BridgeError, CoordinatorHandle, EnqueueOutcome, PlayerStatus};
pub use coordinator::{
    ConnectOutcome, CoordinatorChannels, CoordinatorDeps, CoordinatorSettings, CoordinatorStatus,
    PauseToggle, PlaybackCoordinator, PlaybackState,
};
pub use search::{CatalogSource, SearchService};
