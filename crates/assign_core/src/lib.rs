//! `assign_core`: host-authoritative assignment distribution.
//!
//! The host generates assignments when a round starts, polls them for
//! completion every tick and broadcasts the outcome; every peer (host included,
//! via loopback) applies the broadcast events to its own view. The game world
//! is reached only through [`world::World`].

pub mod assignment;
pub mod catalog;
pub mod config;
pub mod context;
pub mod logic;
pub mod manager;
pub mod phase;
pub mod transport;
pub mod types;
pub mod weighted;
pub mod world;

pub use assignment::{Assignment, Status};
pub use catalog::{AssignmentKind, AssignmentTemplate, Catalog};
pub use config::AssignConfig;
pub use context::Context;
pub use manager::{AssignmentManager, Notice};
pub use phase::{Phase, PhaseTracker, SessionSignals};
pub use transport::{ChannelTransport, Hub, Transport};
pub use types::{PlayerId, TargetId, Vec3};
pub use world::World;
