//! Headless gagaball host.
//!
//! Runs one match on a fixed-interval tokio tick loop: either a single-player
//! match against bots, or a room where the host and in-process loopback
//! clients play over the memory transport.

pub mod autopilot;
pub mod config;
pub mod error;
pub mod game_loop;
pub mod progression;

pub use config::HostConfig;
pub use error::HostError;
pub use game_loop::{LoopCommand, LoopUpdate, MatchSummary, PeerResult, spawn_headless_match};
