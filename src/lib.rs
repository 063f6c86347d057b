//! # Sim Bridge
//!
//! Turns a turn-based game simulator into a synchronous `reset`/`step` environment.
//!
//! The simulator is the client: it connects to the bridge, pushes the state of the player it
//! controls and waits for the action to play. The decision loop sits on the other side and
//! sees an ordinary [`Environment`](crate::game_interface::Environment).
//!
//! It provides:
//! - A JSON wire format for states and actions (see [`message`])
//! - Two framings of that format, length-prefixed socket and chunked HTTP (see [`codec`])
//! - A listener thread per transport (see [`transport`])
//! - The episode state machine and its reward shaping (see [`episode`] and [`reward`])
//!
//! The listener thread and the caller thread meet in two single-slot [`mailbox`]es. The
//! exchange strictly alternates and nothing times out: a silent simulator blocks the caller
//! forever.
//!
//! # Documentation Overview
//!
//! - To start a bridge from settings, see [`Bridge`](crate::bridge::Bridge) and
//!   [`Configuration`](crate::configuration::Configuration).
//! - For the `reset`/`step` contract, see [`EpisodeStateMachine`](crate::episode::EpisodeStateMachine).
//! - For plugging a learner in, implement [`Policy`](crate::game_interface::Policy) and
//!   drive it with [`play_episode`](crate::player::play_episode).
//!
//! # Usage Example
//!
//! ```no_run
//! use sim_bridge::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Configuration::new()
//!         .with_transport(TransportKind::Http)
//!         .with_port(8080)
//!         .with_reward_mode(RewardStrategy::Polynomial { degree: 2.0 })
//!         .with_episode_end_signal(true);
//!
//!     let mut bridge = Bridge::new(&config)?;
//!     println!("waiting for the simulator on {}", bridge.local_addr());
//!
//!     let mut policy = RandomPolicy::new();
//!     let summary = play_episode(&mut bridge, &mut policy)?;
//!     println!("{} steps, total reward {}", summary.steps, summary.total_reward());
//!
//!     bridge.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Simulator Requirements
//!
//! - Send `EPISODE_STARTS` first, then `EPISODE_CONTINUES` until `EPISODE_ENDS`
//! - Every state is answered by exactly one action; the reply to `EPISODE_ENDS` is the
//!   sentinel action `-1`
//! - Observations and masks must have the configured widths
#![warn(missing_docs)]

pub mod bridge;
pub mod codec;
pub mod configuration;
pub mod episode;
pub mod error;
pub mod game_interface;
pub mod logger;
pub mod mailbox;
pub mod message;
pub mod player;
pub mod reward;
pub mod transport;
pub use anyhow;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use sim_bridge::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bridge::Bridge;
    pub use crate::configuration::Configuration;
    pub use crate::error::{BridgeError, Result};
    pub use crate::game_interface::{Environment, Policy, StepType, Transition};
    pub use crate::player::{play_episode, play_episodes, EpisodeSummary, RandomPolicy};
    pub use crate::reward::{RewardShaper, RewardStrategy};
    pub use crate::transport::TransportKind;
}
