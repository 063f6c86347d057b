//! Reward shaping over the victory-progress signal.
//!
//! The first entry of every observation is the player's progress towards winning,
//! normalized so that `1.0` means the goal is reached. Rewards are computed from the
//! previous and the new observation only.

use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;
use crate::message::MessageType;

/// Penalty returned by the episode-end override when the goal was not reached.
pub const EPISODE_LOST_PENALTY: f32 = -1.0;

/// Base reward strategy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RewardStrategy {
    /// `new[0] - old[0]`.
    #[default]
    Naive,
    /// `min(new[0], 1) ^ degree - 1`, always `<= 0`.
    Polynomial {
        /// Exponent applied to the progress signal.
        degree: f32,
    },
}

impl RewardStrategy {
    /// Reward for moving from `old` to `new`.
    pub fn reward(&self, old: &[f32], new: &[f32]) -> f32 {
        match *self {
            RewardStrategy::Naive => progress(new) - progress(old),
            RewardStrategy::Polynomial { degree } => progress(new).min(1.0).powf(degree) - 1.0,
        }
    }
}

/// `naive` or a non-negative float degree, e.g. `2` or `0.5`.
impl FromStr for RewardStrategy {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("naive") {
            return Ok(RewardStrategy::Naive);
        }
        match s.parse::<f32>() {
            Ok(degree) if degree.is_finite() && degree >= 0.0 => {
                Ok(RewardStrategy::Polynomial { degree })
            }
            _ => Err(BridgeError::Config(format!(
                "reward mode '{s}' is neither 'naive' nor a finite non-negative degree"
            ))),
        }
    }
}

impl fmt::Display for RewardStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewardStrategy::Naive => write!(f, "naive"),
            RewardStrategy::Polynomial { degree } => write!(f, "{degree}"),
        }
    }
}

/// Reward policy of one bridge: a base strategy plus the optional episode-end override.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RewardShaper {
    strategy: RewardStrategy,
    episode_end_signal: bool,
}

impl RewardShaper {
    /// Shaper using `strategy`, override disabled.
    pub fn new(strategy: RewardStrategy) -> Self {
        RewardShaper {
            strategy,
            episode_end_signal: false,
        }
    }

    /// Enable or disable the episode-end override.
    pub fn with_episode_end_signal(mut self, value: bool) -> Self {
        self.episode_end_signal = value;
        self
    }

    /// Base strategy.
    pub fn strategy(&self) -> RewardStrategy {
        self.strategy
    }

    /// Reward for the transition `old -> new` carried by a message of `message_type`.
    ///
    /// With the override enabled, an episode that ends below full progress yields
    /// [`EPISODE_LOST_PENALTY`] whatever the base strategy says.
    pub fn reward(&self, old: &[f32], new: &[f32], message_type: MessageType) -> f32 {
        if self.episode_end_signal
            && message_type == MessageType::EpisodeEnds
            && progress(new) < 1.0
        {
            return EPISODE_LOST_PENALTY;
        }
        self.strategy.reward(old, new)
    }
}

/// Victory progress, `0.0` for an empty observation.
fn progress(observation: &[f32]) -> f32 {
    observation.first().copied().unwrap_or(0.0)
}
