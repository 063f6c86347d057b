//! Decision loop over an [`Environment`].

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::game_interface::{Environment, Policy, Transition};
use crate::message::NO_ACTION;

/// Uniform choice among the legal actions.
///
/// Falls back to [`NO_ACTION`] when the mask allows nothing.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    /// Policy seeded from the OS.
    pub fn new() -> Self {
        RandomPolicy {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Reproducible policy.
    pub fn seeded(seed: u64) -> Self {
        RandomPolicy {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for RandomPolicy {
    fn select_action(&mut self, transition: &Transition) -> i32 {
        let legal: Vec<usize> = transition.legal_actions().collect();
        legal.choose(&mut self.rng).map_or(NO_ACTION, |&i| i as i32)
    }
}

/// Outcome of one played episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    /// Reward of every step, in order.
    pub rewards: Vec<f32>,
    /// Number of actions submitted.
    pub steps: usize,
    /// Wall time from `reset` to the terminal transition.
    pub duration: Duration,
}

impl EpisodeSummary {
    /// Sum of the step rewards.
    pub fn total_reward(&self) -> f32 {
        self.rewards.iter().sum()
    }
}

/// Play one episode from `reset` to its terminal transition.
#[instrument(skip_all)]
pub fn play_episode<E, P>(env: &mut E, policy: &mut P) -> Result<EpisodeSummary>
where
    E: Environment + ?Sized,
    P: Policy + ?Sized,
{
    let start = Instant::now();
    let mut transition = env.reset()?;
    let mut rewards = Vec::new();

    while !transition.is_last() {
        let action = policy.select_action(&transition);
        transition = env.step(action)?;
        debug!(action, reward = transition.reward, "step");
        rewards.push(transition.reward);
    }

    let summary = EpisodeSummary {
        steps: rewards.len(),
        rewards,
        duration: start.elapsed(),
    };
    info!(
        steps = summary.steps,
        total_reward = summary.total_reward(),
        "episode finished"
    );
    Ok(summary)
}

/// Play `episodes` episodes in a row, stopping at the first error.
pub fn play_episodes<E, P>(
    env: &mut E,
    policy: &mut P,
    episodes: usize,
) -> Result<Vec<EpisodeSummary>>
where
    E: Environment + ?Sized,
    P: Policy + ?Sized,
{
    (0..episodes)
        .map(|_| play_episode(&mut *env, &mut *policy))
        .collect()
}
