//! Module defining the boundary between the bridge and the decision loop.
//!
//! The learning side only ever sees an [`Environment`] returning [`Transition`]s and hands
//! back action indices chosen by a [`Policy`].

use crate::error::Result;

/// Position of a transition in its episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepType {
    /// First observation of an episode, carries no reward.
    First,
    /// Intermediate observation.
    Continue,
    /// Terminal observation.
    Last,
}

/// Result of one `reset` or `step` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Position in the episode.
    pub step_type: StepType,
    /// Normalized observation vector.
    pub observation: Vec<f32>,
    /// Legal action bitmap for the next decision.
    pub mask: Vec<u8>,
    /// Reward earned by the previous action, `0.0` for [`StepType::First`].
    pub reward: f32,
}

impl Transition {
    /// Start of an episode.
    pub fn first(observation: Vec<f32>, mask: Vec<u8>) -> Self {
        Transition {
            step_type: StepType::First,
            observation,
            mask,
            reward: 0.0,
        }
    }

    /// True for [`StepType::First`].
    pub fn is_first(&self) -> bool {
        self.step_type == StepType::First
    }

    /// True for [`StepType::Last`].
    pub fn is_last(&self) -> bool {
        self.step_type == StepType::Last
    }

    /// Indices of the legal actions.
    pub fn legal_actions(&self) -> impl Iterator<Item = usize> + '_ {
        self.mask
            .iter()
            .enumerate()
            .filter(|(_, &m)| m == 1)
            .map(|(i, _)| i)
    }
}

/// What the decision loop drives.
pub trait Environment {
    /// Block until a new episode starts and return its first transition.
    ///
    /// # Error
    /// Fails if the next message does not start an episode.
    fn reset(&mut self) -> Result<Transition>;

    /// Submit `action` and block until the next transition.
    ///
    /// After a [`StepType::Last`] transition the next call behaves like [`Environment::reset`]
    /// and `action` is discarded.
    fn step(&mut self, action: i32) -> Result<Transition>;
}

/// What the decision loop should implement.
pub trait Policy {
    /// Pick an action index among the legal ones of `transition`.
    ///
    /// The bridge does not check the choice against the mask.
    fn select_action(&mut self, transition: &Transition) -> i32;
}

impl<E: Environment + ?Sized> Environment for &mut E {
    fn reset(&mut self) -> Result<Transition> {
        (**self).reset()
    }

    fn step(&mut self, action: i32) -> Result<Transition> {
        (**self).step(action)
    }
}
