//! Episode state machine: the synchronous `reset`/`step` contract.
//!
//! ```text
//! AwaitingReset --reset--> Running --step(ENDS)--> Ended --reset/step--> Running
//! ```
//!
//! Every call pops exactly one state from the state mailbox. A `step` pushes the chosen action
//! before popping; a terminal reply is followed by one [`NO_ACTION`](crate::message::NO_ACTION)
//! sentinel so the simulator is released without waiting for a decision.

use tracing::{debug, instrument, trace};

use crate::error::{BridgeError, Result};
use crate::game_interface::{Environment, StepType, Transition};
use crate::mailbox::Mailboxes;
use crate::message::{ActionMessage, MessageType, PlayerNumber, Spaces, StateMessage};
use crate::reward::RewardShaper;

/// Lifecycle state of the current episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeState {
    /// No episode started yet.
    AwaitingReset,
    /// An episode is in progress.
    Running,
    /// The last episode received its terminal state.
    Ended,
}

/// Caller side of the bridge.
#[derive(Debug)]
pub struct EpisodeStateMachine {
    mailboxes: Mailboxes,
    rewards: RewardShaper,
    spaces: Spaces,
    state: EpisodeState,
    player_number: PlayerNumber,
    observation: Vec<f32>,
    episode_steps: u64,
}

impl EpisodeStateMachine {
    /// State machine reading and writing `mailboxes`.
    pub fn new(mailboxes: Mailboxes, rewards: RewardShaper, spaces: Spaces) -> Self {
        EpisodeStateMachine {
            mailboxes,
            rewards,
            spaces,
            state: EpisodeState::AwaitingReset,
            player_number: PlayerNumber::One,
            observation: Vec::new(),
            episode_steps: 0,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EpisodeState {
        self.state
    }

    /// Player the current episode is played for.
    pub fn player_number(&self) -> PlayerNumber {
        self.player_number
    }

    /// Last observation received.
    pub fn observation(&self) -> &[f32] {
        &self.observation
    }

    /// Steps taken in the current episode.
    pub fn episode_steps(&self) -> u64 {
        self.episode_steps
    }

    /// The mailboxes this machine is wired to.
    pub fn mailboxes(&self) -> &Mailboxes {
        &self.mailboxes
    }

    /// Block until the simulator starts an episode.
    ///
    /// Nothing is mutated when the received message does not start an episode.
    #[instrument(skip_all)]
    pub fn reset(&mut self) -> Result<Transition> {
        let msg = self.mailboxes.state.take()?;
        if msg.message_type != MessageType::EpisodeStarts {
            return Err(BridgeError::ProtocolDesync {
                expected: "EPISODE_STARTS",
                got: msg.message_type,
            });
        }
        msg.validate(&self.spaces)?;
        debug!(player = %msg.player_number, step = msg.step, "episode starts");

        let StateMessage {
            player_number,
            state,
            mask,
            ..
        } = msg;
        self.player_number = player_number;
        self.observation = state.clone();
        self.episode_steps = 0;
        self.state = EpisodeState::Running;
        Ok(Transition::first(state, mask))
    }

    /// Submit `action` and block until the simulator answers.
    ///
    /// Outside of a running episode this is a [`reset`](Self::reset) and `action` is dropped.
    #[instrument(skip(self))]
    pub fn step(&mut self, action: i32) -> Result<Transition> {
        if self.state != EpisodeState::Running {
            trace!(state = ?self.state, "step outside an episode, resetting");
            return self.reset();
        }

        self.mailboxes
            .action
            .put(ActionMessage::new(self.player_number, action))?;
        let msg = self.mailboxes.state.take()?;

        let step_type = match msg.message_type {
            MessageType::EpisodeContinues => StepType::Continue,
            MessageType::EpisodeEnds => StepType::Last,
            got => {
                return Err(BridgeError::ProtocolDesync {
                    expected: "EPISODE_CONTINUES or EPISODE_ENDS",
                    got,
                })
            }
        };
        msg.validate(&self.spaces)?;

        let reward = self
            .rewards
            .reward(&self.observation, &msg.state, msg.message_type);
        self.observation = msg.state.clone();
        self.episode_steps += 1;
        trace!(step = msg.step, reward, "transition");

        if step_type == StepType::Last {
            self.mailboxes
                .action
                .put(ActionMessage::sentinel(self.player_number))?;
            self.state = EpisodeState::Ended;
            debug!(steps = self.episode_steps, "episode ends");
        }

        Ok(Transition {
            step_type,
            observation: msg.state,
            mask: msg.mask,
            reward,
        })
    }
}

impl Environment for EpisodeStateMachine {
    fn reset(&mut self) -> Result<Transition> {
        EpisodeStateMachine::reset(self)
    }

    fn step(&mut self, action: i32) -> Result<Transition> {
        EpisodeStateMachine::step(self, action)
    }
}
