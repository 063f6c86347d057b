//! Messages exchanged with the simulator and their JSON schema.
//!
//! Inbound (engine -> bridge):
//!
//! ```json
//! {"player_number": 1, "type": "EPISODE_CONTINUES", "step": 12, "state": [0.25, ...], "mask": [0, 1, ...]}
//! ```
//!
//! `player_number` and `type` arrive either as an integer code or as the enum name, both
//! shapes are resolved here, at the boundary. Outbound (bridge -> engine):
//!
//! ```json
//! {"player_number": 1, "index": 42}
//! ```

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{BridgeError, Result};

/// Action index meaning "no action expected", sent after a terminal state.
pub const NO_ACTION: i32 = -1;

/// Observation width of the default game configuration.
pub const DEFAULT_OBSERVATION_WIDTH: usize = 788;
/// Action width of the default game configuration.
pub const DEFAULT_ACTION_WIDTH: usize = 180;

/// Either accepted literal shape of an enum field.
#[derive(Deserialize)]
#[serde(untagged)]
enum EnumCode {
    Code(i64),
    Name(String),
}

/// Seat of the player the simulator is asking a decision from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "EnumCode", into = "u8")]
pub enum PlayerNumber {
    /// Player 1.
    One = 1,
    /// Player 2.
    Two = 2,
    /// Player 3.
    Three = 3,
    /// Player 4.
    Four = 4,
}

impl PlayerNumber {
    const NAMES: [(&'static str, PlayerNumber); 4] = [
        ("ONE", PlayerNumber::One),
        ("TWO", PlayerNumber::Two),
        ("THREE", PlayerNumber::Three),
        ("FOUR", PlayerNumber::Four),
    ];

    /// Integer code used on the wire.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<PlayerNumber> for u8 {
    fn from(p: PlayerNumber) -> u8 {
        p.code()
    }
}

impl TryFrom<EnumCode> for PlayerNumber {
    type Error = String;

    fn try_from(value: EnumCode) -> std::result::Result<Self, Self::Error> {
        match value {
            EnumCode::Code(1) => Ok(PlayerNumber::One),
            EnumCode::Code(2) => Ok(PlayerNumber::Two),
            EnumCode::Code(3) => Ok(PlayerNumber::Three),
            EnumCode::Code(4) => Ok(PlayerNumber::Four),
            EnumCode::Code(n) => Err(format!("unknown player number {n}")),
            EnumCode::Name(name) => Self::NAMES
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(&name))
                .map(|(_, p)| *p)
                .ok_or_else(|| format!("unknown player number '{name}'")),
        }
    }
}

impl fmt::Display for PlayerNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Position of a state message in the episode lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "EnumCode", into = "u8")]
pub enum MessageType {
    /// First state of a new episode.
    EpisodeStarts = 0,
    /// Intermediate state, an action is expected.
    EpisodeContinues = 1,
    /// Terminal state, no action is expected.
    EpisodeEnds = 2,
}

impl MessageType {
    const NAMES: [(&'static str, MessageType); 3] = [
        ("EPISODE_STARTS", MessageType::EpisodeStarts),
        ("EPISODE_CONTINUES", MessageType::EpisodeContinues),
        ("EPISODE_ENDS", MessageType::EpisodeEnds),
    ];

    /// Integer code used on the wire.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<MessageType> for u8 {
    fn from(t: MessageType) -> u8 {
        t.code()
    }
}

impl TryFrom<EnumCode> for MessageType {
    type Error = String;

    fn try_from(value: EnumCode) -> std::result::Result<Self, Self::Error> {
        match value {
            EnumCode::Code(0) => Ok(MessageType::EpisodeStarts),
            EnumCode::Code(1) => Ok(MessageType::EpisodeContinues),
            EnumCode::Code(2) => Ok(MessageType::EpisodeEnds),
            EnumCode::Code(n) => Err(format!("unknown message type {n}")),
            EnumCode::Name(name) => Self::NAMES
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(&name))
                .map(|(_, t)| *t)
                .ok_or_else(|| format!("unknown message type '{name}'")),
        }
    }
}

/// Widths every state message must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spaces {
    /// Number of floats in `state` (W_obs).
    pub observation_width: usize,
    /// Number of entries in `mask` (W_act).
    pub action_width: usize,
}

impl Spaces {
    /// Spaces with the given widths.
    pub fn new(observation_width: usize, action_width: usize) -> Self {
        Spaces {
            observation_width,
            action_width,
        }
    }
}

impl Default for Spaces {
    fn default() -> Self {
        Spaces::new(DEFAULT_OBSERVATION_WIDTH, DEFAULT_ACTION_WIDTH)
    }
}

/// State pushed by the simulator at every decision point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMessage {
    /// Player the decision is asked from.
    pub player_number: PlayerNumber,
    /// Lifecycle position.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Simulator step counter, informational only.
    pub step: u64,
    /// Normalized observation vector.
    pub state: Vec<f32>,
    /// Legal action bitmap.
    #[serde(deserialize_with = "deserialize_mask")]
    pub mask: Vec<u8>,
}

impl StateMessage {
    /// True for [`MessageType::EpisodeEnds`].
    pub fn is_terminal(&self) -> bool {
        self.message_type == MessageType::EpisodeEnds
    }

    /// Check the widths and mask invariants against `spaces`.
    pub fn validate(&self, spaces: &Spaces) -> Result<()> {
        if self.state.len() != spaces.observation_width {
            return Err(BridgeError::malformed(format!(
                "state has {} entries, expected {}",
                self.state.len(),
                spaces.observation_width
            )));
        }
        if self.mask.len() != spaces.action_width {
            return Err(BridgeError::malformed(format!(
                "mask has {} entries, expected {}",
                self.mask.len(),
                spaces.action_width
            )));
        }
        if !self.is_terminal() && !self.mask.iter().any(|&m| m == 1) {
            return Err(BridgeError::malformed(format!(
                "step {}: no legal action in a non-terminal state",
                self.step
            )));
        }
        Ok(())
    }
}

/// Mask entries arrive as JSON numbers (often floats) and must be exactly 0 or 1.
fn deserialize_mask<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<f64>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|v| {
            if v == 0.0 {
                Ok(0)
            } else if v == 1.0 {
                Ok(1)
            } else {
                Err(D::Error::custom(format!("mask entry {v} is not 0 or 1")))
            }
        })
        .collect()
}

/// Decision sent back to the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMessage {
    /// Player the decision belongs to.
    pub player_number: PlayerNumber,
    /// Chosen action, or [`NO_ACTION`].
    pub index: i32,
}

impl ActionMessage {
    /// Action for `player_number`.
    pub fn new(player_number: PlayerNumber, index: i32) -> Self {
        ActionMessage {
            player_number,
            index,
        }
    }

    /// The "no action expected" reply sent after a terminal state.
    pub fn sentinel(player_number: PlayerNumber) -> Self {
        ActionMessage::new(player_number, NO_ACTION)
    }

    /// True if this is the [`NO_ACTION`] reply.
    pub fn is_sentinel(&self) -> bool {
        self.index == NO_ACTION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_fields_accept_codes_and_names() {
        let by_code = r#"{"player_number":2,"type":1,"step":3,"state":[0.5],"mask":[0,1]}"#;
        let by_name = r#"{"player_number":"TWO","type":"EPISODE_CONTINUES","step":3,"state":[0.5],"mask":[0.0,1.0]}"#;
        let a: StateMessage = serde_json::from_str(by_code).unwrap();
        let b: StateMessage = serde_json::from_str(by_name).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.player_number, PlayerNumber::Two);
        assert_eq!(a.message_type, MessageType::EpisodeContinues);
        assert_eq!(a.mask, vec![0, 1]);
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        let bad_type = r#"{"player_number":1,"type":7,"step":0,"state":[],"mask":[]}"#;
        let bad_player = r#"{"player_number":"SEVEN","type":0,"step":0,"state":[],"mask":[]}"#;
        let bad_shape = r#"{"player_number":[1],"type":0,"step":0,"state":[],"mask":[]}"#;
        assert!(serde_json::from_str::<StateMessage>(bad_type).is_err());
        assert!(serde_json::from_str::<StateMessage>(bad_player).is_err());
        assert!(serde_json::from_str::<StateMessage>(bad_shape).is_err());
    }

    #[test]
    fn mask_entries_must_be_binary() {
        let json = r#"{"player_number":1,"type":0,"step":0,"state":[],"mask":[0.5]}"#;
        assert!(serde_json::from_str::<StateMessage>(json).is_err());
    }

    #[test]
    fn action_is_encoded_with_integer_codes() {
        let json = serde_json::to_string(&ActionMessage::new(PlayerNumber::Three, 17)).unwrap();
        assert_eq!(json, r#"{"player_number":3,"index":17}"#);
        let sentinel = ActionMessage::sentinel(PlayerNumber::One);
        assert!(sentinel.is_sentinel());
        assert_eq!(
            serde_json::to_string(&sentinel).unwrap(),
            r#"{"player_number":1,"index":-1}"#
        );
    }

    #[test]
    fn validation_checks_widths_and_legal_actions() {
        let spaces = Spaces::new(2, 3);
        let mut msg = StateMessage {
            player_number: PlayerNumber::One,
            message_type: MessageType::EpisodeContinues,
            step: 1,
            state: vec![0.1, 0.2],
            mask: vec![0, 0, 1],
        };
        assert!(msg.validate(&spaces).is_ok());

        msg.mask = vec![0, 0, 0];
        assert!(matches!(
            msg.validate(&spaces),
            Err(BridgeError::MalformedPayload(_))
        ));

        // a terminal state needs no legal action
        msg.message_type = MessageType::EpisodeEnds;
        assert!(msg.validate(&spaces).is_ok());

        msg.state.push(0.3);
        assert!(msg.validate(&spaces).is_err());
    }
}
