//! Config for the bridge behaviors
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! All values are optional. Flags are case-insensitive, set them to `"true"` to enable.
//!
//! - `BRIDGE_TRANSPORT`: `socket` or `http` (default: `socket`)
//! - `BRIDGE_HOST`: IP address to bind (default: `127.0.0.1`)
//! - `BRIDGE_PORT`: port to bind, `0` picks a free one (default: `0`)
//! - `BRIDGE_REWARD_MODE`: `naive` or a non-negative polynomial degree such as `2` (default: `naive`)
//! - `BRIDGE_END_SIGNAL`: penalize episodes that end without reaching the goal (default: `false`)
//! - `BRIDGE_OBSERVATION_WIDTH`: floats per observation (default: `788`)
//! - `BRIDGE_ACTION_WIDTH`: entries per action mask (default: `180`)
//! - `BRIDGE_MAX_PAYLOAD`: largest accepted message in bytes (default: 1 MiB)
//! - `BRIDGE_EPISODES`: episodes played by the `sim-bridge` binary (default: `1`)
//! - `BRIDGE_LOG`: enable logging to a file (default: `false`)
//! - `BRIDGE_VERBOSE`: enable logging to stdout (default: `false`)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use anyhow::Context;

use crate::codec::DEFAULT_MAX_PAYLOAD;
use crate::message::{Spaces, DEFAULT_ACTION_WIDTH, DEFAULT_OBSERVATION_WIDTH};
use crate::reward::{RewardShaper, RewardStrategy};
use crate::transport::TransportKind;

/// Configuration for bridge behaviors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Configuration {
    pub(crate) transport: TransportKind,
    pub(crate) host: IpAddr,
    pub(crate) port: u16,
    pub(crate) reward_mode: RewardStrategy,
    pub(crate) episode_end_signal: bool,
    pub(crate) spaces: Spaces,
    pub(crate) max_payload: usize,
    pub(crate) episodes: usize,
    pub(crate) log: bool,
    pub(crate) verbose: bool,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - The socket transport listens on `127.0.0.1` on a free port.
    /// - Rewards are the naive progress difference, without episode-end penalty.
    /// - Messages must match the default game widths (788 observations, 180 actions).
    /// - Logging is disabled.
    pub fn new() -> Self {
        Self {
            transport: TransportKind::Socket,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            reward_mode: RewardStrategy::Naive,
            episode_end_signal: false,
            spaces: Spaces::new(DEFAULT_OBSERVATION_WIDTH, DEFAULT_ACTION_WIDTH),
            max_payload: DEFAULT_MAX_PAYLOAD,
            episodes: 1,
            log: false,
            verbose: false,
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Unset variables keep their default value (see [`Configuration::new`]).
    ///
    /// # Errors
    /// Returned when a set variable cannot be parsed, e.g. a reward mode that is neither
    /// `naive` nor a number.
    pub fn from_env() -> anyhow::Result<Self> {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match std::env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        fn get_env_parsed<T>(var: &str, default: T) -> anyhow::Result<T>
        where
            T: FromStr,
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            match std::env::var(var) {
                Ok(val) => val
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid value '{val}' for {var}")),
                Err(_) => Ok(default),
            }
        }

        let defaults = Self::new();
        Ok(Self {
            transport: get_env_parsed("BRIDGE_TRANSPORT", defaults.transport)?,
            host: get_env_parsed("BRIDGE_HOST", defaults.host)?,
            port: get_env_parsed("BRIDGE_PORT", defaults.port)?,
            reward_mode: get_env_parsed("BRIDGE_REWARD_MODE", defaults.reward_mode)?,
            episode_end_signal: get_env_flag("BRIDGE_END_SIGNAL", defaults.episode_end_signal),
            spaces: Spaces::new(
                get_env_parsed("BRIDGE_OBSERVATION_WIDTH", defaults.spaces.observation_width)?,
                get_env_parsed("BRIDGE_ACTION_WIDTH", defaults.spaces.action_width)?,
            ),
            max_payload: get_env_parsed("BRIDGE_MAX_PAYLOAD", defaults.max_payload)?,
            episodes: get_env_parsed("BRIDGE_EPISODES", defaults.episodes)?,
            log: get_env_flag("BRIDGE_LOG", defaults.log),
            verbose: get_env_flag("BRIDGE_VERBOSE", defaults.verbose),
        })
    }

    /// Select the transport the simulator speaks.
    pub fn with_transport(mut self, value: TransportKind) -> Self {
        self.transport = value;
        self
    }

    /// Set the address to bind.
    pub fn with_host(mut self, value: IpAddr) -> Self {
        self.host = value;
        self
    }

    /// Set the port to bind, `0` for any free port.
    pub fn with_port(mut self, value: u16) -> Self {
        self.port = value;
        self
    }

    /// Select the base reward strategy.
    pub fn with_reward_mode(mut self, value: RewardStrategy) -> Self {
        self.reward_mode = value;
        self
    }

    /// Enable or disable the episode-end penalty.
    pub fn with_episode_end_signal(mut self, value: bool) -> Self {
        self.episode_end_signal = value;
        self
    }

    /// Set the observation and action widths every state must have.
    pub fn with_spaces(mut self, value: Spaces) -> Self {
        self.spaces = value;
        self
    }

    /// Set the largest accepted message size in bytes.
    pub fn with_max_payload(mut self, value: usize) -> Self {
        self.max_payload = value;
        self
    }

    /// Set the number of episodes the binary plays.
    pub fn with_episodes(mut self, value: usize) -> Self {
        self.episodes = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Enable or disable logging to stdout.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Selected transport.
    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Address the transport binds.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Reward policy built from the reward mode and the episode-end flag.
    pub fn reward_shaper(&self) -> RewardShaper {
        RewardShaper::new(self.reward_mode).with_episode_end_signal(self.episode_end_signal)
    }

    /// Expected message widths.
    pub fn spaces(&self) -> Spaces {
        self.spaces
    }

    /// Largest accepted message size in bytes.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Episodes the binary plays.
    pub fn episodes(&self) -> usize {
        self.episodes
    }

    /// True if a file logger should be installed.
    pub fn log(&self) -> bool {
        self.log
    }

    /// True if a stdout logger should be installed.
    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // all environment manipulation lives in this one test, tests run in parallel
    #[test]
    fn from_env_overrides_defaults() {
        std::env::set_var("BRIDGE_TRANSPORT", "http");
        std::env::set_var("BRIDGE_PORT", "6000");
        std::env::set_var("BRIDGE_REWARD_MODE", "2");
        std::env::set_var("BRIDGE_END_SIGNAL", "TRUE");
        std::env::set_var("BRIDGE_ACTION_WIDTH", "12");
        let config = Configuration::from_env().unwrap();
        assert_eq!(config.transport(), TransportKind::Http);
        assert_eq!(config.bind_addr(), "127.0.0.1:6000".parse().unwrap());
        assert_eq!(
            config.reward_shaper(),
            RewardShaper::new(RewardStrategy::Polynomial { degree: 2.0 })
                .with_episode_end_signal(true)
        );
        assert_eq!(config.spaces(), Spaces::new(DEFAULT_OBSERVATION_WIDTH, 12));

        std::env::set_var("BRIDGE_REWARD_MODE", "sometimes");
        assert!(Configuration::from_env().is_err());

        for var in [
            "BRIDGE_TRANSPORT",
            "BRIDGE_PORT",
            "BRIDGE_REWARD_MODE",
            "BRIDGE_END_SIGNAL",
            "BRIDGE_ACTION_WIDTH",
        ] {
            std::env::remove_var(var);
        }
        assert_eq!(Configuration::from_env().unwrap(), Configuration::new());
    }

    #[test]
    fn builders_set_fields() {
        let config = Configuration::new()
            .with_transport(TransportKind::Http)
            .with_port(1234)
            .with_spaces(Spaces::new(3, 4))
            .with_max_payload(99)
            .with_episodes(7)
            .with_log(true);
        assert_eq!(config.transport(), TransportKind::Http);
        assert_eq!(config.bind_addr().port(), 1234);
        assert_eq!(config.spaces(), Spaces::new(3, 4));
        assert_eq!(config.max_payload(), 99);
        assert_eq!(config.episodes(), 7);
        assert!(config.log());
        assert!(!config.verbose());
    }
}
