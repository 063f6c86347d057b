//! The assembled bridge: mailboxes, a transport on its listener thread, and the episode
//! state machine driven by the caller.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{error, info, instrument};

use crate::configuration::Configuration;
use crate::episode::{EpisodeState, EpisodeStateMachine};
use crate::error::Result;
use crate::game_interface::{Environment, Transition};
use crate::mailbox::Mailboxes;
use crate::transport::{self, Transport, TransportKind};

/// A simulator-facing server exposed as an [`Environment`].
///
/// The transport runs on a dedicated listener thread; `reset` and `step` run on the caller's
/// thread. Neither side ever times out: if the simulator stalls, `reset`/`step` block forever.
pub struct Bridge {
    episode: EpisodeStateMachine,
    transport: Arc<dyn Transport>,
    listener: Option<JoinHandle<Result<()>>>,
}

impl Bridge {
    /// Bind the configured transport and start listening.
    #[instrument(skip_all, fields(transport = %config.transport(), addr = %config.bind_addr()))]
    pub fn new(config: &Configuration) -> Result<Self> {
        let mailboxes = Mailboxes::new();
        let transport = transport::bind(
            config.transport(),
            config.bind_addr(),
            mailboxes.clone(),
            config.max_payload(),
        )?;
        Self::with_transport(transport, mailboxes, config)
    }

    /// Start listening on an already bound `transport` wired to `mailboxes`.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        mailboxes: Mailboxes,
        config: &Configuration,
    ) -> Result<Self> {
        let server = transport.clone();
        let listener = thread::Builder::new()
            .name("bridge-listener".into())
            .spawn(move || {
                let result = server.start();
                if let Err(e) = &result {
                    error!(error = %e, "listener stopped on error");
                }
                result
            })?;
        info!(addr = %transport.local_addr(), kind = %transport.kind(), "bridge listening");

        Ok(Bridge {
            episode: EpisodeStateMachine::new(mailboxes, config.reward_shaper(), config.spaces()),
            transport,
            listener: Some(listener),
        })
    }

    /// Address the simulator must connect to.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Framing the simulator must speak.
    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Lifecycle state of the current episode.
    pub fn episode_state(&self) -> EpisodeState {
        self.episode.state()
    }

    /// The caller-side state machine.
    pub fn episode(&self) -> &EpisodeStateMachine {
        &self.episode
    }

    /// True while the listener thread is serving.
    pub fn is_listening(&self) -> bool {
        self.listener.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// See [`EpisodeStateMachine::reset`].
    pub fn reset(&mut self) -> Result<Transition> {
        self.episode.reset()
    }

    /// See [`EpisodeStateMachine::step`].
    pub fn step(&mut self, action: i32) -> Result<Transition> {
        self.episode.step(action)
    }

    /// Stop the transport.
    ///
    /// Returns the listener's outcome if it already finished. A listener blocked on the action
    /// mailbox cannot be released and is left detached.
    pub fn close(mut self) -> Result<()> {
        self.transport.stop();
        match self.listener.take() {
            Some(handle) if handle.is_finished() => match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            },
            _ => Ok(()),
        }
    }
}

impl Environment for Bridge {
    fn reset(&mut self) -> Result<Transition> {
        Bridge::reset(self)
    }

    fn step(&mut self, action: i32) -> Result<Transition> {
        Bridge::step(self, action)
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.transport.stop();
    }
}
