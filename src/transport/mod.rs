//! Transport servers connecting the simulator to the mailboxes.
//!
//! Both variants run the same per-message cycle on the listener thread:
//!
//! 1. decode an inbound [`StateMessage`]
//! 2. push it to the state mailbox
//! 3. block on the action mailbox for the reply
//! 4. encode the [`ActionMessage`] and send it back
//!
//! There are no timeouts: a caller that never steps keeps the listener blocked in step 3.
//! Stopping a transport closes its sockets but cannot release a thread blocked on a mailbox.

mod http;
mod socket;

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::error::{BridgeError, Result};
use crate::mailbox::Mailboxes;
use crate::message::{ActionMessage, StateMessage};

pub use http::HttpTransport;
pub use socket::SocketTransport;

/// Which framing the simulator speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportKind {
    /// Chunked HTTP `POST` requests.
    Http,
    /// Length-prefixed frames on one persistent TCP connection.
    #[default]
    Socket,
}

impl FromStr for TransportKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(TransportKind::Http),
            "socket" | "tcp" => Ok(TransportKind::Socket),
            other => Err(BridgeError::Config(format!("unknown transport '{other}'"))),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Http => write!(f, "http"),
            TransportKind::Socket => write!(f, "socket"),
        }
    }
}

/// A server the simulator connects to.
pub trait Transport: Send + Sync {
    /// Framing of this transport.
    fn kind(&self) -> TransportKind;

    /// Address the server is bound to.
    fn local_addr(&self) -> SocketAddr;

    /// Run the blocking serve loop.
    ///
    /// Returns `Ok(())` when the simulator disconnects or [`stop`](Transport::stop) is called,
    /// and an error on malformed input. May only be called once.
    fn start(&self) -> Result<()>;

    /// Release the listening socket and the simulator connection, unblocking `start`.
    fn stop(&self);
}

/// Bind a transport of `kind` on `addr`, wired to `mailboxes`.
pub fn bind(
    kind: TransportKind,
    addr: impl ToSocketAddrs,
    mailboxes: Mailboxes,
    max_payload: usize,
) -> Result<Arc<dyn Transport>> {
    Ok(match kind {
        TransportKind::Http => Arc::new(HttpTransport::bind(addr, mailboxes, max_payload)?),
        TransportKind::Socket => Arc::new(SocketTransport::bind(addr, mailboxes, max_payload)?),
    })
}

/// Hand a decoded state to the caller and wait for its decision.
fn exchange(mailboxes: &Mailboxes, state: StateMessage) -> Result<ActionMessage> {
    debug!(message_type = ?state.message_type, step = state.step, "received state");
    mailboxes.state.put(state)?;
    let action = mailboxes.action.take()?;
    trace!(index = action.index, "action ready");
    Ok(action)
}

/// Listening socket plus the currently served connection, shared with `stop`.
#[derive(Debug)]
struct Endpoint {
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    connection: Mutex<Option<TcpStream>>,
    stopped: AtomicBool,
}

impl Endpoint {
    fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        Ok(Endpoint {
            listener: Mutex::new(Some(listener)),
            local_addr,
            connection: Mutex::new(None),
            stopped: AtomicBool::new(false),
        })
    }

    /// Move the listener out; it is dropped when the serve loop returns.
    ///
    /// `None` if the transport was stopped before it started.
    fn take_listener(&self) -> Result<Option<TcpListener>> {
        match lock(&self.listener).take() {
            Some(listener) => Ok(Some(listener)),
            None if self.is_stopped() => Ok(None),
            None => Err(BridgeError::Config("transport already started".into())),
        }
    }

    /// Accept the next connection, `None` once stopped.
    fn accept(&self, listener: &TcpListener) -> Result<Option<TcpStream>> {
        let (stream, peer) = listener.accept()?;
        if self.is_stopped() {
            return Ok(None);
        }
        *lock(&self.connection) = Some(stream.try_clone()?);
        // stop may have run before the connection was registered
        if self.is_stopped() {
            return Ok(None);
        }
        debug!(%peer, "simulator connected");
        Ok(Some(stream))
    }

    fn release_connection(&self) {
        lock(&self.connection).take();
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(stream) = lock(&self.connection).take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        // a listener still in our hands was never started
        if lock(&self.listener).take().is_none() {
            // wake a blocked accept
            let _ = TcpStream::connect(wake_addr(self.local_addr));
        }
        debug!(addr = %self.local_addr, "transport stopped");
    }
}

fn wake_addr(addr: SocketAddr) -> SocketAddr {
    match addr {
        SocketAddr::V4(a) if a.ip().is_unspecified() => (Ipv4Addr::LOCALHOST, a.port()).into(),
        SocketAddr::V6(a) if a.ip().is_unspecified() => (Ipv6Addr::LOCALHOST, a.port()).into(),
        other => other,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
