//! Raw socket transport: one persistent connection, length-prefixed frames.

use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

use tracing::{debug, info, instrument, warn};

use super::{exchange, Endpoint, Transport, TransportKind};
use crate::codec::frame;
use crate::error::Result;
use crate::mailbox::Mailboxes;
use crate::message::StateMessage;

/// Accepts exactly one simulator connection and serves it until the peer disconnects.
#[derive(Debug)]
pub struct SocketTransport {
    endpoint: Endpoint,
    mailboxes: Mailboxes,
    max_payload: usize,
}

impl SocketTransport {
    /// Bind on `addr`. Frames above `max_payload` bytes are rejected.
    pub fn bind(addr: impl ToSocketAddrs, mailboxes: Mailboxes, max_payload: usize) -> Result<Self> {
        Ok(SocketTransport {
            endpoint: Endpoint::bind(addr)?,
            mailboxes,
            max_payload,
        })
    }

    fn serve(&self, stream: TcpStream) -> Result<()> {
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = BufWriter::new(stream);
        loop {
            let state: Option<StateMessage> = frame::read_frame(&mut reader, self.max_payload)?;
            let Some(state) = state else {
                info!("simulator disconnected");
                return Ok(());
            };
            let action = exchange(&self.mailboxes, state)?;
            frame::write_frame(&mut writer, &action)?;
            debug!(index = action.index, "sent action");
        }
    }
}

impl Transport for SocketTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Socket
    }

    fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr
    }

    #[instrument(skip(self), fields(addr = %self.endpoint.local_addr))]
    fn start(&self) -> Result<()> {
        let Some(listener) = self.endpoint.take_listener()? else {
            return Ok(());
        };
        info!("listening for the simulator");
        let Some(stream) = self.endpoint.accept(&listener)? else {
            return Ok(());
        };
        // the single connection is all this transport serves
        drop(listener);

        let result = self.serve(stream);
        self.endpoint.release_connection();
        match result {
            Err(e) if e.is_disconnect() || self.endpoint.is_stopped() => {
                warn!(error = %e, "connection closed");
                Ok(())
            }
            other => other,
        }
    }

    fn stop(&self) {
        self.endpoint.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::error::BridgeError;
    use crate::message::{ActionMessage, MessageType, PlayerNumber};

    fn start(capacity: usize) -> (Arc<SocketTransport>, Mailboxes, thread::JoinHandle<Result<()>>) {
        let mailboxes = Mailboxes::new();
        let transport =
            Arc::new(SocketTransport::bind("127.0.0.1:0", mailboxes.clone(), capacity).unwrap());
        let server = transport.clone();
        let handle = thread::spawn(move || server.start());
        (transport, mailboxes, handle)
    }

    fn state(message_type: MessageType) -> StateMessage {
        StateMessage {
            player_number: PlayerNumber::One,
            message_type,
            step: 1,
            state: vec![0.25],
            mask: vec![1],
        }
    }

    #[test]
    fn relays_states_and_actions() {
        let (transport, mailboxes, handle) = start(1024);
        let mut client = TcpStream::connect(transport.local_addr()).unwrap();

        frame::write_frame(&mut client, &state(MessageType::EpisodeStarts)).unwrap();
        assert_eq!(mailboxes.state.take().unwrap(), state(MessageType::EpisodeStarts));
        mailboxes
            .action
            .put(ActionMessage::new(PlayerNumber::One, 0))
            .unwrap();
        let reply: ActionMessage = frame::read_frame(&mut client, 1024).unwrap().unwrap();
        assert_eq!(reply.index, 0);

        drop(client);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn oversized_frame_ends_the_loop() {
        let (transport, mailboxes, handle) = start(16);
        let mut client = TcpStream::connect(transport.local_addr()).unwrap();
        frame::write_frame(&mut client, &state(MessageType::EpisodeStarts)).unwrap();

        let err = handle.join().unwrap().unwrap_err();
        assert!(matches!(err, BridgeError::OversizedMessage { capacity: 16, .. }));
        assert!(mailboxes.state.is_empty());
    }

    #[test]
    fn garbage_is_malformed() {
        let (transport, _mailboxes, handle) = start(1024);
        let mut client = TcpStream::connect(transport.local_addr()).unwrap();
        client.write_all(&frame::frame_payload(b"{oops").unwrap()).unwrap();

        let err = handle.join().unwrap().unwrap_err();
        assert!(matches!(err, BridgeError::MalformedPayload(_)));
    }

    #[test]
    fn stop_unblocks_accept() {
        let (transport, _mailboxes, handle) = start(1024);
        thread::sleep(std::time::Duration::from_millis(20));
        transport.stop();
        handle.join().unwrap().unwrap();
    }
}
