//! HTTP transport: one chunked `POST /` per decision point.
//!
//! Requests are served one at a time; the connection is kept open between requests unless the
//! simulator asks otherwise, and a new connection is accepted once it closes.

use std::io::{BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};

use tracing::{debug, info, instrument, warn};

use super::{exchange, Endpoint, Transport, TransportKind};
use crate::codec::http;
use crate::error::{BridgeError, Result};
use crate::mailbox::Mailboxes;
use crate::message::StateMessage;

/// HTTP server relaying state requests to the mailboxes.
#[derive(Debug)]
pub struct HttpTransport {
    endpoint: Endpoint,
    mailboxes: Mailboxes,
    max_payload: usize,
}

impl HttpTransport {
    /// Bind on `addr`. Bodies above `max_payload` bytes are rejected.
    pub fn bind(addr: impl ToSocketAddrs, mailboxes: Mailboxes, max_payload: usize) -> Result<Self> {
        Ok(HttpTransport {
            endpoint: Endpoint::bind(addr)?,
            mailboxes,
            max_payload,
        })
    }

    /// Serve requests on `stream` until the client closes it.
    fn serve(&self, stream: TcpStream) -> Result<()> {
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = stream;
        loop {
            let Some(head) = http::read_request_head(&mut reader)? else {
                return Ok(());
            };
            if !head.method.eq_ignore_ascii_case("POST") {
                warn!(method = %head.method, "rejecting non-POST request");
                return http::write_status(&mut writer, 405, "Method Not Allowed");
            }
            if !head.targets_root() {
                warn!(path = %head.path, "rejecting request outside /");
                return http::write_status(&mut writer, 404, "Not Found");
            }

            let body = http::read_body(&mut reader, &head, self.max_payload)?;
            let state: StateMessage = crate::codec::from_json(&body)?;
            let action = exchange(&self.mailboxes, state)?;

            let keep_alive = head.keep_alive();
            let response = http::encode_response(&action, keep_alive)?;
            writer
                .write_all(&response)
                .and_then(|()| writer.flush())
                .map_err(BridgeError::from_read)?;
            debug!(index = action.index, "sent action");

            if !keep_alive {
                return Ok(());
            }
        }
    }
}

impl Transport for HttpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
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

        while let Some(stream) = self.endpoint.accept(&listener)? {
            let result = self.serve(stream);
            self.endpoint.release_connection();
            match result {
                Ok(()) => {}
                Err(_) if self.endpoint.is_stopped() => break,
                Err(e) if e.is_disconnect() => {
                    warn!(error = %e, "simulator dropped the connection");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
            if self.endpoint.is_stopped() {
                break;
            }
        }
        info!("stopped listening");
        Ok(())
    }

    fn stop(&self) {
        self.endpoint.stop();
    }
}
