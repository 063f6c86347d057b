//! Scripted stand-ins for the game engine, one per framing.

use std::io::{BufReader, Write};
use std::net::{SocketAddr, TcpStream};

use sim_bridge::codec::{frame, http, DEFAULT_MAX_PAYLOAD};
use sim_bridge::error::{BridgeError, Result};
use sim_bridge::message::{ActionMessage, MessageType, PlayerNumber, StateMessage};
use sim_bridge::transport::TransportKind;

pub const OBSERVATION_WIDTH: usize = 4;
pub const ACTION_WIDTH: usize = 6;

/// One state sent, one action back.
pub trait Simulator: Send {
    fn send(&mut self, msg: &StateMessage) -> Result<ActionMessage>;
}

pub struct SocketSimulator {
    stream: TcpStream,
}

impl SocketSimulator {
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        Ok(SocketSimulator {
            stream: TcpStream::connect(addr)?,
        })
    }

    /// Raw bytes, for malformed input.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes)?;
        Ok(())
    }
}

impl Simulator for SocketSimulator {
    fn send(&mut self, msg: &StateMessage) -> Result<ActionMessage> {
        frame::write_frame(&mut self.stream, msg)?;
        frame::read_frame(&mut self.stream, DEFAULT_MAX_PAYLOAD)?
            .ok_or(BridgeError::ConnectionTerminated)
    }
}

/// Keep-alive client sending chunked requests.
pub struct HttpSimulator {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    chunk_size: usize,
}

impl HttpSimulator {
    pub fn connect(addr: SocketAddr, chunk_size: usize) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(HttpSimulator {
            stream,
            reader,
            chunk_size,
        })
    }
}

impl Simulator for HttpSimulator {
    fn send(&mut self, msg: &StateMessage) -> Result<ActionMessage> {
        self.stream
            .write_all(&http::encode_request(msg, self.chunk_size)?)?;
        http::read_response(&mut self.reader, DEFAULT_MAX_PAYLOAD)
    }
}

pub fn connect(kind: TransportKind, addr: SocketAddr) -> Result<Box<dyn Simulator>> {
    Ok(match kind {
        TransportKind::Socket => Box::new(SocketSimulator::connect(addr)?),
        TransportKind::Http => Box::new(HttpSimulator::connect(addr, 64)?),
    })
}

/// Every other action legal.
pub fn mask() -> Vec<u8> {
    (0..ACTION_WIDTH).map(|i| (i % 2 == 0) as u8).collect()
}

pub fn state(
    player_number: PlayerNumber,
    message_type: MessageType,
    step: u64,
    progress: f32,
) -> StateMessage {
    let mut state = vec![0.5; OBSERVATION_WIDTH];
    state[0] = progress;
    StateMessage {
        player_number,
        message_type,
        step,
        state,
        mask: mask(),
    }
}

/// `length` decisions, progress climbing linearly to `final_progress`.
pub fn episode(player_number: PlayerNumber, length: u64, final_progress: f32) -> Vec<StateMessage> {
    (0..=length)
        .map(|step| {
            let message_type = match step {
                0 => MessageType::EpisodeStarts,
                s if s == length => MessageType::EpisodeEnds,
                _ => MessageType::EpisodeContinues,
            };
            let progress = final_progress * step as f32 / length as f32;
            state(player_number, message_type, step, progress)
        })
        .collect()
}

/// Send the whole script, collecting the replies.
pub fn play(sim: &mut dyn Simulator, script: &[StateMessage]) -> Result<Vec<ActionMessage>> {
    script.iter().map(|msg| sim.send(msg)).collect()
}
