//! Length-prefixed framing used by the socket transport.
//!
//! ```text
//! +----------------+------------------+
//! | Length (4B BE) | JSON Payload     |
//! +----------------+------------------+
//! ```
//!
//! A reader always accumulates exactly the declared length before parsing. A frame that
//! declares more than the receive capacity is rejected, never truncated.

use std::io::{ErrorKind, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{from_json, to_json};
use crate::error::{BridgeError, Result};

const PREFIX_LEN: usize = 4;

/// Frame an already serialized payload.
pub fn frame_payload(payload: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(payload.len()).map_err(|_| BridgeError::OversizedMessage {
        size: payload.len(),
        capacity: u32::MAX as usize,
    })?;
    let mut out = Vec::with_capacity(PREFIX_LEN + payload.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Encode `msg` as one frame.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    frame_payload(&to_json(msg)?)
}

/// Decode one complete frame held in `bytes`.
///
/// Trailing bytes after the declared payload are ignored.
pub fn decode<T: DeserializeOwned>(bytes: &[u8], capacity: usize) -> Result<T> {
    let Some(prefix) = bytes.get(..PREFIX_LEN) else {
        return Err(BridgeError::malformed("frame shorter than its length prefix"));
    };
    let len = declared_len(prefix, capacity)?;
    let payload = bytes.get(PREFIX_LEN..PREFIX_LEN + len).ok_or_else(|| {
        BridgeError::malformed(format!(
            "frame declares {len} bytes, only {} available",
            bytes.len() - PREFIX_LEN
        ))
    })?;
    from_json(payload)
}

/// Read one frame from `reader`.
///
/// Returns `Ok(None)` when the peer closes the stream cleanly between frames. A stream that
/// ends inside a frame is malformed; a reset connection is
/// [`BridgeError::ConnectionTerminated`].
pub fn read_frame<T: DeserializeOwned>(
    reader: &mut impl Read,
    capacity: usize,
) -> Result<Option<T>> {
    let mut prefix = [0u8; PREFIX_LEN];
    let filled = fill(reader, &mut prefix)?;
    if filled == 0 {
        return Ok(None);
    }
    if filled < PREFIX_LEN {
        return Err(BridgeError::malformed(format!(
            "stream ended after {filled} of {PREFIX_LEN} length bytes"
        )));
    }

    let len = declared_len(&prefix, capacity)?;
    let mut payload = vec![0u8; len];
    let filled = fill(reader, &mut payload)?;
    if filled < len {
        return Err(BridgeError::malformed(format!(
            "stream ended after {filled} of {len} payload bytes"
        )));
    }

    from_json(&payload).map(Some)
}

/// Write `msg` as one frame and flush.
pub fn write_frame<T: Serialize>(writer: &mut impl Write, msg: &T) -> Result<()> {
    let frame = encode(msg)?;
    writer.write_all(&frame).map_err(BridgeError::from_read)?;
    writer.flush().map_err(BridgeError::from_read)?;
    Ok(())
}

fn declared_len(prefix: &[u8], capacity: usize) -> Result<usize> {
    let mut raw = [0u8; PREFIX_LEN];
    raw.copy_from_slice(prefix);
    let len = u32::from_be_bytes(raw) as usize;
    if len > capacity {
        return Err(BridgeError::OversizedMessage {
            size: len,
            capacity,
        });
    }
    Ok(len)
}

/// Read until `buf` is full or the stream ends, returning the number of bytes read.
fn fill(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(BridgeError::from_read(e)),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::DEFAULT_MAX_PAYLOAD;
    use crate::message::{ActionMessage, MessageType, PlayerNumber, StateMessage};

    fn state() -> StateMessage {
        StateMessage {
            player_number: PlayerNumber::One,
            message_type: MessageType::EpisodeStarts,
            step: 0,
            state: vec![0.0, 0.125, 1.0],
            mask: vec![1, 0, 1, 1],
        }
    }

    #[test]
    fn state_roundtrip() {
        let bytes = encode(&state()).unwrap();
        let back: StateMessage = decode(&bytes, DEFAULT_MAX_PAYLOAD).unwrap();
        assert_eq!(back, state());
    }

    #[test]
    fn length_prefix_is_big_endian() {
        let bytes = encode(&ActionMessage::new(PlayerNumber::Two, 5)).unwrap();
        let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        assert_eq!(len, bytes.len() - 4);
        assert_eq!(&bytes[4..], br#"{"player_number":2,"index":5}"#);
    }

    #[test]
    fn frames_are_read_back_to_back() {
        let mut buf = encode(&state()).unwrap();
        buf.extend(encode(&state()).unwrap());
        let mut cursor = Cursor::new(buf);

        for _ in 0..2 {
            let msg: StateMessage = read_frame(&mut cursor, DEFAULT_MAX_PAYLOAD)
                .unwrap()
                .unwrap();
            assert_eq!(msg, state());
        }
        let end: Option<StateMessage> = read_frame(&mut cursor, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(end.is_none());
    }

    /// Hands out at most `step` bytes per read, like a socket under load.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn split_reads_are_accumulated() {
        let mut reader = Trickle {
            data: encode(&state()).unwrap(),
            pos: 0,
            step: 3,
        };
        let msg: StateMessage = read_frame(&mut reader, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(msg, state());
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let bytes = encode(&state()).unwrap();
        let capacity = bytes.len() - 5;
        let err = read_frame::<StateMessage>(&mut Cursor::new(bytes), capacity).unwrap_err();
        assert!(matches!(err, BridgeError::OversizedMessage { capacity: c, .. } if c == capacity));
    }

    #[test]
    fn truncated_frame_is_malformed() {
        let mut bytes = encode(&state()).unwrap();
        bytes.truncate(bytes.len() - 2);
        let err = read_frame::<StateMessage>(&mut Cursor::new(bytes.clone()), DEFAULT_MAX_PAYLOAD)
            .unwrap_err();
        assert!(matches!(err, BridgeError::MalformedPayload(_)));
        assert!(decode::<StateMessage>(&bytes, DEFAULT_MAX_PAYLOAD).is_err());

        let err = read_frame::<StateMessage>(&mut Cursor::new(vec![0u8, 0]), DEFAULT_MAX_PAYLOAD)
            .unwrap_err();
        assert!(matches!(err, BridgeError::MalformedPayload(_)));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let bytes = frame_payload(b"not json").unwrap();
        let err = decode::<StateMessage>(&bytes, DEFAULT_MAX_PAYLOAD).unwrap_err();
        assert!(matches!(err, BridgeError::MalformedPayload(_)));
    }
}
