//! Wire codecs.
//!
//! Both transports carry the same JSON payload (see [`crate::message`]) and differ only in
//! how the payload is framed:
//!
//! - [`frame`]: 4-byte big-endian length prefix followed by the payload (socket transport)
//! - [`http`]: chunked `POST` request body, unchunked JSON response (HTTP transport)

pub mod frame;
pub mod http;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{BridgeError, Result};

/// Default receive capacity for a single payload.
pub const DEFAULT_MAX_PAYLOAD: usize = 1 << 20;

/// Serialize `msg` to its JSON payload.
pub fn to_json<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(msg)?)
}

/// Parse a JSON payload. The payload must be UTF-8.
pub fn from_json<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| BridgeError::malformed(format!("payload is not UTF-8: {e}")))?;
    Ok(serde_json::from_str(text)?)
}
