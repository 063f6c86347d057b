//! HTTP framing used by the HTTP transport.
//!
//! The simulator sends one `POST /` per decision point. The request body carries the JSON
//! state with chunked transfer-encoding:
//!
//! ```text
//! POST / HTTP/1.1\r\n
//! Transfer-Encoding: chunked\r\n
//! \r\n
//! 1a\r\n
//! {"player_number":1,...}\r\n
//! 0\r\n
//! \r\n
//! ```
//!
//! The reply is a single unchunked JSON body with status `200` and
//! `Content-Type: application/json`. Bodies sent with `Content-Length` are accepted too.

use std::io::{BufRead, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{from_json, to_json};
use crate::error::{BridgeError, Result};

/// Longest accepted request line, header line or chunk-size line.
const MAX_LINE: u64 = 8 * 1024;
/// Most header lines accepted in one request.
const MAX_HEADERS: usize = 64;

/// Request line and headers of an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    /// Request method, e.g. `POST`.
    pub method: String,
    /// Request target, e.g. `/`.
    pub path: String,
    /// Protocol version, e.g. `HTTP/1.1`.
    pub version: String,
    /// Header name/value pairs in arrival order.
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    /// First value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        header(&self.headers, name)
    }

    /// True if the body uses chunked transfer-encoding.
    pub fn is_chunked(&self) -> bool {
        is_chunked(&self.headers)
    }

    /// Parsed `Content-Length`, if present.
    pub fn content_length(&self) -> Result<Option<usize>> {
        content_length(&self.headers)
    }

    /// True if the request targets the root resource, query string aside.
    pub fn targets_root(&self) -> bool {
        self.path.split('?').next() == Some("/")
    }

    /// True if the connection stays open after the response.
    pub fn keep_alive(&self) -> bool {
        match self.header("connection") {
            Some(v) if v.eq_ignore_ascii_case("close") => false,
            Some(v) if v.eq_ignore_ascii_case("keep-alive") => true,
            _ => self.version == "HTTP/1.1",
        }
    }
}

/// Read a request line and its headers.
///
/// Returns `Ok(None)` if the stream ends before the request line starts.
pub fn read_request_head(reader: &mut impl BufRead) -> Result<Option<RequestHead>> {
    let Some(request_line) = read_line(reader)? else {
        return Ok(None);
    };
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(path), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(BridgeError::malformed(format!(
            "invalid request line '{request_line}'"
        )));
    };
    Ok(Some(RequestHead {
        method: method.to_string(),
        path: path.to_string(),
        version: version.to_string(),
        headers: read_headers(reader)?,
    }))
}

/// Read the body announced by `head`.
pub fn read_body(reader: &mut impl BufRead, head: &RequestHead, capacity: usize) -> Result<Vec<u8>> {
    read_message_body(reader, &head.headers, capacity)
}

fn read_message_body(
    reader: &mut impl BufRead,
    headers: &[(String, String)],
    capacity: usize,
) -> Result<Vec<u8>> {
    if is_chunked(headers) {
        return read_chunked_body(reader, capacity);
    }
    let len = content_length(headers)?.unwrap_or(0);
    if len > capacity {
        return Err(BridgeError::OversizedMessage {
            size: len,
            capacity,
        });
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).map_err(truncated)?;
    Ok(body)
}

/// Read a chunked body up to and including its terminating zero-length chunk and trailers.
pub fn read_chunked_body(reader: &mut impl BufRead, capacity: usize) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let line = read_line(reader)?
            .ok_or_else(|| BridgeError::malformed("stream ended before the last chunk"))?;
        // chunk extensions are ignored
        let size_text = line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_text, 16)
            .map_err(|_| BridgeError::malformed(format!("invalid chunk size '{line}'")))?;

        if size == 0 {
            // trailers, up to the empty line
            loop {
                let trailer = read_line(reader)?
                    .ok_or_else(|| BridgeError::malformed("stream ended inside the trailers"))?;
                if trailer.is_empty() {
                    return Ok(body);
                }
            }
        }

        let start = body.len();
        let total = match start.checked_add(size) {
            Some(total) if total <= capacity => total,
            total => {
                return Err(BridgeError::OversizedMessage {
                    size: total.unwrap_or(usize::MAX),
                    capacity,
                })
            }
        };
        body.resize(total, 0);
        reader.read_exact(&mut body[start..]).map_err(truncated)?;

        let end = read_line(reader)?;
        if end.as_deref() != Some("") {
            return Err(BridgeError::malformed("chunk data not followed by CRLF"));
        }
    }
}

/// Encode `payload` as a chunked body, `chunk_size` bytes per chunk.
pub fn encode_chunked(payload: &[u8], chunk_size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 16);
    for chunk in payload.chunks(chunk_size.max(1)) {
        out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}

/// Encode `msg` as a complete chunked `POST /` request.
pub fn encode_request<T: Serialize>(msg: &T, chunk_size: usize) -> Result<Vec<u8>> {
    let body = encode_chunked(&to_json(msg)?, chunk_size);
    let mut out = b"POST / HTTP/1.1\r\n\
        Host: localhost\r\n\
        Content-Type: application/json\r\n\
        Transfer-Encoding: chunked\r\n\r\n"
        .to_vec();
    out.extend(body);
    Ok(out)
}

/// Read one request and decode its JSON body.
///
/// Returns `Ok(None)` on a clean end of stream before the request line.
pub fn decode_request<T: DeserializeOwned>(
    reader: &mut impl BufRead,
    capacity: usize,
) -> Result<Option<(RequestHead, T)>> {
    let Some(head) = read_request_head(reader)? else {
        return Ok(None);
    };
    let body = read_body(reader, &head, capacity)?;
    Ok(Some((head, from_json(&body)?)))
}

/// Encode `msg` as a `200 OK` JSON response.
pub fn encode_response<T: Serialize>(msg: &T, keep_alive: bool) -> Result<Vec<u8>> {
    let body = to_json(msg)?;
    let mut out = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: {}\r\n\r\n",
        body.len(),
        if keep_alive { "keep-alive" } else { "close" },
    )
    .into_bytes();
    out.extend(body);
    Ok(out)
}

/// Write a bodiless error status and close semantics.
pub fn write_status(writer: &mut impl Write, status: u16, reason: &str) -> Result<()> {
    write!(
        writer,
        "HTTP/1.1 {status} {reason}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
    )
    .map_err(BridgeError::from_read)?;
    writer.flush().map_err(BridgeError::from_read)
}

/// Read a `200` JSON response, client side.
pub fn read_response<T: DeserializeOwned>(reader: &mut impl BufRead, capacity: usize) -> Result<T> {
    let status_line = read_line(reader)?.ok_or(BridgeError::ConnectionTerminated)?;
    let status = status_line.split_whitespace().nth(1);
    if status != Some("200") {
        return Err(BridgeError::malformed(format!(
            "unexpected status line '{status_line}'"
        )));
    }
    let headers = read_headers(reader)?;
    let body = read_message_body(reader, &headers, capacity)?;
    from_json(&body)
}

/// Read header lines up to the empty line closing the head.
fn read_headers(reader: &mut impl BufRead) -> Result<Vec<(String, String)>> {
    let mut headers = Vec::new();
    loop {
        let line = read_line(reader)?
            .ok_or_else(|| BridgeError::malformed("stream ended inside the headers"))?;
        if line.is_empty() {
            return Ok(headers);
        }
        if headers.len() == MAX_HEADERS {
            return Err(BridgeError::malformed("too many headers"));
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| BridgeError::malformed(format!("invalid header line '{line}'")))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn is_chunked(headers: &[(String, String)]) -> bool {
    header(headers, "transfer-encoding").is_some_and(|v| v.to_ascii_lowercase().contains("chunked"))
}

fn content_length(headers: &[(String, String)]) -> Result<Option<usize>> {
    header(headers, "content-length")
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| BridgeError::malformed(format!("invalid Content-Length '{v}'")))
        })
        .transpose()
}

/// Read one CRLF (or LF) terminated line without its terminator.
///
/// `Ok(None)` means the stream ended before any byte of the line.
fn read_line(reader: &mut impl BufRead) -> Result<Option<String>> {
    let mut raw = Vec::new();
    reader
        .by_ref()
        .take(MAX_LINE)
        .read_until(b'\n', &mut raw)
        .map_err(BridgeError::from_read)?;
    if raw.is_empty() {
        return Ok(None);
    }
    if raw.last() != Some(&b'\n') {
        return Err(BridgeError::malformed(if raw.len() as u64 >= MAX_LINE {
            "line too long"
        } else {
            "stream ended inside a line"
        }));
    }
    raw.pop();
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    String::from_utf8(raw)
        .map(Some)
        .map_err(|_| BridgeError::malformed("line is not UTF-8"))
}

fn truncated(e: std::io::Error) -> BridgeError {
    match BridgeError::from_read(e) {
        BridgeError::ConnectionTerminated => BridgeError::malformed("stream ended inside the body"),
        other => other,
    }
}
