//! MRPC/2 frame encoding and decoding.
//!
//! A frame is a start line carrying the header and body byte lengths, a
//! CRLF-separated header block terminated by a blank line, and a JSON body
//! terminated by a single newline:
//!
//! ```text
//! MRPC/2 <headerLen> <bodyLen>\r\n
//! Type: request\r\n
//! ...
//! \r\n
//! {"type":"collectionSearch",...}\n
//! ```
//!
//! `headerLen` covers the header lines plus the blank line that ends the
//! block. Decoding is incremental: [`Frame::decode`] returns `Ok(None)` until
//! the buffer holds a whole frame, so callers can keep appending socket reads.
use std::sync::LazyLock;

use regex::bytes::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use super::Request;

pub(crate) const PROTOCOL: &str = "MRPC/2";
pub(crate) const SCHEMA_VERSION: u32 = 14;
pub(crate) const APPLICATION_NAME: &str = "Quicksilver";
pub(crate) const APPLICATION_VERSION: &str = "1.2";

/// Longest prefix we accept while waiting for the start line's CRLF.
const MAX_START_LINE: usize = 64;
/// Largest header plus body length a frame may announce.
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

static START_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^MRPC/2 (\d+) (\d+)\r\n").expect("start line pattern"));

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed start line: {0:?}")]
    StartLine(String),

    #[error("malformed header line: {0:?}")]
    HeaderLine(String),

    #[error("announced frame of {0} bytes is too large")]
    TooLarge(String),

    #[error("missing or invalid RpcId header")]
    RpcId,

    #[error("frame body is not a JSON object: {0}")]
    Body(String),

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Lengths announced by a frame's start line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartLine {
    pub len: usize,
    pub head_len: usize,
    pub body_len: usize,
}

impl StartLine {
    /// Total bytes the announced frame occupies.
    pub fn frame_len(&self) -> Option<usize> {
        self.len.checked_add(self.head_len)?.checked_add(self.body_len)
    }

    /// Parses the start line at the beginning of `buf`.
    ///
    /// Returns `Ok(None)` while the line may still be incomplete.
    pub fn parse(buf: &[u8]) -> Result<Option<Self>, FrameError> {
        if let Some(caps) = START_LINE.captures(buf) {
            let len = caps[0].len();
            let head_len = parse_len(&caps[1])?;
            let body_len = parse_len(&caps[2])?;
            match head_len.checked_add(body_len) {
                Some(total) if total <= MAX_FRAME_LEN => {}
                _ => {
                    return Err(FrameError::TooLarge(format!("{head_len} + {body_len}")));
                }
            }
            return Ok(Some(Self {
                len,
                head_len,
                body_len,
            }));
        }

        let line_end = buf.windows(2).position(|w| w == b"\r\n");
        let could_still_match = PROTOCOL
            .as_bytes()
            .iter()
            .zip(buf)
            .all(|(expected, got)| expected == got);

        if line_end.is_some() || !could_still_match || buf.len() > MAX_START_LINE {
            let end = line_end.unwrap_or(buf.len()).min(MAX_START_LINE);
            return Err(FrameError::StartLine(
                String::from_utf8_lossy(&buf[..end]).into_owned(),
            ));
        }
        Ok(None)
    }
}

fn parse_len(digits: &[u8]) -> Result<usize, FrameError> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| FrameError::StartLine(String::from_utf8_lossy(digits).into_owned()))
}

/// A decoded MRPC/2 message.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub rpc_id: u64,
    headers: Vec<(String, String)>,
    body: Map<String, Value>,
}

impl Frame {
    /// Value of the first header named `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn into_body(self) -> Map<String, Value> {
        self.body
    }

    /// Attempts to decode one frame from the front of `buf`.
    ///
    /// On success returns the frame and the number of bytes it occupied. Any
    /// bytes past that count belong to the next frame and are left to the
    /// caller.
    pub fn decode(buf: &[u8]) -> Result<Option<(Frame, usize)>, FrameError> {
        let Some(start) = StartLine::parse(buf)? else {
            return Ok(None);
        };

        let (Some(head_end), Some(need_len)) =
            (start.len.checked_add(start.head_len), start.frame_len())
        else {
            return Err(FrameError::TooLarge(format!(
                "{} + {}",
                start.head_len, start.body_len
            )));
        };
        if buf.len() < need_len {
            return Ok(None);
        }

        let head = &buf[start.len..head_end];
        let body = &buf[need_len - start.body_len..need_len];

        let headers = parse_headers(head)?;
        let rpc_id = headers
            .iter()
            .find(|(key, _)| key == "RpcId")
            .and_then(|(_, value)| value.parse::<u64>().ok())
            .ok_or(FrameError::RpcId)?;

        let body = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => map,
            Ok(other) => return Err(FrameError::Body(format!("got {other}"))),
            Err(e) => return Err(FrameError::Body(e.to_string())),
        };

        Ok(Some((
            Frame {
                rpc_id,
                headers,
                body,
            },
            need_len,
        )))
    }
}

fn parse_headers(head: &[u8]) -> Result<Vec<(String, String)>, FrameError> {
    let head = std::str::from_utf8(head)
        .map_err(|_| FrameError::HeaderLine(String::from_utf8_lossy(head).into_owned()))?;

    head.split("\r\n")
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.split_once(':')
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
                .ok_or_else(|| FrameError::HeaderLine(line.to_string()))
        })
        .collect()
}

/// Encodes `request` into the exact bytes sent on the wire.
pub fn encode(request: &Request, session_id: u32, rpc_id: u64) -> Result<Vec<u8>, FrameError> {
    let body_id = match request.fields().get("bodyId") {
        Some(Value::String(id)) => id.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let response_count = if request.is_monitor() { "multiple" } else { "single" };

    let mut headers = [
        "Type: request".to_string(),
        format!("RpcId: {rpc_id}"),
        format!("SchemaVersion: {SCHEMA_VERSION}"),
        "Content-Type: application/json".to_string(),
        format!("RequestType: {}", request.kind()),
        format!("ResponseCount: {response_count}"),
        format!("BodyId: {body_id}"),
        format!("X-ApplicationName: {APPLICATION_NAME}"),
        format!("X-ApplicationVersion: {APPLICATION_VERSION}"),
        format!("X-ApplicationSessionId: 0x{session_id:x}"),
    ]
    .join("\r\n");
    headers.push_str("\r\n");

    let mut body = request.fields().clone();
    body.insert("type".to_string(), Value::String(request.kind().to_string()));
    let mut body = serde_json::to_string(&body)?;
    body.push('\n');

    // +2 for the CRLF joining the header block to the body.
    let start_line = format!("{PROTOCOL} {} {}", headers.len() + 2, body.len());

    Ok([start_line, headers, body].join("\r\n").into_bytes())
}
