//! MRPC/2 wire protocol.
//!
//! This module defines the framing used to talk to the Mind metadata service:
//! how requests are laid out on the wire, how responses are parsed back out
//! of a byte stream, and how the service's error envelope is recognised.
//!
//! # Overview
//!
//! Every message is a length-prefixed frame made of a start line, a block of
//! `Name: value` headers and a JSON body. The protocol is strictly
//! request/response: a client writes one request and then reads exactly one
//! response carrying the same `RpcId`.
//!
//! # Key Components
//!
//! - [`Request`]: a request type plus the JSON fields of its body.
//! - [`Frame`]: a decoded message; [`frame::encode`] produces the wire bytes.
//! - [`Response`]: a response body with its error envelope classified.
//! - [`ProtocolTransport`]: buffered framing over any `Read + Write` stream.
//!
//! # Binary Format
//!
//! - The start line is `MRPC/2 <headerLen> <bodyLen>\r\n`.
//! - Header lines are CRLF terminated and the block ends with a blank line;
//!   `headerLen` includes that blank line.
//! - The body is UTF-8 JSON followed by a single `\n`; `bodyLen` counts bytes.
//!
//! # Logging
//!
//! Outbound frames are logged at `debug` after passing through [`redact`],
//! so credentials never reach the log.
//!
//! # See Also
//!
//! - [`session`](crate::session): authenticated connections built on this layer.
pub mod frame;
pub mod redact;
mod request;
mod response;
mod transport;

pub use frame::{Frame, FrameError};
pub use redact::redact;
pub use request::{Request, RequestKind};
pub use response::{Response, ResponseError};
pub use transport::{ProtocolTransport, TransportError};
