//! Authenticated connections to the Mind service.
//!
//! A [`Session`] owns one stream, a random session id sent with every
//! request, and a request counter. It is created by authenticating and then
//! used for any number of strictly sequential [`call`](MindRpc::call)s.
//!
//! # Errors
//!
//! Every failure surfaces as a [`MindError`]:
//!
//! - [`MindError::Connection`]: the stream failed, closed mid-frame, timed out
//!   or carried an undecodable frame. The session is unusable afterwards:
//!   later calls fail with [`MindError::Protocol`] without writing anything.
//! - [`MindError::Auth`]: the service rejected the credential, including an
//!   `internalError` reply to the handshake.
//! - [`MindError::MindTimeout`]: the service answered `mindUnavailable`; the
//!   same request can be retried, see [`retry_unavailable`].
//! - [`MindError::MindInternal`]: the service failed this query.
//! - [`MindError::Service`] and [`MindError::Protocol`]: any other error
//!   envelope, or a response that breaks the protocol's expectations.
use std::{
    fmt,
    io::{Read, Write},
    ops::Range,
};

use log::{debug, error, info, warn};
use rand::Rng;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::{
    MindConfig,
    protocol::{ProtocolTransport, Request, RequestKind, Response, ResponseError, TransportError},
    tls::{self, TlsStream},
};

/// Range the service expects `X-ApplicationSessionId` to fall in.
pub const SESSION_ID_RANGE: Range<u32> = 0x26C000..0x27DC20;

#[derive(Debug, Error)]
pub enum MindError {
    #[error("connection error: {0}")]
    Connection(#[from] TransportError),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("mind unavailable, try again")]
    MindTimeout,

    #[error("mind internal error: {0}")]
    MindInternal(String),

    #[error("service error [{code}]: {text}")]
    Service { code: String, text: String },

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<ResponseError> for MindError {
    fn from(value: ResponseError) -> Self {
        match value {
            ResponseError::Unavailable => MindError::MindTimeout,
            ResponseError::Internal { text } => MindError::MindInternal(text),
            ResponseError::Other { code, text } => MindError::Service { code, text },
        }
    }
}

/// Account used to authenticate a session.
#[derive(Clone)]
pub struct Credential {
    pub username: String,
    password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &crate::protocol::redact::REDACTED)
            .finish()
    }
}

/// Request/response round trips against the Mind service.
pub trait MindRpc {
    /// Sends one request and returns its response.
    ///
    /// Error envelopes are returned as `Err`, never as a successful response.
    fn call(&mut self, request: Request) -> Result<Response, MindError>;
}

/// One authenticated connection.
pub struct Session<T: Read + Write> {
    transport: ProtocolTransport<T>,
    session_id: u32,
    rpc_id: u64,
    /// Set once the stream can no longer be trusted to be in sync.
    broken: bool,
}

impl Session<TlsStream> {
    /// Connects over TLS and authenticates.
    pub fn connect(config: &MindConfig, credential: Credential) -> Result<Self, MindError> {
        let stream = tls::connect(config)?;
        Session::new(stream, credential)
    }
}

impl<T: Read + Write> Session<T> {
    /// Authenticates over an already-open stream.
    pub fn new(stream: T, credential: Credential) -> Result<Self, MindError> {
        let session_id = rand::thread_rng().gen_range(SESSION_ID_RANGE);
        let mut session = Self {
            transport: ProtocolTransport::new(stream),
            session_id,
            rpc_id: 0,
            broken: false,
        };
        debug!("session id 0x{session_id:x}");

        session.authenticate(credential)?;
        Ok(session)
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    /// Returns the id for the next request and advances the counter.
    pub fn next_rpc_id(&mut self) -> u64 {
        let id = self.rpc_id;
        self.rpc_id += 1;
        id
    }

    pub fn get_ref(&self) -> &T {
        self.transport.get_ref()
    }

    fn authenticate(&mut self, credential: Credential) -> Result<(), MindError> {
        let request = Request::new(RequestKind::BodyAuthenticate).field(
            "credential",
            json!({
                "type": "mmaCredential",
                "username": credential.username,
                "password": credential.password,
            }),
        );

        let resp = match self.round_trip(&request) {
            Ok(resp) => resp,
            Err(MindError::Service { code, text }) => {
                error!("authentication rejected [{code}]: {text}");
                return Err(MindError::Auth(text));
            }
            Err(MindError::MindInternal(text)) => {
                error!("authentication rejected [internalError]: {text}");
                return Err(MindError::Auth(text));
            }
            Err(e) => return Err(e),
        };

        match resp.get("status").and_then(Value::as_str) {
            Some("success") | None => {
                info!("authenticated as {}", credential.username);
                Ok(())
            }
            Some(status) => {
                let message = resp
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or(status)
                    .to_string();
                error!("authentication failed with status {status}: {message}");
                Err(MindError::Auth(message))
            }
        }
    }

    /// Whether an earlier connection or sequencing failure closed the session.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    fn round_trip(&mut self, request: &Request) -> Result<Response, MindError> {
        if self.broken {
            return Err(MindError::Protocol(
                "session unusable after an earlier connection error".into(),
            ));
        }

        let rpc_id = self.next_rpc_id();
        let frame = match self
            .transport
            .write_request(request, self.session_id, rpc_id)
            .and_then(|_| self.transport.read_frame())
        {
            Ok(frame) => frame,
            Err(e) => {
                self.broken = true;
                return Err(e.into());
            }
        };

        if frame.rpc_id != rpc_id {
            self.broken = true;
            return Err(MindError::Protocol(format!(
                "expected response to rpc {rpc_id}, got {}",
                frame.rpc_id
            )));
        }

        let resp = Response::from(frame);
        match resp.error() {
            None => Ok(resp),
            Some(ResponseError::Unavailable) => {
                warn!("{} rpc {rpc_id}: mind unavailable", request.kind());
                Err(MindError::MindTimeout)
            }
            Some(e) => Err(e.into()),
        }
    }
}

impl<T: Read + Write> MindRpc for Session<T> {
    fn call(&mut self, request: Request) -> Result<Response, MindError> {
        self.round_trip(&request)
    }
}

/// Convenience for building a request from a type name and field map.
pub fn call_with<R: MindRpc + ?Sized>(
    rpc: &mut R,
    kind: &str,
    fields: Map<String, Value>,
) -> Result<Response, MindError> {
    rpc.call(Request::with_fields(kind, fields))
}

/// Runs `op` until it stops failing with [`MindError::MindTimeout`], at most
/// `attempts` times. Every other error is returned immediately.
pub fn retry_unavailable<F, V>(attempts: usize, mut op: F) -> Result<V, MindError>
where
    F: FnMut() -> Result<V, MindError>,
{
    let attempts = attempts.max(1);
    let mut tries = 0;
    loop {
        tries += 1;
        match op() {
            Err(MindError::MindTimeout) if tries < attempts => {
                warn!("mind unavailable, retrying ({tries}/{attempts})");
            }
            res => return res,
        }
    }
}
