use std::io::{self, Read, Write};

use log::{debug, trace};
use thiserror::Error;

use super::{
    Frame, FrameError, Request,
    frame::{StartLine, encode},
    redact::redact,
};

/// Read size while the start line is still being located.
const START_LINE_CHUNK: usize = 16;
/// Read size once the frame's length is known.
const BODY_CHUNK: usize = 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport IO error: {0}")]
    Io(#[from] io::Error),
    #[error("connection closed with {buffered} bytes of an incomplete frame buffered")]
    Eof { buffered: usize },
    #[error("timed out waiting for a response")]
    Timeout,
    #[error("TLS error: {0}")]
    Tls(String),
    #[error("invalid frame: {0}")]
    Frame(#[from] FrameError),
}

/// Frames requests onto a byte stream and reads whole frames back.
///
/// Bytes read past the end of a frame are kept for the next
/// [`read_frame`](Self::read_frame).
pub struct ProtocolTransport<T: Read + Write> {
    stream: T,
    buffer: Vec<u8>,
}

impl<T: Read + Write> ProtocolTransport<T> {
    pub fn new(stream: T) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
        }
    }

    pub fn write_request(
        &mut self,
        request: &Request,
        session_id: u32,
        rpc_id: u64,
    ) -> Result<(), TransportError> {
        let bytes = encode(request, session_id, rpc_id)?;
        self.write_frame(&bytes)
    }

    /// Writes an already-encoded frame.
    pub fn write_frame(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if log::log_enabled!(log::Level::Debug) {
            debug!("SEND {}", redact(&String::from_utf8_lossy(bytes)));
        }
        self.stream.write_all(bytes).map_err(map_io)?;
        self.stream.flush().map_err(map_io)?;
        trace!("{} bytes written", bytes.len());
        Ok(())
    }

    pub fn read_frame(&mut self) -> Result<Frame, TransportError> {
        loop {
            if let Some((frame, used)) = Frame::decode(&self.buffer)? {
                self.buffer.drain(..used);
                debug!("READ rpc_id={} headers={:?}", frame.rpc_id, frame.headers());
                return Ok(frame);
            }

            let chunk = match StartLine::parse(&self.buffer)? {
                Some(_) => BODY_CHUNK,
                None => START_LINE_CHUNK,
            };
            self.fill(chunk)?;
        }
    }

    /// Bytes buffered but not yet consumed by a frame.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    pub fn get_ref(&self) -> &T {
        &self.stream
    }

    fn fill(&mut self, chunk: usize) -> Result<(), TransportError> {
        let mut buf = [0u8; BODY_CHUNK];
        let read = loop {
            match self.stream.read(&mut buf[..chunk]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_io(e)),
            }
        };

        if read == 0 {
            return Err(TransportError::Eof {
                buffered: self.buffer.len(),
            });
        }
        trace!("read {read} bytes");
        self.buffer.extend_from_slice(&buf[..read]);
        Ok(())
    }
}

fn map_io(e: io::Error) -> TransportError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TransportError::Timeout,
        _ => TransportError::Io(e),
    }
}
