//! Blocking stream transport
//!
//! One in-flight request at a time; the calling thread blocks until the
//! response (or an error) arrives. The `Transport` trait is the seam the
//! loader tests mock.

use crate::codec::{decode_response, encode_request};
use crate::request::Request;
use crate::response::Response;
use oa_core::NetError;
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use tracing::{debug, info, warn};

/// Transport-level protocol version exchanged in the hello frame
pub const TRANSPORT_VERSION: u32 = 1;

const HELLO_MAGIC: u32 = u32::from_le_bytes(*b"ARTC");

/// Largest frame we are willing to accept from the server
const MAX_FRAME_SIZE: usize = 32 * 1024 * 1024;

/// Request/response transport to one remote host
pub trait Transport: Send + Sync {
    /// Attempt one connection; idempotence is the caller's concern.
    fn connect(&self) -> Result<(), NetError>;

    /// Send one request and block for its response.
    fn send(&self, req: &Request) -> Result<Response, NetError>;

    /// Maximum single-request payload size advertised by the server.
    fn max_request_size(&self) -> usize;

    /// Tear the connection down. Safe to call more than once.
    fn stop(&self);
}

/// TCP stream transport with length-prefixed frames
pub struct TcpTransport {
    address: String,
    port: u16,
    inner: Mutex<TcpState>,
}

struct TcpState {
    stream: Option<TcpStream>,
    max_request_size: usize,
}

impl TcpTransport {
    pub fn new(address: &str, port: u16) -> Self {
        Self {
            address: address.to_string(),
            port,
            inner: Mutex::new(TcpState {
                stream: None,
                max_request_size: 0,
            }),
        }
    }

    fn write_frame(stream: &mut TcpStream, body: &[u8]) -> Result<(), NetError> {
        stream.write_all(&(body.len() as u32).to_le_bytes())?;
        stream.write_all(body)?;
        Ok(())
    }

    fn read_frame(stream: &mut TcpStream) -> Result<Vec<u8>, NetError> {
        let mut len_bytes = [0u8; 4];
        stream.read_exact(&mut len_bytes)?;
        let len = u32::from_le_bytes(len_bytes) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(NetError::MalformedFrame(format!(
                "frame length 0x{len:x} exceeds limit"
            )));
        }
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body)?;
        Ok(body)
    }
}

impl Transport for TcpTransport {
    fn connect(&self) -> Result<(), NetError> {
        let mut inner = self.inner.lock();
        if inner.stream.is_some() {
            return Ok(());
        }

        let mut stream = TcpStream::connect((self.address.as_str(), self.port))
            .map_err(|e| NetError::ConnectionFailed(format!("{}:{}: {e}", self.address, self.port)))?;
        stream.set_nodelay(true)?;

        // Hello exchange: our magic+version, the server's magic+max request size.
        let mut hello = Vec::with_capacity(8);
        hello.extend_from_slice(&HELLO_MAGIC.to_le_bytes());
        hello.extend_from_slice(&TRANSPORT_VERSION.to_le_bytes());
        Self::write_frame(&mut stream, &hello)?;

        let reply = Self::read_frame(&mut stream)?;
        if reply.len() < 8 || u32::from_le_bytes([reply[0], reply[1], reply[2], reply[3]]) != HELLO_MAGIC
        {
            return Err(NetError::MalformedFrame("bad hello reply".to_string()));
        }
        let max_request = u32::from_le_bytes([reply[4], reply[5], reply[6], reply[7]]) as usize;
        if max_request == 0 {
            return Err(NetError::MalformedFrame(
                "server advertised zero max request size".to_string(),
            ));
        }

        info!(
            "Connected to Artic server {}:{} (max request 0x{:x})",
            self.address, self.port, max_request
        );
        inner.stream = Some(stream);
        inner.max_request_size = max_request;
        Ok(())
    }

    fn send(&self, req: &Request) -> Result<Response, NetError> {
        let mut inner = self.inner.lock();
        let max_request = inner.max_request_size;
        let stream = inner
            .stream
            .as_mut()
            .ok_or_else(|| NetError::ConnectionFailed("not connected".to_string()))?;

        let body = encode_request(req);
        if body.len() > max_request {
            return Err(NetError::RequestTooLarge {
                size: body.len(),
                max: max_request,
            });
        }

        debug!("-> {} ({} bytes)", req.method(), body.len());
        Self::write_frame(stream, &body)?;
        let reply = Self::read_frame(stream)?;
        decode_response(&reply)
    }

    fn max_request_size(&self) -> usize {
        self.inner.lock().max_request_size
    }

    fn stop(&self) {
        let mut inner = self.inner.lock();
        if let Some(stream) = inner.stream.take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                warn!("Error shutting down Artic connection: {}", e);
            }
        }
    }
}
