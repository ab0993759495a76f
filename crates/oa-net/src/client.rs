//! Shared ArticBase client
//!
//! One `Client` is created per boot target and handed out as an `Arc` to
//! every consumer (loader, romfs readers, service integrations). Nobody owns
//! it exclusively; the loader stops it exactly once at teardown, after the
//! readers have released their handles.

use crate::request::Request;
use crate::response::Response;
use crate::transport::{TcpTransport, Transport};
use parking_lot::Mutex;
use tracing::{error, warn};

/// Severity of a message relayed to the remote operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerLogLevel {
    Info,
    Warning,
    Error,
}

type ErrorCallback = Box<dyn Fn(&str) + Send + Sync>;
type TrafficCallback = Box<dyn Fn(u32) + Send + Sync>;
type EventCallback = Box<dyn Fn(u64) + Send + Sync>;

/// Request/response RPC client over one remote connection
pub struct Client {
    transport: Box<dyn Transport>,
    error_callback: Mutex<Option<ErrorCallback>>,
    traffic_callback: Mutex<Option<TrafficCallback>>,
    event_callback: Mutex<Option<EventCallback>>,
}

impl Client {
    pub fn new(address: &str, port: u16) -> Self {
        Self::with_transport(Box::new(TcpTransport::new(address, port)))
    }

    /// Build a client over an arbitrary transport (tests use a mock here)
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            error_callback: Mutex::new(None),
            traffic_callback: Mutex::new(None),
            event_callback: Mutex::new(None),
        }
    }

    /// Invoked with a human-readable message on communication failure
    pub fn set_communication_error_callback<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.error_callback.lock() = Some(Box::new(callback));
    }

    /// Invoked with the byte count of every successful transfer
    pub fn set_report_traffic_callback<F>(&self, callback: F)
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        *self.traffic_callback.lock() = Some(Box::new(callback));
    }

    /// Invoked with the semantic event word of every successful transfer
    pub fn set_report_event_callback<F>(&self, callback: F)
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        *self.event_callback.lock() = Some(Box::new(callback));
    }

    /// Attempt one connection. Returns whether the transport is usable.
    pub fn connect(&self) -> bool {
        match self.transport.connect() {
            Ok(()) => true,
            Err(e) => {
                error!("Artic connection failed: {}", e);
                self.fire_error(&e.to_string());
                false
            }
        }
    }

    pub fn new_request(&self, method: &str) -> Request {
        Request::new(method)
    }

    /// Send one request, blocking for its response.
    ///
    /// Returns `None` on any communication error, after firing the error
    /// callback. This subsystem never retries.
    pub fn send(&self, req: &Request) -> Option<Response> {
        match self.transport.send(req) {
            Ok(resp) => {
                if let Some(cb) = self.traffic_callback.lock().as_ref() {
                    cb(resp.wire_size() as u32);
                }
                if resp.event_mask() != 0 {
                    if let Some(cb) = self.event_callback.lock().as_ref() {
                        cb(resp.event_mask());
                    }
                }
                Some(resp)
            }
            Err(e) => {
                warn!("Artic request {} failed: {}", req.method(), e);
                self.fire_error(&e.to_string());
                None
            }
        }
    }

    /// Maximum single-request payload size advertised by the server
    pub fn max_request_size(&self) -> usize {
        self.transport.max_request_size()
    }

    /// Relay an operator-visible message to the server console
    pub fn log_on_server(&self, level: ServerLogLevel, message: &str) {
        let mut req = self.new_request("Server_Log");
        req.add_param_u8(match level {
            ServerLogLevel::Info => 0,
            ServerLogLevel::Warning => 1,
            ServerLogLevel::Error => 2,
        });
        req.set_payload(message.as_bytes().to_vec());
        // Best-effort; a failed log must not mask the original error.
        let _ = self.transport.send(&req);
    }

    /// Stop the transport. Idempotent.
    pub fn stop(&self) {
        self.transport.stop();
    }

    fn fire_error(&self, message: &str) {
        if let Some(cb) = self.error_callback.lock().as_ref() {
            cb(message);
        }
    }
}
