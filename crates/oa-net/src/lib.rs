//! ArticBase RPC client for oxidized-artic
//!
//! Named request/response RPC over a blocking stream connection. Requests
//! carry typed scalar parameters; responses carry a success flag, a numeric
//! method result and zero or more indexed opaque buffers.

pub mod client;
pub mod codec;
pub mod request;
pub mod response;
pub mod transport;

pub use client::{Client, ServerLogLevel};
pub use request::{Param, Request};
pub use response::{Response, ResponseBuilder};
pub use transport::{TcpTransport, Transport};
