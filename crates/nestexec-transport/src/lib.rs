//! TCP transport for nestexec.
//!
//! This is the lowest layer of nestexec. Every connection, whether it carries
//! a buffered call or a long-lived chunked stream, is a [`NetStream`]
//! produced by [`TcpTransport::accept`] or [`TcpTransport::connect`].

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::NetStream;
pub use tcp::TcpTransport;
