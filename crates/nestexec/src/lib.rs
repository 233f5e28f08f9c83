//! Minimal remote exec and interactive attach.
//!
//! A nestexec server launches child processes under caller-chosen ids and
//! lets clients attach to their stdin, stdout, and stderr over a chunked
//! HTTP/1.1 stream, with optional terminal resize propagation.
//!
//! # Crate Structure
//!
//! - [`transport`] — TCP stream and listener
//! - [`frame`] — Chunk codec and request/response heads
//! - [`proto`] — Message types and call kinds
//! - [`server`] — Container registry and connection handler (behind `server` feature)
//! - [`client`] — Client calls and session driver (behind `client` feature)

/// Re-export transport types.
pub mod transport {
    pub use nestexec_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use nestexec_frame::*;
}

/// Re-export protocol message types.
pub mod proto {
    pub use nestexec_proto::*;
}

/// Re-export server types (requires `server` feature).
#[cfg(feature = "server")]
pub mod server {
    pub use nestexec_server::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use nestexec_client::*;
}
