//! The nestexec server: a registry of launched processes and the
//! connection handler that exposes launch, list, and attach over the
//! chunked request protocol.
//!
//! ```no_run
//! use nestexec_server::{Server, ServerConfig};
//!
//! let server = Server::bind(ServerConfig::with_addr("127.0.0.1:8888"))?;
//! server.serve()?;
//! # Ok::<(), nestexec_server::ServerError>(())
//! ```

mod dispatcher;
pub mod error;
pub mod latch;
pub mod registry;
pub mod server;
pub mod spawner;

pub use error::{RegistryError, Result, ServerError};
pub use latch::ExitLatch;
pub use registry::{OutputPipes, Registry};
pub use server::{Server, ServerConfig, DEFAULT_ADDR, DEFAULT_READ_CHUNK_SIZE};
pub use spawner::{OsSpawner, Spawner, ALLOWED_ENV_VARS};
