//! Client for the nestexec exec/attach server.
//!
//! [`connector`] exposes the four server calls directly. [`Session`] drives
//! a full exec or attach: launch, wait until the container is listed, then
//! pump local stdio against the output and input streams.
//!
//! ```no_run
//! use nestexec_client::{Session, SessionConfig, SessionOptions};
//!
//! let options = SessionOptions::exec("c1", "echo", vec!["hi".into()]);
//! Session::new(SessionConfig::default(), options).run()?;
//! # Ok::<(), nestexec_client::ClientError>(())
//! ```

pub mod completion;
pub mod connector;
pub mod error;
pub mod pump;
#[cfg(unix)]
pub mod resize;
pub mod session;
#[cfg(unix)]
pub mod terminal;

pub use completion::{Completion, InterruptHandle};
pub use connector::{attach_input, attach_output, launch, list_containers, InputStream, OutputStream};
pub use error::{ClientError, Result};
pub use pump::{pump_input, pump_output, OutputEvent};
#[cfg(unix)]
pub use resize::ResizeWatcher;
pub use session::{
    Session, SessionConfig, SessionOptions, DEFAULT_ADDR, DEFAULT_INPUT_CHUNK_SIZE,
    DEFAULT_POLL_INTERVAL,
};
