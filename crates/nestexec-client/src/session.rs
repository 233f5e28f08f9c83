//! The client side of an exec or attach.
//!
//! A session runs a handful of threads that talk only through two queues and
//! one completion signal:
//!
//! - launch task (exec only): holds the launch connection open for the
//!   lifetime of the process and reports whether the launch was accepted
//! - output stream task: reads the attach-output stream into the output queue
//!   and fires completion once the queue has been written out
//! - output pump: writes queued output to the local stdout and stderr
//! - input pump and input stream task (interactive only): read local input
//!   into the input queue and forward it as stdin frames
//! - resize watcher (tty and interactive): queues window-size messages
//!
//! [`Session::run`] waits on the completion signal and returns its outcome.

use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nestexec_proto::{AttachMessage, InitiateStream, LaunchRequest};
use tracing::{debug, info, warn};

use crate::completion::{Completion, InterruptHandle};
use crate::connector::{attach_input, attach_output, launch, list_containers};
use crate::error::{ClientError, Result};
use crate::pump::{pump_input, pump_output, OutputEvent};

/// Default server address for client commands.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8888";

/// Delay between readiness polls after a launch.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Bytes per read from local input.
pub const DEFAULT_INPUT_CHUNK_SIZE: usize = 1024;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Server address. Default: `127.0.0.1:8888`.
    pub addr: String,
    /// Readiness poll interval. Default: 100 ms.
    pub poll_interval: Duration,
    /// Bytes per local input read. Default: 1024.
    pub input_chunk_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            input_chunk_size: DEFAULT_INPUT_CHUNK_SIZE,
        }
    }
}

impl SessionConfig {
    pub fn with_addr(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }
}

/// What a session does once connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub container_id: String,
    pub tty: bool,
    pub interactive: bool,
    /// Command to launch first; `None` attaches to an existing container.
    pub launch: Option<(String, Vec<String>)>,
}

impl SessionOptions {
    /// Launch `cmd args...` under `container_id`, then attach.
    pub fn exec(container_id: impl Into<String>, cmd: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            container_id: container_id.into(),
            tty: false,
            interactive: false,
            launch: Some((cmd.into(), args)),
        }
    }

    /// Attach to an already launched container.
    pub fn attach(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            tty: false,
            interactive: false,
            launch: None,
        }
    }

    pub fn with_tty(mut self, tty: bool) -> Self {
        self.tty = tty;
        self
    }

    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    fn initiate(&self) -> InitiateStream {
        InitiateStream {
            container_id: self.container_id.clone(),
            tty: self.tty,
            interactive: self.interactive,
        }
    }
}

enum LaunchOutcome {
    Accepted,
    Rejected(ClientError),
}

/// One exec or attach against a server.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    options: SessionOptions,
    completion: Arc<Completion>,
}

impl Session {
    pub fn new(config: SessionConfig, options: SessionOptions) -> Self {
        Self {
            config,
            options,
            completion: Arc::new(Completion::new()),
        }
    }

    /// A handle that ends [`Session::run`] with [`ClientError::Interrupted`].
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle::new(Arc::clone(&self.completion))
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Run against this process's stdin, stdout, and stderr.
    ///
    /// With `tty` and `interactive` set, a terminal stdin is switched to raw
    /// mode and resize events are forwarded for the session's duration.
    pub fn run(self) -> Result<()> {
        #[cfg(unix)]
        let _raw = if self.options.tty && self.options.interactive {
            crate::terminal::RawModeGuard::stdin()
        } else {
            None
        };
        self.run_with(std::io::stdin(), std::io::stdout(), std::io::stderr())
    }

    /// Run against the given local streams.
    pub fn run_with<I, O, E>(self, input: I, stdout: O, stderr: E) -> Result<()>
    where
        I: Read + Send + 'static,
        O: Write + Send + 'static,
        E: Write + Send + 'static,
    {
        let id = self.options.container_id.clone();

        if let Some((cmd, args)) = self.options.launch.clone() {
            let request = LaunchRequest {
                container_id: id.clone(),
                cmd,
                args,
            };
            self.launch_and_wait_ready(request)?;
        }

        let (output_tx, output_rx) = mpsc::channel();
        spawn_task("nestexec-output-pump", move || {
            if let Err(err) = pump_output(output_rx, stdout, stderr) {
                warn!(error = %err, "writing local output failed");
            }
        })?;

        let addr = self.config.addr.clone();
        let init = self.options.initiate();
        let completion = Arc::clone(&self.completion);
        spawn_task("nestexec-output-stream", move || {
            let outcome = stream_output(&addr, init, &output_tx);
            let (ack_tx, ack_rx) = mpsc::channel();
            if output_tx.send(OutputEvent::Flush(ack_tx)).is_ok() {
                let _ = ack_rx.recv();
            }
            completion.fire(outcome);
        })?;

        #[cfg(unix)]
        let mut _resize: Option<crate::resize::ResizeWatcher> = None;

        if self.options.interactive {
            let (input_tx, input_rx) = mpsc::channel();

            let addr = self.config.addr.clone();
            let init = self.options.initiate();
            spawn_task("nestexec-input-stream", move || {
                match stream_input(&addr, init, input_rx) {
                    Ok(()) => debug!("input stream finished"),
                    Err(err @ ClientError::BadRequest) => {
                        warn!(error = %err, "server rejected the input stream");
                    }
                    Err(err) => warn!(error = %err, "input stream failed"),
                }
            })?;

            #[cfg(unix)]
            if self.options.tty {
                if let Some(size) = crate::terminal::stdout_window_size() {
                    let _ = input_tx.send(AttachMessage::window_size(size.rows, size.cols));
                }
                match crate::resize::ResizeWatcher::spawn(input_tx.clone()) {
                    Ok(watcher) => _resize = Some(watcher),
                    Err(err) => warn!(error = %err, "resize events unavailable"),
                }
            }

            let chunk_size = self.config.input_chunk_size;
            spawn_task("nestexec-input-pump", move || {
                if let Err(err) = pump_input(input, &input_tx, chunk_size) {
                    warn!(error = %err, "reading local input failed");
                }
            })?;
        }

        let outcome = self.completion.wait();
        info!(container_id = %id, ok = outcome.is_ok(), "session finished");
        outcome
    }

    fn launch_and_wait_ready(&self, request: LaunchRequest) -> Result<()> {
        let id = request.container_id.clone();
        let (outcome_tx, outcome_rx) = mpsc::channel();

        let addr = self.config.addr.clone();
        spawn_task("nestexec-launch", move || {
            let mut stream = match launch(&addr, request) {
                Ok(stream) => {
                    let _ = outcome_tx.send(LaunchOutcome::Accepted);
                    stream
                }
                Err(err) => {
                    let _ = outcome_tx.send(LaunchOutcome::Rejected(err));
                    return;
                }
            };
            match stream.drain() {
                Ok(_) => debug!("launch stream finished"),
                Err(err) => warn!(error = %err, "launch stream broke"),
            }
        })?;

        match outcome_rx.recv() {
            Ok(LaunchOutcome::Accepted) => info!(container_id = %id, "launch accepted"),
            Ok(LaunchOutcome::Rejected(err)) => return Err(err),
            Err(_) => return Err(ClientError::TaskLost("launch task")),
        }

        loop {
            if list_containers(&self.config.addr)?.contains(&id) {
                debug!(container_id = %id, "container ready");
                return Ok(());
            }
            thread::sleep(self.config.poll_interval);
        }
    }
}

fn spawn_task<F>(name: &str, task: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new().name(name.to_string()).spawn(task)?;
    Ok(())
}

/// Read the attach-output stream into the output queue until the terminator.
fn stream_output(addr: &str, init: InitiateStream, queue: &Sender<OutputEvent>) -> Result<()> {
    let mut stream = attach_output(addr, init)?;
    while let Some(message) = stream.next_message()? {
        match message {
            AttachMessage::Io(io) => {
                if queue.send(OutputEvent::Io(io)).is_err() {
                    return Err(ClientError::TaskLost("output pump"));
                }
            }
            AttachMessage::Control(control) => {
                debug!(?control, "ignoring control message on output stream");
            }
        }
    }
    Ok(())
}

/// Forward queued input frames until the end-of-input sentinel has been sent.
fn stream_input(addr: &str, init: InitiateStream, queue: Receiver<AttachMessage>) -> Result<()> {
    let mut stream = attach_input(addr, init)?;
    for message in queue {
        let last = matches!(&message, AttachMessage::Io(io) if io.is_stdin_eof());
        stream.send(&message)?;
        if last {
            break;
        }
    }
    stream.finish()
}
