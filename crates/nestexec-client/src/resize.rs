use std::io;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use nestexec_proto::{AttachMessage, WindowSize};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::terminal::stdout_window_size;

/// Forwards terminal resizes to the input queue as window-size messages.
///
/// Listens for `SIGWINCH` on a dedicated thread until dropped.
pub struct ResizeWatcher {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ResizeWatcher {
    /// Watch resizes of the terminal on stdout.
    pub fn spawn(queue: Sender<AttachMessage>) -> io::Result<Self> {
        Self::with_size_source(queue, stdout_window_size)
    }

    /// Watch resizes, reading the new size from `size_source` on each signal.
    pub fn with_size_source(
        queue: Sender<AttachMessage>,
        size_source: fn() -> Option<WindowSize>,
    ) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let mut winch = {
            let _guard = runtime.enter();
            signal(SignalKind::window_change())?
        };
        let (shutdown, mut stop) = oneshot::channel::<()>();

        let handle = thread::Builder::new()
            .name("nestexec-resize".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    loop {
                        tokio::select! {
                            _ = &mut stop => break,
                            received = winch.recv() => {
                                if received.is_none() {
                                    break;
                                }
                                let Some(size) = size_source() else {
                                    trace!("resize signal without a terminal size");
                                    continue;
                                };
                                debug!(rows = size.rows, cols = size.cols, "terminal resized");
                                if queue.send(AttachMessage::window_size(size.rows, size.cols)).is_err() {
                                    break;
                                }
                            }
                        }
                    }
                });
            })?;

        Ok(Self {
            shutdown: Some(shutdown),
            handle: Some(handle),
        })
    }
}

impl Drop for ResizeWatcher {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for ResizeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResizeWatcher")
            .field("running", &self.handle.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    fn no_terminal() -> Option<WindowSize> {
        None
    }

    fn fixed_size() -> Option<WindowSize> {
        Some(WindowSize { rows: 33, cols: 101 })
    }

    #[test]
    fn starts_and_stops_cleanly() {
        let (tx, rx) = mpsc::channel();
        let watcher = ResizeWatcher::with_size_source(tx, no_terminal)
            .expect("watcher should start");
        drop(watcher);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn stops_when_queue_closes() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let watcher = ResizeWatcher::spawn(tx).expect("watcher should start");
        drop(watcher);
    }

    #[test]
    fn sigwinch_queues_window_size() {
        let (tx, rx) = mpsc::channel();
        let _watcher =
            ResizeWatcher::with_size_source(tx, fixed_size).expect("watcher should start");

        let mut received = None;
        for _ in 0..50 {
            // SAFETY: raise only sends a signal to this process; a handler for
            // SIGWINCH is installed by the watcher.
            assert_eq!(unsafe { libc::raise(libc::SIGWINCH) }, 0);
            if let Ok(message) = rx.recv_timeout(Duration::from_millis(100)) {
                received = Some(message);
                break;
            }
        }

        assert_eq!(
            received.expect("a resize should be queued"),
            AttachMessage::window_size(33, 101)
        );
    }

    #[test]
    fn resize_without_size_is_skipped() {
        let (tx, rx) = mpsc::channel();
        let _watcher = ResizeWatcher::with_size_source(tx, no_terminal)
            .expect("watcher should start");

        // SAFETY: see sigwinch_queues_window_size.
        assert_eq!(unsafe { libc::raise(libc::SIGWINCH) }, 0);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }
}
