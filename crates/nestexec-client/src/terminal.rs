//! Local terminal queries and raw mode.

use std::io;
use std::os::fd::{AsRawFd, RawFd};

use nestexec_proto::WindowSize;
use tracing::debug;

/// Current size of the terminal on `fd`, or `None` if it is not a terminal.
pub fn window_size(fd: RawFd) -> Option<WindowSize> {
    let mut size = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };

    // SAFETY: `size` is a valid, writable `winsize` for the duration of the call,
    // and TIOCGWINSZ writes at most `size_of::<winsize>()` bytes into it.
    let rc = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut size as *mut libc::winsize) };

    if rc == 0 && size.ws_row > 0 && size.ws_col > 0 {
        Some(WindowSize {
            rows: size.ws_row,
            cols: size.ws_col,
        })
    } else {
        None
    }
}

/// Size of the terminal attached to this process's stdout.
pub fn stdout_window_size() -> Option<WindowSize> {
    window_size(io::stdout().as_raw_fd())
}

/// Puts a terminal in raw mode and restores the previous mode on drop.
pub struct RawModeGuard {
    fd: RawFd,
    saved: libc::termios,
}

impl RawModeGuard {
    /// Switch `fd` to raw mode.
    pub fn enable(fd: RawFd) -> io::Result<Self> {
        // SAFETY: an all-zero `termios` is a valid value for tcgetattr to overwrite.
        let mut saved: libc::termios = unsafe { std::mem::zeroed() };

        // SAFETY: `saved` is a valid, writable `termios`.
        if unsafe { libc::tcgetattr(fd, &mut saved) } != 0 {
            return Err(io::Error::last_os_error());
        }

        let mut raw = saved;
        // SAFETY: `raw` is a valid `termios` initialised by tcgetattr.
        unsafe { libc::cfmakeraw(&mut raw) };

        // SAFETY: `raw` is a valid `termios` and `fd` was accepted by tcgetattr.
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) } != 0 {
            return Err(io::Error::last_os_error());
        }

        debug!(fd, "terminal switched to raw mode");
        Ok(Self { fd, saved })
    }

    /// Raw mode on stdin, if stdin is a terminal.
    pub fn stdin() -> Option<Self> {
        let fd = io::stdin().as_raw_fd();
        // SAFETY: isatty only inspects the descriptor.
        if unsafe { libc::isatty(fd) } != 1 {
            return None;
        }
        match Self::enable(fd) {
            Ok(guard) => Some(guard),
            Err(err) => {
                debug!(error = %err, "raw mode unavailable");
                None
            }
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        // SAFETY: `saved` holds the attributes read from this same descriptor.
        if unsafe { libc::tcsetattr(self.fd, libc::TCSANOW, &self.saved) } != 0 {
            debug!(fd = self.fd, "failed to restore terminal mode");
        }
    }
}

impl std::fmt::Debug for RawModeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawModeGuard").field("fd", &self.fd).finish()
    }
}
