//! Container registry.
//!
//! Each launched process is registered under a caller-chosen id together
//! with its pipe endpoints, a user count, and an exit latch. The entry stays
//! registered until every user has released it; the last release removes it
//! while holding the table lock, so a concurrent launch of the same id either
//! sees the old entry (and conflicts) or sees nothing. A launch claims its id
//! under the same lock before spawning.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Write;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use std::sync::{Arc, Mutex};

use nestexec_proto::WindowSize;
use tracing::{debug, info, warn};

use crate::error::RegistryError;
use crate::latch::{lock, ExitLatch};
use crate::spawner::Spawner;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// The output pipes of a container, handed out once.
#[derive(Debug)]
pub struct OutputPipes {
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

#[derive(Debug)]
struct Entry {
    stdin: Mutex<Option<Arc<ChildStdin>>>,
    outputs: Mutex<Option<OutputPipes>>,
    refcount: Mutex<usize>,
    exit: ExitLatch,
    window: Mutex<Option<WindowSize>>,
}

#[derive(Debug, Default)]
struct Table {
    live: HashMap<String, Arc<Entry>>,
    /// Ids claimed by a launch whose process is still being spawned.
    pending: HashSet<String>,
}

/// Shared table of live containers.
pub struct Registry {
    spawner: Box<dyn Spawner>,
    table: Mutex<Table>,
}

impl Registry {
    pub fn new(spawner: impl Spawner + 'static) -> Self {
        Self {
            spawner: Box::new(spawner),
            table: Mutex::new(Table::default()),
        }
    }

    /// Spawn `cmd args...` and register it under `id`.
    ///
    /// The id is claimed before anything is spawned, so a conflicting launch
    /// never starts a process. The caller becomes the entry's first user and
    /// must [`Self::release`] it once done. The returned child has its pipes
    /// taken; it is only good for waiting on or killing the process.
    pub fn launch(&self, id: &str, cmd: &str, args: &[String]) -> Result<Child> {
        {
            let mut table = lock(&self.table);
            if table.live.contains_key(id) || !table.pending.insert(id.to_string()) {
                return Err(RegistryError::AlreadyExists(id.to_string()));
            }
        }

        let spawned = self
            .spawner
            .spawn(cmd, args)
            .map_err(|source| RegistryError::Spawn {
                id: id.to_string(),
                source,
            })
            .and_then(|child| wire_entry(id, child));

        let mut table = lock(&self.table);
        table.pending.remove(id);
        let (child, entry) = spawned?;
        info!(container_id = %id, pid = child.id(), cmd = %cmd, "container launched");
        table.live.insert(id.to_string(), entry);
        Ok(child)
    }

    /// Take the output pipes of `id`.
    ///
    /// Unless `interactive`, the child's stdin is closed right away so it
    /// reads EOF. Pipes are handed out once; later calls fail with
    /// [`RegistryError::AlreadyAttached`] and change nothing.
    pub fn attach_output(&self, id: &str, interactive: bool) -> Result<OutputPipes> {
        let entry = self.get(id)?;
        let pipes = lock(&entry.outputs)
            .take()
            .ok_or_else(|| RegistryError::AlreadyAttached(id.to_string()))?;

        if !interactive {
            lock(&entry.stdin).take();
            debug!(container_id = %id, "stdin closed for non-interactive attach");
        }
        Ok(pipes)
    }

    /// Write to the child's stdin. An empty write closes stdin.
    pub fn write_input(&self, id: &str, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return self.close_input(id);
        }

        let entry = self.get(id)?;
        let pipe = lock(&entry.stdin)
            .clone()
            .ok_or_else(|| RegistryError::InputClosed(id.to_string()))?;

        (&*pipe).write_all(data)?;
        (&*pipe).flush()?;
        Ok(())
    }

    /// Close the child's stdin. Closing twice is a no-op.
    pub fn close_input(&self, id: &str) -> Result<()> {
        let entry = self.get(id)?;
        if lock(&entry.stdin).take().is_some() {
            debug!(container_id = %id, "stdin closed");
        }
        Ok(())
    }

    /// Register one more user of `id`.
    pub fn acquire(&self, id: &str) -> Result<usize> {
        let table = lock(&self.table);
        let entry = table
            .live
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let mut count = lock(&entry.refcount);
        *count += 1;
        Ok(*count)
    }

    /// Drop one user of `id`. Returns `true` when this removed the entry.
    pub fn release(&self, id: &str) -> Result<bool> {
        let mut table = lock(&self.table);
        let entry = table
            .live
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        let remaining = {
            let mut count = lock(&entry.refcount);
            *count = count.saturating_sub(1);
            *count
        };

        if remaining > 0 {
            return Ok(false);
        }
        table.live.remove(id);
        info!(container_id = %id, "container reaped");
        Ok(true)
    }

    /// Block until [`Self::signal_exit`] has been called for `id`.
    pub fn await_exit(&self, id: &str) -> Result<()> {
        let entry = self.get(id)?;
        entry.exit.wait();
        Ok(())
    }

    /// Fire the exit latch of `id`. Returns `true` for the first call only.
    pub fn signal_exit(&self, id: &str) -> Result<bool> {
        let entry = self.get(id)?;
        Ok(entry.exit.fire())
    }

    /// Remember the last terminal size the client reported for `id`.
    pub fn record_window_size(&self, id: &str, size: WindowSize) -> Result<()> {
        let entry = self.get(id)?;
        *lock(&entry.window) = Some(size);
        Ok(())
    }

    pub fn window_size(&self, id: &str) -> Result<Option<WindowSize>> {
        let entry = self.get(id)?;
        let size = *lock(&entry.window);
        Ok(size)
    }

    /// Ids of every registered container.
    pub fn list(&self) -> BTreeSet<String> {
        lock(&self.table).live.keys().cloned().collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        lock(&self.table).live.contains_key(id)
    }

    pub fn len(&self) -> usize {
        lock(&self.table).live.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.table).live.is_empty()
    }

    fn get(&self, id: &str) -> Result<Arc<Entry>> {
        lock(&self.table)
            .live
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("containers", &self.list())
            .finish_non_exhaustive()
    }
}

/// Move the child's pipes into a fresh entry with one user.
fn wire_entry(id: &str, mut child: Child) -> Result<(Child, Arc<Entry>)> {
    let (Some(stdin), Some(stdout), Some(stderr)) =
        (child.stdin.take(), child.stdout.take(), child.stderr.take())
    else {
        warn!(container_id = %id, "child stdio was not piped, killing it");
        reap(&mut child);
        return Err(RegistryError::Spawn {
            id: id.to_string(),
            source: std::io::Error::other("child stdio was not piped"),
        });
    };

    let entry = Arc::new(Entry {
        stdin: Mutex::new(Some(Arc::new(stdin))),
        outputs: Mutex::new(Some(OutputPipes { stdout, stderr })),
        refcount: Mutex::new(1),
        exit: ExitLatch::new(),
        window: Mutex::new(None),
    });
    Ok((child, entry))
}

fn reap(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!(error = %err, "kill failed");
    }
    let _ = child.wait();
}
