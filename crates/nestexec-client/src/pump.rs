//! Local I/O pumps and the queues between them and the streams.

use std::io::{self, ErrorKind, Read, Write};
use std::sync::mpsc::{Receiver, Sender};

use nestexec_proto::{AttachMessage, IoMessage, StdStream};
use tracing::{debug, trace};

/// Work items for the output pump.
#[derive(Debug)]
pub enum OutputEvent {
    /// Write this payload to the matching local stream.
    Io(IoMessage),
    /// Acknowledge once everything queued before it has been written.
    Flush(Sender<()>),
}

/// Read `input` in `chunk_size` pieces and queue each as a stdin message.
///
/// On end of input (or a read error) one final empty stdin message is queued
/// and the pump stops. Returns the number of bytes queued.
pub fn pump_input<R: Read>(
    mut input: R,
    queue: &Sender<AttachMessage>,
    chunk_size: usize,
) -> io::Result<u64> {
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;
    loop {
        let read = match input.read(&mut buf) {
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                let _ = queue.send(IoMessage::stdin_eof().into());
                return Err(err);
            }
        };

        if read == 0 {
            debug!(bytes = total, "local input ended");
            let _ = queue.send(IoMessage::stdin_eof().into());
            return Ok(total);
        }

        if queue.send(IoMessage::stdin(&buf[..read]).into()).is_err() {
            debug!("input queue closed");
            return Ok(total);
        }
        total += read as u64;
    }
}

/// Write queued output to the local streams, flushing after every message.
///
/// Runs until every sender of `queue` is gone.
pub fn pump_output<O: Write, E: Write>(
    queue: Receiver<OutputEvent>,
    mut stdout: O,
    mut stderr: E,
) -> io::Result<()> {
    for event in queue {
        match event {
            OutputEvent::Io(message) => {
                let sink: &mut dyn Write = match message.stream {
                    StdStream::Stdout => &mut stdout,
                    StdStream::Stderr => &mut stderr,
                    StdStream::Stdin => {
                        trace!("ignoring stdin message on output queue");
                        continue;
                    }
                };
                sink.write_all(&message.data)?;
                sink.flush()?;
            }
            OutputEvent::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    Ok(())
}
