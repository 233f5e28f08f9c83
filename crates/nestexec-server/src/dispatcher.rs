//! Per-connection request handling.
//!
//! One request per connection: read the head, route on the call-kind
//! header, answer, then close. Failures before a response head is written
//! become status codes; once a chunked response has started, the only
//! failure signal left is closing without the terminator.

use std::io::{self, Read, Write};
use std::sync::Mutex;
use std::thread;

use nestexec_frame::{
    BodyFraming, FrameConfig, FrameReader, FrameWriter, RequestHead, ResponseHead, CONNECTION,
    CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING,
};
use nestexec_proto::{
    decode, encode, AttachMessage, Call, CallKind, ControlMessage, InitiateStream, IoMessage,
    LaunchRequest, ListContainersResponse, ProtoError, StdStream, CALL_KIND_HEADER,
    CONTENT_TYPE_VALUE,
};
use nestexec_transport::NetStream;
use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use crate::error::{RegistryError, Result, ServerError};
use crate::latch::lock;
use crate::registry::{OutputPipes, Registry};

/// Serve exactly one request on `stream`.
pub(crate) fn handle_connection(
    registry: &Registry,
    stream: NetStream,
    frame_config: &FrameConfig,
    read_chunk_size: usize,
) -> Result<()> {
    let write_half = stream.try_clone()?;
    let mut reader = FrameReader::with_config(stream, frame_config.clone());
    let mut writer = FrameWriter::with_config(write_half, frame_config.clone());

    let result = serve_request(registry, &mut reader, &mut writer, read_chunk_size);
    linger(&mut reader);
    result
}

/// Half-close and discard whatever the peer still sends, including frames
/// after the end-of-input sentinel, so unread request bytes don't reset the
/// connection before the response is read.
fn linger(reader: &mut FrameReader<NetStream>) {
    if let Err(err) = reader.get_ref().shutdown_write() {
        debug!(error = %err, "shutdown after response failed");
        return;
    }
    match io::copy(reader.get_mut(), &mut io::sink()) {
        Ok(bytes) => trace!(bytes, "discarded unread request bytes"),
        Err(err) => trace!(error = %err, "draining after response failed"),
    }
}

pub(crate) fn serve_request<R, W>(
    registry: &Registry,
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
    read_chunk_size: usize,
) -> Result<()>
where
    R: Read,
    W: Write + Send,
{
    let head = match reader.read_request_head() {
        Ok(head) => head,
        Err(err) => {
            debug!(error = %err, "unreadable request head");
            return respond_status(writer, 400);
        }
    };

    if !head.method.eq_ignore_ascii_case("POST") {
        warn!(method = %head.method, status = 405, "rejecting non-POST request");
        return respond_status(writer, 405);
    }

    let kind = match call_kind(&head) {
        Ok(kind) => kind,
        Err(reason) => {
            warn!(status = 400, "{reason}");
            return respond_status(writer, 400);
        }
    };

    let framing = match head.framing() {
        Ok(framing) => framing,
        Err(err) => {
            warn!(status = 400, error = %err, "bad body framing");
            return respond_status(writer, 400);
        }
    };

    debug!(call = %kind, ?framing, "dispatching request");

    match (kind.is_streaming_request(), framing) {
        (true, BodyFraming::Chunked) => handle_attach_input(registry, reader, writer),
        (false, BodyFraming::Length(len)) => {
            let call = match read_call(reader, len, kind) {
                Ok(call) => call,
                Err(err) => {
                    warn!(call = %kind, status = 400, error = %err, "rejecting request body");
                    return respond_status(writer, 400);
                }
            };
            dispatch_buffered(registry, writer, call, read_chunk_size)
        }
        (_, framing) => {
            warn!(call = %kind, ?framing, status = 400, "body framing does not fit call kind");
            respond_status(writer, 400)
        }
    }
}

fn call_kind(head: &RequestHead) -> std::result::Result<CallKind, String> {
    let raw = head
        .headers
        .get(CALL_KIND_HEADER)
        .ok_or_else(|| format!("missing {CALL_KIND_HEADER} header"))?;
    raw.parse::<CallKind>().map_err(|err| err.to_string())
}

fn read_call<R: Read>(reader: &mut FrameReader<R>, len: usize, kind: CallKind) -> Result<Call> {
    let body = reader.read_body(len)?;
    let call: Call = decode(&body)?;
    if call.kind() != kind {
        return Err(ServerError::Proto(ProtoError::UnexpectedMessage {
            expected: kind.as_str(),
            found: call.kind().as_str(),
        }));
    }
    Ok(call)
}

fn dispatch_buffered<W: Write + Send>(
    registry: &Registry,
    writer: &mut FrameWriter<W>,
    call: Call,
    read_chunk_size: usize,
) -> Result<()> {
    match call {
        Call::ListContainers(_) => {
            let ids = registry.list();
            debug!(count = ids.len(), "listing containers");
            respond_message(writer, 200, &ListContainersResponse { ids })
        }
        Call::LaunchSession(request) => handle_launch(registry, writer, request),
        Call::AttachOutput(message) => match message.into_initiate() {
            Ok(init) => handle_attach_output(registry, writer, init, read_chunk_size),
            Err(err) => {
                warn!(status = 400, error = %err, "attach-output without initiate message");
                respond_status(writer, 400)
            }
        },
        Call::AttachInput(_) => respond_status(writer, 400),
    }
}

fn handle_launch<W: Write>(
    registry: &Registry,
    writer: &mut FrameWriter<W>,
    request: LaunchRequest,
) -> Result<()> {
    let id = request.container_id;
    let mut child = match registry.launch(&id, &request.cmd, &request.args) {
        Ok(child) => child,
        Err(RegistryError::AlreadyExists(_)) => {
            warn!(container_id = %id, status = 409, "container id in use");
            return respond_status(writer, 409);
        }
        Err(err) => {
            error!(container_id = %id, status = 500, error = %err, "launch failed");
            return respond_status(writer, 500);
        }
    };

    // The launch-waiter role runs to completion even if the client has gone.
    let started = writer.write_response_head(&stream_head());

    match child.wait() {
        Ok(status) => info!(container_id = %id, code = ?status.code(), "process exited"),
        Err(err) => warn!(container_id = %id, error = %err, "wait on process failed"),
    }
    if let Err(err) = registry.await_exit(&id) {
        warn!(container_id = %id, error = %err, "exit wait failed");
    }
    if let Err(err) = registry.release(&id) {
        warn!(container_id = %id, error = %err, "release after launch failed");
    }

    started?;
    writer.write_terminator()?;
    Ok(())
}

fn handle_attach_output<W: Write + Send>(
    registry: &Registry,
    writer: &mut FrameWriter<W>,
    init: InitiateStream,
    read_chunk_size: usize,
) -> Result<()> {
    let id = init.container_id;
    let pipes = match registry.attach_output(&id, init.interactive) {
        Ok(pipes) => pipes,
        Err(RegistryError::NotFound(_)) => {
            warn!(container_id = %id, status = 404, "attach-output to unknown container");
            return respond_status(writer, 404);
        }
        Err(RegistryError::AlreadyAttached(_)) => {
            warn!(container_id = %id, status = 409, "output already attached");
            return respond_status(writer, 409);
        }
        Err(err) => {
            error!(container_id = %id, status = 500, error = %err, "attach-output failed");
            return respond_status(writer, 500);
        }
    };

    info!(container_id = %id, tty = init.tty, interactive = init.interactive, "output attached");
    let result = stream_output(writer, pipes, read_chunk_size);

    match registry.signal_exit(&id) {
        Ok(true) => debug!(container_id = %id, "exit signalled"),
        Ok(false) => warn!(container_id = %id, "exit was already signalled"),
        Err(err) => warn!(container_id = %id, error = %err, "exit signal failed"),
    }
    result
}

fn stream_output<W: Write + Send>(
    writer: &mut FrameWriter<W>,
    pipes: OutputPipes,
    read_chunk_size: usize,
) -> Result<()> {
    writer.write_response_head(&stream_head())?;

    let OutputPipes { stdout, stderr } = pipes;
    let (out, err) = {
        let shared = Mutex::new(&mut *writer);
        thread::scope(|scope| {
            let out =
                scope.spawn(|| drain_pipe(stdout, StdStream::Stdout, &shared, read_chunk_size));
            let err =
                scope.spawn(|| drain_pipe(stderr, StdStream::Stderr, &shared, read_chunk_size));
            (
                out.join()
                    .unwrap_or(Err(ServerError::WorkerPanicked("stdout"))),
                err.join()
                    .unwrap_or(Err(ServerError::WorkerPanicked("stderr"))),
            )
        })
    };

    let stdout_bytes = out?;
    let stderr_bytes = err?;
    debug!(stdout_bytes, stderr_bytes, "output drained");
    writer.write_terminator()?;
    Ok(())
}

fn drain_pipe<P: Read, W: Write>(
    mut pipe: P,
    stream: StdStream,
    writer: &Mutex<&mut FrameWriter<W>>,
    read_chunk_size: usize,
) -> Result<u64> {
    let mut buf = vec![0u8; read_chunk_size.max(1)];
    let mut total = 0u64;
    loop {
        let read = match pipe.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(ServerError::Io(err)),
        };
        let payload = encode(&AttachMessage::Io(IoMessage::new(
            stream,
            buf[..read].to_vec(),
        )))?;
        lock(writer).write_frame(&payload)?;
        total += read as u64;
    }
}

fn handle_attach_input<R: Read, W: Write>(
    registry: &Registry,
    reader: &mut FrameReader<R>,
    writer: &mut FrameWriter<W>,
) -> Result<()> {
    let init = match read_initiate(reader) {
        Ok(init) => init,
        Err(err) => {
            warn!(status = 400, error = %err, "attach-input without initiate message");
            return respond_status(writer, 400);
        }
    };
    let id = init.container_id;

    match registry.acquire(&id) {
        Ok(users) => debug!(container_id = %id, users, "input attached"),
        Err(RegistryError::NotFound(_)) => {
            warn!(container_id = %id, status = 404, "attach-input to unknown container");
            return respond_status(writer, 404);
        }
        Err(err) => {
            error!(container_id = %id, status = 500, error = %err, "attach-input failed");
            return respond_status(writer, 500);
        }
    }

    let status = match pump_input(registry, &id, reader) {
        Ok(bytes) => {
            debug!(container_id = %id, bytes, "end-of-input sentinel received");
            200
        }
        Err(err) => {
            warn!(container_id = %id, error = %err, "input stream failed before sentinel");
            400
        }
    };

    if let Err(err) = registry.close_input(&id) {
        warn!(container_id = %id, error = %err, "closing stdin failed");
    }
    if let Err(err) = registry.await_exit(&id) {
        warn!(container_id = %id, error = %err, "exit wait failed");
    }
    if let Err(err) = registry.release(&id) {
        warn!(container_id = %id, error = %err, "release after input failed");
    }

    info!(container_id = %id, status, "input stream finished");
    respond_status(writer, status)
}

fn read_initiate<R: Read>(reader: &mut FrameReader<R>) -> Result<InitiateStream> {
    let frame = reader.read_frame()?.ok_or(ServerError::MissingInitiate)?;
    let message: AttachMessage = decode(&frame.payload)?;
    Ok(message.into_initiate()?)
}

/// Forward stdin frames until the sentinel. Returns the bytes written.
fn pump_input<R: Read>(registry: &Registry, id: &str, reader: &mut FrameReader<R>) -> Result<u64> {
    let mut total = 0u64;
    loop {
        let frame = reader.read_frame()?.ok_or(ServerError::InputEndedEarly)?;
        match decode::<AttachMessage>(&frame.payload)? {
            AttachMessage::Io(io) if io.is_stdin_eof() => return Ok(total),
            AttachMessage::Io(io) if io.stream == StdStream::Stdin => {
                registry.write_input(id, &io.data)?;
                total += io.data.len() as u64;
            }
            AttachMessage::Control(ControlMessage::WindowSize(size)) => {
                info!(container_id = %id, rows = size.rows, cols = size.cols, "window resized");
                registry.record_window_size(id, size)?;
            }
            other => {
                return Err(ServerError::Proto(ProtoError::UnexpectedMessage {
                    expected: "stdin or window_size",
                    found: other.label(),
                }));
            }
        }
    }
}

fn stream_head() -> ResponseHead {
    ResponseHead::new(200)
        .with_header(CONTENT_TYPE, CONTENT_TYPE_VALUE)
        .with_header(TRANSFER_ENCODING, "chunked")
        .with_header(CONNECTION, "close")
}

fn respond_status<W: Write>(writer: &mut FrameWriter<W>, status: u16) -> Result<()> {
    let head = ResponseHead::new(status)
        .with_header(CONTENT_LENGTH, "0")
        .with_header(CONNECTION, "close");
    writer.write_response_head(&head)?;
    Ok(())
}

fn respond_message<W: Write, T: Serialize>(
    writer: &mut FrameWriter<W>,
    status: u16,
    message: &T,
) -> Result<()> {
    let body = encode(message)?;
    let head = ResponseHead::new(status)
        .with_header(CONTENT_TYPE, CONTENT_TYPE_VALUE)
        .with_header(CONTENT_LENGTH, body.len().to_string())
        .with_header(CONNECTION, "close");
    writer.write_response_head(&head)?;
    writer.write_body(&body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;
    use nestexec_frame::{decode_response_head, encode_frame, encode_terminator, DEFAULT_MAX_HEAD};
    use nestexec_proto::ListContainersRequest;

    use super::*;
    use crate::spawner::OsSpawner;

    fn registry() -> Registry {
        Registry::new(OsSpawner::new())
    }

    fn request(kind: Option<&str>, body: &[u8]) -> Vec<u8> {
        let mut head = RequestHead::post("/").with_header(CONTENT_TYPE, CONTENT_TYPE_VALUE);
        if let Some(kind) = kind {
            head = head.with_header(CALL_KIND_HEADER, kind);
        }
        head = head.with_header(CONTENT_LENGTH, body.len().to_string());
        let mut wire = BytesMut::new();
        head.encode(&mut wire);
        wire.extend_from_slice(body);
        wire.to_vec()
    }

    fn chunked_request(kind: &str, frames: &[Vec<u8>]) -> Vec<u8> {
        let head = RequestHead::post("/")
            .with_header(CALL_KIND_HEADER, kind)
            .with_header(TRANSFER_ENCODING, "chunked");
        let mut wire = BytesMut::new();
        head.encode(&mut wire);
        for frame in frames {
            encode_frame(frame, &mut wire);
        }
        encode_terminator(&mut wire);
        wire.to_vec()
    }

    /// Run one request through the dispatcher and return (status, body bytes after the head).
    fn exchange(registry: &Registry, wire: Vec<u8>) -> (u16, BytesMut) {
        let mut reader = FrameReader::new(Cursor::new(wire));
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        serve_request(registry, &mut reader, &mut writer, 1024).unwrap();

        let mut out = BytesMut::from(writer.into_inner().into_inner().as_slice());
        let head = decode_response_head(&mut out, DEFAULT_MAX_HEAD)
            .unwrap()
            .unwrap();
        (head.status, out)
    }

    fn call(call: &Call) -> Vec<u8> {
        encode(call).unwrap()
    }

    #[test]
    fn non_post_is_405() {
        let wire = b"GET / HTTP/1.1\r\nx-nestexec-call: list-containers\r\n\r\n".to_vec();
        assert_eq!(exchange(&registry(), wire).0, 405);
    }

    #[test]
    fn missing_or_unknown_call_kind_is_400() {
        let body = call(&Call::ListContainers(ListContainersRequest::default()));
        assert_eq!(exchange(&registry(), request(None, &body)).0, 400);
        assert_eq!(exchange(&registry(), request(Some("exec"), &body)).0, 400);
    }

    #[test]
    fn kind_body_mismatch_is_400() {
        let body = call(&Call::ListContainers(ListContainersRequest::default()));
        assert_eq!(
            exchange(&registry(), request(Some("launch-session"), &body)).0,
            400
        );
    }

    #[test]
    fn garbage_body_is_400() {
        assert_eq!(
            exchange(&registry(), request(Some("list-containers"), b"{nope")).0,
            400
        );
    }

    #[test]
    fn framing_must_fit_kind() {
        let body = call(&Call::ListContainers(ListContainersRequest::default()));
        // Buffered body on the streaming kind.
        assert_eq!(
            exchange(&registry(), request(Some("attach-input"), &body)).0,
            400
        );
        // Chunked body on a buffered kind.
        let wire = chunked_request("list-containers", &[body]);
        assert_eq!(exchange(&registry(), wire).0, 400);
        // No body at all.
        assert_eq!(
            exchange(&registry(), request(Some("list-containers"), b"")).0,
            400
        );
    }

    #[test]
    fn list_containers_on_empty_registry() {
        let body = call(&Call::ListContainers(ListContainersRequest::default()));
        let (status, out) = exchange(&registry(), request(Some("list-containers"), &body));
        assert_eq!(status, 200);
        let response: ListContainersResponse = decode(&out).unwrap();
        assert!(response.ids.is_empty());
    }

    #[test]
    fn attach_output_unknown_is_404() {
        let body = call(&Call::AttachOutput(AttachMessage::initiate(
            "ghost", false, false,
        )));
        assert_eq!(
            exchange(&registry(), request(Some("attach-output"), &body)).0,
            404
        );
    }

    #[test]
    fn attach_output_requires_initiate() {
        let body = call(&Call::AttachOutput(AttachMessage::window_size(1, 1)));
        assert_eq!(
            exchange(&registry(), request(Some("attach-output"), &body)).0,
            400
        );
    }

    #[test]
    fn attach_input_bad_first_frame_is_400() {
        let stdin_first = encode(&AttachMessage::Io(IoMessage::stdin(b"x".to_vec()))).unwrap();
        let wire = chunked_request("attach-input", &[stdin_first]);
        assert_eq!(exchange(&registry(), wire).0, 400);

        let wire = chunked_request("attach-input", &[b"not json".to_vec()]);
        assert_eq!(exchange(&registry(), wire).0, 400);

        let wire = chunked_request("attach-input", &[]);
        assert_eq!(exchange(&registry(), wire).0, 400);
    }

    #[test]
    fn attach_input_unknown_is_404() {
        let init = encode(&AttachMessage::initiate("ghost", false, true)).unwrap();
        let wire = chunked_request("attach-input", &[init]);
        assert_eq!(exchange(&registry(), wire).0, 404);
    }

    #[test]
    fn launch_spawn_failure_is_500() {
        let body = call(&Call::LaunchSession(LaunchRequest {
            container_id: "bad".into(),
            cmd: "/nonexistent/nestexec-binary".into(),
            args: Vec::new(),
        }));
        let registry = registry();
        assert_eq!(
            exchange(&registry, request(Some("launch-session"), &body)).0,
            500
        );
        assert!(registry.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn launch_conflict_is_409() {
        let registry = registry();
        let mut child = registry
            .launch("taken", "true", &[])
            .expect("launch should succeed");

        let body = call(&Call::LaunchSession(LaunchRequest {
            container_id: "taken".into(),
            cmd: "true".into(),
            args: Vec::new(),
        }));
        assert_eq!(
            exchange(&registry, request(Some("launch-session"), &body)).0,
            409
        );

        child.wait().expect("child should exit");
        registry.release("taken").expect("release should succeed");
    }
}
