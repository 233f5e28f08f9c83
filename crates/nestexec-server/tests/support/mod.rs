#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use nestexec_frame::{
    BodyFraming, FrameReader, FrameWriter, RequestHead, ResponseHead, CONTENT_LENGTH,
    CONTENT_TYPE, TRANSFER_ENCODING,
};
use nestexec_proto::{
    decode, encode, AttachMessage, Call, CallKind, LaunchRequest, ListContainersRequest,
    ListContainersResponse, StdStream, CALL_KIND_HEADER, CONTENT_TYPE_VALUE,
};
use nestexec_server::{Registry, Server, ServerConfig};
use nestexec_transport::{NetStream, TcpTransport};

pub struct TestServer {
    pub addr: String,
    pub registry: Arc<Registry>,
}

pub fn start() -> TestServer {
    let server =
        Server::bind(ServerConfig::with_addr("127.0.0.1:0")).expect("server should bind");
    let addr = server.local_addr().to_string();
    let registry = Arc::clone(server.registry());
    server.spawn().expect("accept loop should start");
    TestServer { addr, registry }
}

/// Send one buffered call; return the response head and the reader positioned at its body.
pub fn send_call(addr: &str, call: &Call) -> (ResponseHead, FrameReader<NetStream>) {
    let stream = TcpTransport::connect(addr).expect("client should connect");
    let mut reader = FrameReader::new(stream.try_clone().expect("stream should clone"));
    let mut writer = FrameWriter::new(stream);

    let body = encode(call).expect("call should encode");
    let head = RequestHead::post("/")
        .with_header(CALL_KIND_HEADER, call.kind().as_str())
        .with_header(CONTENT_TYPE, CONTENT_TYPE_VALUE)
        .with_header(CONTENT_LENGTH, body.len().to_string());
    writer.write_request_head(&head).expect("head should send");
    writer.write_body(&body).expect("body should send");

    let response = reader.read_response_head().expect("response head should arrive");
    (response, reader)
}

pub struct InputStream {
    pub writer: FrameWriter<NetStream>,
    pub reader: FrameReader<NetStream>,
}

impl InputStream {
    pub fn open(addr: &str) -> Self {
        let stream = TcpTransport::connect(addr).expect("client should connect");
        let reader = FrameReader::new(stream.try_clone().expect("stream should clone"));
        let mut writer = FrameWriter::new(stream);
        let head = RequestHead::post("/")
            .with_header(CALL_KIND_HEADER, CallKind::AttachInput.as_str())
            .with_header(CONTENT_TYPE, CONTENT_TYPE_VALUE)
            .with_header(TRANSFER_ENCODING, "chunked");
        writer.write_request_head(&head).expect("head should send");
        Self { writer, reader }
    }

    pub fn send(&mut self, message: impl Into<AttachMessage>) {
        let payload = encode(&message.into()).expect("message should encode");
        self.writer.write_frame(&payload).expect("frame should send");
    }

    /// End the request body and return the final status.
    pub fn finish(mut self) -> u16 {
        self.writer.write_terminator().expect("terminator should send");
        self.reader
            .read_response_head()
            .expect("response should arrive")
            .status
    }
}

pub fn launch(id: &str, cmd: &str, args: &[&str]) -> Call {
    Call::LaunchSession(LaunchRequest {
        container_id: id.to_string(),
        cmd: cmd.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
    })
}

pub fn attach_output(id: &str, interactive: bool) -> Call {
    Call::AttachOutput(AttachMessage::initiate(id, false, interactive))
}

pub fn list(addr: &str) -> BTreeSet<String> {
    let (head, mut reader) = send_call(addr, &Call::ListContainers(ListContainersRequest {}));
    assert_eq!(head.status, 200);
    let BodyFraming::Length(len) = head.framing().expect("framing should parse") else {
        panic!("list response should carry a body");
    };
    let body = reader.read_body(len).expect("body should arrive");
    decode::<ListContainersResponse>(&body)
        .expect("body should decode")
        .ids
}

/// Read an output stream to its terminator, split into (stdout, stderr).
pub fn collect_output(reader: &mut FrameReader<NetStream>) -> (Vec<u8>, Vec<u8>) {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    while let Some(frame) = reader.read_frame().expect("output stream should be well formed") {
        match decode::<AttachMessage>(&frame.payload).expect("frame should decode") {
            AttachMessage::Io(io) if io.stream == StdStream::Stdout => stdout.extend(io.data),
            AttachMessage::Io(io) if io.stream == StdStream::Stderr => stderr.extend(io.data),
            other => panic!("unexpected message on output stream: {other:?}"),
        }
    }
    (stdout, stderr)
}

pub fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(20));
    }
}
