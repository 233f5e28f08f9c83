//! One function per server call.
//!
//! Each call opens its own connection. Streaming calls hand back the open
//! connection so the caller can consume (or feed) the chunked body.

use std::collections::BTreeSet;

use nestexec_frame::{
    BodyFraming, FrameReader, FrameWriter, RequestHead, ResponseHead, CONTENT_LENGTH,
    CONTENT_TYPE, TRANSFER_ENCODING,
};
use nestexec_proto::{
    decode, encode, AttachMessage, Call, CallKind, ControlMessage, InitiateStream, LaunchRequest,
    ListContainersRequest, ListContainersResponse, CALL_KIND_HEADER, CONTENT_TYPE_VALUE,
};
use nestexec_transport::{NetStream, TcpTransport};
use tracing::debug;

use crate::error::{ClientError, Result};

type Conn = (FrameReader<NetStream>, FrameWriter<NetStream>);

fn connect(addr: &str) -> Result<Conn> {
    let stream = TcpTransport::connect(addr)?;
    let reader = FrameReader::new(stream.try_clone()?);
    Ok((reader, FrameWriter::new(stream)))
}

fn request_head(kind: CallKind) -> RequestHead {
    RequestHead::post("/")
        .with_header(CALL_KIND_HEADER, kind.as_str())
        .with_header(CONTENT_TYPE, CONTENT_TYPE_VALUE)
}

/// Send `call` as a buffered request and read the response head.
fn call(addr: &str, call: &Call) -> Result<(ResponseHead, FrameReader<NetStream>)> {
    let (mut reader, mut writer) = connect(addr)?;
    let body = encode(call)?;
    let head =
        request_head(call.kind()).with_header(CONTENT_LENGTH, body.len().to_string());
    writer.write_request_head(&head)?;
    writer.write_body(&body)?;

    let response = reader.read_response_head()?;
    debug!(call = %call.kind(), status = response.status, "response received");
    Ok((response, reader))
}

/// Map a non-200 status to the typed failure for `id`.
fn status_error(status: u16, id: &str, conflict: fn(String) -> ClientError) -> ClientError {
    match status {
        400 => ClientError::BadRequest,
        404 => ClientError::NotFound(id.to_string()),
        409 => conflict(id.to_string()),
        other => ClientError::UnexpectedStatus(other),
    }
}

/// Ids of every container the server has registered.
pub fn list_containers(addr: &str) -> Result<BTreeSet<String>> {
    let (head, mut reader) = call(addr, &Call::ListContainers(ListContainersRequest::default()))?;
    if !head.is_success() {
        return Err(ClientError::UnexpectedStatus(head.status));
    }
    let response: ListContainersResponse = match head.framing()? {
        BodyFraming::Length(len) => decode(&reader.read_body(len)?)?,
        BodyFraming::Empty => ListContainersResponse::default(),
        BodyFraming::Chunked => return Err(ClientError::UnexpectedStatus(head.status)),
    };
    Ok(response.ids)
}

/// Launch a process and return the open launch stream.
///
/// The stream ends with the terminator once the process has exited and its
/// output has been drained.
pub fn launch(addr: &str, request: LaunchRequest) -> Result<OutputStream> {
    let id = request.container_id.clone();
    let (head, reader) = call(addr, &Call::LaunchSession(request))?;
    if !head.is_success() {
        return Err(status_error(head.status, &id, ClientError::Conflict));
    }
    Ok(OutputStream { reader })
}

/// Attach to a container's output.
pub fn attach_output(addr: &str, init: InitiateStream) -> Result<OutputStream> {
    let id = init.container_id.clone();
    let message = AttachMessage::Control(ControlMessage::InitiateStream(init));
    let (head, reader) = call(addr, &Call::AttachOutput(message))?;
    if !head.is_success() {
        return Err(status_error(head.status, &id, ClientError::AlreadyAttached));
    }
    Ok(OutputStream { reader })
}

/// Open an input stream for a container. The initiate message is sent right away.
pub fn attach_input(addr: &str, init: InitiateStream) -> Result<InputStream> {
    let (reader, mut writer) = connect(addr)?;
    let head = request_head(CallKind::AttachInput).with_header(TRANSFER_ENCODING, "chunked");
    writer.write_request_head(&head)?;

    let container_id = init.container_id.clone();
    let mut stream = InputStream {
        container_id,
        reader,
        writer,
    };
    stream.send(&AttachMessage::Control(ControlMessage::InitiateStream(init)))?;
    Ok(stream)
}

/// The chunked body of a launch or attach-output response.
pub struct OutputStream {
    reader: FrameReader<NetStream>,
}

impl OutputStream {
    /// Next message, or `None` after the terminator.
    pub fn next_message(&mut self) -> Result<Option<AttachMessage>> {
        match self.reader.read_frame()? {
            Some(frame) => Ok(Some(decode(&frame.payload)?)),
            None => Ok(None),
        }
    }

    /// Read and discard messages until the terminator.
    pub fn drain(&mut self) -> Result<usize> {
        let mut count = 0;
        while self.next_message()?.is_some() {
            count += 1;
        }
        Ok(count)
    }
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("finished", &self.reader.is_finished())
            .finish_non_exhaustive()
    }
}

/// The chunked request body of an attach-input call.
pub struct InputStream {
    container_id: String,
    reader: FrameReader<NetStream>,
    writer: FrameWriter<NetStream>,
}

impl InputStream {
    pub fn send(&mut self, message: &AttachMessage) -> Result<()> {
        let payload = encode(message)?;
        self.writer.write_frame(&payload)?;
        Ok(())
    }

    /// Terminate the request body and wait for the final status.
    pub fn finish(mut self) -> Result<()> {
        if let Err(err) = self.writer.write_terminator() {
            // The server may already have answered; its status is still worth reading.
            debug!(container_id = %self.container_id, error = %err, "terminator not sent");
        }
        let head = self.reader.read_response_head()?;
        if head.is_success() {
            return Ok(());
        }
        Err(status_error(
            head.status,
            &self.container_id,
            ClientError::Conflict,
        ))
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }
}

impl std::fmt::Debug for InputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputStream")
            .field("container_id", &self.container_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(400, "c", ClientError::Conflict),
            ClientError::BadRequest
        ));
        assert!(matches!(
            status_error(404, "c", ClientError::Conflict),
            ClientError::NotFound(id) if id == "c"
        ));
        assert!(matches!(
            status_error(409, "c", ClientError::Conflict),
            ClientError::Conflict(id) if id == "c"
        ));
        assert!(matches!(
            status_error(409, "c", ClientError::AlreadyAttached),
            ClientError::AlreadyAttached(id) if id == "c"
        ));
        assert!(matches!(
            status_error(500, "c", ClientError::Conflict),
            ClientError::UnexpectedStatus(500)
        ));
    }

    #[test]
    fn unreachable_server_is_transport_error() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let err = list_containers(&addr).unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }
}
