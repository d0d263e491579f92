use crate::config::Config;
use crate::error::ChannelError;
use crate::wire::Record;
use std::io::{ErrorKind, Read, Write};
use std::mem::size_of;
use std::os::unix::net::UnixStream;

/// A single synchronous request/response round trip to the external device-model process.
///
/// Per §4.5: one connection per fault, one request record sent, one response record received,
/// connection dropped. No multiplexing, no pipelining - the caller blocks until this returns.
pub fn round_trip(config: &Config, request: Record) -> Result<Record, ChannelError> {
    let stream = match UnixStream::connect(&config.socket_path) {
        Ok(stream) => stream,
        Err(err) if is_unreachable(&err) => {
            // Called from the signal-handler hot path: no logging here, since `tracing`'s
            // formatting and dispatch machinery is not async-signal-safe and allocates.
            return if config.permissive_startup { Ok(benign_response(&request)) } else { Err(ChannelError::Unreachable(err)) };
        }
        Err(err) => return Err(ChannelError::Unreachable(err)),
    };

    send_request(&stream, &request)?;
    let response = receive_response(&stream)?;

    if response.is_error() {
        return Err(ChannelError::ModelError(response.result));
    }

    Ok(response)
}

fn is_unreachable(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::ConnectionRefused | ErrorKind::NotFound)
}

fn benign_response(request: &Record) -> Record {
    Record { data: 0, result: 0, ..*request }
}

fn send_request(mut stream: &UnixStream, request: &Record) -> Result<(), ChannelError> {
    let bytes = request.to_bytes();
    stream.write_all(&bytes).map_err(|_| ChannelError::ShortWrite { written: 0, expected: bytes.len() })
}

fn receive_response(mut stream: &UnixStream) -> Result<Record, ChannelError> {
    let mut bytes = [0u8; size_of::<Record>()];
    stream
        .read_exact(&mut bytes)
        .map_err(|_| ChannelError::ShortRead { read: 0, expected: bytes.len() })?;
    Ok(Record::from_bytes(bytes))
}
