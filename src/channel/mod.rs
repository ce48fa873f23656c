//! Blocking request/response transport to the compiler server
//!
//! One trait, two implementations: [`RemoteChannel`] talks to the
//! spawned compiler process over a Unix socket with length-prefixed
//! frames, [`LocalChannel`] adapts an in-process handler (embedded mode
//! and tests). Which one a proxy uses is decided at construction time.
//!
//! The channel is not reentrant: exactly one outstanding request at a
//! time. [`ChannelWorker`] moves the actual send onto a dedicated thread
//! so the caller can keep ticking a progress callback while it waits,
//! but the call remains logically blocking — there is no pipelining and
//! no cancellation.

use crate::error::TransportError;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Maximum frame size (10MB, guards against a corrupted length prefix)
const MAX_FRAME_SIZE: u32 = 10 * 1024 * 1024;

/// Interval between progress callback invocations while waiting
const PROGRESS_TICK: Duration = Duration::from_millis(10);

/// A blocking request/response transport
pub trait Channel: Send {
    /// Send one expression, return the raw reply text
    fn send(&mut self, expression: &str) -> Result<String, TransportError>;
}

/// Encode a request or reply into the wire format
///
/// Format: [4-byte LE length][UTF-8 payload]
pub fn write_frame<W: Write>(writer: &mut W, text: &str) -> Result<(), TransportError> {
    let payload = text.as_bytes();
    if payload.len() as u64 > MAX_FRAME_SIZE as u64 {
        return Err(TransportError::Frame(format!(
            "Frame too large: {} bytes",
            payload.len()
        )));
    }
    writer
        .write_all(&(payload.len() as u32).to_le_bytes())
        .and_then(|_| writer.write_all(payload))
        .and_then(|_| writer.flush())
        .map_err(TransportError::Write)
}

/// Decode one frame from the wire format
pub fn read_frame<R: Read>(reader: &mut R) -> Result<String, TransportError> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).map_err(TransportError::Read)?;
    let len = u32::from_le_bytes(len_bytes);
    if len > MAX_FRAME_SIZE {
        return Err(TransportError::Frame(format!("Frame too large: {} bytes", len)));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).map_err(TransportError::Read)?;
    String::from_utf8(payload).map_err(|e| TransportError::Frame(format!("Invalid UTF-8: {}", e)))
}

/// Channel to the spawned compiler process
///
/// The socket path comes from the single line of the handle file the
/// compiler writes once it is ready to accept commands.
pub struct RemoteChannel {
    stream: UnixStream,
}

impl RemoteChannel {
    pub fn connect(address: &str) -> Result<Self, TransportError> {
        let stream = UnixStream::connect(address).map_err(|source| TransportError::Connect {
            address: address.to_string(),
            source,
        })?;
        Ok(Self { stream })
    }
}

impl Channel for RemoteChannel {
    fn send(&mut self, expression: &str) -> Result<String, TransportError> {
        write_frame(&mut self.stream, expression)?;
        read_frame(&mut self.stream)
    }
}

/// In-process adapter around a reply function
///
/// Used for embedded mode and for tests that script the compiler's side
/// of the conversation.
pub struct LocalChannel {
    handler: Box<dyn FnMut(&str) -> String + Send>,
}

impl LocalChannel {
    pub fn new<F>(handler: F) -> Self
    where
        F: FnMut(&str) -> String + Send + 'static,
    {
        Self {
            handler: Box::new(handler),
        }
    }
}

impl Channel for LocalChannel {
    fn send(&mut self, expression: &str) -> Result<String, TransportError> {
        Ok((self.handler)(expression))
    }
}

/// Runs a channel on a dedicated thread
///
/// `send` blocks the caller until the reply arrives, waking every
/// [`PROGRESS_TICK`] to invoke the optional progress callback so a
/// front end is not starved during long compiler calls.
pub struct ChannelWorker {
    requests: Option<mpsc::Sender<String>>,
    replies: mpsc::Receiver<Result<String, TransportError>>,
    handle: Option<JoinHandle<()>>,
}

impl ChannelWorker {
    pub fn spawn(mut channel: Box<dyn Channel>) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<String>();
        let (reply_tx, reply_rx) = mpsc::channel();

        let handle = std::thread::spawn(move || {
            while let Ok(expression) = request_rx.recv() {
                let result = channel.send(&expression);
                if reply_tx.send(result).is_err() {
                    break;
                }
            }
        });

        Self {
            requests: Some(request_tx),
            replies: reply_rx,
            handle: Some(handle),
        }
    }

    /// Send one expression and block until its reply arrives
    pub fn send(
        &self,
        expression: &str,
        mut progress: Option<&mut dyn FnMut()>,
    ) -> Result<String, TransportError> {
        let requests = self.requests.as_ref().ok_or(TransportError::Closed)?;
        requests
            .send(expression.to_string())
            .map_err(|_| TransportError::Closed)?;

        loop {
            match self.replies.recv_timeout(PROGRESS_TICK) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(callback) = progress.as_mut() {
                        callback();
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Err(TransportError::Closed),
            }
        }
    }
}

impl Drop for ChannelWorker {
    fn drop(&mut self) {
        // closing the request sender ends the worker loop
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
