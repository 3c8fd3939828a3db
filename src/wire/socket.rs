//! Queued full-message socket I/O.
//!
//! Wraps a non-blocking `TcpStream` behind frame queues. Receiving
//! accumulates header then body and only surfaces complete frames; sending
//! is FIFO, and a write that would block leaves the remaining bytes queued
//! for the next send pass. A zero-byte read or a socket error closes the
//! session.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::net::TcpStream;

use log::{debug, warn};

use super::frame::{Frame, FrameError, HEADER_LEN};

/// Receive buffer size for one read call.
const READ_CHUNK: usize = 1024;

/// A session-fatal socket failure.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("connection closed by peer")]
    Closed,

    #[error("socket failure: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Incremental decode state for the incoming byte stream.
enum ReadState {
    Header { filled: usize },
    Body { header: [u8; 4], filled: usize },
}

/// A message-oriented socket carrying DAIDE frames.
pub struct FramedSocket {
    stream: TcpStream,
    incoming: VecDeque<Frame>,
    outgoing: VecDeque<Vec<u8>>,
    /// Bytes of the front outgoing buffer already written.
    outgoing_sent: usize,
    read_state: ReadState,
    body_buf: Vec<u8>,
    closed: bool,
}

impl FramedSocket {
    /// Connects to the server and switches the stream to non-blocking mode.
    pub fn connect(host: &str, port: u16) -> io::Result<FramedSocket> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        debug!("connected to {}:{}", host, port);
        Ok(FramedSocket {
            stream,
            incoming: VecDeque::new(),
            outgoing: VecDeque::new(),
            outgoing_sent: 0,
            read_state: ReadState::Header { filled: 0 },
            body_buf: Vec::new(),
            closed: false,
        })
    }

    /// Wraps an already-connected stream. Used by tests and by servers.
    pub fn from_stream(stream: TcpStream) -> io::Result<FramedSocket> {
        stream.set_nonblocking(true)?;
        Ok(FramedSocket {
            stream,
            incoming: VecDeque::new(),
            outgoing: VecDeque::new(),
            outgoing_sent: 0,
            read_state: ReadState::Header { filled: 0 },
            body_buf: Vec::new(),
            closed: false,
        })
    }

    /// True once the peer has closed or a socket error occurred.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// True while queued outgoing bytes remain unsent.
    pub fn has_pending_sends(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Queues a frame and attempts to send immediately.
    pub fn push_outgoing(&mut self, frame: &Frame) {
        self.outgoing.push_back(frame.encode());
        if let Err(err) = self.send_pending() {
            warn!("send failed: {}", err);
        }
    }

    /// Takes the next complete incoming frame, if any.
    pub fn pull_incoming(&mut self) -> Option<Frame> {
        self.incoming.pop_front()
    }

    /// Writes queued frames until the queue is empty or the socket would
    /// block. Partial writes are resumed on the next call.
    pub fn send_pending(&mut self) -> Result<(), SocketError> {
        if self.closed {
            return Err(SocketError::Closed);
        }
        while let Some(front) = self.outgoing.front() {
            match self.stream.write(&front[self.outgoing_sent..]) {
                Ok(written) => {
                    self.outgoing_sent += written;
                    if self.outgoing_sent >= front.len() {
                        self.outgoing.pop_front();
                        self.outgoing_sent = 0;
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.closed = true;
                    return Err(SocketError::Io(err));
                }
            }
        }
        Ok(())
    }

    /// Reads all available bytes and decodes any completed frames into the
    /// incoming queue.
    pub fn receive_available(&mut self) -> Result<(), SocketError> {
        if self.closed {
            return Err(SocketError::Closed);
        }
        let mut buffer = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut buffer) {
                Ok(0) => {
                    self.closed = true;
                    return Err(SocketError::Closed);
                }
                Ok(received) => {
                    self.absorb(&buffer[..received])?;
                    if received < buffer.len() {
                        return Ok(());
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.closed = true;
                    return Err(SocketError::Io(err));
                }
            }
        }
    }

    /// Feeds received bytes through the header/body state machine.
    fn absorb(&mut self, mut bytes: &[u8]) -> Result<(), SocketError> {
        while !bytes.is_empty() {
            match &mut self.read_state {
                ReadState::Header { filled } => {
                    let header_start = *filled;
                    let take = (HEADER_LEN - header_start).min(bytes.len());
                    let mut header = [0u8; HEADER_LEN];
                    // Re-copy into a scratch header so a partial header
                    // survives across calls via body_buf.
                    header[..header_start].copy_from_slice(&self.body_buf[..header_start]);
                    header[header_start..header_start + take].copy_from_slice(&bytes[..take]);
                    bytes = &bytes[take..];
                    if header_start + take < HEADER_LEN {
                        self.body_buf.resize(header_start + take, 0);
                        self.body_buf.copy_from_slice(&header[..header_start + take]);
                        self.read_state = ReadState::Header {
                            filled: header_start + take,
                        };
                        return Ok(());
                    }
                    self.body_buf.clear();
                    let length = u16::from_be_bytes([header[2], header[3]]) as usize;
                    if length == 0 {
                        self.complete_frame(header, &[])?;
                        self.read_state = ReadState::Header { filled: 0 };
                    } else {
                        self.read_state = ReadState::Body { header, filled: 0 };
                        self.body_buf = vec![0; length];
                    }
                }
                ReadState::Body { header, filled } => {
                    let length = self.body_buf.len();
                    let take = (length - *filled).min(bytes.len());
                    self.body_buf[*filled..*filled + take].copy_from_slice(&bytes[..take]);
                    *filled += take;
                    bytes = &bytes[take..];
                    if *filled == length {
                        let header = *header;
                        let body = std::mem::take(&mut self.body_buf);
                        self.complete_frame(header, &body)?;
                        self.read_state = ReadState::Header { filled: 0 };
                    }
                }
            }
        }
        Ok(())
    }

    fn complete_frame(&mut self, header: [u8; 4], body: &[u8]) -> Result<(), SocketError> {
        match Frame::decode(header[0], body) {
            Ok(frame) => {
                self.incoming.push_back(frame);
                Ok(())
            }
            Err(err) => {
                self.closed = true;
                Err(SocketError::Frame(err))
            }
        }
    }
}
