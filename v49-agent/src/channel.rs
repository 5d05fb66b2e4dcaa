// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
The channel abstraction: a polymorphic, message-framed duplex
connection used by both the daemon's southbound/northbound dispatcher
and the tool's expect engine. Framing is fixed at one wire frame per
send; a frame is whatever `Packet::format`/`Packet::parse` (or
`Control::format`/`Control::parse`) produce, so the transport never
needs to understand VITA-49 itself.
*/

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use crate::errors::AgentError;

/// Readiness of a channel's two directions, as reported by a
/// non-blocking probe. The expect engine and the daemon poll loop are
/// both single-threaded cooperative schedulers driven by this.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Readiness {
    /// True if a full frame is available to read without blocking.
    pub readable: bool,
    /// True if outbound bytes can be written without blocking.
    pub writable: bool,
}

/// A message-framed duplex connection. Implementations: [`UnixChannel`]
/// (daemon and tool, over a Unix-domain stream socket) and
/// [`LoopbackChannel`] (an in-process test double).
pub trait Channel {
    /// Queues `frame` for sending. Does not necessarily write it to the
    /// transport immediately; call [`Channel::flush_writes`] to drain the
    /// queue.
    fn enqueue(&mut self, frame: Vec<u8>) -> Result<(), AgentError>;
    /// Returns one received frame if a complete one is buffered, without
    /// blocking.
    fn try_read(&mut self) -> Result<Option<Vec<u8>>, AgentError>;
    /// Reports which directions are currently ready, without blocking.
    fn readiness(&mut self) -> Result<Readiness, AgentError>;
    /// Attempts to write any buffered outbound bytes, without blocking.
    fn flush_writes(&mut self) -> Result<(), AgentError>;
    /// Closes the underlying transport. Idempotent.
    fn close(&mut self);
}

/// Reads the wire length of a frame's header, in bytes, given its first
/// four bytes. VRT packets encode length in 32-bit words at bytes 2..4;
/// Control packets encode a byte length at bytes 4..8 after a 4-byte
/// magic. Both are distinguished the same way `Packet::parse` does: by
/// the Control magic.
fn frame_len(head: &[u8; 8]) -> usize {
    if vita49::Control::has_magic(head) {
        8 + u32::from_be_bytes([head[4], head[5], head[6], head[7]]) as usize
    } else {
        let words = u16::from_be_bytes([head[2], head[3]]) as usize;
        words * 4
    }
}

/// A Unix-domain stream socket channel, used by both the daemon and the
/// tool. Framing: one VRT or Control frame per `enqueue`/`try_read`;
/// length is self-describing per [`frame_len`], so no additional framing
/// bytes are added on the wire.
#[cfg(unix)]
pub struct UnixChannel {
    stream: UnixStream,
    send_queue: VecDeque<Vec<u8>>,
    write_in_progress: Vec<u8>,
    read_buf: Vec<u8>,
}

#[cfg(unix)]
impl UnixChannel {
    /// Wraps an already-connected stream, switching it to non-blocking
    /// mode so every operation on this channel is a suspension-free
    /// probe.
    pub fn new(stream: UnixStream) -> Result<UnixChannel, AgentError> {
        stream
            .set_nonblocking(true)
            .map_err(|e| AgentError::Channel(e.to_string()))?;
        Ok(UnixChannel {
            stream,
            send_queue: VecDeque::new(),
            write_in_progress: Vec::new(),
            read_buf: Vec::new(),
        })
    }

    /// Connects to a listening daemon socket at `path`.
    pub fn connect(path: &std::path::Path) -> Result<UnixChannel, AgentError> {
        let stream = UnixStream::connect(path).map_err(|e| AgentError::Channel(e.to_string()))?;
        UnixChannel::new(stream)
    }

    fn try_fill_read_buf(&mut self) -> Result<(), AgentError> {
        let mut chunk = [0u8; 4096];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(AgentError::Channel("peer closed connection".into())),
                Ok(n) => self.read_buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(AgentError::Channel(e.to_string())),
            }
        }
    }
}

#[cfg(unix)]
impl Channel for UnixChannel {
    fn enqueue(&mut self, frame: Vec<u8>) -> Result<(), AgentError> {
        self.send_queue.push_back(frame);
        Ok(())
    }

    fn try_read(&mut self) -> Result<Option<Vec<u8>>, AgentError> {
        self.try_fill_read_buf()?;
        if self.read_buf.len() < 8 {
            return Ok(None);
        }
        let head: [u8; 8] = self.read_buf[0..8].try_into().unwrap();
        let len = frame_len(&head);
        if self.read_buf.len() < len {
            return Ok(None);
        }
        let frame = self.read_buf[..len].to_vec();
        self.read_buf.drain(..len);
        Ok(Some(frame))
    }

    fn readiness(&mut self) -> Result<Readiness, AgentError> {
        self.try_fill_read_buf()?;
        let head_ready = self.read_buf.len() >= 8
            && self.read_buf.len() >= frame_len(&self.read_buf[0..8].try_into().unwrap());
        Ok(Readiness {
            readable: head_ready,
            writable: true,
        })
    }

    fn flush_writes(&mut self) -> Result<(), AgentError> {
        if self.write_in_progress.is_empty() {
            match self.send_queue.pop_front() {
                Some(frame) => self.write_in_progress = frame,
                None => return Ok(()),
            }
        }
        while !self.write_in_progress.is_empty() {
            match self.stream.write(&self.write_in_progress) {
                Ok(n) => {
                    self.write_in_progress.drain(..n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(AgentError::Channel(e.to_string())),
            }
        }
        self.flush_writes()
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

/// An in-process loopback channel: a bounded pair of queues, used by
/// tests and the expect engine's unit coverage. Constructed in
/// connected pairs via [`LoopbackChannel::pair`].
#[derive(Debug, Default)]
pub struct LoopbackChannel {
    outbox: VecDeque<Vec<u8>>,
    inbox: std::rc::Rc<std::cell::RefCell<VecDeque<Vec<u8>>>>,
    peer_inbox: std::rc::Rc<std::cell::RefCell<VecDeque<Vec<u8>>>>,
    closed: bool,
}

impl LoopbackChannel {
    /// Builds two channels wired to each other: a frame enqueued on one
    /// side becomes readable on the other once `flush_writes` runs.
    pub fn pair() -> (LoopbackChannel, LoopbackChannel) {
        let a_to_b = std::rc::Rc::new(std::cell::RefCell::new(VecDeque::new()));
        let b_to_a = std::rc::Rc::new(std::cell::RefCell::new(VecDeque::new()));
        let a = LoopbackChannel {
            outbox: VecDeque::new(),
            inbox: b_to_a.clone(),
            peer_inbox: a_to_b.clone(),
            closed: false,
        };
        let b = LoopbackChannel {
            outbox: VecDeque::new(),
            inbox: a_to_b,
            peer_inbox: b_to_a,
            closed: false,
        };
        (a, b)
    }
}

impl Channel for LoopbackChannel {
    fn enqueue(&mut self, frame: Vec<u8>) -> Result<(), AgentError> {
        if self.closed {
            return Err(AgentError::Channel("channel closed".into()));
        }
        self.outbox.push_back(frame);
        Ok(())
    }

    fn try_read(&mut self) -> Result<Option<Vec<u8>>, AgentError> {
        Ok(self.inbox.borrow_mut().pop_front())
    }

    fn readiness(&mut self) -> Result<Readiness, AgentError> {
        Ok(Readiness {
            readable: !self.inbox.borrow().is_empty(),
            writable: true,
        })
    }

    fn flush_writes(&mut self) -> Result<(), AgentError> {
        while let Some(frame) = self.outbox.pop_front() {
            self.peer_inbox.borrow_mut().push_back(frame);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_pair_delivers_after_flush() {
        let (mut a, mut b) = LoopbackChannel::pair();
        a.enqueue(vec![1, 2, 3]).unwrap();
        assert!(b.try_read().unwrap().is_none());
        a.flush_writes().unwrap();
        assert_eq!(b.try_read().unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn closed_loopback_rejects_enqueue() {
        let (mut a, _b) = LoopbackChannel::pair();
        a.close();
        assert!(a.enqueue(vec![1]).is_err());
    }

    #[test]
    fn readiness_reflects_pending_frame() {
        let (mut a, mut b) = LoopbackChannel::pair();
        assert!(!b.readiness().unwrap().readable);
        a.enqueue(vec![9]).unwrap();
        a.flush_writes().unwrap();
        assert!(b.readiness().unwrap().readable);
    }
}
