use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use waywire_wire::RawFd;

/// Destination for encoded outgoing messages.
///
/// The engine calls [`on_output`](OutputSink::on_output) once per message,
/// with the complete message bytes and every file descriptor the message
/// declares. There is no buffering or flow control on the engine side.
pub trait OutputSink {
    fn on_output(&mut self, data: &[u8], fds: &[RawFd]) -> io::Result<()>;
}

impl<F> OutputSink for F
where
    F: FnMut(&[u8], &[RawFd]) -> io::Result<()>,
{
    fn on_output(&mut self, data: &[u8], fds: &[RawFd]) -> io::Result<()> {
        self(data, fds)
    }
}

#[derive(Debug, Default)]
struct Recorded {
    bytes: Vec<u8>,
    fds: Vec<RawFd>,
    chunks: usize,
}

/// In-memory sink that records everything written to it.
///
/// Clones share the same recording, so a test can keep one handle and give
/// the other to the engine.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    recorded: Rc<RefCell<Recorded>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the bytes recorded so far.
    pub fn take_bytes(&self) -> Vec<u8> {
        std::mem::take(&mut self.recorded.borrow_mut().bytes)
    }

    /// Take the file descriptors recorded so far.
    pub fn take_fds(&self) -> Vec<RawFd> {
        std::mem::take(&mut self.recorded.borrow_mut().fds)
    }

    /// Number of `on_output` calls received.
    pub fn chunks(&self) -> usize {
        self.recorded.borrow().chunks
    }

    /// Bytes currently held.
    pub fn len(&self) -> usize {
        self.recorded.borrow().bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutputSink for MemorySink {
    fn on_output(&mut self, data: &[u8], fds: &[RawFd]) -> io::Result<()> {
        let mut recorded = self.recorded.borrow_mut();
        recorded.bytes.extend_from_slice(data);
        recorded.fds.extend_from_slice(fds);
        recorded.chunks += 1;
        Ok(())
    }
}
