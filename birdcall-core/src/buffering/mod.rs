//! Unbounded FIFO of sample chunks between the device callback and the poll loop.
//!
//! Backed by an unbounded `crossbeam_channel`: `send` on an unbounded channel
//! never blocks and never fails while the receiving side is alive, so the
//! producer half is safe to use from the driver's callback thread. Draining
//! for `clear` goes through the same lock-free `try_recv` as `try_pop`, so a
//! push racing a clear lands either before the clear (and is discarded) or
//! after it (and is kept), never in a torn state.

pub mod chunk;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use chunk::SampleChunk;

/// Producer half, cloned into the device callback.
#[derive(Debug, Clone)]
pub struct ChunkProducer {
    tx: Sender<SampleChunk>,
}

impl ChunkProducer {
    /// Enqueue a chunk. Never blocks.
    ///
    /// A chunk pushed after the owning `CaptureBuffer` is gone is dropped.
    pub fn push(&self, chunk: SampleChunk) {
        let _ = self.tx.send(chunk);
    }
}

/// Consumer-side owner of the capture queue.
#[derive(Debug)]
pub struct CaptureBuffer {
    tx: Sender<SampleChunk>,
    rx: Receiver<SampleChunk>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// A new producer handle feeding this buffer.
    pub fn producer(&self) -> ChunkProducer {
        ChunkProducer {
            tx: self.tx.clone(),
        }
    }

    pub fn push(&self, chunk: SampleChunk) {
        let _ = self.tx.send(chunk);
    }

    /// Pop the oldest chunk, or `None` when nothing is queued right now.
    pub fn try_pop(&self) -> Option<SampleChunk> {
        match self.rx.try_recv() {
            Ok(chunk) => Some(chunk),
            // We hold a sender ourselves, so the channel never disconnects.
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Discard everything currently queued. Returns the number of chunks dropped.
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }

    /// Snapshot of the queue length.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for CaptureBuffer {
    fn default() -> Self {
        Self::new()
    }
}
