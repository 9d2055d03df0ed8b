pub mod buffer;

pub use buffer::RingBuffer;

use crate::models::BufferEntry;

/// Names the entry returned by a peek; only that entry can be confirmed with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHandle(pub u64);

/// Durable FIFO of captured readings with a two-phase read.
pub trait ReadingBuffer {
    fn append(&mut self, entry: BufferEntry);
    fn peek_oldest(&self) -> Option<(EntryHandle, BufferEntry)>;
    /// Remove the peeked entry. A stale handle is ignored.
    fn confirm_removed(&mut self, handle: EntryHandle);
    fn count(&self) -> usize;
}
