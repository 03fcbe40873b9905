//! Command Buffer Arena
//!
//! Fixed-capacity command buffers ("cmdfiles") the engine's command DMA
//! replays instead of direct register writes. Each buffer holds
//! `(offset, value)` word pairs and lives at a fixed DMA address. Buffers are
//! addressed by integer id; a chain is formed by patching each used buffer's
//! trailer to point at the next one.

use tracing::{debug, error};

use crate::error::{G2dError, Result};
use crate::regs::*;

/// Words held back in every buffer for the chain trailer (three pairs).
pub const TRAILER_WORDS: usize = 6;

#[derive(Debug, Clone)]
struct CmdBuffer {
    words: Vec<u32>,
    dirty: bool,
    dma_addr: u64,
}

impl CmdBuffer {
    fn entries(&self) -> u32 {
        (self.words.len() / 2) as u32
    }

    fn push_pair(&mut self, offset: u32, value: u32) {
        self.words.push(offset);
        self.words.push(value);
    }
}

/// Where the command DMA starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainHead {
    pub dma_addr: u64,
    /// Pair count of the first buffer, trailer included.
    pub entries: u32,
    pub buffers: usize,
}

#[derive(Debug, Clone)]
pub struct CmdArena {
    buffers: Vec<CmdBuffer>,
    capacity_words: usize,
}

impl CmdArena {
    /// `count` buffers of `capacity_words` words, laid out back to back from
    /// `dma_base`.
    pub fn new(count: usize, capacity_words: usize, dma_base: u64) -> Self {
        let buffers = (0..count)
            .map(|id| CmdBuffer {
                words: Vec::with_capacity(capacity_words),
                dirty: false,
                dma_addr: dma_base + (id * capacity_words * 4) as u64,
            })
            .collect();
        Self {
            buffers,
            capacity_words,
        }
    }

    pub fn count(&self) -> usize {
        self.buffers.len()
    }

    fn buffer(&self, id: usize) -> Result<&CmdBuffer> {
        self.buffers.get(id).ok_or(G2dError::CmdBufferId {
            id,
            count: self.buffers.len(),
        })
    }

    fn buffer_mut(&mut self, id: usize) -> Result<&mut CmdBuffer> {
        let count = self.buffers.len();
        self.buffers
            .get_mut(id)
            .ok_or(G2dError::CmdBufferId { id, count })
    }

    /// Words still free in buffer `id`, excluding the trailer reserve.
    pub fn remaining(&self, id: usize) -> Result<usize> {
        let used = self.buffer(id)?.words.len();
        Ok(self.capacity_words.saturating_sub(TRAILER_WORDS + used))
    }

    /// Words used so far in buffer `id`.
    pub fn len(&self, id: usize) -> Result<usize> {
        Ok(self.buffer(id)?.words.len())
    }

    pub fn is_dirty(&self, id: usize) -> Result<bool> {
        Ok(self.buffer(id)?.dirty)
    }

    fn ensure(&self, id: usize, needed: usize) -> Result<()> {
        let remaining = self.remaining(id)?;
        if needed > remaining {
            error!(
                "cmdbuf {}: need {} words, {} remaining",
                id, needed, remaining
            );
            return Err(G2dError::CmdBufferFull {
                id,
                needed,
                remaining,
            });
        }
        Ok(())
    }

    pub fn append(&mut self, id: usize, offset: u32, value: u32) -> Result<()> {
        self.ensure(id, 2)?;
        let buf = self.buffer_mut(id)?;
        buf.push_pair(offset, value);
        buf.dirty = true;
        Ok(())
    }

    /// Append every write or none of them.
    pub fn append_all(&mut self, id: usize, writes: &[RegWrite]) -> Result<()> {
        self.ensure(id, writes.len() * 2)?;
        let buf = self.buffer_mut(id)?;
        for w in writes {
            buf.push_pair(w.offset, w.value);
        }
        if !writes.is_empty() {
            buf.dirty = true;
        }
        Ok(())
    }

    /// Patch the trailers of all dirty buffers into one chain, in id order.
    ///
    /// Trailers are written back to front so that every buffer can record the
    /// final pair count of its successor.
    pub fn finalize_chain(&mut self) -> Option<ChainHead> {
        let dirty: Vec<usize> = (0..self.buffers.len())
            .filter(|&id| self.buffers[id].dirty)
            .collect();
        let (&first, &last) = (dirty.first()?, dirty.last()?);

        self.buffers[last].push_pair(G2D_CMD_CHAIN_END, 1);
        for pair in dirty.windows(2).rev() {
            let next = &self.buffers[pair[1]];
            let (next_addr, next_entries) = (next.dma_addr, next.entries());
            let buf = &mut self.buffers[pair[0]];
            buf.push_pair(G2D_CMD_NEXT_LO, lo32(next_addr));
            buf.push_pair(G2D_CMD_NEXT_HI, hi32(next_addr));
            buf.push_pair(G2D_CMD_NEXT_LEN, next_entries);
        }

        let head = &self.buffers[first];
        debug!(
            "cmd chain: {} buffers, head 0x{:X} ({} entries)",
            dirty.len(),
            head.dma_addr,
            head.entries()
        );
        Some(ChainHead {
            dma_addr: head.dma_addr,
            entries: head.entries(),
            buffers: dirty.len(),
        })
    }

    /// `(dma_addr, words)` of every dirty buffer, for upload before a kick.
    pub fn dirty_buffers(&self) -> impl Iterator<Item = (u64, &[u32])> {
        self.buffers
            .iter()
            .filter(|b| b.dirty)
            .map(|b| (b.dma_addr, b.words.as_slice()))
    }

    /// Empty every buffer for the next request.
    pub fn reset(&mut self) {
        for buf in &mut self.buffers {
            buf.words.clear();
            buf.dirty = false;
        }
    }
}
