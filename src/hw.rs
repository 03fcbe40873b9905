//! Hardware Access
//!
//! [`RegisterIo`] is everything the driver needs from the engine: 32-bit
//! register access and a way to place command buffers in DMA memory.
//! [`Mmio`] drives a mapped register window; [`SimEngine`] is a register
//! file that executes kicks (including command chains) and raises the
//! completion interrupt, used by tests and the replay tool.

use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::atomic::{fence, Ordering};
use std::sync::Arc;

use tracing::{trace, warn};

use crate::device::Completion;
use crate::generation::Generation;
use crate::regs::*;

pub trait RegisterIo: Send {
    fn write(&mut self, offset: u32, value: u32);

    fn read(&mut self, offset: u32) -> u32;

    /// Copy a command buffer to `dma_addr` and make it visible to the
    /// engine.
    fn upload(&mut self, dma_addr: u64, words: &[u32]);

    /// Route the engine's completion interrupt. Real hardware is wired up by
    /// the interrupt handler calling `Device::handle_irq` instead.
    fn connect_irq(&mut self, _irq: Arc<Completion>) {}
}

/// A mapped register window plus the command buffer memory.
pub struct Mmio {
    regs: NonNull<u32>,
    reg_words: usize,
    cmd_mem: NonNull<u32>,
    cmd_words: usize,
    cmd_dma_base: u64,
}

// SAFETY: the mappings are owned by this handle and only touched through
// `&mut self`.
unsafe impl Send for Mmio {}

impl Mmio {
    /// # Safety
    /// `regs` must map `REG_SPACE_SIZE` bytes of engine registers and
    /// `cmd_mem` must map `cmd_words` words that the engine sees at
    /// `cmd_dma_base`, both valid for the lifetime of the returned value.
    pub unsafe fn new(
        regs: *mut u32,
        cmd_mem: *mut u32,
        cmd_words: usize,
        cmd_dma_base: u64,
    ) -> Option<Self> {
        Some(Self {
            regs: NonNull::new(regs)?,
            reg_words: (REG_SPACE_SIZE / 4) as usize,
            cmd_mem: NonNull::new(cmd_mem)?,
            cmd_words,
            cmd_dma_base,
        })
    }
}

impl RegisterIo for Mmio {
    fn write(&mut self, offset: u32, value: u32) {
        let index = (offset / 4) as usize;
        if index >= self.reg_words {
            warn!("mmio write outside register window: 0x{:X}", offset);
            return;
        }
        // SAFETY: index is inside the mapped window.
        unsafe { self.regs.as_ptr().add(index).write_volatile(value) }
    }

    fn read(&mut self, offset: u32) -> u32 {
        let index = (offset / 4) as usize;
        if index >= self.reg_words {
            return 0;
        }
        // SAFETY: index is inside the mapped window.
        unsafe { self.regs.as_ptr().add(index).read_volatile() }
    }

    fn upload(&mut self, dma_addr: u64, words: &[u32]) {
        let start = (dma_addr.wrapping_sub(self.cmd_dma_base) / 4) as usize;
        if start + words.len() > self.cmd_words {
            warn!("command buffer at 0x{:X} outside command memory", dma_addr);
            return;
        }
        for (i, &word) in words.iter().enumerate() {
            // SAFETY: bounds checked above.
            unsafe { self.cmd_mem.as_ptr().add(start + i).write_volatile(word) }
        }
        // Buffer contents must land before the start bit.
        fence(Ordering::SeqCst);
    }
}

/// Simulated engine.
pub struct SimEngine {
    regs: Vec<u32>,
    version: u32,
    log: Vec<RegWrite>,
    cmd_mem: HashMap<u64, Vec<u32>>,
    kicks: u32,
    frames: u32,
    resets: u32,
    hang: bool,
    fault: Option<IntStatus>,
    irq: Option<Arc<Completion>>,
}

impl SimEngine {
    pub fn new(gen: Generation) -> Self {
        let mut sim = Self {
            regs: vec![0; (REG_SPACE_SIZE / 4) as usize],
            version: gen.version_word(),
            log: Vec::new(),
            cmd_mem: HashMap::new(),
            kicks: 0,
            frames: 0,
            resets: 0,
            hang: false,
            fault: None,
            irq: None,
        };
        sim.store(G2D_VERSION, sim.version);
        sim
    }

    /// Never raise the completion interrupt.
    pub fn hang(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Report `status` alongside every completion.
    pub fn with_fault(mut self, status: IntStatus) -> Self {
        self.fault = Some(status);
        self
    }

    pub fn reg(&self, offset: u32) -> u32 {
        self.regs.get((offset / 4) as usize).copied().unwrap_or(0)
    }

    /// Every write that reached the registers, direct or replayed.
    pub fn writes(&self) -> &[RegWrite] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub fn kicks(&self) -> u32 {
        self.kicks
    }

    /// Passes executed: one per direct kick, one per chained buffer.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn resets(&self) -> u32 {
        self.resets
    }

    fn store(&mut self, offset: u32, value: u32) {
        if let Some(slot) = self.regs.get_mut((offset / 4) as usize) {
            *slot = value;
        }
    }

    fn soft_reset(&mut self) {
        self.resets += 1;
        self.regs.iter_mut().for_each(|r| *r = 0);
        self.store(G2D_VERSION, self.version);
    }

    /// Follow the command chain from the base registers. Returns the number
    /// of buffers executed, or `None` if the chain points at unloaded
    /// memory.
    fn replay_chain(&mut self) -> Option<u32> {
        let mut addr = (self.reg(G2D_CMD_BASE_HI) as u64) << 32 | self.reg(G2D_CMD_BASE_LO) as u64;
        let mut entries = self.reg(G2D_CMD_LEN) as usize;
        self.store(G2D_CMD_CHAIN_END, 0);

        for executed in 1..=self.cmd_mem.len() as u32 {
            let words = self.cmd_mem.get(&addr)?.clone();
            for pair in words.chunks_exact(2).take(entries) {
                self.log.push(RegWrite::new(pair[0], pair[1]));
                self.store(pair[0], pair[1]);
            }
            if self.reg(G2D_CMD_CHAIN_END) != 0 {
                return Some(executed);
            }
            addr = (self.reg(G2D_CMD_NEXT_HI) as u64) << 32 | self.reg(G2D_CMD_NEXT_LO) as u64;
            entries = self.reg(G2D_CMD_NEXT_LEN) as usize;
        }
        None
    }

    fn start(&mut self, ctrl: u32) {
        self.kicks += 1;
        let mut status = IntStatus::FRAME_DONE;
        if ctrl & G2D_CTRL_CMD_MODE != 0 {
            match self.replay_chain() {
                Some(buffers) => {
                    self.frames += buffers;
                    status |= IntStatus::CMD_DONE;
                }
                None => status = IntStatus::CMD_ERR,
            }
        } else {
            self.frames += 1;
        }
        if let Some(fault) = self.fault {
            status |= fault;
        }

        let status = status.bits() | self.reg(G2D_INT_STATUS);
        self.store(G2D_INT_STATUS, status);
        trace!("sim: kick {} status 0x{:X}", self.kicks, status);

        let pending = status & self.reg(G2D_INT_MASK);
        if self.hang || pending == 0 {
            return;
        }
        if let Some(irq) = &self.irq {
            irq.signal(pending);
        }
    }
}

impl RegisterIo for SimEngine {
    fn write(&mut self, offset: u32, value: u32) {
        self.log.push(RegWrite::new(offset, value));
        match offset {
            G2D_CTRL if value & G2D_CTRL_SOFT_RESET != 0 => self.soft_reset(),
            G2D_CTRL if value & G2D_CTRL_START != 0 => {
                self.store(G2D_CTRL, value & !G2D_CTRL_START);
                self.start(value);
            }
            // Write one to clear.
            G2D_INT_STATUS => {
                let status = self.reg(G2D_INT_STATUS) & !value;
                self.store(G2D_INT_STATUS, status);
            }
            G2D_VERSION => {}
            _ => self.store(offset, value),
        }
    }

    fn read(&mut self, offset: u32) -> u32 {
        self.reg(offset)
    }

    fn upload(&mut self, dma_addr: u64, words: &[u32]) {
        self.cmd_mem.insert(dma_addr, words.to_vec());
    }

    fn connect_irq(&mut self, irq: Arc<Completion>) {
        self.irq = Some(irq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_reset_keeps_version() {
        let mut sim = SimEngine::new(Generation::Lite);
        sim.write(MLC_CTRL, 1);
        sim.write(G2D_CTRL, G2D_CTRL_SOFT_RESET);
        assert_eq!(sim.reg(MLC_CTRL), 0);
        assert_eq!(sim.read(G2D_VERSION), Generation::Lite.version_word());
        assert_eq!(sim.resets(), 1);
    }

    #[test]
    fn test_direct_kick_sets_frame_done() {
        let mut sim = SimEngine::new(Generation::Normal);
        sim.write(G2D_CTRL, G2D_CTRL_START);
        assert_eq!(sim.frames(), 1);
        assert_eq!(sim.reg(G2D_INT_STATUS), IntStatus::FRAME_DONE.bits());
        sim.write(G2D_INT_STATUS, IntStatus::FRAME_DONE.bits());
        assert_eq!(sim.reg(G2D_INT_STATUS), 0);
    }

    #[test]
    fn test_broken_chain_reports_cmd_error() {
        let mut sim = SimEngine::new(Generation::Normal);
        sim.write(G2D_CMD_BASE_LO, 0x1000);
        sim.write(G2D_CMD_LEN, 1);
        sim.write(G2D_CTRL, G2D_CTRL_CMD_MODE | G2D_CTRL_START);
        assert_eq!(sim.frames(), 0);
        assert_ne!(sim.reg(G2D_INT_STATUS) & IntStatus::CMD_ERR.bits(), 0);
    }

    #[test]
    fn test_unterminated_chain_stops() {
        let mut sim = SimEngine::new(Generation::Normal);
        // Buffer points back at itself and never ends the chain.
        sim.upload(
            0x1000,
            &[G2D_CMD_NEXT_LO, 0x1000, G2D_CMD_NEXT_HI, 0, G2D_CMD_NEXT_LEN, 3],
        );
        sim.write(G2D_CMD_BASE_LO, 0x1000);
        sim.write(G2D_CMD_LEN, 3);
        sim.write(G2D_CTRL, G2D_CTRL_CMD_MODE | G2D_CTRL_START);
        assert_ne!(sim.reg(G2D_INT_STATUS) & IntStatus::CMD_ERR.bits(), 0);
    }
}
