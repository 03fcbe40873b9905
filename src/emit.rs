//! Command Emitter
//!
//! Moves a compiled [`Program`] onto the engine. In CPU write mode every
//! pass is poked straight into the registers and kicked on its own. In
//! command write mode the passes are appended one per command buffer, the
//! buffers are chained, uploaded and the chain is kicked once.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::cmdbuf::CmdArena;
use crate::compose::{Pass, Program};
use crate::error::{G2dError, Result};
use crate::hw::RegisterIo;
use crate::regs::*;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteMode {
    #[default]
    #[serde(rename = "cpu")]
    CpuWrite,
    #[serde(rename = "cmd")]
    CmdWrite,
}

pub struct Emitter {
    mode: WriteMode,
    arena: CmdArena,
}

impl Emitter {
    pub fn new(mode: WriteMode, arena: CmdArena) -> Self {
        Self { mode, arena }
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    pub fn arena(&self) -> &CmdArena {
        &self.arena
    }

    /// Poke one pass into the registers.
    pub fn write_pass<I: RegisterIo>(&self, io: &mut I, pass: &Pass) {
        for w in &pass.writes {
            io.write(w.offset, w.value);
        }
    }

    pub fn kick_direct<I: RegisterIo>(&self, io: &mut I) {
        io.write(G2D_CTRL, G2D_CTRL_START);
    }

    /// Place every pass of `program` in its own command buffer.
    pub fn load(&mut self, program: &Program) -> Result<()> {
        let buffers = self.arena.count();
        if program.passes.len() > buffers {
            error!(
                "{} passes do not fit {} command buffers",
                program.passes.len(),
                buffers
            );
            return Err(G2dError::TooManyPasses {
                passes: program.passes.len(),
                buffers,
            });
        }
        for (id, pass) in program.passes.iter().enumerate() {
            self.arena.append_all(id, &pass.writes)?;
        }
        Ok(())
    }

    /// Chain, upload and start the loaded buffers. The arena is emptied
    /// afterwards whether or not anything was loaded.
    pub fn kick_chain<I: RegisterIo>(&mut self, io: &mut I) -> Result<()> {
        let Some(head) = self.arena.finalize_chain() else {
            self.arena.reset();
            return Err(G2dError::InvalidGeometry("empty command chain".into()));
        };

        for (dma_addr, words) in self.arena.dirty_buffers() {
            io.upload(dma_addr, words);
        }
        io.write(G2D_CMD_BASE_LO, lo32(head.dma_addr));
        io.write(G2D_CMD_BASE_HI, hi32(head.dma_addr));
        io.write(G2D_CMD_LEN, head.entries);
        io.write(G2D_CTRL, G2D_CTRL_CMD_MODE | G2D_CTRL_START);
        debug!("kicked command chain of {} buffers", head.buffers);

        self.arena.reset();
        Ok(())
    }

    /// Drop anything loaded but not kicked.
    pub fn abort(&mut self) {
        self.arena.reset();
    }
}
