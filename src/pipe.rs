//! Read Pipes
//!
//! Each enabled layer is fetched by exactly one pipe. Graphics pipes can
//! crop, scale, convert YUV and read tiled buffers; simple pipes only fetch
//! linear RGB. Pipe programming dispatches on [`PipeKind`].

use bitflags::bitflags;
use tracing::trace;

use crate::compose::ResolvedLayer;
use crate::csc;
use crate::error::{G2dError, Result};
use crate::generation::Generation;
use crate::regs::*;
use crate::scaler;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipeCaps: u32 {
        const SCALE  = 1 << 0;
        const ROTATE = 1 << 1;
        const YUV    = 1 << 2;
        const TILE   = 1 << 3;
        const CROP   = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeKind {
    /// Graphics pipe with rotation.
    GPipeHigh,
    /// Graphics pipe without rotation.
    GPipeMid,
    /// RGB-only simple pipe.
    SPipe,
}

impl PipeKind {
    pub fn caps(self) -> PipeCaps {
        match self {
            PipeKind::GPipeHigh => PipeCaps::all(),
            PipeKind::GPipeMid => PipeCaps::all() - PipeCaps::ROTATE,
            PipeKind::SPipe => PipeCaps::empty(),
        }
    }

    /// Read DMA channels wired to this pipe.
    pub fn rdma_channels(self) -> usize {
        match self {
            PipeKind::GPipeHigh | PipeKind::GPipeMid => 3,
            PipeKind::SPipe => 1,
        }
    }
}

/// A pipe instance: its kind, register block and first read channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipe {
    pub index: usize,
    pub kind: PipeKind,
    pub block: Block,
    pub rdma_base: usize,
}

impl Pipe {
    /// The pipe table of a generation, indexed by plane.
    pub fn table(gen: Generation) -> Vec<Pipe> {
        let mut next_channel = 0;
        gen.pipes()
            .iter()
            .enumerate()
            .map(|(index, &kind)| {
                let pipe = Pipe {
                    index,
                    kind,
                    block: Block::at(PIPE_BASE + index as u32 * PIPE_STRIDE),
                    rdma_base: next_channel,
                };
                next_channel += kind.rdma_channels();
                pipe
            })
            .collect()
    }

    pub fn caps(&self) -> PipeCaps {
        self.kind.caps()
    }

    fn require(&self, cap: PipeCaps, what: &'static str) -> Result<()> {
        if self.caps().contains(cap) {
            Ok(())
        } else {
            Err(G2dError::MissingCapability {
                plane: self.index,
                what,
            })
        }
    }

    /// Reject layers this pipe cannot fetch.
    pub fn check(&self, rl: &ResolvedLayer) -> Result<()> {
        let layer = &rl.layer;
        if rl.pc.is_yuv {
            self.require(PipeCaps::YUV, "fetch YUV formats")?;
        }
        if rl.tile.is_tile_mode {
            self.require(PipeCaps::TILE, "fetch tiled or compressed buffers")?;
        }
        if !layer.rotation.is_none() {
            self.require(PipeCaps::ROTATE, "rotate")?;
        }
        if layer.is_h_scaled() || layer.is_v_scaled() {
            self.require(PipeCaps::SCALE, "scale")?;
            let (sw, sh) = layer.rotated_src_size();
            scaler::check_ratio(sw, layer.dst.w)?;
            scaler::check_ratio(sh, layer.dst.h)?;
        }
        Ok(())
    }

    /// Queue the register writes that fetch `rl` through this pipe.
    pub fn program(&self, rl: &ResolvedLayer, out: &mut Vec<RegWrite>) {
        let b = self.block;
        let layer = &rl.layer;
        let planes = rl.pc.planes();

        b.push(out, PIPE_PIXEL_COMP, rl.pc.to_reg());
        b.push(
            out,
            PIPE_FRAME_CTRL,
            FRAME_CTRL_PLANES.encode(planes as u32)
                | FRAME_CTRL_DATA_MODE.encode(rl.tile.data_mode as u32)
                | FRAME_CTRL_FBDC_FMT.encode(rl.tile.fbdc_code.unwrap_or(0) as u32),
        );
        for plane in 0..planes {
            b.push(out, pipe_addr_lo(plane), lo32(layer.addr[plane]));
            b.push(out, pipe_addr_hi(plane), hi32(layer.addr[plane]));
            b.push(out, pipe_stride(plane), layer.stride[plane]);
        }

        let ctrl = match self.kind {
            PipeKind::SPipe => {
                b.push(out, PIPE_SRC_POS, pack_pos(layer.src.x, layer.src.y));
                b.push(out, PIPE_SRC_SIZE, pack_size(layer.src.w, layer.src.h));
                PIPE_CTRL_ENABLE
            }
            PipeKind::GPipeHigh | PipeKind::GPipeMid => self.program_gpipe(rl, out),
        };
        b.push(out, PIPE_CTRL, ctrl);

        trace!(
            "pipe {} ({:?}): {} {}x{} -> {}x{} at ({}, {})",
            self.index,
            self.kind,
            layer.format,
            layer.src.w,
            layer.src.h,
            layer.dst.w,
            layer.dst.h,
            layer.dst.x,
            layer.dst.y
        );
    }

    /// Crop, tile, CSC and scaler state. Returns the control word.
    fn program_gpipe(&self, rl: &ResolvedLayer, out: &mut Vec<RegWrite>) -> u32 {
        let b = self.block;
        let layer = &rl.layer;
        let bbox = rl.tile.bbox;
        let mut ctrl = PIPE_CTRL_ENABLE | PIPE_CTRL_ROTATION.encode(layer.rotation.code());

        b.push(out, PIPE_SRC_POS, pack_pos(bbox.x1, bbox.y1));
        b.push(out, PIPE_SRC_SIZE, pack_size(bbox.width, bbox.height));
        b.push(
            out,
            PIPE_CROP_POS,
            pack_pos(layer.src.x - bbox.x1, layer.src.y - bbox.y1),
        );
        b.push(out, PIPE_CROP_SIZE, pack_size(layer.src.w, layer.src.h));

        if rl.tile.is_tile_mode {
            ctrl |= PIPE_CTRL_TILE;
            if rl.tile.is_fbdc_cps {
                ctrl |= PIPE_CTRL_FBDC;
            }
            b.push(out, PIPE_TILE_CTRL, rl.tile.tile_ctrl());
            b.push(
                out,
                PIPE_TILE_POS,
                pack_pos(bbox.x1 / rl.tile.tile_h, bbox.y1 / rl.tile.tile_v),
            );
            b.push(
                out,
                PIPE_TILE_SIZE,
                pack_size(bbox.width / rl.tile.tile_h, bbox.height / rl.tile.tile_v),
            );
        }

        if rl.pc.is_yuv {
            ctrl |= PIPE_CTRL_CSC;
            b.push(out, PIPE_CSC_CTRL, CSC_CTRL_ENABLE);
            for (n, &coef) in csc::yuv_to_rgb(layer.color_space).iter().enumerate() {
                b.push(out, pipe_csc_coef(n), csc::coef_reg(coef));
            }
        } else {
            b.push(out, PIPE_CSC_CTRL, 0);
        }

        let (h_scaled, v_scaled) = (layer.is_h_scaled(), layer.is_v_scaled());
        if h_scaled || v_scaled {
            let (sw, sh) = layer.rotated_src_size();
            let mut scl = 0;
            if h_scaled {
                scl |= SCL_CTRL_H;
            }
            if v_scaled {
                scl |= SCL_CTRL_V;
            }
            ctrl |= PIPE_CTRL_SCALER;
            b.push(out, PIPE_SCL_CTRL, scl);
            b.push(out, PIPE_SCL_DST_SIZE, pack_size(layer.dst.w, layer.dst.h));
            b.push(out, PIPE_SCL_HSTEP, scaler::step(sw, layer.dst.w));
            b.push(out, PIPE_SCL_VSTEP, scaler::step(sh, layer.dst.h));
            b.push(out, PIPE_SCL_HPHASE, 0);
            b.push(out, PIPE_SCL_VPHASE, 0);
            for (phase, &taps) in scaler::LINEAR_TAPS.iter().enumerate() {
                b.push(out, pipe_scl_hcoef(phase), taps);
                b.push(out, pipe_scl_vcoef(phase), taps);
            }
        } else {
            b.push(out, PIPE_SCL_CTRL, 0);
        }

        ctrl
    }

    pub fn program_disabled(&self, out: &mut Vec<RegWrite>) {
        self.block.push(out, PIPE_CTRL, 0);
    }
}
