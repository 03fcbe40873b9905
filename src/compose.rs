//! Composition Compiler
//!
//! Turns a request into a [`Program`]: one or more passes of register
//! writes, each tagged with its command id. Compilation is pure; nothing
//! touches the engine until the program is handed to the emitter.
//!
//! Every pass is emitted in the same order: command id and work mode, read
//! and write DMA partitioning, the read pipes, the compositor and finally
//! the write pipe.

use std::collections::HashSet;

use tracing::debug;

use crate::bandwidth::{self, Allocation};
use crate::error::{G2dError, Result};
use crate::format::{self, DownsampleBypass, PixelComponent};
use crate::generation::Generation;
use crate::mlc;
use crate::pipe::Pipe;
use crate::regs::*;
use crate::request::{Background, ComposeRequest, Layer, OutputConfig, PorterDuff, Rect, Rotation};
use crate::stroke::{self, StrokeLimits};
use crate::tile::{self, TileContext};
use crate::wpipe;

/// A layer together with its resolved format and tile geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLayer {
    pub layer: Layer,
    pub pc: PixelComponent,
    pub tile: TileContext,
}

impl ResolvedLayer {
    pub fn resolve(layer: &Layer) -> Result<Self> {
        let pc = format::resolve(layer.format)?;
        let tile = tile::resolve_tile(layer.format, layer.modifier, &layer.src)?;
        Ok(Self {
            layer: layer.clone(),
            pc,
            tile,
        })
    }
}

/// The output surface with its write-side format.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOutput {
    pub output: OutputConfig,
    pub pc: PixelComponent,
    pub bypass: DownsampleBypass,
}

impl ResolvedOutput {
    pub fn resolve(output: &OutputConfig) -> Result<Self> {
        check_size(output.width, output.height)?;
        let (pc, bypass) = format::resolve_write(output.format)?;
        Ok(Self {
            output: output.clone(),
            pc,
            bypass,
        })
    }
}

fn check_size(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(G2dError::InvalidOutput { width, height });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Compose,
    Fill,
    Fastcopy,
}

impl Op {
    fn code(self) -> u32 {
        match self {
            Op::Compose => OP_COMPOSE,
            Op::Fill => OP_FILL,
            Op::Fastcopy => OP_FASTCOPY,
        }
    }
}

/// Register writes for one hardware run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pass {
    pub cmd_id: u32,
    pub writes: Vec<RegWrite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub op: Op,
    pub stroke: bool,
    pub passes: Vec<Pass>,
}

impl Program {
    pub fn write_count(&self) -> usize {
        self.passes.iter().map(|p| p.writes.len()).sum()
    }
}

/// A raw 2D memory copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FastCopy {
    pub src_addr: u64,
    /// Row length in bytes.
    pub width: u32,
    pub height: u32,
    pub src_stride: u32,
    pub dst_addr: u64,
    pub dst_stride: u32,
}

/// Compiler bound to one engine generation.
#[derive(Debug, Clone)]
pub struct Compiler {
    gen: Generation,
    pipes: Vec<Pipe>,
    limits: StrokeLimits,
    /// The command DMA claims the last read channel.
    cmd_mode: bool,
}

impl Compiler {
    pub fn new(gen: Generation, limits: StrokeLimits, cmd_mode: bool) -> Self {
        Self {
            gen,
            pipes: Pipe::table(gen),
            limits,
            cmd_mode,
        }
    }

    pub fn generation(&self) -> Generation {
        self.gen
    }

    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    pub fn limits(&self) -> &StrokeLimits {
        &self.limits
    }

    /// Validate and resolve the enabled layers of a request.
    fn resolve_layers(&self, req: &ComposeRequest) -> Result<Vec<ResolvedLayer>> {
        let canvas = Rect::new(0, 0, req.output.width, req.output.height);
        let mut planes = HashSet::new();
        let mut zpos = HashSet::new();
        let mut resolved = Vec::new();

        for layer in req.enabled_layers() {
            let plane = layer.plane as usize;
            let pipe = self.pipes.get(plane).ok_or(G2dError::PlaneIndex {
                plane,
                count: self.pipes.len(),
            })?;
            if !planes.insert(plane) {
                return Err(G2dError::DuplicatePlane(plane));
            }
            if !zpos.insert(layer.zpos) {
                return Err(G2dError::InvalidGeometry(format!(
                    "z-order {} used by more than one layer",
                    layer.zpos
                )));
            }
            for (what, rect) in [("source", &layer.src), ("destination", &layer.dst)] {
                if rect.is_empty() || rect.w > MAX_DIMENSION || rect.h > MAX_DIMENSION {
                    return Err(G2dError::InvalidGeometry(format!(
                        "plane {} {} rect {}x{}",
                        plane, what, rect.w, rect.h
                    )));
                }
            }
            // Source positions are programmed as 16-bit fields.
            if !Rect::new(0, 0, MAX_DIMENSION, MAX_DIMENSION).contains(&layer.src) {
                return Err(G2dError::InvalidGeometry(format!(
                    "plane {} source {:?} beyond {} pixels",
                    plane, layer.src, MAX_DIMENSION
                )));
            }
            if !canvas.contains(&layer.dst) {
                return Err(G2dError::InvalidGeometry(format!(
                    "plane {} destination {:?} outside {}x{} output",
                    plane, layer.dst, canvas.w, canvas.h
                )));
            }

            let rl = ResolvedLayer::resolve(layer)?;
            pipe.check(&rl)?;
            resolved.push(rl);
        }
        Ok(resolved)
    }

    pub fn compose(&self, req: &ComposeRequest) -> Result<Program> {
        let out = ResolvedOutput::resolve(&req.output)?;
        let layers = self.resolve_layers(req)?;
        let reserve = self.cmd_mode || req.background.is_some();

        if !stroke::needs_stroke(&layers, &out, &self.limits)? {
            let pass = self.compose_pass(
                0,
                false,
                &layers,
                &out,
                req.background,
                req.porter_duff,
                reserve,
            )?;
            return Ok(Program {
                op: Op::Compose,
                stroke: false,
                passes: vec![pass],
            });
        }

        let mut passes = Vec::new();
        for job in stroke::plan(&layers, &out, &self.limits)? {
            let sliced = job
                .layers
                .iter()
                .map(ResolvedLayer::resolve)
                .collect::<Result<Vec<_>>>()?;
            let slice_out = ResolvedOutput {
                output: job.output,
                ..out.clone()
            };
            // Porter-Duff only applies where both operands reach the slice.
            let pd = req.porter_duff.filter(|pd| {
                [pd.src_plane, pd.dst_plane]
                    .iter()
                    .all(|&p| sliced.iter().any(|rl| rl.layer.plane == p))
            });
            let reserve = reserve || sliced.is_empty();
            passes.push(self.compose_pass(
                job.slice.index as u32,
                true,
                &sliced,
                &slice_out,
                req.background,
                pd,
                reserve,
            )?);
        }
        debug!("compose: {} stroke passes", passes.len());

        Ok(Program {
            op: Op::Compose,
            stroke: true,
            passes,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn compose_pass(
        &self,
        cmd_id: u32,
        stroke: bool,
        layers: &[ResolvedLayer],
        out: &ResolvedOutput,
        background: Option<u32>,
        porter_duff: Option<PorterDuff>,
        reserve: bool,
    ) -> Result<Pass> {
        let read = bandwidth::allocate(
            &bandwidth::read_usage(self.gen, &self.pipes, layers, reserve),
            self.gen.read_pools(),
            false,
        )?;
        let write = self.write_allocation(out, false)?;
        let plain: Vec<Layer> = layers.iter().map(|rl| rl.layer.clone()).collect();
        let (width, height) = (out.output.width, out.output.height);
        let mlc_state = mlc::resolve(&plain, background, porter_duff, width, height)?;

        let mut writes = Vec::new();
        self.header(&mut writes, cmd_id, Op::Compose, stroke);
        bandwidth::program_read(&read, &mut writes);
        bandwidth::program_write(&write, &mut writes);
        for pipe in &self.pipes {
            match layers.iter().find(|rl| rl.layer.plane as usize == pipe.index) {
                Some(rl) => pipe.program(rl, &mut writes),
                None => pipe.program_disabled(&mut writes),
            }
        }
        mlc::program(&mlc_state, &mut writes);
        wpipe::program(out, &mut writes);
        Ok(Pass { cmd_id, writes })
    }

    fn header(&self, writes: &mut Vec<RegWrite>, cmd_id: u32, op: Op, stroke: bool) {
        let mut mode = WORK_MODE_OP.encode(op.code());
        if stroke {
            mode |= WORK_MODE_STROKE;
        }
        GLOBAL.push(writes, G2D_CMD_ID, cmd_id);
        GLOBAL.push(writes, G2D_WORK_MODE, mode);
    }

    fn write_allocation(&self, out: &ResolvedOutput, fastcopy: bool) -> Result<Allocation> {
        bandwidth::allocate(
            &bandwidth::write_usage(self.gen, out),
            self.gen.write_pools(),
            fastcopy,
        )
    }

    /// Fill `bg.rect` of the output with a solid colour. The rectangle is in
    /// memory coordinates; the output rotation does not apply.
    pub fn fill_rect(&self, bg: &Background, output: &OutputConfig) -> Result<Program> {
        let full = ResolvedOutput::resolve(output)?;
        let (mem_w, mem_h) = output.memory_size();
        let rect = bg.rect;
        if rect.is_empty() || !Rect::new(0, 0, mem_w, mem_h).contains(&rect) {
            return Err(G2dError::InvalidGeometry(format!(
                "fill rect {:?} outside {}x{} surface",
                rect, mem_w, mem_h
            )));
        }
        let (col_align, row_align) = (full.pc.column_align(), full.pc.row_align());
        if rect.x % col_align != 0 || rect.y % row_align != 0 {
            return Err(G2dError::InvalidGeometry(format!(
                "fill rect at ({}, {}) splits a chroma sample of {}",
                rect.x, rect.y, output.format
            )));
        }

        let mut target = output.clone();
        target.width = rect.w;
        target.height = rect.h;
        target.rotation = Rotation::None;
        for plane in 0..full.pc.planes() {
            let rows = (rect.y / full.pc.plane_v_sub(plane)) as u64 * output.stride[plane] as u64;
            let cols = rect.x as u64 * full.pc.plane_bpp(plane) as u64 / 8;
            target.addr[plane] = output.addr[plane] + rows + cols;
        }
        let out = ResolvedOutput {
            output: target,
            ..full
        };

        let read = bandwidth::allocate(
            &bandwidth::read_usage(self.gen, &self.pipes, &[], true),
            self.gen.read_pools(),
            false,
        )?;
        let write = self.write_allocation(&out, false)?;
        let mlc_state = mlc::resolve(&[], Some(bg.color), None, rect.w, rect.h)?;

        let mut writes = Vec::new();
        self.header(&mut writes, 0, Op::Fill, false);
        bandwidth::program_read(&read, &mut writes);
        bandwidth::program_write(&write, &mut writes);
        for pipe in &self.pipes {
            pipe.program_disabled(&mut writes);
        }
        mlc::program(&mlc_state, &mut writes);
        wpipe::program(&out, &mut writes);

        Ok(Program {
            op: Op::Fill,
            stroke: false,
            passes: vec![Pass { cmd_id: 0, writes }],
        })
    }

    pub fn fastcopy(&self, copy: &FastCopy) -> Result<Program> {
        if copy.width == 0 || copy.width > FASTCOPY_MAX_WIDTH {
            return Err(G2dError::InvalidGeometry(format!(
                "fastcopy width {} bytes out of range",
                copy.width
            )));
        }
        if copy.height == 0 || copy.height > MAX_DIMENSION {
            return Err(G2dError::InvalidGeometry(format!(
                "fastcopy height {} out of range",
                copy.height
            )));
        }
        if copy.src_stride < copy.width || copy.dst_stride < copy.width {
            return Err(G2dError::InvalidGeometry(format!(
                "fastcopy strides {}/{} shorter than row of {} bytes",
                copy.src_stride, copy.dst_stride, copy.width
            )));
        }

        let idle_read = vec![0; self.gen.rdma_channels()];
        let idle_write = vec![0; self.gen.wdma_channels()];
        let read = bandwidth::allocate(&idle_read, self.gen.read_pools(), true)?;
        let write = bandwidth::allocate(&idle_write, self.gen.write_pools(), true)?;

        let mut writes = Vec::new();
        self.header(&mut writes, 0, Op::Fastcopy, false);
        bandwidth::program_read(&read, &mut writes);
        bandwidth::program_write(&write, &mut writes);
        GLOBAL.push(&mut writes, G2D_FC_SRC_LO, lo32(copy.src_addr));
        GLOBAL.push(&mut writes, G2D_FC_SRC_HI, hi32(copy.src_addr));
        GLOBAL.push(&mut writes, G2D_FC_DST_LO, lo32(copy.dst_addr));
        GLOBAL.push(&mut writes, G2D_FC_DST_HI, hi32(copy.dst_addr));
        GLOBAL.push(&mut writes, G2D_FC_SIZE, pack_size(copy.width, copy.height));
        GLOBAL.push(&mut writes, G2D_FC_SRC_STRIDE, copy.src_stride);
        GLOBAL.push(&mut writes, G2D_FC_DST_STRIDE, copy.dst_stride);

        Ok(Program {
            op: Op::Fastcopy,
            stroke: false,
            passes: vec![Pass { cmd_id: 0, writes }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Fourcc;
    use crate::request::BlendMode;

    fn compiler(cmd_mode: bool) -> Compiler {
        Compiler::new(
            Generation::Normal,
            StrokeLimits::for_generation(Generation::Normal),
            cmd_mode,
        )
    }

    fn last(pass: &Pass, offset: u32) -> Option<u32> {
        pass.writes
            .iter()
            .rev()
            .find(|w| w.offset == offset)
            .map(|w| w.value)
    }

    fn full_hd() -> ComposeRequest {
        let full = Rect::new(0, 0, 1920, 1080);
        let layer = Layer::new(0, Fourcc::XRGB8888, full, full)
            .with_buffer(0x1000_0000, 1920, 1080);
        let output = OutputConfig::new(Fourcc::XRGB8888, 1920, 1080).with_buffer(0x2000_0000);
        ComposeRequest::new(vec![layer], output)
    }

    #[test]
    fn test_full_hd_single_layer() {
        let program = compiler(false).compose(&full_hd()).unwrap();
        assert!(!program.stroke);
        assert_eq!(program.passes.len(), 1);
        let pass = &program.passes[0];

        assert_eq!(pass.writes[0], RegWrite::new(G2D_CMD_ID, 0));
        assert_eq!(
            last(pass, mlc_layer(0, MLC_L_CTRL)),
            Some(SUBFRAME_ENABLE | SUBFRAME_GLOBAL_ALPHA)
        );
        assert_eq!(PATH_LAYER_OUT.decode(last(pass, mlc_path(0)).unwrap()), 0);
        assert_eq!(last(pass, WP_DS_BYPASS), Some(DownsampleBypass::Both as u32));
        assert_eq!(last(pass, PIPE_BASE + PIPE_STRIDE + PIPE_CTRL), Some(0));
        // Only the layer's channel is active without command DMA or background.
        assert_eq!(last(pass, rdma_ch(0, DMA_CH_WATERMARK)), Some(512));
        assert_eq!(last(pass, rdma_ch(11, DMA_CH_WATERMARK)), Some(0));
    }

    #[test]
    fn test_cmd_mode_reserves_last_channel() {
        let program = compiler(true).compose(&full_hd()).unwrap();
        let pass = &program.passes[0];
        assert_eq!(last(pass, rdma_ch(0, DMA_CH_WATERMARK)), Some(256));
        assert_eq!(last(pass, rdma_ch(11, DMA_CH_WATERMARK)), Some(256));
    }

    #[test]
    fn test_plane_out_of_range() {
        let mut req = full_hd();
        req.layers[0].plane = 5;
        assert_eq!(
            compiler(false).compose(&req),
            Err(G2dError::PlaneIndex { plane: 5, count: 5 })
        );
        let lite_limits = StrokeLimits::for_generation(Generation::Lite);
        let lite = Compiler::new(Generation::Lite, lite_limits, false);
        req.layers[0].plane = 2;
        assert!(matches!(lite.compose(&req), Err(G2dError::PlaneIndex { .. })));
    }

    #[test]
    fn test_duplicate_plane_and_zpos() {
        let mut req = full_hd();
        let mut second = req.layers[0].clone();
        second.zpos = 1;
        req.layers.push(second);
        assert_eq!(compiler(false).compose(&req), Err(G2dError::DuplicatePlane(0)));

        req.layers[1].plane = 1;
        req.layers[1].zpos = 0;
        assert!(matches!(compiler(false).compose(&req), Err(G2dError::InvalidGeometry(_))));
    }

    #[test]
    fn test_disabled_layers_are_ignored() {
        let mut req = full_hd();
        let mut off = req.layers[0].clone();
        off.plane = 9;
        off.enabled = false;
        req.layers.push(off);
        assert!(compiler(false).compose(&req).is_ok());
    }

    #[test]
    fn test_destination_outside_output() {
        let mut req = full_hd();
        req.layers[0].dst = Rect::new(1, 0, 1920, 1080);
        assert!(matches!(compiler(false).compose(&req), Err(G2dError::InvalidGeometry(_))));
    }

    #[test]
    fn test_bad_output() {
        let mut req = full_hd();
        req.output.width = 0;
        assert_eq!(
            compiler(false).compose(&req),
            Err(G2dError::InvalidOutput { width: 0, height: 1080 })
        );
        let mut req = full_hd();
        req.output.format = Fourcc::RGB332;
        assert_eq!(
            compiler(false).compose(&req),
            Err(G2dError::UnsupportedWriteFormat(Fourcc::RGB332))
        );
    }

    #[test]
    fn test_no_layers_and_no_background_fails() {
        let mut req = full_hd();
        req.layers.clear();
        assert_eq!(compiler(false).compose(&req), Err(G2dError::NoActiveChannel));
        req.background = Some(0xFF00_00FF);
        assert!(compiler(false).compose(&req).is_ok());
    }

    #[test]
    fn test_wide_nv12_is_sliced_with_command_ids() {
        let wide = Rect::new(0, 0, 3000, 100);
        let layer = Layer::new(0, Fourcc::NV12, wide, wide)
            .with_buffer(0x1000_0000, 3000, 100);
        let output = OutputConfig::new(Fourcc::ARGB8888, 3000, 100).with_buffer(0x4000_0000);
        let program = compiler(false).compose(&ComposeRequest::new(vec![layer], output)).unwrap();

        assert!(program.stroke);
        assert_eq!(program.passes.len(), 12);
        for (i, pass) in program.passes.iter().enumerate() {
            assert_eq!(pass.cmd_id, i as u32);
            assert_ne!(last(pass, G2D_WORK_MODE).unwrap() & WORK_MODE_STROKE, 0);
        }
        let tail = &program.passes[11];
        assert_eq!(last(tail, WP_SIZE), Some(pack_size(184, 100)));
        assert_eq!(last(tail, wp_addr_lo(0)), Some(0x4000_0000 + 11 * 256 * 4));
    }

    #[test]
    fn test_premultiplied_sets_pma() {
        let mut req = full_hd();
        req.layers[0].blend = BlendMode::Premultiplied;
        let program = compiler(false).compose(&req).unwrap();
        assert_ne!(last(&program.passes[0], mlc_path(1)).unwrap() & PATH_PMA_EN, 0);
    }

    #[test]
    fn test_fill_rect_offsets_target() {
        let output = OutputConfig::new(Fourcc::ARGB8888, 640, 480).with_buffer(0x1000_0000);
        let bg = Background {
            color: 0xFF20_4060,
            rect: Rect::new(10, 20, 100, 50),
        };
        let program = compiler(false).fill_rect(&bg, &output).unwrap();
        let pass = &program.passes[0];
        assert_eq!(program.op, Op::Fill);
        assert_eq!(last(pass, MLC_BG_COLOR), Some(0xFF20_4060));
        assert_eq!(last(pass, WP_SIZE), Some(pack_size(100, 50)));
        assert_eq!(last(pass, wp_addr_lo(0)), Some(0x1000_0000 + 20 * 640 * 4 + 10 * 4));
        assert_eq!(WORK_MODE_OP.decode(last(pass, G2D_WORK_MODE).unwrap()), OP_FILL);

        let outside = Background {
            rect: Rect::new(600, 0, 100, 10),
            ..bg
        };
        assert!(compiler(false).fill_rect(&outside, &output).is_err());
    }

    #[test]
    fn test_fastcopy_uses_single_channel() {
        let copy = FastCopy {
            src_addr: 0x1_0000_0000,
            width: 4096,
            height: 16,
            src_stride: 4096,
            dst_addr: 0x2000_0000,
            dst_stride: 8192,
        };
        let program = compiler(false).fastcopy(&copy).unwrap();
        let pass = &program.passes[0];
        assert_eq!(last(pass, RDMA_CTRL), Some(RDMA_CTRL_FASTCOPY));
        assert_eq!(last(pass, rdma_ch(0, DMA_CH_WATERMARK)), Some(512));
        assert_eq!(last(pass, rdma_ch(1, DMA_CH_WATERMARK)), Some(0));
        assert_eq!(last(pass, G2D_FC_SRC_HI), Some(1));
        assert_eq!(last(pass, G2D_FC_SIZE), Some(pack_size(4096, 16)));

        let too_wide = FastCopy {
            width: FASTCOPY_MAX_WIDTH + 1,
            src_stride: FASTCOPY_MAX_WIDTH + 1,
            dst_stride: FASTCOPY_MAX_WIDTH + 1,
            ..copy
        };
        assert!(compiler(false).fastcopy(&too_wide).is_err());
    }

    #[test]
    fn test_rects_near_u32_max_are_rejected() {
        let mut req = full_hd();
        req.layers[0].src = Rect::new(0, 0, 64, 64);
        req.layers[0].dst = Rect::new(u32::MAX - 10, 0, 64, 64);
        assert!(matches!(compiler(false).compose(&req), Err(G2dError::InvalidGeometry(_))));

        req.layers[0].dst = Rect::new(0, 0, 64, 64);
        req.layers[0].src = Rect::new(70_000, 0, 64, 64);
        assert!(matches!(compiler(false).compose(&req), Err(G2dError::InvalidGeometry(_))));
        req.layers[0].src = Rect::new(0, u32::MAX - 1, 64, 64);
        assert!(matches!(compiler(false).compose(&req), Err(G2dError::InvalidGeometry(_))));

        let output = OutputConfig::new(Fourcc::ARGB8888, 640, 480).with_buffer(0x1000_0000);
        let bg = Background {
            color: 0,
            rect: Rect::new(u32::MAX, u32::MAX, 10, 10),
        };
        assert!(matches!(
            compiler(false).fill_rect(&bg, &output),
            Err(G2dError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_odd_destination_on_stroke_moves_crop() {
        let (src, dst) = (Rect::new(0, 0, 600, 64), Rect::new(101, 0, 600, 64));
        let layer = Layer::new(0, Fourcc::NV12, src, dst)
            .with_buffer(0x1000_0000, 600, 64);
        let chroma = layer.addr[1];
        let output = OutputConfig::new(Fourcc::ARGB8888, 1024, 64).with_buffer(0x4000_0000);
        let program = compiler(false).compose(&ComposeRequest::new(vec![layer], output)).unwrap();

        let pass = &program.passes[1];
        assert_eq!(last(pass, PIPE_BASE + pipe_addr_lo(0)), Some(0x1000_0000 + 154));
        assert_eq!(last(pass, PIPE_BASE + pipe_addr_lo(1)), Some(lo32(chroma + 154)));
        assert_eq!(last(pass, PIPE_BASE + PIPE_SRC_POS), Some(pack_pos(1, 0)));
    }

    #[test]
    fn test_fill_rect_keeps_chroma_samples_whole() {
        let output = OutputConfig::new(Fourcc::NV12, 640, 480).with_buffer(0x1000_0000);
        let bg = Background {
            color: 0xFF80_8080,
            rect: Rect::new(10, 20, 100, 50),
        };
        let program = compiler(false).fill_rect(&bg, &output).unwrap();
        let pass = &program.passes[0];
        assert_eq!(last(pass, wp_addr_lo(0)), Some(0x1000_0000 + 20 * 640 + 10));
        assert_eq!(last(pass, wp_addr_lo(1)), Some(0x1000_0000 + 640 * 480 + 10 * 640 + 10));

        for rect in [Rect::new(11, 20, 100, 50), Rect::new(10, 21, 100, 50)] {
            let odd = Background { rect, ..bg };
            assert!(matches!(
                compiler(false).fill_rect(&odd, &output),
                Err(G2dError::InvalidGeometry(_))
            ));
        }
    }
}
