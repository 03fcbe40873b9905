//! Stroke/Slice Planner
//!
//! The pipes buffer whole source lines. When a request would overflow those
//! line buffers, or the write pipe has to rotate, the composition is split
//! into vertical strips ("strokes") of the output and each strip runs as its
//! own pass.
//!
//! Slices are cut in composition space (output width before the write pipe's
//! rotation). Every layer is clipped to the slice's column span, and the
//! output addresses move to where that span lands in memory after rotation.

use tracing::debug;

use crate::compose::{ResolvedLayer, ResolvedOutput};
use crate::error::{G2dError, Result};
use crate::format::PixelComponent;
use crate::generation::Generation;
use crate::request::{Layer, OutputConfig, Rotation};
use crate::tile::Modifier;

/// Per-generation line buffer constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrokeLimits {
    pub slice_width: u32,
    /// Widest 4:2:0 source line a normal pipe can buffer.
    pub line_buffer_limit: u32,
    /// Plane whose pipe has the deeper line buffer.
    pub deep_plane: Option<usize>,
}

impl StrokeLimits {
    pub const DEFAULT_SLICE_WIDTH: u32 = 256;
    pub const DEFAULT_LINE_BUFFER_LIMIT: u32 = 256;

    pub fn for_generation(gen: Generation) -> Self {
        Self {
            slice_width: Self::DEFAULT_SLICE_WIDTH,
            line_buffer_limit: Self::DEFAULT_LINE_BUFFER_LIMIT,
            deep_plane: gen.deep_line_buffer_plane(),
        }
    }

    fn is_deep(&self, plane: u8) -> bool {
        self.deep_plane == Some(plane as usize)
    }
}

/// Decide whether the request must be sliced, or reject combinations the
/// hardware cannot slice.
pub fn needs_stroke(
    layers: &[ResolvedLayer],
    output: &ResolvedOutput,
    limits: &StrokeLimits,
) -> Result<bool> {
    let rotation = output.output.rotation;
    if !rotation.is_none() && output.pc.is_packed_yuv422() {
        return Err(G2dError::RotatedPackedYuv(rotation));
    }

    let mut stroke = !rotation.is_none();
    for rl in layers {
        let layer = &rl.layer;
        let overflows = layer.src.w > limits.line_buffer_limit;
        if rl.pc.is_yuv420() && overflows && !limits.is_deep(layer.plane) {
            stroke = true;
        }
    }

    for rl in layers {
        let layer = &rl.layer;
        let (h, v) = (layer.is_h_scaled(), layer.is_v_scaled());
        if stroke && h {
            return Err(G2dError::StrokeWithScaling(layer.plane as usize));
        }
        if h && v && !limits.is_deep(layer.plane) {
            return Err(G2dError::DualAxisScaling(layer.plane as usize));
        }
    }

    Ok(stroke)
}

/// One vertical strip of the composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub index: usize,
    pub x: u32,
    pub width: u32,
}

impl Slice {
    pub fn end(&self) -> u32 {
        self.x + self.width
    }
}

/// Cut `[0, width)` into strips of `slice_width`; the last one takes the
/// remainder.
pub fn slices(width: u32, slice_width: u32) -> Vec<Slice> {
    let slice_width = slice_width.max(1);
    let count = width.div_ceil(slice_width) as usize;
    (0..count)
        .map(|index| {
            let x = index as u32 * slice_width;
            Slice {
                index,
                x,
                width: slice_width.min(width - x),
            }
        })
        .collect()
}

/// Where slice `s` starts along the memory axis it lands on: columns for
/// unrotated outputs, rows for 90 degree ones. Backward rotations count from
/// the far edge, so the last slice sits at 0.
fn memory_start(out: &OutputConfig, s: &Slice) -> u32 {
    match out.rotation {
        Rotation::None | Rotation::VFlip | Rotation::Rot90 | Rotation::HFlip90 => s.x,
        Rotation::HFlip | Rotation::Rot180 | Rotation::Rot270 | Rotation::VFlip90 => {
            out.width - s.end()
        }
    }
}

/// Byte offset of slice `s` into output plane `plane`.
pub fn output_offset(out: &OutputConfig, pc: &PixelComponent, plane: usize, s: &Slice) -> u64 {
    let start = memory_start(out, s) as u64;
    if out.rotation.swaps_axes() {
        start / pc.plane_v_sub(plane) as u64 * out.stride[plane] as u64
    } else {
        start * pc.plane_bpp(plane) as u64 / 8
    }
}

fn slice_output(out: &ResolvedOutput, s: &Slice) -> Result<OutputConfig> {
    let start = memory_start(&out.output, s);
    let align = if out.output.rotation.swaps_axes() {
        out.pc.row_align()
    } else {
        out.pc.column_align()
    };
    if start % align != 0 {
        return Err(G2dError::InvalidGeometry(format!(
            "slice {} starts at {} {} of the {} output, inside a chroma sample",
            s.index,
            if out.output.rotation.swaps_axes() { "row" } else { "column" },
            start,
            out.output.format
        )));
    }

    let mut sliced = out.output.clone();
    sliced.width = s.width;
    for plane in 0..out.pc.planes() {
        sliced.addr[plane] = out.output.addr[plane] + output_offset(&out.output, &out.pc, plane, s);
    }
    Ok(sliced)
}

/// Clip `rl` to the slice's column span. Returns `None` when the layer does
/// not reach into the slice.
fn slice_layer(rl: &ResolvedLayer, s: &Slice) -> Option<Layer> {
    let layer = &rl.layer;
    let x0 = layer.dst.x.max(s.x);
    let x1 = layer.dst.right().min(s.end());
    if x0 >= x1 {
        return None;
    }

    let mut clipped = layer.clone();
    let width = x1 - x0;
    let cut_left = x0 - layer.dst.x;
    let cut_right = layer.dst.right() - x1;
    clipped.dst.x = x0 - s.x;
    clipped.dst.w = width;

    // Destination columns walk the source forwards or backwards, along
    // source columns or, for 90 degree rotations, source rows.
    match layer.rotation {
        Rotation::None | Rotation::VFlip => shift_columns(rl, &mut clipped, cut_left, width),
        Rotation::HFlip | Rotation::Rot180 => shift_columns(rl, &mut clipped, cut_right, width),
        Rotation::Rot90 | Rotation::HFlip90 => {
            clipped.src.y += cut_right;
            clipped.src.h = width;
        }
        Rotation::Rot270 | Rotation::VFlip90 => {
            clipped.src.y += cut_left;
            clipped.src.h = width;
        }
    }
    Some(clipped)
}

/// Linear sources move their plane addresses by the part of the shift that
/// keeps every plane on a whole byte and chroma sample. The remainder, or
/// the whole shift for tiled sources, moves the crop.
fn shift_columns(rl: &ResolvedLayer, clipped: &mut Layer, shift: u32, width: u32) {
    let moved = if rl.layer.modifier == Modifier::Linear {
        shift - shift % rl.pc.column_align()
    } else {
        0
    };
    for p in 0..rl.pc.planes() {
        clipped.addr[p] += moved as u64 * rl.pc.plane_bpp(p) as u64 / 8;
    }
    clipped.src.x += shift - moved;
    clipped.src.w = width;
}

/// Per-slice layers and output, ready to be resolved and programmed.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceJob {
    pub slice: Slice,
    pub layers: Vec<Layer>,
    pub output: OutputConfig,
}

pub fn plan(
    layers: &[ResolvedLayer],
    output: &ResolvedOutput,
    limits: &StrokeLimits,
) -> Result<Vec<SliceJob>> {
    let jobs = slices(output.output.width, limits.slice_width)
        .into_iter()
        .map(|slice| {
            Ok(SliceJob {
                slice,
                layers: layers.iter().filter_map(|rl| slice_layer(rl, &slice)).collect(),
                output: slice_output(output, &slice)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(
        "stroke: {} slices of {} over width {}",
        jobs.len(),
        limits.slice_width,
        output.output.width
    );
    Ok(jobs)
}
