//! Request Module
//!
//! Caller-owned descriptions of a composition: input layers, the output
//! surface and the solid-fill background. Addresses are fully resolved
//! physical addresses; buffer import happens elsewhere.

use serde::{Deserialize, Serialize};

use crate::format::{self, Fourcc};
use crate::tile::Modifier;

/// Pixel rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Saturates, so an out-of-range rect never fits inside another.
    pub const fn right(&self) -> u32 {
        self.x.saturating_add(self.w)
    }

    pub const fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }

    pub const fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// Rotation/flip applied by a pipe or the write pipe. In the combined
/// variants the flip follows the 90 degree rotation, so `HFlip90` walks
/// memory in the same direction as `Rot90` and `VFlip90` as `Rot270`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    #[default]
    None = 0,
    Rot90 = 1,
    Rot180 = 2,
    Rot270 = 3,
    HFlip = 4,
    VFlip = 5,
    HFlip90 = 6,
    VFlip90 = 7,
}

impl Rotation {
    pub const ALL: [Rotation; 8] = [
        Rotation::None,
        Rotation::Rot90,
        Rotation::Rot180,
        Rotation::Rot270,
        Rotation::HFlip,
        Rotation::VFlip,
        Rotation::HFlip90,
        Rotation::VFlip90,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn is_none(self) -> bool {
        self == Rotation::None
    }

    /// Whether width and height trade places.
    pub fn swaps_axes(self) -> bool {
        matches!(
            self,
            Rotation::Rot90 | Rotation::Rot270 | Rotation::HFlip90 | Rotation::VFlip90
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Straight alpha; the layer's global alpha register applies.
    #[default]
    None,
    /// Source is premultiplied.
    Premultiplied,
    /// Per-pixel coverage only.
    Coverage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorSpace {
    #[default]
    Bt601,
    Bt709,
}

/// Inclusive ARGB range treated as transparent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorKey {
    pub min: u32,
    pub max: u32,
}

fn default_true() -> bool {
    true
}

fn default_alpha() -> u8 {
    0xFF
}

/// One input layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub format: Fourcc,
    #[serde(default)]
    pub modifier: Modifier,
    pub src: Rect,
    pub dst: Rect,
    #[serde(default)]
    pub zpos: u8,
    /// Hardware pipe this layer is fetched by.
    pub plane: u8,
    #[serde(default)]
    pub blend: BlendMode,
    #[serde(default = "default_alpha")]
    pub alpha: u8,
    #[serde(default)]
    pub addr: [u64; 3],
    #[serde(default)]
    pub stride: [u32; 3],
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default)]
    pub color_space: ColorSpace,
    #[serde(default)]
    pub color_key: Option<ColorKey>,
}

impl Layer {
    pub fn new(plane: u8, format: Fourcc, src: Rect, dst: Rect) -> Self {
        Self {
            enabled: true,
            format,
            modifier: Modifier::Linear,
            src,
            dst,
            zpos: plane,
            plane,
            blend: BlendMode::None,
            alpha: default_alpha(),
            addr: [0; 3],
            stride: [0; 3],
            rotation: Rotation::None,
            color_space: ColorSpace::Bt601,
            color_key: None,
        }
    }

    /// Lay the planes out back to back from `base` for a surface of the
    /// given size. Unknown formats are left untouched.
    pub fn with_buffer(mut self, base: u64, width: u32, height: u32) -> Self {
        if let Some((addr, stride)) = linear_planes(self.format, base, width, height) {
            self.addr = addr;
            self.stride = stride;
        }
        self
    }

    /// Source size as seen after the pipe's rotation.
    pub fn rotated_src_size(&self) -> (u32, u32) {
        if self.rotation.swaps_axes() {
            (self.src.h, self.src.w)
        } else {
            (self.src.w, self.src.h)
        }
    }

    pub fn is_h_scaled(&self) -> bool {
        self.rotated_src_size().0 != self.dst.w
    }

    pub fn is_v_scaled(&self) -> bool {
        self.rotated_src_size().1 != self.dst.h
    }
}

/// The single output surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: Fourcc,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub addr: [u64; 3],
    #[serde(default)]
    pub stride: [u32; 3],
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default)]
    pub color_space: ColorSpace,
}

impl OutputConfig {
    pub fn new(format: Fourcc, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            addr: [0; 3],
            stride: [0; 3],
            rotation: Rotation::None,
            color_space: ColorSpace::Bt601,
        }
    }

    /// Lay the planes out back to back from `base`, honouring the rotation
    /// (a 90 degree output is stored `height` wide).
    pub fn with_buffer(mut self, base: u64) -> Self {
        let (w, h) = self.memory_size();
        if let Some((addr, stride)) = linear_planes(self.format, base, w, h) {
            self.addr = addr;
            self.stride = stride;
        }
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Width and height of the surface in memory.
    pub fn memory_size(&self) -> (u32, u32) {
        if self.rotation.swaps_axes() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    pub fn plane_count(&self) -> usize {
        format::resolve(self.format)
            .map(|pc| pc.planes())
            .unwrap_or(0)
    }
}

/// Solid colour fill of a region of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Background {
    /// ARGB8888 colour.
    pub color: u32,
    pub rect: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdMode {
    Clear = 0,
    Src = 1,
    Dst = 2,
    SrcOver = 3,
    DstOver = 4,
    SrcIn = 5,
    DstIn = 6,
    SrcOut = 7,
    DstOut = 8,
    SrcAtop = 9,
    DstAtop = 10,
    Xor = 11,
}

/// Porter-Duff operator between two layers, applied by the compositor in
/// place of ordinary alpha blending for that pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PorterDuff {
    pub src_plane: u8,
    pub dst_plane: u8,
    pub mode: PdMode,
}

/// A full composition request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeRequest {
    #[serde(default)]
    pub layers: Vec<Layer>,
    pub output: OutputConfig,
    /// ARGB background colour below every layer.
    #[serde(default)]
    pub background: Option<u32>,
    #[serde(default)]
    pub porter_duff: Option<PorterDuff>,
}

impl ComposeRequest {
    pub fn new(layers: Vec<Layer>, output: OutputConfig) -> Self {
        Self {
            layers,
            output,
            background: None,
            porter_duff: None,
        }
    }

    pub fn enabled_layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(|layer| layer.enabled)
    }
}

fn linear_planes(
    format: Fourcc,
    base: u64,
    width: u32,
    height: u32,
) -> Option<([u64; 3], [u32; 3])> {
    let pc = format::resolve(format).ok()?;
    let mut addr = [0u64; 3];
    let mut stride = [0u32; 3];
    let mut next = base;
    for plane in 0..pc.planes() {
        stride[plane] = (width * pc.plane_bpp(plane)).div_ceil(8);
        addr[plane] = next;
        next += stride[plane] as u64 * (height / pc.plane_v_sub(plane)) as u64;
    }
    Some((addr, stride))
}
