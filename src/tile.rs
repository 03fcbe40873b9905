//! Tile/FBDC Resolver
//!
//! Tiled and compressed sources are fetched in whole tile blocks. This module
//! maps a (format, modifier) pair onto the block geometry and widens the
//! source rectangle to the tile-aligned box the pipe actually reads.

use serde::{Deserialize, Serialize};

use crate::error::{G2dError, Result};
use crate::format::{self, BufferLayout, Fourcc, PixelComponent, UvMode};
use crate::regs::{MAX_DIMENSION, TILE_CTRL_H, TILE_CTRL_V};
use crate::request::Rect;

/// Buffer modifier describing the memory arrangement of a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modifier {
    #[default]
    #[serde(rename = "linear")]
    Linear,
    #[serde(rename = "gpu_tile_16x4")]
    GpuTile16x4,
    #[serde(rename = "gpu_tile_32x2")]
    GpuTile32x2,
    #[serde(rename = "gpu_fbdc_16x4")]
    GpuFbdc16x4,
    #[serde(rename = "vdec_tile_16x16")]
    VdecTile16x16,
    #[serde(rename = "vdec_fbdc_32x8")]
    VdecFbdc32x8,
}

/// Fetch data mode programmed into the pipe's frame control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    Linear = 0,
    GpuRawTile = 1,
    GpuCompressedTile = 2,
    DecoderRawTile = 3,
    DecoderCompressedTile = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Rgb32,
    Rgb16,
    Yuv420SemiPlanar,
}

fn family(pc: &PixelComponent) -> Option<Family> {
    match (pc.is_yuv, pc.bpp(), pc.layout, pc.uv_mode) {
        (false, 32, _, _) => Some(Family::Rgb32),
        (false, 16, _, _) => Some(Family::Rgb16),
        (true, _, BufferLayout::SemiPlanar, UvMode::Yuv420) => Some(Family::Yuv420SemiPlanar),
        _ => None,
    }
}

struct TileEntry {
    family: Family,
    modifier: Modifier,
    tile_h: u32,
    tile_v: u32,
    mode: DataMode,
    fbdc: Option<u8>,
}

static TILE_TABLE: [TileEntry; 8] = [
    TileEntry {
        family: Family::Rgb32,
        modifier: Modifier::GpuTile16x4,
        tile_h: 16,
        tile_v: 4,
        mode: DataMode::GpuRawTile,
        fbdc: None,
    },
    TileEntry {
        family: Family::Rgb32,
        modifier: Modifier::GpuTile32x2,
        tile_h: 32,
        tile_v: 2,
        mode: DataMode::GpuRawTile,
        fbdc: None,
    },
    TileEntry {
        family: Family::Rgb32,
        modifier: Modifier::GpuFbdc16x4,
        tile_h: 16,
        tile_v: 4,
        mode: DataMode::GpuCompressedTile,
        fbdc: Some(0x0C),
    },
    TileEntry {
        family: Family::Rgb16,
        modifier: Modifier::GpuTile16x4,
        tile_h: 16,
        tile_v: 4,
        mode: DataMode::GpuRawTile,
        fbdc: None,
    },
    TileEntry {
        family: Family::Rgb16,
        modifier: Modifier::GpuFbdc16x4,
        tile_h: 16,
        tile_v: 4,
        mode: DataMode::GpuCompressedTile,
        fbdc: Some(0x05),
    },
    TileEntry {
        family: Family::Yuv420SemiPlanar,
        modifier: Modifier::GpuFbdc16x4,
        tile_h: 16,
        tile_v: 4,
        mode: DataMode::GpuCompressedTile,
        fbdc: Some(0x28),
    },
    TileEntry {
        family: Family::Yuv420SemiPlanar,
        modifier: Modifier::VdecTile16x16,
        tile_h: 16,
        tile_v: 16,
        mode: DataMode::DecoderRawTile,
        fbdc: None,
    },
    TileEntry {
        family: Family::Yuv420SemiPlanar,
        modifier: Modifier::VdecFbdc32x8,
        tile_h: 32,
        tile_v: 8,
        mode: DataMode::DecoderCompressedTile,
        fbdc: Some(0x25),
    },
];

/// Tile-aligned fetch box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    pub width: u32,
    pub height: u32,
}

impl TileBox {
    fn from_edges(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    pub fn as_rect(&self) -> Rect {
        Rect::new(self.x1, self.y1, self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileContext {
    pub tile_h_code: u32,
    pub tile_v_code: u32,
    /// Tile block width in pixels.
    pub tile_h: u32,
    /// Tile block height in pixels.
    pub tile_v: u32,
    pub bbox: TileBox,
    pub data_mode: DataMode,
    pub fbdc_code: Option<u8>,
    pub is_tile_mode: bool,
    pub is_fbdc_cps: bool,
}

impl TileContext {
    /// The tile control register word.
    pub fn tile_ctrl(&self) -> u32 {
        TILE_CTRL_H.encode(self.tile_h_code) | TILE_CTRL_V.encode(self.tile_v_code)
    }
}

/// Block size code, log2 minus one: 2 → 0, 4 → 1, 16 → 3, 32 → 4.
fn size_code(pixels: u32) -> u32 {
    pixels.trailing_zeros().saturating_sub(1)
}

const fn align_down(v: u32, a: u32) -> u32 {
    v / a * a
}

const fn align_up(v: u32, a: u32) -> u32 {
    v.div_ceil(a) * a
}

pub fn resolve_tile(format: Fourcc, modifier: Modifier, src: &Rect) -> Result<TileContext> {
    if src.right() > MAX_DIMENSION || src.bottom() > MAX_DIMENSION {
        return Err(G2dError::InvalidGeometry(format!(
            "source {:?} beyond {} pixels",
            src, MAX_DIMENSION
        )));
    }
    if modifier == Modifier::Linear {
        return Ok(TileContext {
            tile_h_code: 0,
            tile_v_code: 0,
            tile_h: 1,
            tile_v: 1,
            bbox: TileBox::from_edges(src.x, src.y, src.right(), src.bottom()),
            data_mode: DataMode::Linear,
            fbdc_code: None,
            is_tile_mode: false,
            is_fbdc_cps: false,
        });
    }

    let pc = format::resolve(format)?;
    let unsupported = G2dError::UnsupportedModifier { format, modifier };
    let fam = family(&pc).ok_or(unsupported.clone())?;
    let entry = TILE_TABLE
        .iter()
        .find(|entry| entry.family == fam && entry.modifier == modifier)
        .ok_or(unsupported)?;

    let (th, tv) = (entry.tile_h, entry.tile_v);
    let x1 = align_down(src.x, th);
    let y1 = align_down(src.y, tv);
    let mut x2 = align_up(src.right(), th);
    let y2 = align_up(src.bottom(), tv);

    // The chroma plane is fetched in tile pairs.
    if fam == Family::Yuv420SemiPlanar && ((x2 - x1) / th) % 2 == 1 {
        x2 += th;
    }

    let compressed = matches!(
        entry.mode,
        DataMode::GpuCompressedTile | DataMode::DecoderCompressedTile
    );

    Ok(TileContext {
        tile_h_code: size_code(th),
        tile_v_code: size_code(tv),
        tile_h: th,
        tile_v: tv,
        bbox: TileBox::from_edges(x1, y1, x2, y2),
        data_mode: entry.mode,
        fbdc_code: entry.fbdc,
        is_tile_mode: true,
        is_fbdc_cps: compressed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formats_for(fam: Family) -> Fourcc {
        match fam {
            Family::Rgb32 => Fourcc::ARGB8888,
            Family::Rgb16 => Fourcc::RGB565,
            Family::Yuv420SemiPlanar => Fourcc::NV12,
        }
    }

    #[test]
    fn test_box_is_aligned_and_contains_source() {
        for entry in TILE_TABLE.iter() {
            let format = formats_for(entry.family);
            for x in [0, 1, 7, 15, 16, 33, 100] {
                for w in [1, 3, 16, 17, 64, 250] {
                    let src = Rect::new(x, x / 2, w, w / 2 + 1);
                    let ctx = resolve_tile(format, entry.modifier, &src).unwrap();
                    let b = ctx.bbox;
                    assert_eq!(b.x1 % ctx.tile_h, 0);
                    assert_eq!(b.x2 % ctx.tile_h, 0);
                    assert_eq!(b.y1 % ctx.tile_v, 0);
                    assert_eq!(b.y2 % ctx.tile_v, 0);
                    assert!(b.as_rect().contains(&src), "{:?} {:?}", b, src);
                    assert!(ctx.is_tile_mode);
                }
            }
        }
    }

    #[test]
    fn test_nv12_tile_count_is_even() {
        let src = Rect::new(0, 0, 48, 32);
        let ctx = resolve_tile(Fourcc::NV21, Modifier::VdecTile16x16, &src).unwrap();
        assert_eq!(ctx.bbox.width, 64);
        assert_eq!((ctx.bbox.width / ctx.tile_h) % 2, 0);

        // RGB keeps an odd count.
        let ctx = resolve_tile(Fourcc::ARGB8888, Modifier::GpuTile16x4, &src).unwrap();
        assert_eq!(ctx.bbox.width, 48);
    }

    #[test]
    fn test_linear_keeps_source_rect() {
        let src = Rect::new(3, 5, 17, 9);
        let ctx = resolve_tile(Fourcc::NV12, Modifier::Linear, &src).unwrap();
        assert_eq!(ctx.bbox.as_rect(), src);
        assert!(!ctx.is_tile_mode);
        assert!(!ctx.is_fbdc_cps);
        assert_eq!(ctx.data_mode, DataMode::Linear);
    }

    #[test]
    fn test_compressed_flags() {
        let src = Rect::new(0, 0, 64, 64);
        let raw = resolve_tile(Fourcc::ARGB8888, Modifier::GpuTile32x2, &src).unwrap();
        assert!(!raw.is_fbdc_cps);
        assert_eq!(raw.fbdc_code, None);
        assert_eq!((raw.tile_h_code, raw.tile_v_code), (4, 0));

        let cps = resolve_tile(Fourcc::NV12, Modifier::VdecFbdc32x8, &src).unwrap();
        assert!(cps.is_fbdc_cps);
        assert_eq!(cps.fbdc_code, Some(0x25));
        assert_eq!(cps.data_mode, DataMode::DecoderCompressedTile);
    }

    #[test]
    fn test_unsupported_combination() {
        let src = Rect::new(0, 0, 64, 64);
        assert_eq!(
            resolve_tile(Fourcc::YUYV, Modifier::GpuTile16x4, &src),
            Err(G2dError::UnsupportedModifier {
                format: Fourcc::YUYV,
                modifier: Modifier::GpuTile16x4
            })
        );
        assert!(resolve_tile(Fourcc::ARGB8888, Modifier::VdecTile16x16, &src).is_err());
    }

    #[test]
    fn test_source_past_addressable_range() {
        let src = Rect::new(u32::MAX - 4, 0, 16, 16);
        for modifier in [Modifier::Linear, Modifier::GpuTile16x4] {
            assert!(matches!(
                resolve_tile(Fourcc::ARGB8888, modifier, &src),
                Err(G2dError::InvalidGeometry(_))
            ));
        }
    }
}
