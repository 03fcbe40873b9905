//! Format Catalog
//!
//! Maps DRM fourcc pixel formats onto the component layout the pipes and the
//! write pipe are programmed with.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{G2dError, Result};
use crate::regs::*;

/// A DRM fourcc pixel format code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fourcc(pub u32);

const fn fourcc(code: &[u8; 4]) -> Fourcc {
    Fourcc(
        code[0] as u32 | (code[1] as u32) << 8 | (code[2] as u32) << 16 | (code[3] as u32) << 24,
    )
}

impl Fourcc {
    pub const ARGB8888: Fourcc = fourcc(b"AR24");
    pub const XRGB8888: Fourcc = fourcc(b"XR24");
    pub const ABGR8888: Fourcc = fourcc(b"AB24");
    pub const XBGR8888: Fourcc = fourcc(b"XB24");
    pub const RGBA8888: Fourcc = fourcc(b"RA24");
    pub const RGBX8888: Fourcc = fourcc(b"RX24");
    pub const BGRA8888: Fourcc = fourcc(b"BA24");
    pub const BGRX8888: Fourcc = fourcc(b"BX24");
    pub const RGB888: Fourcc = fourcc(b"RG24");
    pub const BGR888: Fourcc = fourcc(b"BG24");
    pub const RGB565: Fourcc = fourcc(b"RG16");
    pub const BGR565: Fourcc = fourcc(b"BG16");
    pub const ARGB1555: Fourcc = fourcc(b"AR15");
    pub const XRGB1555: Fourcc = fourcc(b"XR15");
    pub const ARGB4444: Fourcc = fourcc(b"AR12");
    pub const RGBA4444: Fourcc = fourcc(b"RA12");
    pub const RGB332: Fourcc = fourcc(b"RGB8");
    pub const NV12: Fourcc = fourcc(b"NV12");
    pub const NV21: Fourcc = fourcc(b"NV21");
    pub const NV16: Fourcc = fourcc(b"NV16");
    pub const NV61: Fourcc = fourcc(b"NV61");
    pub const YUV420: Fourcc = fourcc(b"YU12");
    pub const YVU420: Fourcc = fourcc(b"YV12");
    pub const YUV422: Fourcc = fourcc(b"YU16");
    pub const YUV444: Fourcc = fourcc(b"YU24");
    pub const AYUV: Fourcc = fourcc(b"AYUV");
    pub const YUYV: Fourcc = fourcc(b"YUYV");
    pub const YVYU: Fourcc = fourcc(b"YVYU");
    pub const UYVY: Fourcc = fourcc(b"UYVY");
    pub const VYUY: Fourcc = fourcc(b"VYUY");

    /// Catalog name, if the format is known.
    pub fn name(self) -> Option<&'static str> {
        CATALOG
            .iter()
            .find(|entry| entry.fourcc == self)
            .map(|entry| entry.name)
    }
}

impl fmt::Display for Fourcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

impl fmt::Debug for Fourcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fourcc({})", self)
    }
}

impl FromStr for Fourcc {
    type Err = G2dError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        if let Some(entry) = CATALOG.iter().find(|entry| entry.name == upper) {
            return Ok(entry.fourcc);
        }
        // Raw codes pass through and fail later at resolve time.
        let raw = upper.trim_start_matches("0X");
        u32::from_str_radix(raw, 16)
            .map(Fourcc)
            .map_err(|_| G2dError::UnknownFormatName(s.trim().to_string()))
    }
}

impl TryFrom<String> for Fourcc {
    type Error = G2dError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Fourcc> for String {
    fn from(value: Fourcc) -> Self {
        value.to_string()
    }
}

/// Chroma subsampling of a YUV format. RGB formats report `Yuv444`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UvMode {
    Yuv420 = 0,
    Yuv422 = 1,
    Yuv444 = 2,
}

impl UvMode {
    /// Horizontal chroma subsampling factor.
    pub fn h_sub(self) -> u32 {
        match self {
            UvMode::Yuv420 | UvMode::Yuv422 => 2,
            UvMode::Yuv444 => 1,
        }
    }

    /// Vertical chroma subsampling factor.
    pub fn v_sub(self) -> u32 {
        match self {
            UvMode::Yuv420 => 2,
            UvMode::Yuv422 | UvMode::Yuv444 => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferLayout {
    Interleaved = 0,
    SemiPlanar = 1,
    Planar = 2,
}

impl BufferLayout {
    pub fn planes(self) -> usize {
        match self {
            BufferLayout::Interleaved => 1,
            BufferLayout::SemiPlanar => 2,
            BufferLayout::Planar => 3,
        }
    }
}

/// Per-format component layout.
///
/// For RGB formats `y_bits`/`u_bits`/`v_bits` hold the R/G/B widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelComponent {
    pub a_bits: u8,
    pub y_bits: u8,
    pub u_bits: u8,
    pub v_bits: u8,
    /// Channel order code. RGB: 0 ARGB, 1 ABGR, 2 RGBA, 3 BGRA.
    /// Semi-planar/planar YUV: 0 UV, 1 VU. Packed 4:2:2: 0 YUYV, 1 UYVY,
    /// 2 YVYU, 3 VYUY.
    pub swap: u8,
    pub is_yuv: bool,
    pub uv_mode: UvMode,
    pub layout: BufferLayout,
    pub big_endian: bool,
    /// The alpha slot is padding (X formats).
    pub alpha_ignored: bool,
}

impl PixelComponent {
    const fn rgb(a: u8, r: u8, g: u8, b: u8, swap: u8) -> Self {
        Self {
            a_bits: a,
            y_bits: r,
            u_bits: g,
            v_bits: b,
            swap,
            is_yuv: false,
            uv_mode: UvMode::Yuv444,
            layout: BufferLayout::Interleaved,
            big_endian: false,
            alpha_ignored: false,
        }
    }

    const fn yuv(a: u8, uv_mode: UvMode, layout: BufferLayout, swap: u8) -> Self {
        Self {
            a_bits: a,
            y_bits: 8,
            u_bits: 8,
            v_bits: 8,
            swap,
            is_yuv: true,
            uv_mode,
            layout,
            big_endian: false,
            alpha_ignored: false,
        }
    }

    const fn padded(mut self) -> Self {
        self.alpha_ignored = true;
        self
    }

    const fn byte_order(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn planes(&self) -> usize {
        self.layout.planes()
    }

    /// Bits per pixel averaged over the whole frame.
    pub fn bpp(&self) -> u32 {
        let (a, y, u, v) = (
            self.a_bits as u32,
            self.y_bits as u32,
            self.u_bits as u32,
            self.v_bits as u32,
        );
        if self.is_yuv {
            a + y + (u + v) / (self.uv_mode.h_sub() * self.uv_mode.v_sub())
        } else {
            a + y + u + v
        }
    }

    /// Bits a single luma column occupies in `plane`, horizontally.
    ///
    /// Used for address arithmetic: advancing `n` columns moves plane `p`
    /// by `n * plane_bpp(p) / 8` bytes.
    pub fn plane_bpp(&self, plane: usize) -> u32 {
        let h_sub = self.uv_mode.h_sub();
        match (self.layout, plane) {
            (BufferLayout::Interleaved, 0) => {
                if self.is_yuv {
                    // Packed formats carry their chroma inline.
                    self.a_bits as u32
                        + self.y_bits as u32
                        + (self.u_bits as u32 + self.v_bits as u32) / h_sub
                } else {
                    self.bpp()
                }
            }
            (BufferLayout::SemiPlanar, 0) | (BufferLayout::Planar, 0) => self.y_bits as u32,
            (BufferLayout::SemiPlanar, 1) => (self.u_bits as u32 + self.v_bits as u32) / h_sub,
            (BufferLayout::Planar, 1) => self.u_bits as u32 / h_sub,
            (BufferLayout::Planar, 2) => self.v_bits as u32 / h_sub,
            _ => 0,
        }
    }

    /// Rows of `plane` per luma row, as a divisor.
    pub fn plane_v_sub(&self, plane: usize) -> u32 {
        if plane == 0 || !self.is_yuv {
            1
        } else {
            self.uv_mode.v_sub()
        }
    }

    /// Smallest column step that starts every plane on a whole byte and on
    /// a whole chroma sample.
    pub fn column_align(&self) -> u32 {
        let mut align = if self.is_yuv { self.uv_mode.h_sub() } else { 1 };
        while (0..self.planes()).any(|p| align * self.plane_bpp(p) % 8 != 0) {
            align *= 2;
        }
        align
    }

    /// Smallest row step that starts every plane on a whole chroma row.
    pub fn row_align(&self) -> u32 {
        if self.is_yuv {
            self.uv_mode.v_sub()
        } else {
            1
        }
    }

    pub fn is_yuv420(&self) -> bool {
        self.is_yuv && self.uv_mode == UvMode::Yuv420
    }

    pub fn is_packed_yuv422(&self) -> bool {
        self.is_yuv && self.layout == BufferLayout::Interleaved && self.uv_mode == UvMode::Yuv422
    }

    /// The pixel-component register word.
    pub fn to_reg(&self) -> u32 {
        let mut reg = PC_A_BITS.encode(self.a_bits as u32)
            | PC_Y_BITS.encode(self.y_bits as u32)
            | PC_U_BITS.encode(self.u_bits as u32)
            | PC_V_BITS.encode(self.v_bits as u32)
            | PC_SWAP.encode(self.swap as u32)
            | PC_UV_MODE.encode(self.uv_mode as u32)
            | PC_LAYOUT.encode(self.layout as u32);
        if self.is_yuv {
            reg |= PC_YUV;
        }
        if self.big_endian {
            reg |= PC_ENDIAN;
        }
        if self.alpha_ignored {
            reg |= PC_ALPHA_IGNORE;
        }
        reg
    }
}

/// Chroma down-sample bypass code for the write pipe's two cascaded stages
/// (horizontal 4:4:4 → 4:2:2, then vertical 4:2:2 → 4:2:0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownsampleBypass {
    /// Both stages active: 4:2:0 output.
    None = 0b00,
    /// Vertical stage bypassed: 4:2:2 output.
    ChromaOnly = 0b01,
    /// Both stages bypassed: RGB or 4:4:4 output.
    Both = 0b11,
}

struct CatalogEntry {
    fourcc: Fourcc,
    name: &'static str,
    component: PixelComponent,
    writable: bool,
}

use BufferLayout::{Interleaved, Planar, SemiPlanar};

const fn entry(
    fourcc: Fourcc,
    name: &'static str,
    component: PixelComponent,
    writable: bool,
) -> CatalogEntry {
    CatalogEntry {
        fourcc,
        name,
        component,
        writable,
    }
}

#[rustfmt::skip]
static CATALOG: [CatalogEntry; 30] = [
    entry(Fourcc::ARGB8888, "ARGB8888", PixelComponent::rgb(8, 8, 8, 8, 0), true),
    entry(Fourcc::XRGB8888, "XRGB8888", PixelComponent::rgb(8, 8, 8, 8, 0).padded(), true),
    entry(Fourcc::ABGR8888, "ABGR8888", PixelComponent::rgb(8, 8, 8, 8, 1), true),
    entry(Fourcc::XBGR8888, "XBGR8888", PixelComponent::rgb(8, 8, 8, 8, 1).padded(), true),
    entry(Fourcc::RGBA8888, "RGBA8888", PixelComponent::rgb(8, 8, 8, 8, 2), true),
    entry(Fourcc::RGBX8888, "RGBX8888", PixelComponent::rgb(8, 8, 8, 8, 2).padded(), true),
    entry(Fourcc::BGRA8888, "BGRA8888", PixelComponent::rgb(8, 8, 8, 8, 3), true),
    entry(Fourcc::BGRX8888, "BGRX8888", PixelComponent::rgb(8, 8, 8, 8, 3).padded(), true),
    entry(Fourcc::RGB888, "RGB888", PixelComponent::rgb(0, 8, 8, 8, 0).byte_order(), true),
    entry(Fourcc::BGR888, "BGR888", PixelComponent::rgb(0, 8, 8, 8, 1).byte_order(), true),
    entry(Fourcc::RGB565, "RGB565", PixelComponent::rgb(0, 5, 6, 5, 0), true),
    entry(Fourcc::BGR565, "BGR565", PixelComponent::rgb(0, 5, 6, 5, 1), true),
    entry(Fourcc::ARGB1555, "ARGB1555", PixelComponent::rgb(1, 5, 5, 5, 0), false),
    entry(Fourcc::XRGB1555, "XRGB1555", PixelComponent::rgb(1, 5, 5, 5, 0).padded(), false),
    entry(Fourcc::ARGB4444, "ARGB4444", PixelComponent::rgb(4, 4, 4, 4, 0), false),
    entry(Fourcc::RGBA4444, "RGBA4444", PixelComponent::rgb(4, 4, 4, 4, 2), false),
    entry(Fourcc::RGB332, "RGB332", PixelComponent::rgb(0, 3, 3, 2, 0), false),
    entry(Fourcc::NV12, "NV12", PixelComponent::yuv(0, UvMode::Yuv420, SemiPlanar, 0), true),
    entry(Fourcc::NV21, "NV21", PixelComponent::yuv(0, UvMode::Yuv420, SemiPlanar, 1), true),
    entry(Fourcc::NV16, "NV16", PixelComponent::yuv(0, UvMode::Yuv422, SemiPlanar, 0), true),
    entry(Fourcc::NV61, "NV61", PixelComponent::yuv(0, UvMode::Yuv422, SemiPlanar, 1), true),
    entry(Fourcc::YUV420, "YUV420", PixelComponent::yuv(0, UvMode::Yuv420, Planar, 0), true),
    entry(Fourcc::YVU420, "YVU420", PixelComponent::yuv(0, UvMode::Yuv420, Planar, 1), true),
    entry(Fourcc::YUV422, "YUV422", PixelComponent::yuv(0, UvMode::Yuv422, Planar, 0), false),
    entry(Fourcc::YUV444, "YUV444", PixelComponent::yuv(0, UvMode::Yuv444, Planar, 0), false),
    entry(Fourcc::AYUV, "AYUV", PixelComponent::yuv(8, UvMode::Yuv444, Interleaved, 0), true),
    entry(Fourcc::YUYV, "YUYV", PixelComponent::yuv(0, UvMode::Yuv422, Interleaved, 0), true),
    entry(Fourcc::UYVY, "UYVY", PixelComponent::yuv(0, UvMode::Yuv422, Interleaved, 1), true),
    entry(Fourcc::YVYU, "YVYU", PixelComponent::yuv(0, UvMode::Yuv422, Interleaved, 2), false),
    entry(Fourcc::VYUY, "VYUY", PixelComponent::yuv(0, UvMode::Yuv422, Interleaved, 3), true),
];

/// Resolve a format for the read side.
pub fn resolve(format: Fourcc) -> Result<PixelComponent> {
    CATALOG
        .iter()
        .find(|entry| entry.fourcc == format)
        .map(|entry| entry.component)
        .ok_or(G2dError::UnsupportedFormat(format))
}

/// Resolve a format for the write pipe, together with its down-sample
/// bypass code.
pub fn resolve_write(format: Fourcc) -> Result<(PixelComponent, DownsampleBypass)> {
    let entry = CATALOG
        .iter()
        .find(|entry| entry.fourcc == format)
        .ok_or(G2dError::UnsupportedFormat(format))?;
    if !entry.writable {
        return Err(G2dError::UnsupportedWriteFormat(format));
    }
    let pc = entry.component;
    let bypass = if !pc.is_yuv {
        DownsampleBypass::Both
    } else {
        match pc.uv_mode {
            UvMode::Yuv420 => DownsampleBypass::None,
            UvMode::Yuv422 => DownsampleBypass::ChromaOnly,
            UvMode::Yuv444 => DownsampleBypass::Both,
        }
    };
    Ok((pc, bypass))
}

/// Every format the catalog knows, in catalog order.
pub fn all_formats() -> impl Iterator<Item = Fourcc> {
    CATALOG.iter().map(|entry| entry.fourcc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known_bpp(format: Fourcc) -> u32 {
        match format {
            Fourcc::RGB332 => 8,
            Fourcc::NV12 | Fourcc::NV21 | Fourcc::YUV420 | Fourcc::YVU420 => 12,
            Fourcc::RGB565
            | Fourcc::BGR565
            | Fourcc::ARGB1555
            | Fourcc::XRGB1555
            | Fourcc::ARGB4444
            | Fourcc::RGBA4444
            | Fourcc::NV16
            | Fourcc::NV61
            | Fourcc::YUV422
            | Fourcc::YUYV
            | Fourcc::YVYU
            | Fourcc::UYVY
            | Fourcc::VYUY => 16,
            Fourcc::RGB888 | Fourcc::BGR888 | Fourcc::YUV444 => 24,
            _ => 32,
        }
    }

    #[test]
    fn test_component_widths_match_bpp() {
        for format in all_formats() {
            let pc = resolve(format).unwrap();
            assert_eq!(pc.bpp(), known_bpp(format), "{}", format);
        }
    }

    #[test]
    fn test_plane_bpp_sums_to_bpp() {
        for format in all_formats() {
            let pc = resolve(format).unwrap();
            let per_row: u32 = (0..pc.planes())
                .map(|p| pc.plane_bpp(p) * 2 / pc.plane_v_sub(p))
                .sum();
            // Two luma rows so 4:2:0 chroma rows come out whole.
            assert_eq!(per_row, pc.bpp() * 2, "{}", format);
        }
    }

    #[test]
    fn test_semi_planar_differs_only_in_swap() {
        let nv12 = resolve(Fourcc::NV12).unwrap();
        let nv21 = resolve(Fourcc::NV21).unwrap();
        assert_ne!(nv12.swap, nv21.swap);
        assert_eq!(PixelComponent { swap: nv12.swap, ..nv21 }, nv12);
    }

    #[test]
    fn test_unknown_format_fails() {
        let bogus = Fourcc(0x1234_5678);
        assert_eq!(resolve(bogus), Err(G2dError::UnsupportedFormat(bogus)));
        assert!(resolve_write(bogus).is_err());
    }

    #[test]
    fn test_write_bypass_codes() {
        assert_eq!(resolve_write(Fourcc::XRGB8888).unwrap().1, DownsampleBypass::Both);
        assert_eq!(resolve_write(Fourcc::AYUV).unwrap().1, DownsampleBypass::Both);
        assert_eq!(resolve_write(Fourcc::NV16).unwrap().1, DownsampleBypass::ChromaOnly);
        assert_eq!(resolve_write(Fourcc::YUYV).unwrap().1, DownsampleBypass::ChromaOnly);
        assert_eq!(resolve_write(Fourcc::NV12).unwrap().1, DownsampleBypass::None);
        assert_eq!(
            resolve_write(Fourcc::YUV444),
            Err(G2dError::UnsupportedWriteFormat(Fourcc::YUV444))
        );
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("nv12".parse::<Fourcc>().unwrap(), Fourcc::NV12);
        assert_eq!("XRGB8888".parse::<Fourcc>().unwrap(), Fourcc::XRGB8888);
        assert_eq!(Fourcc::YUV420.to_string(), "YUV420");
        assert_eq!("0x34325258".parse::<Fourcc>().unwrap(), Fourcc::XRGB8888);
        assert_eq!(
            " bogus ".parse::<Fourcc>(),
            Err(G2dError::UnknownFormatName("bogus".into()))
        );
    }

    #[test]
    fn test_alignment_keeps_chroma_pairs_whole() {
        for format in [Fourcc::NV12, Fourcc::NV61, Fourcc::YUV420, Fourcc::YUYV, Fourcc::UYVY] {
            assert_eq!(resolve(format).unwrap().column_align(), 2, "{}", format);
        }
        let whole = [
            Fourcc::ARGB8888,
            Fourcc::RGB888,
            Fourcc::RGB565,
            Fourcc::YUV444,
            Fourcc::AYUV,
        ];
        for format in whole {
            assert_eq!(resolve(format).unwrap().column_align(), 1, "{}", format);
        }
        assert_eq!(resolve(Fourcc::NV12).unwrap().row_align(), 2);
        assert_eq!(resolve(Fourcc::NV16).unwrap().row_align(), 1);
        assert_eq!(resolve(Fourcc::XRGB8888).unwrap().row_align(), 1);
    }
}
