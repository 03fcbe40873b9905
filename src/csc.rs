//! Colour-space conversion tables
//!
//! Fixed Q10 matrices for the read pipes (YUV → RGB, feeding the compositor)
//! and the write pipe (RGB → YUV). Each table is three rows of
//! `[c0, c1, c2, offset]`; the hardware computes
//! `out = (c0 * in0 + c1 * in1 + c2 * in2) >> 10 + offset` per row.

use crate::regs::CSC_COEF_COUNT;
use crate::request::ColorSpace;

pub type CscTable = [i16; CSC_COEF_COUNT];

#[rustfmt::skip]
const YUV2RGB_BT601: CscTable = [
    1192,    0, 1634, -223,
    1192, -401, -833,  136,
    1192, 2066,    0, -277,
];

#[rustfmt::skip]
const YUV2RGB_BT709: CscTable = [
    1192,    0, 1836, -248,
    1192, -218, -546,   77,
    1192, 2163,    0, -289,
];

#[rustfmt::skip]
const RGB2YUV_BT601: CscTable = [
     263,  516,  100,  16,
    -152, -298,  450, 128,
     450, -377,  -73, 128,
];

#[rustfmt::skip]
const RGB2YUV_BT709: CscTable = [
     187,  629,   63,  16,
    -103, -346,  450, 128,
     450, -409,  -41, 128,
];

pub fn yuv_to_rgb(cs: ColorSpace) -> &'static CscTable {
    match cs {
        ColorSpace::Bt601 => &YUV2RGB_BT601,
        ColorSpace::Bt709 => &YUV2RGB_BT709,
    }
}

pub fn rgb_to_yuv(cs: ColorSpace) -> &'static CscTable {
    match cs {
        ColorSpace::Bt601 => &RGB2YUV_BT601,
        ColorSpace::Bt709 => &RGB2YUV_BT709,
    }
}

/// Register encoding: 16-bit two's complement in the low half-word.
pub fn coef_reg(coef: i16) -> u32 {
    coef as u16 as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(table: &CscTable, input: [i32; 3]) -> [i32; 3] {
        let mut out = [0; 3];
        for (row, value) in out.iter_mut().enumerate() {
            let c = &table[row * 4..row * 4 + 4];
            *value = (c[0] as i32 * input[0] + c[1] as i32 * input[1] + c[2] as i32 * input[2])
                / 1024
                + c[3] as i32;
        }
        out
    }

    #[test]
    fn test_video_white_maps_to_full_white() {
        for cs in [ColorSpace::Bt601, ColorSpace::Bt709] {
            let rgb = apply(yuv_to_rgb(cs), [235, 128, 128]);
            for channel in rgb {
                assert!((253..=257).contains(&channel), "{:?} {:?}", cs, rgb);
            }
        }
    }

    #[test]
    fn test_grey_has_neutral_chroma() {
        for cs in [ColorSpace::Bt601, ColorSpace::Bt709] {
            let yuv = apply(rgb_to_yuv(cs), [128, 128, 128]);
            assert!((127..=129).contains(&yuv[1]), "{:?} {:?}", cs, yuv);
            assert!((127..=129).contains(&yuv[2]), "{:?} {:?}", cs, yuv);
        }
    }

    #[test]
    fn test_negative_coefficients_encode_low_half() {
        assert_eq!(coef_reg(-1), 0xFFFF);
        assert_eq!(coef_reg(1192), 1192);
    }
}
