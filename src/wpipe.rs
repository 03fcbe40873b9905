//! Write Pipe
//!
//! Converts the composed RGB stream to the output format (RGB → YUV CSC plus
//! the chroma down-sample bypass code), applies the output rotation and
//! writes through the write DMA.

use crate::compose::ResolvedOutput;
use crate::csc;
use crate::regs::*;

pub fn program(out: &ResolvedOutput, writes: &mut Vec<RegWrite>) {
    let cfg = &out.output;
    let planes = out.pc.planes();

    writes.push(RegWrite::new(WP_PIXEL_COMP, out.pc.to_reg()));
    writes.push(RegWrite::new(WP_SIZE, pack_size(cfg.width, cfg.height)));
    writes.push(RegWrite::new(WP_DS_BYPASS, WP_BYPASS.encode(out.bypass as u32)));

    if out.pc.is_yuv {
        writes.push(RegWrite::new(WP_CSC_CTRL, CSC_CTRL_ENABLE));
        for (n, &coef) in csc::rgb_to_yuv(cfg.color_space).iter().enumerate() {
            writes.push(RegWrite::new(wp_csc_coef(n), csc::coef_reg(coef)));
        }
    } else {
        writes.push(RegWrite::new(WP_CSC_CTRL, 0));
    }

    for plane in 0..planes {
        writes.push(RegWrite::new(wp_addr_lo(plane), lo32(cfg.addr[plane])));
        writes.push(RegWrite::new(wp_addr_hi(plane), hi32(cfg.addr[plane])));
        writes.push(RegWrite::new(wp_stride(plane), cfg.stride[plane]));
    }

    writes.push(RegWrite::new(
        WP_CTRL,
        WP_CTRL_ENABLE
            | WP_CTRL_ROTATION.encode(cfg.rotation.code())
            | WP_CTRL_PLANES.encode(planes as u32),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Fourcc;
    use crate::request::{OutputConfig, Rotation};

    fn written(writes: &[RegWrite], offset: u32) -> Option<u32> {
        writes.iter().find(|w| w.offset == offset).map(|w| w.value)
    }

    #[test]
    fn test_rgb_output_bypasses_downsampling() {
        let cfg = OutputConfig::new(Fourcc::XRGB8888, 1920, 1080).with_buffer(0x8000_0000);
        let out = ResolvedOutput::resolve(&cfg).unwrap();
        let mut writes = Vec::new();
        program(&out, &mut writes);
        assert_eq!(written(&writes, WP_DS_BYPASS), Some(0b11));
        assert_eq!(written(&writes, WP_CSC_CTRL), Some(0));
        assert_eq!(written(&writes, wp_stride(0)), Some(1920 * 4));
        assert_eq!(written(&writes, wp_addr_lo(1)), None);
    }

    #[test]
    fn test_nv12_output_programs_csc_and_both_planes() {
        let cfg = OutputConfig::new(Fourcc::NV12, 640, 480)
            .with_rotation(Rotation::Rot90)
            .with_buffer(0x1_0000_0000);
        let out = ResolvedOutput::resolve(&cfg).unwrap();
        let mut writes = Vec::new();
        program(&out, &mut writes);
        assert_eq!(written(&writes, WP_DS_BYPASS), Some(0b00));
        assert_eq!(written(&writes, WP_CSC_CTRL), Some(CSC_CTRL_ENABLE));
        assert_eq!(written(&writes, wp_addr_hi(0)), Some(1));
        assert!(written(&writes, wp_addr_lo(1)).is_some());
        let ctrl = written(&writes, WP_CTRL).unwrap();
        assert_eq!(WP_CTRL_ROTATION.decode(ctrl), Rotation::Rot90 as u32);
        assert_eq!(WP_CTRL_PLANES.decode(ctrl), 2);
    }
}
