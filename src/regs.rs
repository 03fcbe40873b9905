//! G2D Register Map
//!
//! Register offsets and bit-field layouts for the composition engine. All
//! offsets are byte offsets from the engine's register base. Every value the
//! compiler emits is built from the field helpers below so that the bit
//! positions live in exactly one place.

use bitflags::bitflags;

/// Largest width/height any size field can carry.
pub const MAX_DIMENSION: u32 = 8192;

// =============================================================================
// Field helpers
// =============================================================================

/// A bit field inside a 32-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub shift: u32,
    pub width: u32,
}

impl Field {
    pub const fn new(shift: u32, width: u32) -> Self {
        Self { shift, width }
    }

    /// Unshifted mask covering `width` bits.
    pub const fn max(self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            (1 << self.width) - 1
        }
    }

    /// Place `value` into this field. Bits beyond the field width are dropped.
    pub const fn encode(self, value: u32) -> u32 {
        (value & self.max()) << self.shift
    }

    /// Extract this field from a register value.
    pub const fn decode(self, reg: u32) -> u32 {
        (reg >> self.shift) & self.max()
    }

    /// Replace this field inside `reg`, leaving other bits alone.
    pub const fn insert(self, reg: u32, value: u32) -> u32 {
        (reg & !(self.max() << self.shift)) | self.encode(value)
    }
}

/// Packed `(h - 1) << 16 | (w - 1)` size word.
pub const fn pack_size(width: u32, height: u32) -> u32 {
    (height.saturating_sub(1) & 0xFFFF) << 16 | (width.saturating_sub(1) & 0xFFFF)
}

/// Packed `y << 16 | x` position word.
pub const fn pack_pos(x: u32, y: u32) -> u32 {
    (y & 0xFFFF) << 16 | (x & 0xFFFF)
}

pub const fn lo32(addr: u64) -> u32 {
    addr as u32
}

pub const fn hi32(addr: u64) -> u32 {
    (addr >> 32) as u32
}

/// A single register write, the unit both emit modes operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegWrite {
    pub offset: u32,
    pub value: u32,
}

impl RegWrite {
    pub const fn new(offset: u32, value: u32) -> Self {
        Self { offset, value }
    }
}

/// A register block at a fixed base offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub base: u32,
}

impl Block {
    pub const fn at(base: u32) -> Self {
        Self { base }
    }

    pub const fn offset(self, reg: u32) -> u32 {
        self.base + reg
    }

    /// Queue a write of `value` to `reg` inside this block.
    pub fn push(self, out: &mut Vec<RegWrite>, reg: u32, value: u32) {
        out.push(RegWrite::new(self.offset(reg), value));
    }
}

/// Global register space as a block.
pub const GLOBAL: Block = Block::at(0);

// =============================================================================
// Global block: 0x0000 - 0x00FF
// =============================================================================

pub const G2D_VERSION: u32 = 0x0000;
pub const G2D_CTRL: u32 = 0x0004;
pub const G2D_INT_MASK: u32 = 0x0008;
pub const G2D_INT_STATUS: u32 = 0x000C;
pub const G2D_CMD_ID: u32 = 0x0010;
pub const G2D_STATUS: u32 = 0x0014;
pub const G2D_WORK_MODE: u32 = 0x0018;

pub const G2D_CTRL_START: u32 = 1 << 0;
pub const G2D_CTRL_SOFT_RESET: u32 = 1 << 1;
pub const G2D_CTRL_CMD_MODE: u32 = 1 << 2;

pub const G2D_STATUS_BUSY: u32 = 1 << 0;

pub const WORK_MODE_OP: Field = Field::new(0, 2);
pub const WORK_MODE_STROKE: u32 = 1 << 4;

pub const OP_COMPOSE: u32 = 0;
pub const OP_FILL: u32 = 1;
pub const OP_FASTCOPY: u32 = 2;

bitflags! {
    /// Interrupt status / mask bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IntStatus: u32 {
        const FRAME_DONE = 1 << 0;
        const CMD_DONE   = 1 << 1;
        const RDMA_ERR   = 1 << 4;
        const WDMA_ERR   = 1 << 5;
        const CMD_ERR    = 1 << 6;
        const HW_TIMEOUT = 1 << 8;
    }
}

impl IntStatus {
    pub const ERRORS: IntStatus = IntStatus::RDMA_ERR
        .union(IntStatus::WDMA_ERR)
        .union(IntStatus::CMD_ERR)
        .union(IntStatus::HW_TIMEOUT);
}

// Command DMA (cmdfile chain)
pub const G2D_CMD_BASE_LO: u32 = 0x0020;
pub const G2D_CMD_BASE_HI: u32 = 0x0024;
pub const G2D_CMD_LEN: u32 = 0x0028;
pub const G2D_CMD_NEXT_LO: u32 = 0x002C;
pub const G2D_CMD_NEXT_HI: u32 = 0x0030;
pub const G2D_CMD_NEXT_LEN: u32 = 0x0034;
pub const G2D_CMD_CHAIN_END: u32 = 0x0038;

// Fastcopy
pub const G2D_FC_SRC_LO: u32 = 0x0040;
pub const G2D_FC_SRC_HI: u32 = 0x0044;
pub const G2D_FC_DST_LO: u32 = 0x0048;
pub const G2D_FC_DST_HI: u32 = 0x004C;
pub const G2D_FC_SIZE: u32 = 0x0050;
pub const G2D_FC_SRC_STRIDE: u32 = 0x0054;
pub const G2D_FC_DST_STRIDE: u32 = 0x0058;

/// Fastcopy width field is 16 bits of bytes-minus-one.
pub const FASTCOPY_MAX_WIDTH: u32 = 0x1_0000;

// =============================================================================
// Read/Write DMA: 0x0100 - 0x02FF
// =============================================================================

pub const RDMA_CTRL: u32 = 0x0100;
pub const RDMA_CTRL_FASTCOPY: u32 = 1 << 0;
pub const RDMA_CH_BASE: u32 = 0x0110;
pub const RDMA_MAX_CHANNELS: usize = 12;

pub const WDMA_CTRL: u32 = 0x0200;
pub const WDMA_CH_BASE: u32 = 0x0210;
pub const WDMA_MAX_CHANNELS: usize = 4;

pub const DMA_CH_STRIDE: u32 = 0x10;

// Per-channel group layout
pub const DMA_CH_WATERMARK: u32 = 0x0;
pub const DMA_CH_DATA_DEPTH: u32 = 0x4;
pub const DMA_CH_CMD_DEPTH: u32 = 0x8;
pub const DMA_CH_BURST: u32 = 0xC;

pub const DMA_BURST_LEN: Field = Field::new(0, 4);
pub const DMA_BURST_PRIORITY: Field = Field::new(8, 4);
pub const DMA_BURST_ENABLE: u32 = 1 << 31;

pub const fn rdma_ch(channel: usize, reg: u32) -> u32 {
    RDMA_CH_BASE + channel as u32 * DMA_CH_STRIDE + reg
}

pub const fn wdma_ch(channel: usize, reg: u32) -> u32 {
    WDMA_CH_BASE + channel as u32 * DMA_CH_STRIDE + reg
}

// =============================================================================
// Read pipes: 0x1000 + n * 0x400
// =============================================================================

pub const PIPE_BASE: u32 = 0x1000;
pub const PIPE_STRIDE: u32 = 0x400;
pub const MAX_PIPES: usize = 5;

pub const PIPE_CTRL: u32 = 0x000;
pub const PIPE_PIXEL_COMP: u32 = 0x004;
pub const PIPE_FRAME_CTRL: u32 = 0x008;
pub const PIPE_SRC_SIZE: u32 = 0x00C;
pub const PIPE_CROP_POS: u32 = 0x010;
pub const PIPE_CROP_SIZE: u32 = 0x014;
pub const PIPE_SRC_POS: u32 = 0x018;
pub const PIPE_TILE_CTRL: u32 = 0x050;
pub const PIPE_TILE_POS: u32 = 0x054;
pub const PIPE_TILE_SIZE: u32 = 0x058;
pub const PIPE_CSC_CTRL: u32 = 0x05C;
pub const PIPE_SCL_CTRL: u32 = 0x100;
pub const PIPE_SCL_DST_SIZE: u32 = 0x104;
pub const PIPE_SCL_HSTEP: u32 = 0x108;
pub const PIPE_SCL_VSTEP: u32 = 0x10C;
pub const PIPE_SCL_HPHASE: u32 = 0x110;
pub const PIPE_SCL_VPHASE: u32 = 0x114;

pub const fn pipe_addr_lo(plane: usize) -> u32 {
    0x020 + plane as u32 * 8
}

pub const fn pipe_addr_hi(plane: usize) -> u32 {
    0x024 + plane as u32 * 8
}

pub const fn pipe_stride(plane: usize) -> u32 {
    0x040 + plane as u32 * 4
}

pub const fn pipe_csc_coef(n: usize) -> u32 {
    0x060 + n as u32 * 4
}

pub const fn pipe_scl_hcoef(phase: usize) -> u32 {
    0x200 + phase as u32 * 4
}

pub const fn pipe_scl_vcoef(phase: usize) -> u32 {
    0x240 + phase as u32 * 4
}

/// Absolute offset of register `reg` in pipe block `base`.
pub const fn pipe_reg(base: u32, reg: u32) -> u32 {
    base + reg
}

pub const PIPE_CTRL_ENABLE: u32 = 1 << 0;
pub const PIPE_CTRL_ROTATION: Field = Field::new(4, 3);
pub const PIPE_CTRL_TILE: u32 = 1 << 8;
pub const PIPE_CTRL_FBDC: u32 = 1 << 9;
pub const PIPE_CTRL_CSC: u32 = 1 << 10;
pub const PIPE_CTRL_SCALER: u32 = 1 << 11;

pub const FRAME_CTRL_PLANES: Field = Field::new(0, 2);
pub const FRAME_CTRL_DATA_MODE: Field = Field::new(4, 3);
pub const FRAME_CTRL_FBDC_FMT: Field = Field::new(8, 8);

pub const TILE_CTRL_H: Field = Field::new(0, 4);
pub const TILE_CTRL_V: Field = Field::new(4, 4);

pub const SCL_CTRL_H: u32 = 1 << 0;
pub const SCL_CTRL_V: u32 = 1 << 1;

// Pixel-component word, shared by read pipes and the write pipe
pub const PC_A_BITS: Field = Field::new(0, 4);
pub const PC_Y_BITS: Field = Field::new(4, 4);
pub const PC_U_BITS: Field = Field::new(8, 4);
pub const PC_V_BITS: Field = Field::new(12, 4);
pub const PC_SWAP: Field = Field::new(16, 3);
pub const PC_YUV: u32 = 1 << 19;
pub const PC_UV_MODE: Field = Field::new(20, 2);
pub const PC_LAYOUT: Field = Field::new(22, 2);
pub const PC_ENDIAN: u32 = 1 << 24;
pub const PC_ALPHA_IGNORE: u32 = 1 << 25;

pub const CSC_CTRL_ENABLE: u32 = 1 << 0;
pub const CSC_COEF_COUNT: usize = 12;

// =============================================================================
// Compositor (MLC): 0x3000
// =============================================================================

pub const MLC_CTRL: u32 = 0x3000;
pub const MLC_BG_COLOR: u32 = 0x3004;
pub const MLC_OUT_SIZE: u32 = 0x3008;
pub const MLC_PD_CTRL: u32 = 0x300C;

pub const MLC_CTRL_ENABLE: u32 = 1 << 0;
pub const MLC_CTRL_BG_ENABLE: u32 = 1 << 1;

pub const PD_ENABLE: u32 = 1 << 0;
pub const PD_SRC: Field = Field::new(4, 3);
pub const PD_DST: Field = Field::new(8, 3);
pub const PD_MODE: Field = Field::new(12, 4);

pub const MLC_LAYER_BASE: u32 = 0x3100;
pub const MLC_LAYER_STRIDE: u32 = 0x20;
pub const MLC_LAYER_COUNT: usize = 5;

pub const MLC_L_CTRL: u32 = 0x00;
pub const MLC_L_POS: u32 = 0x04;
pub const MLC_L_SIZE: u32 = 0x08;
pub const MLC_L_ALPHA: u32 = 0x0C;
pub const MLC_L_CKEY_MIN: u32 = 0x10;
pub const MLC_L_CKEY_MAX: u32 = 0x14;

pub const fn mlc_layer(layer: usize, reg: u32) -> u32 {
    MLC_LAYER_BASE + layer as u32 * MLC_LAYER_STRIDE + reg
}

pub const SUBFRAME_ENABLE: u32 = 1 << 0;
pub const SUBFRAME_GLOBAL_ALPHA: u32 = 1 << 1;
pub const SUBFRAME_COLORKEY: u32 = 1 << 2;
pub const SUBFRAME_DISABLED: u32 = 0x0000_0000;

pub const MLC_PATH_BASE: u32 = 0x3200;
/// Slot 0 is the background; layers occupy 1..=MLC_LAYER_COUNT.
pub const MLC_PATH_COUNT: usize = MLC_LAYER_COUNT + 1;

pub const fn mlc_path(z: usize) -> u32 {
    MLC_PATH_BASE + z as u32 * 4
}

pub const PATH_LAYER_OUT: Field = Field::new(0, 3);
pub const PATH_ALPHA_BLD: Field = Field::new(4, 3);
pub const PATH_PMA_EN: u32 = 1 << 8;
/// Both index fields parked on the unused index 7.
pub const PATH_DISABLED: u32 = 0x0000_0077;

// =============================================================================
// Write pipe: 0x4000
// =============================================================================

pub const WPIPE_BASE: u32 = 0x4000;

pub const WP_CTRL: u32 = WPIPE_BASE;
pub const WP_PIXEL_COMP: u32 = WPIPE_BASE + 0x004;
pub const WP_SIZE: u32 = WPIPE_BASE + 0x008;
pub const WP_DS_BYPASS: u32 = WPIPE_BASE + 0x00C;
pub const WP_CSC_CTRL: u32 = WPIPE_BASE + 0x010;

pub const fn wp_csc_coef(n: usize) -> u32 {
    WPIPE_BASE + 0x014 + n as u32 * 4
}

pub const fn wp_addr_lo(plane: usize) -> u32 {
    WPIPE_BASE + 0x050 + plane as u32 * 8
}

pub const fn wp_addr_hi(plane: usize) -> u32 {
    WPIPE_BASE + 0x054 + plane as u32 * 8
}

pub const fn wp_stride(plane: usize) -> u32 {
    WPIPE_BASE + 0x070 + plane as u32 * 4
}

pub const WP_CTRL_ENABLE: u32 = 1 << 0;
pub const WP_CTRL_ROTATION: Field = Field::new(4, 3);
pub const WP_CTRL_PLANES: Field = Field::new(8, 2);
pub const WP_BYPASS: Field = Field::new(0, 2);

/// Last register in the map; used to size simulated register files.
pub const REG_SPACE_SIZE: u32 = 0x5000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_encode_masks_overflow() {
        let f = Field::new(4, 3);
        assert_eq!(f.encode(0b101), 0b101_0000);
        assert_eq!(f.encode(0b1111), 0b111_0000);
        assert_eq!(f.decode(0xFFFF_FFFF), 0b111);
    }

    #[test]
    fn test_pack_size_is_minus_one() {
        assert_eq!(pack_size(1920, 1080), (1079 << 16) | 1919);
        assert_eq!(pack_pos(3, 7), (7 << 16) | 3);
    }

    #[test]
    fn test_blocks_do_not_overlap() {
        assert!(rdma_ch(RDMA_MAX_CHANNELS - 1, DMA_CH_BURST) < WDMA_CTRL);
        assert!(wdma_ch(WDMA_MAX_CHANNELS - 1, DMA_CH_BURST) < PIPE_BASE);
        assert!(PIPE_BASE + PIPE_STRIDE * MAX_PIPES as u32 <= MLC_CTRL);
        assert!(pipe_scl_vcoef(15) < PIPE_STRIDE);
        assert!(mlc_layer(MLC_LAYER_COUNT - 1, MLC_L_CKEY_MAX) < MLC_PATH_BASE);
        assert!(wp_csc_coef(CSC_COEF_COUNT - 1) < wp_addr_lo(0));
        assert!(wp_stride(2) < REG_SPACE_SIZE);
    }

    #[test]
    fn test_path_disabled_parks_indices() {
        assert_eq!(PATH_LAYER_OUT.decode(PATH_DISABLED), 7);
        assert_eq!(PATH_ALPHA_BLD.decode(PATH_DISABLED), 7);
        assert_eq!(PATH_DISABLED & PATH_PMA_EN, 0);
    }
}
