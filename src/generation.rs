//! Hardware generations
//!
//! Two engine revisions share the register map but differ in pipe count,
//! DMA channel budget and whether the command DMA exists. The generation is
//! picked once at probe from the compatible string.

use crate::bandwidth::DmaPools;
use crate::pipe::PipeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Lite,
    Normal,
}

const COMPATIBLE: [(&str, Generation); 2] = [
    ("g2d,normal-v2", Generation::Normal),
    ("g2d,lite-v1", Generation::Lite),
];

const NORMAL_PIPES: [PipeKind; 5] = [
    PipeKind::GPipeHigh,
    PipeKind::GPipeHigh,
    PipeKind::GPipeMid,
    PipeKind::SPipe,
    PipeKind::SPipe,
];

const LITE_PIPES: [PipeKind; 2] = [PipeKind::GPipeMid, PipeKind::SPipe];

impl Generation {
    /// Match a compatible/version string. Minor revisions (`g2d,lite-v1.3`)
    /// match their base entry.
    pub fn from_compatible(compatible: &str) -> Option<Self> {
        let compatible = compatible.trim();
        COMPATIBLE
            .iter()
            .find(|(prefix, _)| compatible.starts_with(prefix))
            .map(|&(_, gen)| gen)
    }

    pub fn compatible(self) -> &'static str {
        match self {
            Generation::Normal => COMPATIBLE[0].0,
            Generation::Lite => COMPATIBLE[1].0,
        }
    }

    pub fn pipes(self) -> &'static [PipeKind] {
        match self {
            Generation::Normal => &NORMAL_PIPES,
            Generation::Lite => &LITE_PIPES,
        }
    }

    pub fn rdma_channels(self) -> usize {
        match self {
            Generation::Normal => 12,
            Generation::Lite => 6,
        }
    }

    pub fn wdma_channels(self) -> usize {
        match self {
            Generation::Normal => 4,
            Generation::Lite => 3,
        }
    }

    /// Write-side FIFO pools. The read side gets twice these.
    pub fn write_pools(self) -> DmaPools {
        match self {
            Generation::Normal => DmaPools {
                watermark: 256,
                data_depth: 512,
                cmd_depth: 32,
            },
            Generation::Lite => DmaPools {
                watermark: 128,
                data_depth: 256,
                cmd_depth: 16,
            },
        }
    }

    pub fn read_pools(self) -> DmaPools {
        self.write_pools().doubled()
    }

    pub fn has_cmd_dma(self) -> bool {
        matches!(self, Generation::Normal)
    }

    /// Plane whose pipe has the deeper line buffer, if any.
    pub fn deep_line_buffer_plane(self) -> Option<usize> {
        match self {
            Generation::Normal => Some(2),
            Generation::Lite => None,
        }
    }

    /// Value of the version register.
    pub fn version_word(self) -> u32 {
        match self {
            Generation::Normal => 0x0002_0000,
            Generation::Lite => 0x0001_0000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compatible_match() {
        assert_eq!(
            Generation::from_compatible("g2d,normal-v2"),
            Some(Generation::Normal)
        );
        assert_eq!(
            Generation::from_compatible(" g2d,lite-v1.3 "),
            Some(Generation::Lite)
        );
        assert_eq!(Generation::from_compatible("g2d,unknown"), None);
    }

    #[test]
    fn test_channel_budget_covers_pipes() {
        for gen in [Generation::Normal, Generation::Lite] {
            let used: usize = gen.pipes().iter().map(|k| k.rdma_channels()).sum();
            // One channel stays reserved for command DMA / background.
            assert!(used < gen.rdma_channels());
            assert!(gen.pipes().len() <= crate::regs::MAX_PIPES);
        }
    }

    #[test]
    fn test_read_pools_double_write_pools() {
        let w = Generation::Normal.write_pools();
        let r = Generation::Normal.read_pools();
        assert_eq!(r.watermark, 2 * w.watermark);
        assert_eq!(r.data_depth, 2 * w.data_depth);
        assert_eq!(r.cmd_depth, 2 * w.cmd_depth);
    }
}
