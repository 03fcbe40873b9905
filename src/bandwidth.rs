//! Bandwidth Allocator
//!
//! The read and write DMA engines share fixed FIFO pools (watermark, data
//! depth, command depth) across their channels. Pools are split in
//! proportion to each channel's usage weight for the current request, and
//! one burst length is picked for the whole engine from how busy it is.

use tracing::debug;

use crate::compose::{ResolvedLayer, ResolvedOutput};
use crate::error::{G2dError, Result};
use crate::format::{BufferLayout, UvMode};
use crate::generation::Generation;
use crate::pipe::Pipe;
use crate::regs::*;

/// Totals shared by every channel of one DMA engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaPools {
    pub watermark: u32,
    pub data_depth: u32,
    pub cmd_depth: u32,
}

impl DmaPools {
    pub const fn doubled(self) -> Self {
        Self {
            watermark: self.watermark * 2,
            data_depth: self.data_depth * 2,
            cmd_depth: self.cmd_depth * 2,
        }
    }
}

/// Burst length codes, longest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BurstLen {
    Short = 1,
    Medium = 2,
    Long = 3,
}

/// Burst tier for a given active weight sum. A double-rate channel counts
/// as two channels.
pub fn burst_for(active_weight: u32) -> BurstLen {
    match active_weight {
        0 | 1 => BurstLen::Long,
        2..=3 => BurstLen::Medium,
        _ => BurstLen::Short,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelAlloc {
    pub weight: u8,
    pub watermark: u32,
    pub data_depth: u32,
    pub cmd_depth: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub channels: Vec<ChannelAlloc>,
    pub active_weight: u32,
    pub burst: BurstLen,
    pub fastcopy: bool,
}

/// Partition `pools` over `weights`.
///
/// In fastcopy mode the weights are ignored and channel 0 alone gets the
/// whole pool.
pub fn allocate(weights: &[u8], pools: DmaPools, fastcopy: bool) -> Result<Allocation> {
    let mut weights = weights.to_vec();
    if fastcopy {
        if weights.is_empty() {
            weights.push(0);
        }
        weights.iter_mut().for_each(|w| *w = 0);
        weights[0] = 1;
    }

    let active_weight: u32 = weights.iter().map(|&w| w as u32).sum();
    if active_weight == 0 {
        return Err(G2dError::NoActiveChannel);
    }

    let share = |total: u32, weight: u8| weight as u32 * (total / active_weight);
    let channels = weights
        .iter()
        .map(|&weight| ChannelAlloc {
            weight,
            watermark: share(pools.watermark, weight),
            data_depth: share(pools.data_depth, weight),
            cmd_depth: share(pools.cmd_depth, weight),
        })
        .collect();

    Ok(Allocation {
        channels,
        active_weight,
        burst: burst_for(active_weight),
        fastcopy,
    })
}

fn mark(weights: &mut [u8], channel: usize, weight: u8) {
    if let Some(slot) = weights.get_mut(channel) {
        *slot = (*slot).max(weight);
    }
}

/// Read channel weights for a set of layers.
///
/// `reserve` claims the last read channel, used by the command DMA and the
/// background fetch.
pub fn read_usage(
    gen: Generation,
    pipes: &[Pipe],
    layers: &[ResolvedLayer],
    reserve: bool,
) -> Vec<u8> {
    let mut weights = vec![0u8; gen.rdma_channels()];
    for rl in layers {
        let Some(pipe) = pipes.get(rl.layer.plane as usize) else {
            continue;
        };
        let base = pipe.rdma_base;
        match (rl.pc.layout, rl.pc.uv_mode) {
            (BufferLayout::Interleaved, _) => mark(&mut weights, base, 1),
            (BufferLayout::SemiPlanar, _) => {
                mark(&mut weights, base, 1);
                mark(&mut weights, base + 1, 1);
            }
            (BufferLayout::Planar, UvMode::Yuv444) => {
                // Both full-rate chroma planes share one double-rate channel.
                mark(&mut weights, base, 1);
                mark(&mut weights, base + 1, 2);
            }
            (BufferLayout::Planar, _) => {
                mark(&mut weights, base, 1);
                mark(&mut weights, base + 1, 1);
                mark(&mut weights, base + 2, 1);
            }
        }
    }
    if reserve {
        let last = weights.len() - 1;
        mark(&mut weights, last, 1);
    }
    weights
}

/// Write channel weights for the output surface.
pub fn write_usage(gen: Generation, out: &ResolvedOutput) -> Vec<u8> {
    let mut weights = vec![0u8; gen.wdma_channels()];
    for plane in 0..out.pc.planes() {
        mark(&mut weights, plane, 1);
    }
    weights
}

fn burst_word(alloc: &Allocation, ch: &ChannelAlloc) -> u32 {
    let mut word =
        DMA_BURST_LEN.encode(alloc.burst as u32) | DMA_BURST_PRIORITY.encode(ch.weight as u32);
    if ch.weight > 0 {
        word |= DMA_BURST_ENABLE;
    }
    word
}

fn program_channels(alloc: &Allocation, group: fn(usize, u32) -> u32, out: &mut Vec<RegWrite>) {
    for (n, ch) in alloc.channels.iter().enumerate() {
        out.push(RegWrite::new(group(n, DMA_CH_WATERMARK), ch.watermark));
        out.push(RegWrite::new(group(n, DMA_CH_DATA_DEPTH), ch.data_depth));
        out.push(RegWrite::new(group(n, DMA_CH_CMD_DEPTH), ch.cmd_depth));
        out.push(RegWrite::new(group(n, DMA_CH_BURST), burst_word(alloc, ch)));
    }
}

pub fn program_read(alloc: &Allocation, out: &mut Vec<RegWrite>) {
    let ctrl = if alloc.fastcopy { RDMA_CTRL_FASTCOPY } else { 0 };
    out.push(RegWrite::new(RDMA_CTRL, ctrl));
    program_channels(alloc, rdma_ch, out);
    debug!(
        "rdma: active weight {} burst {:?} weights {:?}",
        alloc.active_weight,
        alloc.burst,
        alloc.channels.iter().map(|c| c.weight).collect::<Vec<_>>()
    );
}

pub fn program_write(alloc: &Allocation, out: &mut Vec<RegWrite>) {
    out.push(RegWrite::new(WDMA_CTRL, 0));
    program_channels(alloc, wdma_ch, out);
}
