//! Pipe scaler parameters
//!
//! Steps are 16.16 fixed point source pixels per destination pixel. The
//! filter is a fixed 16-phase, 4-tap table with taps summing to 64.

use crate::error::{G2dError, Result};

pub const PHASES: usize = 16;
const TAP_SUM: u32 = 64;

/// Largest supported downscale (source / destination).
pub const MAX_DOWNSCALE: u32 = 8;
/// Largest supported upscale (destination / source).
pub const MAX_UPSCALE: u32 = 16;

const fn pack_taps(t0: i8, t1: i8, t2: i8, t3: i8) -> u32 {
    (t0 as u8 as u32) | (t1 as u8 as u32) << 8 | (t2 as u8 as u32) << 16 | (t3 as u8 as u32) << 24
}

const fn linear_table() -> [u32; PHASES] {
    let mut table = [0u32; PHASES];
    let mut phase = 0;
    while phase < PHASES {
        let far = (phase as u32 * TAP_SUM / PHASES as u32) as i8;
        let near = TAP_SUM as i8 - far;
        table[phase] = pack_taps(0, near, far, 0);
        phase += 1;
    }
    table
}

/// Coefficient words, one per phase, taps packed low to high.
pub static LINEAR_TAPS: [u32; PHASES] = linear_table();

/// 16.16 step for scaling `src` pixels onto `dst` pixels.
pub fn step(src: u32, dst: u32) -> u32 {
    (((src as u64) << 16) / dst.max(1) as u64) as u32
}

/// Reject ratios the scaler cannot produce.
pub fn check_ratio(src: u32, dst: u32) -> Result<()> {
    if src == 0 || dst == 0 {
        return Err(G2dError::InvalidGeometry(format!(
            "empty scaler input/output {}->{}",
            src, dst
        )));
    }
    if src > dst * MAX_DOWNSCALE || dst > src * MAX_UPSCALE {
        return Err(G2dError::InvalidGeometry(format!(
            "scale ratio {}->{} out of range",
            src, dst
        )));
    }
    Ok(())
}
