//! Error Module
//!
//! Every failure the compiler or the device can report. Errors are detected
//! before any register write wherever possible; the device resets the engine
//! on every error path regardless.

use thiserror::Error;

use crate::format::Fourcc;
use crate::request::Rotation;
use crate::tile::Modifier;

pub const EINVAL: i32 = 22;
pub const ENOMEM: i32 = 12;
pub const ETIMEDOUT: i32 = 110;

/// Broad classification of a [`G2dError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request cannot be expressed on this hardware.
    InvalidConfiguration,
    /// A fixed command-buffer resource ran out.
    ResourceExhaustion,
    /// The engine did not signal completion in time.
    HardwareTimeout,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum G2dError {
    #[error("no engine generation matches compatible string {0:?}")]
    UnknownCompatible(String),

    #[error("unknown pixel format name {0:?}")]
    UnknownFormatName(String),

    #[error("unknown or unsupported pixel format {0}")]
    UnsupportedFormat(Fourcc),

    #[error("pixel format {0} cannot be written by the write pipe")]
    UnsupportedWriteFormat(Fourcc),

    #[error("modifier {modifier:?} is not supported for format {format}")]
    UnsupportedModifier { format: Fourcc, modifier: Modifier },

    #[error("plane index {plane} out of range ({count} pipes)")]
    PlaneIndex { plane: usize, count: usize },

    #[error("compositor layer {layer} / z-order {zpos} out of range")]
    LayerIndex { layer: usize, zpos: usize },

    #[error("two enabled layers target plane {0}")]
    DuplicatePlane(usize),

    #[error("pipe {plane} cannot {what}")]
    MissingCapability { plane: usize, what: &'static str },

    #[error("rotated output ({0:?}) is not supported for packed YUV 4:2:2")]
    RotatedPackedYuv(Rotation),

    #[error("layer on plane {0} is horizontally scaled but the request needs slicing")]
    StrokeWithScaling(usize),

    #[error("layer on plane {0} scales in both directions without a deep line buffer")]
    DualAxisScaling(usize),

    #[error("invalid output size {width}x{height}")]
    InvalidOutput { width: u32, height: u32 },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("no active DMA channel")]
    NoActiveChannel,

    #[error("command buffer {id} out of range ({count} buffers)")]
    CmdBufferId { id: usize, count: usize },

    #[error("command buffer {id} full: need {needed} words, {remaining} left")]
    CmdBufferFull {
        id: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("{passes} passes exceed the {buffers} available command buffers")]
    TooManyPasses { passes: usize, buffers: usize },

    #[error("engine did not complete within {0} ms")]
    Timeout(u64),

    #[error("engine reported error status 0x{0:08X}")]
    EngineFault(u32),
}

impl G2dError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            G2dError::CmdBufferFull { .. } | G2dError::TooManyPasses { .. } => {
                ErrorKind::ResourceExhaustion
            }
            G2dError::Timeout(_) | G2dError::EngineFault(_) => ErrorKind::HardwareTimeout,
            _ => ErrorKind::InvalidConfiguration,
        }
    }

    /// Negative errno-style status for callers that speak integers.
    pub fn status(&self) -> i32 {
        match self.kind() {
            ErrorKind::InvalidConfiguration => -EINVAL,
            ErrorKind::ResourceExhaustion => -ENOMEM,
            ErrorKind::HardwareTimeout => -ETIMEDOUT,
        }
    }
}

pub type Result<T> = std::result::Result<T, G2dError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_negative() {
        assert_eq!(G2dError::NoActiveChannel.status(), -EINVAL);
        assert_eq!(
            G2dError::TooManyPasses {
                passes: 20,
                buffers: 16
            }
            .status(),
            -ENOMEM
        );
        assert_eq!(G2dError::Timeout(1000).status(), -ETIMEDOUT);
    }

    #[test]
    fn test_buffer_id_is_configuration_error() {
        let err = G2dError::CmdBufferId { id: 9, count: 4 };
        assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    }
}
