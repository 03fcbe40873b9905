//! G2D composition engine driver
//!
//! Compiles layer compositions into register programs for a fixed-function
//! 2D engine (read DMA → pipes → multi-layer compositor → write pipe) and
//! submits them either as direct register writes or as chained command
//! buffers.

pub mod bandwidth;
pub mod cmdbuf;
pub mod compose;
pub mod config;
pub mod csc;
pub mod device;
pub mod emit;
pub mod error;
pub mod format;
pub mod generation;
pub mod hw;
pub mod mlc;
pub mod pipe;
pub mod regs;
pub mod request;
pub mod scaler;
pub mod stroke;
pub mod tile;
pub mod wpipe;

pub use compose::{Compiler, FastCopy, Program};
pub use config::Config;
pub use device::Device;
pub use emit::WriteMode;
pub use error::{ErrorKind, G2dError, Result};
pub use format::Fourcc;
pub use generation::Generation;
pub use hw::{Mmio, RegisterIo, SimEngine};
pub use request::{Background, ComposeRequest, Layer, OutputConfig, Rect, Rotation};
pub use tile::Modifier;
