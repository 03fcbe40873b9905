//! Device Module
//!
//! One [`Device`] per physical engine. Requests are serialized behind an
//! async mutex; each one is compiled, emitted and then waited on through the
//! completion signal the interrupt handler raises. Every failure resets the
//! engine before it is returned.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::cmdbuf::CmdArena;
use crate::compose::{Compiler, FastCopy, Program};
use crate::config::Config;
use crate::emit::{Emitter, WriteMode};
use crate::error::{G2dError, Result};
use crate::generation::Generation;
use crate::hw::RegisterIo;
use crate::regs::*;
use crate::request::{Background, ComposeRequest, OutputConfig};
use crate::stroke::StrokeLimits;

/// Completion signal shared between the submitter and the interrupt side.
#[derive(Debug, Default)]
pub struct Completion {
    notify: Notify,
    status: AtomicU32,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record interrupt status bits and wake the waiter.
    pub fn signal(&self, status: u32) {
        self.status.fetch_or(status, Ordering::AcqRel);
        self.notify.notify_one();
    }

    pub fn clear(&self) {
        self.status.store(0, Ordering::Release);
    }

    /// Wait for the next non-empty status, or `None` on timeout.
    pub async fn wait(&self, timeout: Duration) -> Option<IntStatus> {
        let wait = async {
            loop {
                let status = self.status.swap(0, Ordering::AcqRel);
                if status != 0 {
                    return IntStatus::from_bits_truncate(status);
                }
                self.notify.notified().await;
            }
        };
        tokio::time::timeout(timeout, wait).await.ok()
    }
}

struct Engine<I> {
    io: I,
    compiler: Compiler,
    emitter: Emitter,
    submitted: u64,
}

impl<I: RegisterIo> Engine<I> {
    fn reset(&mut self) {
        self.io.write(G2D_CTRL, G2D_CTRL_SOFT_RESET);
        self.io.write(G2D_INT_MASK, IntStatus::all().bits());
        self.emitter.abort();
    }
}

pub struct Device<I> {
    engine: Mutex<Engine<I>>,
    completion: Arc<Completion>,
    generation: Generation,
    write_mode: WriteMode,
    timeout: Duration,
}

impl<I: RegisterIo> Device<I> {
    /// Bind to an engine: pick the generation from the configured compatible
    /// string, route its interrupt and reset it.
    pub fn probe(config: &Config, mut io: I) -> Result<Self> {
        let generation = Generation::from_compatible(&config.compatible)
            .ok_or_else(|| G2dError::UnknownCompatible(config.compatible.clone()))?;

        let mut write_mode = config.write_mode;
        if write_mode == WriteMode::CmdWrite && !generation.has_cmd_dma() {
            warn!(
                "{} has no command DMA, falling back to CPU writes",
                generation.compatible()
            );
            write_mode = WriteMode::CpuWrite;
        }

        let limits = StrokeLimits {
            slice_width: config.stroke_width,
            line_buffer_limit: config.line_buffer_limit,
            deep_plane: config
                .deep_line_buffer_plane
                .or(generation.deep_line_buffer_plane()),
        };
        let compiler = Compiler::new(generation, limits, write_mode == WriteMode::CmdWrite);
        let arena = CmdArena::new(
            config.cmd_buffer_count,
            config.cmd_buffer_words,
            config.cmd_dma_base,
        );

        let completion = Arc::new(Completion::new());
        io.connect_irq(completion.clone());

        let mut engine = Engine {
            io,
            compiler,
            emitter: Emitter::new(write_mode, arena),
            submitted: 0,
        };
        engine.reset();
        let version = engine.io.read(G2D_VERSION);

        info!(
            "G2D {:?} engine (version 0x{:08X}), {} pipes, {:?}",
            generation,
            version,
            engine.compiler.pipes().len(),
            write_mode
        );

        Ok(Self {
            engine: Mutex::new(engine),
            completion,
            generation,
            write_mode,
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    /// Interrupt entry point.
    pub fn handle_irq(&self, status: u32) {
        self.completion.signal(status);
    }

    /// Compose `req` onto its output surface.
    pub async fn post_config(&self, req: &ComposeRequest) -> Result<()> {
        let mut engine = self.engine.lock().await;
        let program = engine.compiler.compose(req);
        self.run(&mut engine, program, "post_config").await
    }

    /// Fill a rectangle of `output` with `bg.color`.
    pub async fn fill_rect(&self, bg: &Background, output: &OutputConfig) -> Result<()> {
        let mut engine = self.engine.lock().await;
        let program = engine.compiler.fill_rect(bg, output);
        self.run(&mut engine, program, "fill_rect").await
    }

    /// Copy `height` rows of `width` bytes between two buffers.
    pub async fn fastcopy(
        &self,
        src_addr: u64,
        width: u32,
        height: u32,
        src_stride: u32,
        dst_addr: u64,
        dst_stride: u32,
    ) -> Result<()> {
        let copy = FastCopy {
            src_addr,
            width,
            height,
            src_stride,
            dst_addr,
            dst_stride,
        };
        let mut engine = self.engine.lock().await;
        let program = engine.compiler.fastcopy(&copy);
        self.run(&mut engine, program, "fastcopy").await
    }

    /// Run `f` against the register backend, between requests.
    pub async fn with_io<R>(&self, f: impl FnOnce(&mut I) -> R) -> R {
        let mut engine = self.engine.lock().await;
        f(&mut engine.io)
    }

    async fn run(
        &self,
        engine: &mut Engine<I>,
        program: Result<Program>,
        what: &str,
    ) -> Result<()> {
        let result = match program {
            Ok(program) => self.submit(engine, &program).await,
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            error!("{} failed: {} (status {}), resetting engine", what, err, err.status());
            engine.reset();
            self.completion.clear();
        }
        result
    }

    async fn submit(&self, engine: &mut Engine<I>, program: &Program) -> Result<()> {
        engine.submitted += 1;
        debug!(
            "request {}: {:?}, {} passes, {} writes",
            engine.submitted,
            program.op,
            program.passes.len(),
            program.write_count()
        );

        match engine.emitter.mode() {
            WriteMode::CpuWrite => {
                for pass in &program.passes {
                    self.completion.clear();
                    engine.emitter.write_pass(&mut engine.io, pass);
                    engine.emitter.kick_direct(&mut engine.io);
                    self.wait(engine, IntStatus::FRAME_DONE).await?;
                }
            }
            WriteMode::CmdWrite => {
                engine.emitter.load(program)?;
                self.completion.clear();
                engine.emitter.kick_chain(&mut engine.io)?;
                // FRAME_DONE fires per buffer; only CMD_DONE ends the chain.
                self.wait(engine, IntStatus::CMD_DONE).await?;
            }
        }
        Ok(())
    }

    /// Wait until `done` is raised or an error bit shows up, acknowledging
    /// every status seen on the way.
    async fn wait(&self, engine: &mut Engine<I>, done: IntStatus) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let Some(status) = self.completion.wait(remaining).await else {
                return Err(G2dError::Timeout(self.timeout.as_millis() as u64));
            };
            engine.io.write(G2D_INT_STATUS, status.bits());
            if status.intersects(IntStatus::ERRORS) {
                return Err(G2dError::EngineFault(status.bits()));
            }
            if status.contains(done) {
                return Ok(());
            }
            trace!("waiting for {:?}, got {:?}", done, status);
        }
    }
}
