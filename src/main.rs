//! G2D request replay tool
//!
//! Runs TOML request files through the driver against the simulated engine
//! and logs the register stream each one produces:
//!
//! ```text
//! g2d-replay [config.toml] request.toml...
//! ```
//!
//! The first argument is taken as a configuration file when it is not a
//! request itself. `RUST_LOG=debug` prints every register write.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use g2d::{Background, ComposeRequest, Config, Device, Generation, OutputConfig, SimEngine};

/// One request file.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Job {
    Compose(ComposeRequest),
    Fill {
        background: Background,
        output: OutputConfig,
    },
    Fastcopy {
        src_addr: u64,
        width: u32,
        height: u32,
        src_stride: u32,
        dst_addr: u64,
        dst_stride: u32,
    },
}

fn load_job(path: &Path) -> Result<Job> {
    let content = std::fs::read_to_string(path)?;
    let job = toml::from_str(&content)?;
    Ok(job)
}

/// Split the command line into the configuration and the request files.
fn parse_args(args: &[String]) -> Result<(Config, &[String])> {
    let Some(first) = args.first() else {
        bail!("usage: g2d-replay [config.toml] request.toml...");
    };
    if load_job(Path::new(first)).is_ok() {
        return Ok((Config::default(), args));
    }
    let config = Config::load(first).with_context(|| format!("loading {}", first))?;
    Ok((config, &args[1..]))
}

async fn run(device: &Device<SimEngine>, job: &Job) -> g2d::Result<()> {
    match job {
        Job::Compose(req) => device.post_config(req).await,
        Job::Fill { background, output } => device.fill_rect(background, output).await,
        Job::Fastcopy {
            src_addr,
            width,
            height,
            src_stride,
            dst_addr,
            dst_stride,
        } => {
            device
                .fastcopy(*src_addr, *width, *height, *src_stride, *dst_addr, *dst_stride)
                .await
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config, requests) = parse_args(&args)?;
    info!("Configuration loaded: {:?}", config);

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, stopping after the current request...");
        flag.store(true, Ordering::Relaxed);
    })
    .context("setting Ctrl+C handler")?;

    let generation = Generation::from_compatible(&config.compatible)
        .ok_or_else(|| anyhow!("unknown compatible string {:?}", config.compatible))?;
    let device = Device::probe(&config, SimEngine::new(generation))?;

    let mut failed = 0;
    for path in requests {
        if shutdown.load(Ordering::Relaxed) {
            warn!("Shutdown requested, skipping remaining requests");
            break;
        }

        let job = load_job(Path::new(path)).with_context(|| format!("loading {}", path))?;
        device.with_io(|io| io.clear_log()).await;

        match run(&device, &job).await {
            Ok(()) => {
                let (writes, frames) = device
                    .with_io(|io| (io.writes().to_vec(), io.frames()))
                    .await;
                info!("{}: ok, {} register writes, {} frames total", path, writes.len(), frames);
                for w in &writes {
                    debug!("  0x{:04X} <- 0x{:08X}", w.offset, w.value);
                }
            }
            Err(e) => {
                failed += 1;
                error!("{}: {} (status {})", path, e, e.status());
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} requests failed", failed, requests.len());
    }
    info!("All requests completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo(name: &str) -> String {
        format!("{}/demos/{}", env!("CARGO_MANIFEST_DIR"), name)
    }

    #[test]
    fn test_demo_requests_parse() {
        assert!(matches!(
            load_job(Path::new(&demo("compose_two_layers.toml"))),
            Ok(Job::Compose(req)) if req.layers.len() == 2
        ));
        assert!(matches!(load_job(Path::new(&demo("fill.toml"))), Ok(Job::Fill { .. })));
        assert!(matches!(
            load_job(Path::new(&demo("fastcopy.toml"))),
            Ok(Job::Fastcopy { width: 7680, .. })
        ));
    }

    #[test]
    fn test_leading_config_is_split_off() {
        let args = vec![demo("config.toml"), demo("stroke_nv12.toml")];
        let (config, requests) = parse_args(&args).unwrap();
        assert_eq!(config.write_mode, g2d::WriteMode::CmdWrite);
        assert_eq!(requests.len(), 1);

        let args = vec![demo("fill.toml")];
        let (config, requests) = parse_args(&args).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn test_demo_requests_run() {
        let config = Config::load(demo("config.toml")).unwrap();
        let device = Device::probe(&config, SimEngine::new(Generation::Normal)).unwrap();
        for name in ["compose_two_layers.toml", "stroke_nv12.toml", "fill.toml", "fastcopy.toml"] {
            let job = load_job(Path::new(&demo(name))).unwrap();
            run(&device, &job).await.unwrap();
        }
    }
}
