//! Configuration Module
//!
//! Engine binding and tuning, loaded from TOML.

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::emit::WriteMode;
use crate::stroke::StrokeLimits;

/// Driver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Compatible string selecting the engine generation
    #[serde(default = "default_compatible")]
    pub compatible: String,

    /// Register programming path: "cpu" or "cmd"
    #[serde(default)]
    pub write_mode: WriteMode,

    /// Completion wait per kick, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Slice width used when a request has to be stroked
    #[serde(default = "default_stroke_width")]
    pub stroke_width: u32,

    /// Widest 4:2:0 source a regular pipe buffers without slicing
    #[serde(default = "default_line_buffer_limit")]
    pub line_buffer_limit: u32,

    /// Overrides the generation's deep line buffer plane
    #[serde(default)]
    pub deep_line_buffer_plane: Option<usize>,

    /// Number of command buffers (max passes per request in cmd mode)
    #[serde(default = "default_cmd_buffer_count")]
    pub cmd_buffer_count: usize,

    /// Capacity of each command buffer in 32-bit words
    #[serde(default = "default_cmd_buffer_words")]
    pub cmd_buffer_words: usize,

    /// DMA address of the first command buffer
    #[serde(default = "default_cmd_dma_base")]
    pub cmd_dma_base: u64,
}

fn default_compatible() -> String {
    "g2d,normal-v2".to_string()
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_stroke_width() -> u32 {
    StrokeLimits::DEFAULT_SLICE_WIDTH
}

fn default_line_buffer_limit() -> u32 {
    StrokeLimits::DEFAULT_LINE_BUFFER_LIMIT
}

fn default_cmd_buffer_count() -> usize {
    16
}

fn default_cmd_buffer_words() -> usize {
    4096
}

fn default_cmd_dma_base() -> u64 {
    0x8000_0000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compatible: default_compatible(),
            write_mode: WriteMode::default(),
            timeout_ms: default_timeout_ms(),
            stroke_width: default_stroke_width(),
            line_buffer_limit: default_line_buffer_limit(),
            deep_line_buffer_plane: None,
            cmd_buffer_count: default_cmd_buffer_count(),
            cmd_buffer_words: default_cmd_buffer_words(),
            cmd_dma_base: default_cmd_dma_base(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.write_mode, WriteMode::CpuWrite);
    }

    #[test]
    fn test_partial_file() {
        let config: Config = toml::from_str(
            r#"
            compatible = "g2d,lite-v1"
            write_mode = "cmd"
            stroke_width = 128
            "#,
        )
        .unwrap();
        assert_eq!(config.compatible, "g2d,lite-v1");
        assert_eq!(config.write_mode, WriteMode::CmdWrite);
        assert_eq!(config.stroke_width, 128);
        assert_eq!(config.timeout_ms, 1000);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("g2d-config-{}.toml", std::process::id()));
        let config = Config {
            cmd_buffer_count: 4,
            deep_line_buffer_plane: Some(1),
            ..Config::default()
        };
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
