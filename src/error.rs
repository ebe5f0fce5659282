use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by engine construction and configuration.
///
/// Out-of-range coordinates, repeated start/stop calls and repeated disposal
/// are not errors; they are handled as silent no-ops.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("body part sequences differ in length: {positions} positions, {colors} colors")]
    LengthMismatch { positions: usize, colors: usize },

    #[error("body part index {index} is out of range for a group of {len} parts")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("map dimensions must be non-zero, got {width}x{height}")]
    InvalidDimensions { width: u16, height: u16 },

    #[error("cell glyph {glyph:?} is {width} columns wide, expected 2")]
    InvalidGlyph { glyph: String, width: usize },

    #[error("unknown color {0:?}")]
    UnknownColor(String),

    #[error("invalid config file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to spawn render thread: {0}")]
    Spawn(#[source] io::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, EngineError>;
