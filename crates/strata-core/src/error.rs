//! Error types for the editing engine.
//!
//! Unknown stack, layer, or selection ids are not errors: those lookups
//! return `Option`/`bool` so a UI racing its own teardown never has to
//! handle a failure path. The types here cover failures that make the
//! requested operation itself impossible.

/// Errors produced while turning an image source into pixels or compositing.
#[derive(Debug, thiserror::Error)]
pub enum CompositeError {
    #[error("no raster context for a {width}x{height} image")]
    ContextUnavailable { width: u32, height: u32 },

    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    InvalidBuffer { expected: usize, actual: usize },

    #[error("image dimensions differ: {base:?} vs {overlay:?}")]
    DimensionMismatch {
        base: (u32, u32),
        overlay: (u32, u32),
    },
}

/// Errors from the external key-value store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize stacks: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors from importing a serialized layer stack.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("malformed stack JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from finishing a selection gesture.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no selection gesture in progress")]
    NotSelecting,

    #[error("polygon selection needs at least 3 points, got {0}")]
    InsufficientPoints(usize),

    #[error("magic wand selection needs a raster snapshot")]
    MissingRaster,

    #[error("seed point ({x}, {y}) lies outside the {width}x{height} raster")]
    SeedOutOfBounds {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },
}
