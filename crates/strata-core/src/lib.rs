//! Strata Core: non-destructive image editing engine.
//!
//! Adjustment layer stacks with undo and persistence, CPU adjustment and
//! blend math, the compositor with its pluggable GPU backend seam, selection
//! tools, and transform/crop state. No GPU or UI dependencies.

pub mod adjust;
pub mod compositor;
pub mod config;
pub mod error;
pub mod image;
pub mod layers;
pub mod selection;
pub mod stack;
pub mod store;
pub mod transform;

// Re-exports for convenience.
pub use compositor::{Compositor, ProcessOutput, ShaderBackend};
pub use config::EngineConfig;
pub use error::{CompositeError, ImportError, SelectionError, StoreError};
pub use image::{ImageSource, RasterImage};
pub use layers::{
    AdjustmentKind, AdjustmentLayer, AdjustmentParams, BlendMode, LayerMask, LayerStack,
    LayerUpdate,
};
pub use selection::{CombineMode, Selection, SelectionMask, SelectionTool, SelectionTools};
pub use stack::{AdjustmentStack, StackChange, StackEvent};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use transform::{CropRect, ImageBounds, TransformState, TransformTools};
