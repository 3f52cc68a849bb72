//! Affine transform and crop state with interactive handle math.

pub mod state;
pub mod tools;

pub use state::{CropRect, ImageBounds, TransformState};
pub use tools::{
    FlipAxis, Handle, HandlePositions, TransformAction, TransformChange, TransformConstraints,
    TransformEvent, TransformOperation, TransformSnapshot, TransformTool, TransformTools,
};
