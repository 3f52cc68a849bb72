//! Layer model: adjustment parameters, layers, stacks, and history records.

pub mod model;
pub mod params;

pub use model::{
    AdjustmentLayer, BlendMode, HistoryAction, HistoryEntry, LayerMask, LayerStack, LayerUpdate,
};
pub use params::{AdjustmentKind, AdjustmentParams};
