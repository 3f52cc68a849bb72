//! Region-of-interest selection: vector paths, magic wand regions, and
//! their raster masks.

pub mod mask;
pub mod path;
pub mod tools;
pub mod wand;

pub use mask::SelectionMask;
pub use path::{BoundingBox, PathShape, SelectionPath};
pub use tools::{CombineMode, Selection, SelectionTool, SelectionTools};
pub use wand::{WandOptions, WandRegion, magic_wand};
