//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Undo entries kept per layer stack.
const DEFAULT_LAYER_HISTORY: usize = 50;
/// Selection snapshots kept for undo.
const DEFAULT_SELECTION_HISTORY: usize = 20;
/// Transform operations kept for undo and redo.
const DEFAULT_TRANSFORM_HISTORY: usize = 50;
/// Key under which the stack map is persisted.
const DEFAULT_STORAGE_KEY: &str = "strata.adjustment-stacks";

/// Tunable constants shared by the stack, selection, and transform engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of each stack's undo ring buffer.
    pub layer_history_capacity: usize,
    /// Capacity of the selection snapshot stack.
    pub selection_history_capacity: usize,
    /// Capacity of the transform undo and redo stacks.
    pub transform_history_capacity: usize,
    /// Buffered change events per subscriber before the oldest are dropped.
    pub notification_capacity: usize,
    /// Number of vertices used to approximate an ellipse path.
    pub ellipse_samples: usize,
    /// Scale multiplier change per pixel of handle drag.
    pub scale_sensitivity: f32,
    /// Skew change in degrees per pixel of handle drag.
    pub skew_sensitivity: f32,
    /// Absolute skew limit in degrees.
    pub max_skew: f32,
    /// Smallest crop edge in pixels.
    pub min_crop_size: f32,
    /// Translation snap step in pixels when grid snapping is on.
    pub grid_size: f32,
    /// Rotation snap step in degrees when angle snapping is on.
    pub snap_angle: f32,
    /// Key used with the external key-value store.
    pub storage_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            layer_history_capacity: DEFAULT_LAYER_HISTORY,
            selection_history_capacity: DEFAULT_SELECTION_HISTORY,
            transform_history_capacity: DEFAULT_TRANSFORM_HISTORY,
            notification_capacity: 64,
            ellipse_samples: 64,
            scale_sensitivity: 0.01,
            skew_sensitivity: 0.1,
            max_skew: 45.0,
            min_crop_size: 10.0,
            grid_size: 10.0,
            snap_angle: 15.0,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults with overrides from `STRATA_*` environment variables.
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse("STRATA_LAYER_HISTORY") {
            config.layer_history_capacity = v;
        }
        if let Some(v) = env_parse("STRATA_SELECTION_HISTORY") {
            config.selection_history_capacity = v;
        }
        if let Some(v) = env_parse("STRATA_TRANSFORM_HISTORY") {
            config.transform_history_capacity = v;
        }
        if let Ok(key) = std::env::var("STRATA_STORAGE_KEY") {
            config.storage_key = key;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}
