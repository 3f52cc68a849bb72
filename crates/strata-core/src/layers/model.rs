//! Layer, stack, and history records. Plain data; behavior lives in
//! [`AdjustmentStack`](crate::stack::AdjustmentStack).

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::layers::params::{AdjustmentKind, AdjustmentParams};

/// Per-channel blend formula used when merging a layer's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    SoftLight,
    HardLight,
    ColorDodge,
    ColorBurn,
    Darken,
    Lighten,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl BlendMode {
    /// Every blend mode, in menu order.
    pub fn all() -> &'static [Self] {
        const ALL: [BlendMode; 16] = [
            BlendMode::Normal,
            BlendMode::Multiply,
            BlendMode::Screen,
            BlendMode::Overlay,
            BlendMode::SoftLight,
            BlendMode::HardLight,
            BlendMode::ColorDodge,
            BlendMode::ColorBurn,
            BlendMode::Darken,
            BlendMode::Lighten,
            BlendMode::Difference,
            BlendMode::Exclusion,
            BlendMode::Hue,
            BlendMode::Saturation,
            BlendMode::Color,
            BlendMode::Luminosity,
        ];
        &ALL
    }
}

/// Restricts where a layer applies, using the session's selection mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerMask {
    pub enabled: bool,
    pub inverted: bool,
    /// Feather radius in pixels.
    pub feather: f32,
}

/// One non-destructive adjustment in a stack.
///
/// The adjustment kind is not stored separately: it is always
/// `params.kind()`, so a layer can never carry a mismatched payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentLayer {
    pub id: String,
    pub name: String,
    pub params: AdjustmentParams,
    pub visible: bool,
    /// `0..=100`.
    pub opacity: f32,
    pub blend_mode: BlendMode,
    /// Position in the compositing sequence, dense within a stack.
    pub order: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<LayerMask>,
}

impl AdjustmentLayer {
    /// Kind of this layer's adjustment.
    pub fn kind(&self) -> AdjustmentKind {
        self.params.kind()
    }

    /// Whether the layer takes part in compositing.
    pub fn is_active(&self) -> bool {
        self.visible && self.opacity > 0.0
    }
}

/// Partial update merged into a layer by
/// [`AdjustmentStack::update_layer`](crate::stack::AdjustmentStack::update_layer).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerUpdate {
    pub name: Option<String>,
    /// Must have the same kind as the layer being updated.
    pub params: Option<AdjustmentParams>,
    pub visible: Option<bool>,
    pub opacity: Option<f32>,
    pub blend_mode: Option<BlendMode>,
    /// `Some(None)` removes the mask.
    pub mask: Option<Option<LayerMask>>,
}

/// A named, ordered collection of adjustment layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStack {
    pub id: String,
    pub name: String,
    pub layers: Vec<AdjustmentLayer>,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Milliseconds since the Unix epoch.
    pub updated_at: u64,
}

/// What a history entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HistoryAction {
    Add,
    Remove,
    Update,
    Reorder,
    ToggleVisibility,
}

/// One undoable mutation of a stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub action: HistoryAction,
    pub layer_id: String,
    pub previous_state: Option<AdjustmentLayer>,
    pub new_state: Option<AdjustmentLayer>,
    /// Layer ids in compositing order before a reorder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_order: Option<Vec<String>>,
    pub timestamp: u64,
}

/// Fresh random id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_json_carries_type_once() {
        let layer = AdjustmentLayer {
            id: "a".into(),
            name: "Levels".into(),
            params: AdjustmentKind::Levels.default_params(),
            visible: true,
            opacity: 100.0,
            blend_mode: BlendMode::Normal,
            order: 0,
            mask: None,
        };
        let json = serde_json::to_value(&layer).unwrap();
        assert_eq!(json["params"]["type"], "levels");
        assert_eq!(json["params"]["input_white"], 255.0);
        assert_eq!(json["blend_mode"], "normal");

        let back: AdjustmentLayer = serde_json::from_value(json).unwrap();
        assert_eq!(back, layer);
    }

    #[test]
    fn test_zero_opacity_is_inactive() {
        let mut layer = AdjustmentLayer {
            id: "a".into(),
            name: "Grain".into(),
            params: AdjustmentKind::Grain.default_params(),
            visible: true,
            opacity: 0.0,
            blend_mode: BlendMode::Screen,
            order: 0,
            mask: None,
        };
        assert!(!layer.is_active());
        layer.opacity = 1.0;
        assert!(layer.is_active());
        layer.visible = false;
        assert!(!layer.is_active());
    }
}
