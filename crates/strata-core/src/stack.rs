//! Adjustment layer stacks: CRUD, ordering, bounded undo, persistence, and
//! change notification.
//!
//! Each stack keeps its layers sorted by `order`, and `order` always equals
//! the layer's index, so the stored sequence is the compositing sequence.
//!
//! Unknown stack or layer ids are not errors: mutating calls return `None`
//! or `false` and leave everything untouched.

use std::collections::{HashMap, HashSet, VecDeque};

use tokio::sync::broadcast;

use crate::config::EngineConfig;
use crate::error::ImportError;
use crate::layers::model::{
    AdjustmentLayer, BlendMode, HistoryAction, HistoryEntry, LayerStack, LayerUpdate, new_id,
    now_millis,
};
use crate::layers::params::{AdjustmentKind, AdjustmentParams};
use crate::store::{KeyValueStore, MemoryStore};

/// What changed in a stack.
#[derive(Debug, Clone, PartialEq)]
pub enum StackChange {
    Created,
    Renamed,
    Deleted,
    Imported,
    LayerAdded { layer_id: String },
    LayerUpdated { layer_id: String },
    LayerRemoved { layer_id: String },
    LayersReordered,
    VisibilityToggled { layer_id: String, visible: bool },
    Undone { action: HistoryAction },
    HistoryCleared,
}

/// Notification sent to subscribers after a stack mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct StackEvent {
    pub stack_id: String,
    pub change: StackChange,
    pub updated_at: u64,
}

/// Owner of all layer stacks in an editing session.
pub struct AdjustmentStack {
    stacks: HashMap<String, LayerStack>,
    history: HashMap<String, VecDeque<HistoryEntry>>,
    channels: HashMap<String, broadcast::Sender<StackEvent>>,
    store: Box<dyn KeyValueStore>,
    config: EngineConfig,
}

impl std::fmt::Debug for AdjustmentStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdjustmentStack")
            .field("stacks", &self.stacks.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AdjustmentStack {
    /// Create an engine backed by `store`, loading any stacks it holds.
    ///
    /// A missing or unreadable saved state starts the session empty.
    pub fn new(store: impl KeyValueStore + 'static, config: EngineConfig) -> Self {
        let stacks = load_stacks(&store, &config.storage_key);
        let history = stacks.keys().map(|id| (id.clone(), VecDeque::new())).collect();
        Self {
            stacks,
            history,
            channels: HashMap::new(),
            store: Box::new(store),
            config,
        }
    }

    /// An engine with a private in-memory store and default config.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new(), EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // --- stacks ---

    /// Create an empty stack.
    pub fn create_stack(&mut self, name: Option<&str>) -> LayerStack {
        let now = now_millis();
        let stack = LayerStack {
            id: new_id(),
            name: name.map_or_else(
                || format!("Stack {}", self.stacks.len() + 1),
                str::to_string,
            ),
            layers: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        tracing::debug!(stack_id = %stack.id, name = %stack.name, "created stack");
        self.history.insert(stack.id.clone(), VecDeque::new());
        self.stacks.insert(stack.id.clone(), stack.clone());
        self.commit(&stack.id, None, StackChange::Created);
        stack
    }

    pub fn get_stack(&self, stack_id: &str) -> Option<&LayerStack> {
        self.stacks.get(stack_id)
    }

    /// All stacks, oldest first.
    pub fn list_stacks(&self) -> Vec<&LayerStack> {
        let mut stacks: Vec<_> = self.stacks.values().collect();
        stacks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        stacks
    }

    pub fn rename_stack(&mut self, stack_id: &str, name: &str) -> bool {
        let Some(stack) = self.stacks.get_mut(stack_id) else {
            return false;
        };
        stack.name = name.to_string();
        self.commit(stack_id, None, StackChange::Renamed);
        true
    }

    /// Remove a stack together with its history. Subscribers receive a
    /// final [`StackChange::Deleted`] event.
    pub fn delete_stack(&mut self, stack_id: &str) -> bool {
        if self.stacks.remove(stack_id).is_none() {
            return false;
        }
        self.history.remove(stack_id);
        self.persist();
        if let Some(tx) = self.channels.remove(stack_id) {
            let _ = tx.send(StackEvent {
                stack_id: stack_id.to_string(),
                change: StackChange::Deleted,
                updated_at: now_millis(),
            });
        }
        tracing::debug!(stack_id, "deleted stack");
        true
    }

    // --- layers ---

    /// Append a layer of `kind` with default parameters at the top of the
    /// stack.
    pub fn add_layer(
        &mut self,
        stack_id: &str,
        kind: AdjustmentKind,
        name: Option<&str>,
    ) -> Option<AdjustmentLayer> {
        let stack = self.stacks.get_mut(stack_id)?;
        let layer = AdjustmentLayer {
            id: new_id(),
            name: name.map_or_else(|| kind.label().to_string(), str::to_string),
            params: kind.default_params(),
            visible: true,
            opacity: 100.0,
            blend_mode: BlendMode::Normal,
            order: stack.layers.len(),
            mask: None,
        };
        stack.layers.push(layer.clone());

        tracing::debug!(stack_id, layer_id = %layer.id, ?kind, "added layer");
        let entry = history_entry(HistoryAction::Add, &layer.id, None, Some(layer.clone()));
        self.commit(
            stack_id,
            Some(entry),
            StackChange::LayerAdded {
                layer_id: layer.id.clone(),
            },
        );
        Some(layer)
    }

    pub fn get_layer(&self, stack_id: &str, layer_id: &str) -> Option<&AdjustmentLayer> {
        self.stacks
            .get(stack_id)?
            .layers
            .iter()
            .find(|l| l.id == layer_id)
    }

    /// Merge `update` into a layer.
    ///
    /// Parameters of a different kind than the layer's are rejected and the
    /// layer is left unchanged.
    pub fn update_layer(
        &mut self,
        stack_id: &str,
        layer_id: &str,
        update: LayerUpdate,
    ) -> Option<AdjustmentLayer> {
        let stack = self.stacks.get_mut(stack_id)?;
        let layer = stack.layers.iter_mut().find(|l| l.id == layer_id)?;

        if let Some(params) = &update.params
            && params.kind() != layer.kind()
        {
            tracing::warn!(
                stack_id,
                layer_id,
                expected = ?layer.kind(),
                got = ?params.kind(),
                "rejected update with mismatched adjustment kind"
            );
            return None;
        }

        let previous = layer.clone();
        if let Some(name) = update.name {
            layer.name = name;
        }
        if let Some(params) = update.params {
            layer.params = params;
        }
        if let Some(visible) = update.visible {
            layer.visible = visible;
        }
        if let Some(opacity) = update.opacity {
            layer.opacity = sanitize_opacity(opacity);
        }
        if let Some(mode) = update.blend_mode {
            layer.blend_mode = mode;
        }
        if let Some(mask) = update.mask {
            layer.mask = mask;
        }
        let updated = layer.clone();

        tracing::debug!(stack_id, layer_id, "updated layer");
        let entry = history_entry(
            HistoryAction::Update,
            layer_id,
            Some(previous),
            Some(updated.clone()),
        );
        self.commit(
            stack_id,
            Some(entry),
            StackChange::LayerUpdated {
                layer_id: layer_id.to_string(),
            },
        );
        Some(updated)
    }

    /// Replace a layer's parameters.
    pub fn set_params(
        &mut self,
        stack_id: &str,
        layer_id: &str,
        params: AdjustmentParams,
    ) -> Option<AdjustmentLayer> {
        self.update_layer(
            stack_id,
            layer_id,
            LayerUpdate {
                params: Some(params),
                ..LayerUpdate::default()
            },
        )
    }

    /// Remove a layer and renumber the rest.
    pub fn remove_layer(&mut self, stack_id: &str, layer_id: &str) -> bool {
        let Some(stack) = self.stacks.get_mut(stack_id) else {
            return false;
        };
        let Some(index) = stack.layers.iter().position(|l| l.id == layer_id) else {
            return false;
        };
        let removed = stack.layers.remove(index);
        renumber(&mut stack.layers);

        tracing::debug!(stack_id, layer_id, "removed layer");
        let entry = history_entry(HistoryAction::Remove, layer_id, Some(removed), None);
        self.commit(
            stack_id,
            Some(entry),
            StackChange::LayerRemoved {
                layer_id: layer_id.to_string(),
            },
        );
        true
    }

    /// Reassign `order` by position in `ordered_ids`.
    ///
    /// Fails unless `ordered_ids` is exactly a permutation of the stack's
    /// layer ids.
    pub fn reorder_layers<S: AsRef<str>>(&mut self, stack_id: &str, ordered_ids: &[S]) -> bool {
        let Some(stack) = self.stacks.get_mut(stack_id) else {
            return false;
        };
        if !is_permutation(&stack.layers, ordered_ids) {
            tracing::debug!(stack_id, "rejected reorder that is not a permutation");
            return false;
        }

        let previous_order: Vec<String> = stack.layers.iter().map(|l| l.id.clone()).collect();
        apply_order(&mut stack.layers, ordered_ids);

        tracing::debug!(stack_id, "reordered layers");
        let mut entry = history_entry(HistoryAction::Reorder, "", None, None);
        entry.previous_order = Some(previous_order);
        self.commit(stack_id, Some(entry), StackChange::LayersReordered);
        true
    }

    /// Flip a layer's visibility. Returns the new visibility.
    pub fn toggle_layer_visibility(&mut self, stack_id: &str, layer_id: &str) -> Option<bool> {
        let stack = self.stacks.get_mut(stack_id)?;
        let layer = stack.layers.iter_mut().find(|l| l.id == layer_id)?;
        let previous = layer.clone();
        layer.visible = !layer.visible;
        let visible = layer.visible;
        let updated = layer.clone();

        tracing::debug!(stack_id, layer_id, visible, "toggled visibility");
        let entry = history_entry(
            HistoryAction::ToggleVisibility,
            layer_id,
            Some(previous),
            Some(updated),
        );
        self.commit(
            stack_id,
            Some(entry),
            StackChange::VisibilityToggled {
                layer_id: layer_id.to_string(),
                visible,
            },
        );
        Some(visible)
    }

    /// Deep-copy a layer with a fresh id and append it at the top.
    pub fn duplicate_layer(&mut self, stack_id: &str, layer_id: &str) -> Option<AdjustmentLayer> {
        let stack = self.stacks.get_mut(stack_id)?;
        let source = stack.layers.iter().find(|l| l.id == layer_id)?;
        let copy = AdjustmentLayer {
            id: new_id(),
            name: format!("{} copy", source.name),
            order: stack.layers.len(),
            ..source.clone()
        };
        stack.layers.push(copy.clone());

        tracing::debug!(stack_id, layer_id, copy_id = %copy.id, "duplicated layer");
        let entry = history_entry(HistoryAction::Add, &copy.id, None, Some(copy.clone()));
        self.commit(
            stack_id,
            Some(entry),
            StackChange::LayerAdded {
                layer_id: copy.id.clone(),
            },
        );
        Some(copy)
    }

    /// Visible layers with non-zero opacity, ascending by `order`. This is
    /// the compositing sequence.
    pub fn get_active_adjustments(&self, stack_id: &str) -> Vec<AdjustmentLayer> {
        let Some(stack) = self.stacks.get(stack_id) else {
            return Vec::new();
        };
        let mut active: Vec<AdjustmentLayer> =
            stack.layers.iter().filter(|l| l.is_active()).cloned().collect();
        active.sort_by_key(|l| l.order);
        active
    }

    /// Parameters of the active layers, in compositing order.
    pub fn flatten_stack(&self, stack_id: &str) -> Vec<AdjustmentParams> {
        self.get_active_adjustments(stack_id)
            .into_iter()
            .map(|l| l.params)
            .collect()
    }

    // --- history ---

    /// Invert the most recent history entry. `false` when there is nothing
    /// to undo.
    ///
    /// Entries that no longer fit the stack, such as an update of a layer
    /// that is gone, are dropped and the next older entry is tried.
    pub fn undo(&mut self, stack_id: &str) -> bool {
        let Some(stack) = self.stacks.get_mut(stack_id) else {
            return false;
        };
        let Some(history) = self.history.get_mut(stack_id) else {
            return false;
        };
        let entry = loop {
            let Some(entry) = history.pop_back() else {
                return false;
            };
            if can_undo(&entry, &stack.layers) {
                break entry;
            }
            tracing::debug!(
                stack_id,
                action = ?entry.action,
                layer_id = %entry.layer_id,
                "dropped stale history entry"
            );
        };

        match entry.action {
            HistoryAction::Add => {
                stack.layers.retain(|l| l.id != entry.layer_id);
                renumber(&mut stack.layers);
            }
            HistoryAction::Remove => {
                if let Some(layer) = entry.previous_state.clone() {
                    let index = layer.order.min(stack.layers.len());
                    stack.layers.insert(index, layer);
                    renumber(&mut stack.layers);
                }
            }
            HistoryAction::Update | HistoryAction::ToggleVisibility => {
                if let Some(previous) = entry.previous_state.clone()
                    && let Some(layer) = stack.layers.iter_mut().find(|l| l.id == entry.layer_id)
                {
                    let order = layer.order;
                    *layer = AdjustmentLayer { order, ..previous };
                }
            }
            HistoryAction::Reorder => {
                if let Some(order) = &entry.previous_order
                    && is_permutation(&stack.layers, order)
                {
                    apply_order(&mut stack.layers, order);
                }
            }
        }

        tracing::debug!(stack_id, action = ?entry.action, "undid history entry");
        self.commit(
            stack_id,
            None,
            StackChange::Undone {
                action: entry.action,
            },
        );
        true
    }

    /// Number of undoable entries for a stack.
    pub fn history_len(&self, stack_id: &str) -> usize {
        self.history.get(stack_id).map_or(0, VecDeque::len)
    }

    /// Entries oldest first.
    pub fn history(&self, stack_id: &str) -> Vec<&HistoryEntry> {
        self.history
            .get(stack_id)
            .map(|h| h.iter().collect())
            .unwrap_or_default()
    }

    pub fn clear_history(&mut self, stack_id: &str) -> bool {
        let Some(history) = self.history.get_mut(stack_id) else {
            return false;
        };
        history.clear();
        self.notify(stack_id, StackChange::HistoryCleared);
        true
    }

    // --- import / export ---

    /// Serialize one stack to JSON.
    pub fn export_stack(&self, stack_id: &str) -> Option<String> {
        let stack = self.stacks.get(stack_id)?;
        match serde_json::to_string_pretty(stack) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::warn!(stack_id, error = %e, "failed to export stack");
                None
            }
        }
    }

    /// Load a stack from JSON under fresh stack and layer ids.
    pub fn import_stack(&mut self, json: &str) -> Result<LayerStack, ImportError> {
        let mut stack: LayerStack = serde_json::from_str(json).inspect_err(|e| {
            tracing::warn!(error = %e, "rejected malformed stack import");
        })?;

        let now = now_millis();
        stack.id = new_id();
        stack.created_at = now;
        stack.updated_at = now;
        stack.layers.sort_by_key(|l| l.order);
        for layer in &mut stack.layers {
            layer.id = new_id();
            layer.opacity = sanitize_opacity(layer.opacity);
        }
        renumber(&mut stack.layers);

        tracing::debug!(stack_id = %stack.id, layers = stack.layers.len(), "imported stack");
        self.history.insert(stack.id.clone(), VecDeque::new());
        self.stacks.insert(stack.id.clone(), stack.clone());
        self.commit(&stack.id, None, StackChange::Imported);
        Ok(stack)
    }

    // --- notification ---

    /// Receive change events for a stack. Slow receivers lose the oldest
    /// events rather than blocking the engine.
    pub fn subscribe(&mut self, stack_id: &str) -> Option<broadcast::Receiver<StackEvent>> {
        if !self.stacks.contains_key(stack_id) {
            return None;
        }
        let capacity = self.config.notification_capacity.max(1);
        let tx = self
            .channels
            .entry(stack_id.to_string())
            .or_insert_with(|| broadcast::channel(capacity).0);
        Some(tx.subscribe())
    }

    // --- internals ---

    /// Record history, bump the timestamp, persist, and notify.
    fn commit(&mut self, stack_id: &str, entry: Option<HistoryEntry>, change: StackChange) {
        if let Some(entry) = entry {
            let history = self.history.entry(stack_id.to_string()).or_default();
            history.push_back(entry);
            while history.len() > self.config.layer_history_capacity {
                history.pop_front();
            }
        }
        if let Some(stack) = self.stacks.get_mut(stack_id) {
            stack.updated_at = now_millis().max(stack.updated_at);
        }
        self.persist();
        self.notify(stack_id, change);
    }

    fn notify(&self, stack_id: &str, change: StackChange) {
        let Some(tx) = self.channels.get(stack_id) else {
            return;
        };
        let updated_at = self.stacks.get(stack_id).map_or(0, |s| s.updated_at);
        // No receivers is fine.
        let _ = tx.send(StackEvent {
            stack_id: stack_id.to_string(),
            change,
            updated_at,
        });
    }

    fn persist(&mut self) {
        let json = match serde_json::to_string(&self.stacks) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize stacks");
                return;
            }
        };
        if let Err(e) = self.store.write(&self.config.storage_key, &json) {
            tracing::warn!(error = %e, key = %self.config.storage_key, "failed to persist stacks");
        }
    }
}

fn load_stacks(store: &dyn KeyValueStore, key: &str) -> HashMap<String, LayerStack> {
    let json = match store.read(key) {
        Ok(Some(json)) => json,
        Ok(None) => return HashMap::new(),
        Err(e) => {
            tracing::warn!(error = %e, key, "failed to read saved stacks");
            return HashMap::new();
        }
    };
    match serde_json::from_str::<HashMap<String, LayerStack>>(&json) {
        Ok(mut stacks) => {
            for stack in stacks.values_mut() {
                for layer in &mut stack.layers {
                    layer.opacity = sanitize_opacity(layer.opacity);
                }
                stack.layers.sort_by_key(|l| l.order);
                renumber(&mut stack.layers);
            }
            tracing::info!(count = stacks.len(), "loaded saved stacks");
            stacks
        }
        Err(e) => {
            tracing::warn!(error = %e, key, "ignoring corrupt saved stacks");
            HashMap::new()
        }
    }
}

fn history_entry(
    action: HistoryAction,
    layer_id: &str,
    previous_state: Option<AdjustmentLayer>,
    new_state: Option<AdjustmentLayer>,
) -> HistoryEntry {
    HistoryEntry {
        id: new_id(),
        action,
        layer_id: layer_id.to_string(),
        previous_state,
        new_state,
        previous_order: None,
        timestamp: now_millis(),
    }
}

/// Opacity in `0..=100`. NaN falls back to fully opaque.
fn sanitize_opacity(opacity: f32) -> f32 {
    if opacity.is_nan() {
        100.0
    } else {
        opacity.clamp(0.0, 100.0)
    }
}

/// Whether undoing `entry` would change `layers`.
fn can_undo(entry: &HistoryEntry, layers: &[AdjustmentLayer]) -> bool {
    let has_layer = || layers.iter().any(|l| l.id == entry.layer_id);
    match entry.action {
        HistoryAction::Add => has_layer(),
        HistoryAction::Remove => entry.previous_state.is_some() && !has_layer(),
        HistoryAction::Update | HistoryAction::ToggleVisibility => {
            entry.previous_state.is_some() && has_layer()
        }
        HistoryAction::Reorder => entry
            .previous_order
            .as_ref()
            .is_some_and(|order| is_permutation(layers, order)),
    }
}

fn renumber(layers: &mut [AdjustmentLayer]) {
    for (i, layer) in layers.iter_mut().enumerate() {
        layer.order = i;
    }
}

fn is_permutation<S: AsRef<str>>(layers: &[AdjustmentLayer], ids: &[S]) -> bool {
    if ids.len() != layers.len() {
        return false;
    }
    let wanted: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
    wanted.len() == ids.len() && layers.iter().all(|l| wanted.contains(l.id.as_str()))
}

/// Sort layers into the order of `ids`. Callers check the permutation first.
fn apply_order<S: AsRef<str>>(layers: &mut [AdjustmentLayer], ids: &[S]) {
    let position: HashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_ref(), i))
        .collect();
    layers.sort_by_key(|l| position.get(l.id.as_str()).copied().unwrap_or(usize::MAX));
    renumber(layers);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::params::ExposureParams;

    fn orders(engine: &AdjustmentStack, stack_id: &str) -> Vec<usize> {
        let mut orders: Vec<usize> = engine
            .get_stack(stack_id)
            .unwrap()
            .layers
            .iter()
            .map(|l| l.order)
            .collect();
        orders.sort_unstable();
        orders
    }

    fn ids(engine: &AdjustmentStack, stack_id: &str) -> Vec<String> {
        engine
            .get_stack(stack_id)
            .unwrap()
            .layers
            .iter()
            .map(|l| l.id.clone())
            .collect()
    }

    #[test]
    fn test_add_layer_uses_defaults_and_appends() {
        let mut engine = AdjustmentStack::in_memory();
        let stack = engine.create_stack(Some("Look"));
        let a = engine.add_layer(&stack.id, AdjustmentKind::Levels, None).unwrap();
        let b = engine
            .add_layer(&stack.id, AdjustmentKind::Curves, Some("Tone"))
            .unwrap();
        assert_eq!(a.order, 0);
        assert_eq!(b.order, 1);
        assert_eq!(a.name, "Levels");
        assert_eq!(b.name, "Tone");
        assert!(a.visible);
        assert_eq!(a.opacity, 100.0);
        assert_eq!(a.blend_mode, BlendMode::Normal);
        assert_eq!(a.params, AdjustmentKind::Levels.default_params());
    }

    #[test]
    fn test_unknown_ids_fail_quietly() {
        let mut engine = AdjustmentStack::in_memory();
        assert!(engine.add_layer("nope", AdjustmentKind::Grain, None).is_none());
        let stack = engine.create_stack(None);
        assert!(
            engine
                .update_layer(&stack.id, "nope", LayerUpdate::default())
                .is_none()
        );
        assert!(!engine.remove_layer(&stack.id, "nope"));
        assert!(engine.toggle_layer_visibility(&stack.id, "nope").is_none());
        assert!(engine.duplicate_layer(&stack.id, "nope").is_none());
        assert!(!engine.undo(&stack.id));
        assert!(engine.subscribe("nope").is_none());
        assert!(engine.export_stack("nope").is_none());
    }

    #[test]
    fn test_remove_renumbers_densely() {
        let mut engine = AdjustmentStack::in_memory();
        let stack = engine.create_stack(None);
        let layers: Vec<_> = (0..4)
            .map(|_| engine.add_layer(&stack.id, AdjustmentKind::Hsl, None).unwrap())
            .collect();
        assert!(engine.remove_layer(&stack.id, &layers[1].id));
        assert_eq!(orders(&engine, &stack.id), vec![0, 1, 2]);
        assert_eq!(
            ids(&engine, &stack.id),
            vec![layers[0].id.clone(), layers[2].id.clone(), layers[3].id.clone()]
        );
    }

    #[test]
    fn test_undo_remove_restores_position() {
        let mut engine = AdjustmentStack::in_memory();
        let stack = engine.create_stack(None);
        for _ in 0..3 {
            engine.add_layer(&stack.id, AdjustmentKind::Exposure, None);
        }
        let before = engine.get_stack(&stack.id).unwrap().layers.clone();
        assert!(engine.remove_layer(&stack.id, &before[1].id));
        assert!(engine.undo(&stack.id));
        assert_eq!(engine.get_stack(&stack.id).unwrap().layers, before);
    }

    #[test]
    fn test_update_records_previous_state_and_undo_restores_it() {
        let mut engine = AdjustmentStack::in_memory();
        let stack = engine.create_stack(None);
        let layer = engine
            .add_layer(&stack.id, AdjustmentKind::Exposure, None)
            .unwrap();
        let params = AdjustmentParams::Exposure(ExposureParams {
            exposure: 1.5,
            ..ExposureParams::default()
        });
        let updated = engine
            .update_layer(
                &stack.id,
                &layer.id,
                LayerUpdate {
                    params: Some(params.clone()),
                    opacity: Some(140.0),
                    ..LayerUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.params, params);
        assert_eq!(updated.opacity, 100.0);

        let last = engine.history(&stack.id).last().copied().cloned().unwrap();
        assert_eq!(last.action, HistoryAction::Update);
        assert_eq!(last.previous_state.as_ref(), Some(&layer));

        assert!(engine.undo(&stack.id));
        assert_eq!(engine.get_layer(&stack.id, &layer.id), Some(&layer));
    }

    #[test]
    fn test_update_with_wrong_kind_is_rejected() {
        let mut engine = AdjustmentStack::in_memory();
        let stack = engine.create_stack(None);
        let layer = engine
            .add_layer(&stack.id, AdjustmentKind::Levels, None)
            .unwrap();
        let result = engine.set_params(
            &stack.id,
            &layer.id,
            AdjustmentKind::Curves.default_params(),
        );
        assert!(result.is_none());
        assert_eq!(engine.get_layer(&stack.id, &layer.id), Some(&layer));
        assert_eq!(engine.history_len(&stack.id), 1);
    }

    #[test]
    fn test_nan_opacity_is_stored_opaque() {
        let mut engine = AdjustmentStack::in_memory();
        let stack = engine.create_stack(None);
        let layer = engine.add_layer(&stack.id, AdjustmentKind::Hsl, None).unwrap();
        let update = |opacity| LayerUpdate {
            opacity: Some(opacity),
            ..LayerUpdate::default()
        };

        let updated = engine.update_layer(&stack.id, &layer.id, update(f32::NAN)).unwrap();
        assert_eq!(updated.opacity, 100.0);
        assert!(engine.get_layer(&stack.id, &layer.id).unwrap().is_active());

        let updated = engine
            .update_layer(&stack.id, &layer.id, update(f32::NEG_INFINITY))
            .unwrap();
        assert_eq!(updated.opacity, 0.0);
    }

    #[test]
    fn test_import_clamps_opacity() {
        let mut engine = AdjustmentStack::in_memory();
        let stack = engine.create_stack(None);
        engine.add_layer(&stack.id, AdjustmentKind::Vignette, None);
        let mut value: serde_json::Value =
            serde_json::from_str(&engine.export_stack(&stack.id).unwrap()).unwrap();
        value["layers"][0]["opacity"] = serde_json::json!(250.0);

        let imported = engine.import_stack(&value.to_string()).unwrap();
        assert_eq!(imported.layers[0].opacity, 100.0);
    }

    #[test]
    fn test_toggle_and_undo() {
        let mut engine = AdjustmentStack::in_memory();
        let stack = engine.create_stack(None);
        let layer = engine.add_layer(&stack.id, AdjustmentKind::Grain, None).unwrap();
        assert_eq!(engine.toggle_layer_visibility(&stack.id, &layer.id), Some(false));
        assert!(engine.get_active_adjustments(&stack.id).is_empty());
        assert!(engine.undo(&stack.id));
        assert_eq!(engine.get_active_adjustments(&stack.id).len(), 1);
    }

    #[test]
    fn test_reorder_and_undo_reorder() {
        let mut engine = AdjustmentStack::in_memory();
        let stack = engine.create_stack(None);
        for kind in [AdjustmentKind::Levels, AdjustmentKind::Curves, AdjustmentKind::Hsl] {
            engine.add_layer(&stack.id, kind, None);
        }
        let original = ids(&engine, &stack.id);
        let reversed: Vec<String> = original.iter().rev().cloned().collect();
        assert!(engine.reorder_layers(&stack.id, &reversed));
        assert_eq!(ids(&engine, &stack.id), reversed);
        assert_eq!(orders(&engine, &stack.id), vec![0, 1, 2]);
        let kinds: Vec<_> = engine
            .flatten_stack(&stack.id)
            .iter()
            .map(AdjustmentParams::kind)
            .collect();
        assert_eq!(
            kinds,
            vec![AdjustmentKind::Hsl, AdjustmentKind::Curves, AdjustmentKind::Levels]
        );

        assert!(engine.undo(&stack.id));
        assert_eq!(ids(&engine, &stack.id), original);
    }

    #[test]
    fn test_duplicate_is_deep_copy_on_top() {
        let mut engine = AdjustmentStack::in_memory();
        let stack = engine.create_stack(None);
        let a = engine.add_layer(&stack.id, AdjustmentKind::Vignette, None).unwrap();
        engine.add_layer(&stack.id, AdjustmentKind::Grain, None);
        let copy = engine.duplicate_layer(&stack.id, &a.id).unwrap();
        assert_ne!(copy.id, a.id);
        assert_eq!(copy.name, "Vignette copy");
        assert_eq!(copy.order, 2);
        assert_eq!(copy.params, a.params);
        assert!(engine.undo(&stack.id));
        assert!(engine.get_layer(&stack.id, &copy.id).is_none());
    }

    #[test]
    fn test_history_is_bounded() {
        let config = EngineConfig {
            layer_history_capacity: 3,
            ..EngineConfig::default()
        };
        let mut engine = AdjustmentStack::new(MemoryStore::new(), config);
        let stack = engine.create_stack(None);
        for _ in 0..5 {
            engine.add_layer(&stack.id, AdjustmentKind::Sharpen, None);
        }
        assert_eq!(engine.history_len(&stack.id), 3);
        for _ in 0..3 {
            assert!(engine.undo(&stack.id));
        }
        assert!(!engine.undo(&stack.id));
        assert_eq!(engine.get_stack(&stack.id).unwrap().layers.len(), 2);
    }

    #[test]
    fn test_undo_skips_entries_for_missing_layers() {
        let mut engine = AdjustmentStack::in_memory();
        let stack = engine.create_stack(None);
        let a = engine.add_layer(&stack.id, AdjustmentKind::Levels, None).unwrap();
        let b = engine.add_layer(&stack.id, AdjustmentKind::Curves, None).unwrap();
        let ghost = AdjustmentLayer {
            id: "gone".to_string(),
            ..b.clone()
        };
        engine
            .history
            .get_mut(&stack.id)
            .unwrap()
            .push_back(history_entry(HistoryAction::Update, "gone", Some(ghost), None));

        assert!(engine.undo(&stack.id));
        assert_eq!(ids(&engine, &stack.id), vec![a.id.clone()]);
        assert_eq!(engine.history_len(&stack.id), 1);
    }

    #[test]
    fn test_undo_with_only_stale_entries_reports_nothing_done() {
        let mut engine = AdjustmentStack::in_memory();
        let stack = engine.create_stack(None);
        let layer = engine.add_layer(&stack.id, AdjustmentKind::Grain, None).unwrap();
        let mut events = engine.subscribe(&stack.id).unwrap();
        engine.history.get_mut(&stack.id).unwrap().clear();
        engine.history.get_mut(&stack.id).unwrap().push_back(history_entry(
            HistoryAction::ToggleVisibility,
            "gone",
            Some(layer.clone()),
            None,
        ));

        assert!(!engine.undo(&stack.id));
        assert_eq!(engine.history_len(&stack.id), 0);
        assert_eq!(engine.get_layer(&stack.id, &layer.id), Some(&layer));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_state_survives_reload_from_store() {
        let store = MemoryStore::new();
        let stack_id = {
            let mut engine = AdjustmentStack::new(store.clone(), EngineConfig::default());
            let stack = engine.create_stack(Some("Saved"));
            engine.add_layer(&stack.id, AdjustmentKind::Vibrance, None);
            stack.id
        };
        let engine = AdjustmentStack::new(store, EngineConfig::default());
        let stack = engine.get_stack(&stack_id).unwrap();
        assert_eq!(stack.name, "Saved");
        assert_eq!(stack.layers.len(), 1);
        assert_eq!(engine.history_len(&stack_id), 0);
    }

    #[test]
    fn test_corrupt_store_starts_empty() {
        let mut store = MemoryStore::new();
        let key = EngineConfig::default().storage_key;
        store.write(&key, "{ not json").unwrap();
        let engine = AdjustmentStack::new(store, EngineConfig::default());
        assert!(engine.list_stacks().is_empty());
    }

    #[test]
    fn test_subscribers_receive_events_in_order() {
        let mut engine = AdjustmentStack::in_memory();
        let stack = engine.create_stack(None);
        let mut rx = engine.subscribe(&stack.id).unwrap();
        let layer = engine.add_layer(&stack.id, AdjustmentKind::Hsl, None).unwrap();
        engine.toggle_layer_visibility(&stack.id, &layer.id);

        let first = rx.try_recv().unwrap();
        assert_eq!(
            first.change,
            StackChange::LayerAdded {
                layer_id: layer.id.clone()
            }
        );
        let second = rx.try_recv().unwrap();
        assert_eq!(
            second.change,
            StackChange::VisibilityToggled {
                layer_id: layer.id.clone(),
                visible: false
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_delete_and_rename() {
        let mut engine = AdjustmentStack::in_memory();
        let stack = engine.create_stack(None);
        assert!(engine.rename_stack(&stack.id, "Renamed"));
        assert_eq!(engine.get_stack(&stack.id).unwrap().name, "Renamed");
        let mut rx = engine.subscribe(&stack.id).unwrap();
        assert!(engine.delete_stack(&stack.id));
        assert_eq!(rx.try_recv().unwrap().change, StackChange::Deleted);
        assert!(engine.get_stack(&stack.id).is_none());
        assert!(!engine.delete_stack(&stack.id));
    }
}
