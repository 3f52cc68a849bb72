//! Interactive transform and crop tool with constraints and undo/redo.
//!
//! Every operation stores full before/after snapshots, so undo and redo are
//! plain state restores. Interactive gestures recompute from the state at
//! gesture start on every update, so repeated updates never accumulate
//! rounding drift.

use std::collections::VecDeque;

use glam::{Mat3, Vec2};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::EngineConfig;
use crate::layers::model::{new_id, now_millis};
use crate::transform::state::{CropRect, ImageBounds, TransformState};

/// Distance of the rotation handle above the top edge, in image pixels.
const ROTATE_HANDLE_OFFSET: f32 = 24.0;

/// Active transform tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformTool {
    #[default]
    Move,
    Scale,
    Rotate,
    Skew,
    Crop,
}

/// Grab point on the transform frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Handle {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
    /// Rotation knob above the top edge. Grabbing it rotates regardless of
    /// the active tool.
    Rotate,
}

impl Handle {
    /// The eight frame handles, clockwise from the top left.
    pub const FRAME: [Handle; 8] = [
        Handle::NorthWest,
        Handle::North,
        Handle::NorthEast,
        Handle::East,
        Handle::SouthEast,
        Handle::South,
        Handle::SouthWest,
        Handle::West,
    ];

    fn is_north(self) -> bool {
        matches!(self, Handle::North | Handle::NorthEast | Handle::NorthWest)
    }

    fn is_south(self) -> bool {
        matches!(self, Handle::South | Handle::SouthEast | Handle::SouthWest)
    }

    fn is_east(self) -> bool {
        matches!(self, Handle::East | Handle::NorthEast | Handle::SouthEast)
    }

    fn is_west(self) -> bool {
        matches!(self, Handle::West | Handle::NorthWest | Handle::SouthWest)
    }

    fn is_corner(self) -> bool {
        matches!(
            self,
            Handle::NorthEast | Handle::NorthWest | Handle::SouthEast | Handle::SouthWest
        )
    }

    /// Position on an untransformed frame.
    fn anchor(self, b: &ImageBounds) -> Vec2 {
        let cx = b.x + b.width * 0.5;
        let cy = b.y + b.height * 0.5;
        let x = if self.is_west() {
            b.x
        } else if self.is_east() {
            b.right()
        } else {
            cx
        };
        let y = match self {
            Handle::Rotate => b.y - ROTATE_HANDLE_OFFSET,
            _ if self.is_north() => b.y,
            _ if self.is_south() => b.bottom(),
            _ => cy,
        };
        Vec2::new(x, y)
    }
}

/// Mirror axis for [`TransformTools::flip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

/// Switches that restrict or quantize transform input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformConstraints {
    /// Scale both axes by the mean of the requested factors.
    pub lock_aspect_ratio: bool,
    /// Translation becomes a no-op.
    pub lock_position: bool,
    /// Rotation becomes a no-op.
    pub lock_rotation: bool,
    /// Round translation deltas to the grid size.
    pub snap_to_grid: bool,
    /// Round rotation to the snap angle.
    pub snap_to_angles: bool,
}

/// Complete tool state restored by undo and redo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformSnapshot {
    pub state: TransformState,
    pub crop: Option<CropRect>,
    pub bounds: ImageBounds,
}

/// What an operation did, with its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum TransformAction {
    Translate { dx: f32, dy: f32 },
    Scale { sx: f32, sy: f32 },
    Rotate { degrees: f32 },
    Skew { x: f32, y: f32 },
    Flip { axis: FlipAxis },
    Reset,
    SetCrop { rect: CropRect },
    ApplyCrop { rect: CropRect },
    /// A completed drag gesture.
    Drag {
        tool: TransformTool,
        handle: Option<Handle>,
        delta: Vec2,
    },
}

/// One entry of the undo history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformOperation {
    pub id: String,
    pub action: TransformAction,
    pub timestamp: u64,
    pub previous: TransformSnapshot,
    pub next: TransformSnapshot,
}

/// What changed in a [`TransformEvent`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformChange {
    Applied(TransformAction),
    /// Live preview during a drag.
    Dragged,
    DragCancelled,
    Undone,
    Redone,
}

/// Notification sent to subscribers after every state change.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformEvent {
    pub change: TransformChange,
    pub snapshot: TransformSnapshot,
}

/// Screen positions of the frame handles under the current transform.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlePositions {
    /// In [`Handle::FRAME`] order.
    pub frame: [(Handle, Vec2); 8],
    pub rotate: Vec2,
}

#[derive(Debug, Clone)]
struct DragSession {
    tool: TransformTool,
    handle: Option<Handle>,
    start: Vec2,
    current: Vec2,
    original: TransformSnapshot,
}

/// Affine transform and crop engine for one image.
#[derive(Debug)]
pub struct TransformTools {
    tool: TransformTool,
    state: TransformState,
    crop: Option<CropRect>,
    bounds: ImageBounds,
    constraints: TransformConstraints,
    session: Option<DragSession>,
    undo_stack: VecDeque<TransformOperation>,
    redo_stack: VecDeque<TransformOperation>,
    events: broadcast::Sender<TransformEvent>,
    config: EngineConfig,
}

impl TransformTools {
    pub fn new(bounds: ImageBounds, config: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(config.notification_capacity.max(1));
        Self {
            tool: TransformTool::default(),
            state: TransformState::default(),
            crop: None,
            bounds,
            constraints: TransformConstraints::default(),
            session: None,
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            events,
            config,
        }
    }

    pub fn tool(&self) -> TransformTool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: TransformTool) {
        self.tool = tool;
    }

    pub fn state(&self) -> &TransformState {
        &self.state
    }

    pub fn crop_rect(&self) -> Option<&CropRect> {
        self.crop.as_ref()
    }

    pub fn image_bounds(&self) -> &ImageBounds {
        &self.bounds
    }

    pub fn constraints(&self) -> &TransformConstraints {
        &self.constraints
    }

    pub fn set_constraints(&mut self, constraints: TransformConstraints) {
        self.constraints = constraints;
    }

    pub fn snapshot(&self) -> TransformSnapshot {
        TransformSnapshot {
            state: self.state,
            crop: self.crop,
            bounds: self.bounds,
        }
    }

    /// Receive an event after every state change, including live drag
    /// previews.
    pub fn subscribe(&self) -> broadcast::Receiver<TransformEvent> {
        self.events.subscribe()
    }

    // --- discrete operations ---

    /// Move by `(dx, dy)` pixels. No-op while position is locked.
    pub fn translate(&mut self, dx: f32, dy: f32) -> bool {
        if self.constraints.lock_position {
            return false;
        }
        let previous = self.snapshot();
        let d = self.snap_translation(Vec2::new(dx, dy));
        self.state.translate_x += d.x;
        self.state.translate_y += d.y;
        self.record(TransformAction::Translate { dx: d.x, dy: d.y }, previous);
        true
    }

    /// Multiply the current scale by `(sx, sy)`.
    pub fn scale(&mut self, sx: f32, sy: f32) -> bool {
        let previous = self.snapshot();
        let (sx, sy) = if self.constraints.lock_aspect_ratio {
            let mean = (sx + sy) * 0.5;
            (mean, mean)
        } else {
            (sx, sy)
        };
        self.state.scale_x *= sx;
        self.state.scale_y *= sy;
        self.record(TransformAction::Scale { sx, sy }, previous);
        true
    }

    /// Rotate by `degrees`. No-op while rotation is locked.
    pub fn rotate(&mut self, degrees: f32) -> bool {
        if self.constraints.lock_rotation {
            return false;
        }
        let previous = self.snapshot();
        self.state.rotation = self.snap_rotation(self.state.rotation + degrees);
        self.record(TransformAction::Rotate { degrees }, previous);
        true
    }

    /// Add to both skew angles, clamped to the configured limit.
    pub fn skew(&mut self, x_degrees: f32, y_degrees: f32) -> bool {
        let previous = self.snapshot();
        let limit = self.config.max_skew;
        self.state.skew_x = (self.state.skew_x + x_degrees).clamp(-limit, limit);
        self.state.skew_y = (self.state.skew_y + y_degrees).clamp(-limit, limit);
        self.record(
            TransformAction::Skew {
                x: x_degrees,
                y: y_degrees,
            },
            previous,
        );
        true
    }

    pub fn flip(&mut self, axis: FlipAxis) -> bool {
        let previous = self.snapshot();
        match axis {
            FlipAxis::Horizontal => self.state.scale_x = -self.state.scale_x,
            FlipAxis::Vertical => self.state.scale_y = -self.state.scale_y,
        }
        self.record(TransformAction::Flip { axis }, previous);
        true
    }

    /// Back to the identity transform with no crop. The image bounds are
    /// kept.
    pub fn reset(&mut self) -> bool {
        let previous = self.snapshot();
        self.state = TransformState::default();
        self.crop = None;
        self.record(TransformAction::Reset, previous);
        true
    }

    // --- crop ---

    /// Replace the crop rectangle, clamped inside the image bounds.
    pub fn set_crop_rect(&mut self, rect: CropRect) -> CropRect {
        let previous = self.snapshot();
        let rect = rect.clamped(&self.bounds, self.config.min_crop_size);
        self.crop = Some(rect);
        self.record(TransformAction::SetCrop { rect }, previous);
        rect
    }

    /// Shrink the image bounds to the crop rectangle, then reset the crop to
    /// the new full bounds. `false` without a crop rectangle.
    pub fn apply_crop(&mut self) -> bool {
        let Some(rect) = self.crop else {
            return false;
        };
        let previous = self.snapshot();
        self.bounds = ImageBounds {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        };
        self.crop = Some(CropRect {
            aspect_ratio: rect.aspect_ratio,
            ..CropRect::full(&self.bounds)
        });
        tracing::debug!(bounds = ?self.bounds, "applied crop");
        self.record(TransformAction::ApplyCrop { rect }, previous);
        true
    }

    // --- interactive ---

    pub fn is_transforming(&self) -> bool {
        self.session.is_some()
    }

    /// Begin a drag at `point`. Grabbing [`Handle::Rotate`] rotates whatever
    /// the active tool. A drag already in progress is replaced.
    pub fn start_transform(&mut self, point: Vec2, handle: Option<Handle>) {
        let tool = if handle == Some(Handle::Rotate) {
            TransformTool::Rotate
        } else {
            self.tool
        };
        self.session = Some(DragSession {
            tool,
            handle,
            start: point,
            current: point,
            original: self.snapshot(),
        });
    }

    /// Recompute the state from the drag start and the total delta to
    /// `point`. `false` when no drag is active.
    pub fn update_transform(&mut self, point: Vec2) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        session.current = point;
        let session = session.clone();

        self.state = session.original.state;
        self.crop = session.original.crop;
        let delta = point - session.start;
        match session.tool {
            TransformTool::Move => self.drag_move(&session.original, delta),
            TransformTool::Scale => {
                let handle = session.handle.unwrap_or(Handle::SouthEast);
                self.drag_scale(&session.original, handle, delta);
            }
            TransformTool::Rotate => self.drag_rotate(&session.original, session.start, point),
            TransformTool::Skew => {
                let handle = session.handle.unwrap_or(Handle::East);
                self.drag_skew(&session.original, handle, delta);
            }
            TransformTool::Crop => self.drag_crop(&session.original, session.handle, delta),
        }
        self.notify(TransformChange::Dragged);
        true
    }

    /// Finish the drag, recording one history entry when anything changed.
    pub fn end_transform(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        if self.snapshot() == session.original {
            return false;
        }
        let action = TransformAction::Drag {
            tool: session.tool,
            handle: session.handle,
            delta: session.current - session.start,
        };
        self.record(action, session.original);
        true
    }

    /// Abandon the drag and restore the state from its start.
    pub fn cancel_transform(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        self.restore(&session.original);
        self.notify(TransformChange::DragCancelled);
        true
    }

    fn drag_move(&mut self, original: &TransformSnapshot, delta: Vec2) {
        if self.constraints.lock_position {
            return;
        }
        let d = self.snap_translation(delta);
        self.state.translate_x = original.state.translate_x + d.x;
        self.state.translate_y = original.state.translate_y + d.y;
    }

    fn drag_scale(&mut self, original: &TransformSnapshot, handle: Handle, delta: Vec2) {
        let k = self.config.scale_sensitivity;
        let mut mx = if handle.is_east() {
            1.0 + delta.x * k
        } else if handle.is_west() {
            1.0 - delta.x * k
        } else {
            1.0
        };
        let mut my = if handle.is_south() {
            1.0 + delta.y * k
        } else if handle.is_north() {
            1.0 - delta.y * k
        } else {
            1.0
        };
        if self.constraints.lock_aspect_ratio {
            let m = if handle.is_corner() {
                (mx + my) * 0.5
            } else if handle.is_east() || handle.is_west() {
                mx
            } else {
                my
            };
            mx = m;
            my = m;
        }

        let o = &original.state;
        self.state.scale_x = o.scale_x * mx;
        self.state.scale_y = o.scale_y * my;

        // Near-side handles keep the far edge in place.
        let b = &original.bounds;
        if handle.is_west() {
            let far = b.width * (1.0 - o.origin_x);
            self.state.translate_x = o.translate_x - far * (self.state.scale_x - o.scale_x);
        }
        if handle.is_north() {
            let far = b.height * (1.0 - o.origin_y);
            self.state.translate_y = o.translate_y - far * (self.state.scale_y - o.scale_y);
        }
    }

    fn drag_rotate(&mut self, original: &TransformSnapshot, start: Vec2, current: Vec2) {
        if self.constraints.lock_rotation {
            return;
        }
        let o = &original.state;
        let center = o.pivot(&original.bounds) + Vec2::new(o.translate_x, o.translate_y);
        let a = start - center;
        let b = current - center;
        if a.length_squared() <= f32::EPSILON || b.length_squared() <= f32::EPSILON {
            return;
        }
        let angle = (b.y.atan2(b.x) - a.y.atan2(a.x)).to_degrees();
        self.state.rotation = self.snap_rotation(o.rotation + angle);
    }

    fn drag_skew(&mut self, original: &TransformSnapshot, handle: Handle, delta: Vec2) {
        let k = self.config.skew_sensitivity;
        let limit = self.config.max_skew;
        let o = &original.state;
        match handle {
            Handle::East | Handle::West => {
                self.state.skew_y = (o.skew_y + delta.y * k).clamp(-limit, limit);
            }
            Handle::North | Handle::South => {
                self.state.skew_x = (o.skew_x + delta.x * k).clamp(-limit, limit);
            }
            _ => {}
        }
    }

    /// Without an existing crop the drag starts from the full bounds.
    fn drag_crop(&mut self, original: &TransformSnapshot, handle: Option<Handle>, delta: Vec2) {
        if delta == Vec2::ZERO {
            return;
        }
        let bounds = original.bounds;
        let min = self.config.min_crop_size;
        let base = original.crop.unwrap_or_else(|| CropRect::full(&bounds));
        let mut rect = base;

        match handle {
            None | Some(Handle::Rotate) => {
                rect.x += delta.x;
                rect.y += delta.y;
            }
            Some(h) => {
                if h.is_east() {
                    rect.width = (base.width + delta.x).max(min);
                }
                if h.is_west() {
                    rect.width = (base.width - delta.x).max(min);
                    rect.x = base.right() - rect.width;
                }
                if h.is_south() {
                    rect.height = (base.height + delta.y).max(min);
                }
                if h.is_north() {
                    rect.height = (base.height - delta.y).max(min);
                    rect.y = base.bottom() - rect.height;
                }
                if let Some(ratio) = rect.aspect_ratio.filter(|r| *r > 0.0) {
                    rect.height = rect.width / ratio;
                    if h.is_north() {
                        rect.y = base.bottom() - rect.height;
                    }
                }
            }
        }
        self.crop = Some(rect.clamped(&bounds, min));
    }

    // --- history ---

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Operations in the undo history, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TransformOperation> {
        self.undo_stack.iter()
    }

    /// Restore the state before the latest operation. Not available during
    /// a drag.
    pub fn undo(&mut self) -> bool {
        if self.session.is_some() {
            return false;
        }
        let Some(op) = self.undo_stack.pop_back() else {
            return false;
        };
        self.restore(&op.previous);
        push_bounded(&mut self.redo_stack, op, self.config.transform_history_capacity);
        self.notify(TransformChange::Undone);
        true
    }

    /// Restore the state after the most recently undone operation.
    pub fn redo(&mut self) -> bool {
        if self.session.is_some() {
            return false;
        }
        let Some(op) = self.redo_stack.pop_back() else {
            return false;
        };
        self.restore(&op.next);
        push_bounded(&mut self.undo_stack, op, self.config.transform_history_capacity);
        self.notify(TransformChange::Redone);
        true
    }

    // --- geometry ---

    pub fn get_transform_matrix(&self) -> Mat3 {
        self.state.matrix(&self.bounds)
    }

    pub fn transform_point(&self, point: Vec2) -> Vec2 {
        self.get_transform_matrix().transform_point2(point)
    }

    /// Where a UI should draw the handles.
    pub fn handle_positions(&self) -> HandlePositions {
        let m = self.get_transform_matrix();
        let frame = Handle::FRAME.map(|h| (h, m.transform_point2(h.anchor(&self.bounds))));
        HandlePositions {
            frame,
            rotate: m.transform_point2(Handle::Rotate.anchor(&self.bounds)),
        }
    }

    // --- internals ---

    fn snap_translation(&self, d: Vec2) -> Vec2 {
        let grid = self.config.grid_size;
        if self.constraints.snap_to_grid && grid > 0.0 {
            (d / grid).round() * grid
        } else {
            d
        }
    }

    fn snap_rotation(&self, degrees: f32) -> f32 {
        let step = self.config.snap_angle;
        if self.constraints.snap_to_angles && step > 0.0 {
            (degrees / step).round() * step
        } else {
            degrees
        }
    }

    fn restore(&mut self, snapshot: &TransformSnapshot) {
        self.state = snapshot.state;
        self.crop = snapshot.crop;
        self.bounds = snapshot.bounds;
    }

    fn record(&mut self, action: TransformAction, previous: TransformSnapshot) {
        let op = TransformOperation {
            id: new_id(),
            action,
            timestamp: now_millis(),
            previous,
            next: self.snapshot(),
        };
        tracing::debug!(?action, "transform operation");
        push_bounded(&mut self.undo_stack, op, self.config.transform_history_capacity);
        self.redo_stack.clear();
        self.notify(TransformChange::Applied(action));
    }

    fn notify(&self, change: TransformChange) {
        // No receivers is fine.
        let _ = self.events.send(TransformEvent {
            change,
            snapshot: self.snapshot(),
        });
    }
}

fn push_bounded(stack: &mut VecDeque<TransformOperation>, op: TransformOperation, capacity: usize) {
    stack.push_back(op);
    while stack.len() > capacity {
        stack.pop_front();
    }
}
