//! Selection gesture state machine, combination, and history.
//!
//! A gesture runs `start → update* → complete | cancel`. Completing builds
//! one [`SelectionPath`] and combines it with the current selection:
//!
//! - `New` replaces the selection.
//! - `Add` appends the path; the bounding box grows to the union.
//! - `Subtract` appends the path tagged subtractive. Hit-testing and mask
//!   rasterization both exclude subtractive area.
//! - `Intersect` keeps the paths and clips to the overlap of the bounding
//!   boxes only; it is not a geometric intersection.
//!
//! Expand and contract likewise move the bounding box only.

use std::collections::VecDeque;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::SelectionError;
use crate::image::RasterImage;
use crate::layers::model::new_id;
use crate::selection::mask::SelectionMask;
use crate::selection::path::{BoundingBox, PathShape, SelectionPath};
use crate::selection::wand::{WandOptions, magic_wand};

/// Largest feather radius in pixels.
pub const MAX_FEATHER: f32 = 250.0;

/// Subsamples per axis when rasterizing with anti-aliasing.
const AA_SUBSAMPLES: u32 = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionTool {
    #[default]
    Rectangle,
    Ellipse,
    Lasso,
    Polygon,
    MagicWand,
}

/// How a finished path combines with the existing selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CombineMode {
    #[default]
    New,
    Add,
    Subtract,
    Intersect,
}

/// A region of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub id: String,
    pub paths: Vec<SelectionPath>,
    /// Rasterized coverage when the selection includes magic wand regions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<SelectionMask>,
    /// Extent of the additive paths, clipped by `clip`.
    pub bounding_box: BoundingBox,
    /// Bounding-box clip left by intersect combination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip: Option<BoundingBox>,
    /// Net expand/contract amount applied to the bounding box, in pixels.
    #[serde(default)]
    pub grow: f32,
    /// Edge softening radius in pixels, `0..=250`.
    pub feather: f32,
    pub anti_alias: bool,
}

impl Selection {
    fn new(path: SelectionPath, feather: f32, anti_alias: bool) -> Self {
        let mut selection = Self {
            id: new_id(),
            paths: vec![path],
            mask: None,
            bounding_box: BoundingBox::default(),
            clip: None,
            grow: 0.0,
            feather,
            anti_alias,
        };
        selection.refresh();
        selection
    }

    /// A rectangle covering a whole image.
    pub fn all(width: u32, height: u32) -> Self {
        Self::new(
            SelectionPath::rect(Vec2::ZERO, Vec2::new(width as f32, height as f32)),
            0.0,
            false,
        )
    }

    /// Recompute the bounding box and raster cache after a path change.
    fn refresh(&mut self) {
        let additive = self
            .paths
            .iter()
            .filter(|p| !p.subtractive)
            .map(|p| p.bounds)
            .reduce(|a, b| a.union(&b))
            .map(|b| b.expand(self.grow))
            .unwrap_or_default();
        self.bounding_box = match &self.clip {
            Some(clip) => additive.intersect(clip).unwrap_or_default(),
            None => additive,
        };

        let raster_dims = self.paths.iter().find_map(|p| match &p.shape {
            PathShape::Raster { mask } => Some((mask.width, mask.height)),
            _ => None,
        });
        self.mask = raster_dims.map(|(w, h)| self.mask_for(w, h));
    }

    /// Whether a point is selected.
    ///
    /// Rejects by bounding box first, then requires an additive path to
    /// contain the point and no subtractive path to contain it.
    pub fn contains(&self, p: Vec2) -> bool {
        if self.bounding_box.is_empty() || !self.bounding_box.contains(p) {
            return false;
        }
        let mut inside = false;
        for path in &self.paths {
            if path.contains(p) {
                if path.subtractive {
                    return false;
                }
                inside = true;
            }
        }
        inside
    }

    /// Rasterize to a coverage mask of the given size, honoring
    /// subtractive paths, anti-aliasing, and feather.
    pub fn mask_for(&self, width: u32, height: u32) -> SelectionMask {
        let mut mask = SelectionMask::empty(width, height);
        if self.bounding_box.is_empty() {
            return mask;
        }
        let b = &self.bounding_box;
        let x0 = b.x.floor().max(0.0) as u32;
        let y0 = b.y.floor().max(0.0) as u32;
        let x1 = (b.right().ceil().max(0.0) as u32).min(width);
        let y1 = (b.bottom().ceil().max(0.0) as u32).min(height);

        let n = if self.anti_alias { AA_SUBSAMPLES } else { 1 };
        let step = 1.0 / n as f32;
        for y in y0..y1 {
            for x in x0..x1 {
                let mut hits = 0;
                for sy in 0..n {
                    for sx in 0..n {
                        let p = Vec2::new(
                            x as f32 + (sx as f32 + 0.5) * step,
                            y as f32 + (sy as f32 + 0.5) * step,
                        );
                        if self.contains(p) {
                            hits += 1;
                        }
                    }
                }
                if hits > 0 {
                    let value = (hits * 255 + (n * n) / 2) / (n * n);
                    mask.set(x, y, value as u8);
                }
            }
        }
        mask.feathered(self.feather)
    }
}

/// In-progress gesture.
#[derive(Debug, Clone)]
struct Gesture {
    anchor: Vec2,
    current: Vec2,
    points: Vec<Vec2>,
}

/// Selection engine for one editing session.
#[derive(Debug)]
pub struct SelectionTools {
    tool: SelectionTool,
    mode: CombineMode,
    wand: WandOptions,
    feather: f32,
    anti_alias: bool,
    current: Option<Selection>,
    gesture: Option<Gesture>,
    history: VecDeque<Option<Selection>>,
    config: EngineConfig,
}

impl Default for SelectionTools {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SelectionTools {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            tool: SelectionTool::default(),
            mode: CombineMode::default(),
            wand: WandOptions::default(),
            feather: 0.0,
            anti_alias: true,
            current: None,
            gesture: None,
            history: VecDeque::new(),
            config,
        }
    }

    pub fn tool(&self) -> SelectionTool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: SelectionTool) {
        self.tool = tool;
    }

    pub fn mode(&self) -> CombineMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: CombineMode) {
        self.mode = mode;
    }

    pub fn set_wand_options(&mut self, options: WandOptions) {
        self.wand = options;
    }

    /// Feather applied to selections completed from now on.
    pub fn set_feather(&mut self, feather: f32) {
        self.feather = feather.clamp(0.0, MAX_FEATHER);
    }

    pub fn set_anti_alias(&mut self, anti_alias: bool) {
        self.anti_alias = anti_alias;
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.current.as_ref()
    }

    pub fn is_selecting(&self) -> bool {
        self.gesture.is_some()
    }

    /// Points collected by the current free-form gesture.
    pub fn gesture_points(&self) -> &[Vec2] {
        self.gesture.as_ref().map_or(&[][..], |g| g.points.as_slice())
    }

    // --- gesture ---

    /// Begin a gesture at `point`. Replaces any unfinished gesture.
    pub fn start_selection(&mut self, point: Vec2) {
        self.gesture = Some(Gesture {
            anchor: point,
            current: point,
            points: vec![point],
        });
    }

    /// Move the gesture's current point. Lasso and polygon tools also
    /// append it to their outline. No-op outside a gesture.
    pub fn update_selection(&mut self, point: Vec2) {
        let tool = self.tool;
        let Some(g) = self.gesture.as_mut() else {
            return;
        };
        g.current = point;
        if matches!(tool, SelectionTool::Lasso | SelectionTool::Polygon)
            && g.points.last() != Some(&point)
        {
            g.points.push(point);
        }
    }

    /// Abandon the gesture without touching the selection.
    pub fn cancel_selection(&mut self) {
        self.gesture = None;
    }

    /// Finish the gesture and combine its path with the current selection.
    ///
    /// The magic wand needs `raster`. Returns the resulting selection, or
    /// `None` when the combination leaves nothing selected or the gesture
    /// had no area.
    pub fn complete_selection(
        &mut self,
        raster: Option<&RasterImage>,
    ) -> Result<Option<&Selection>, SelectionError> {
        let gesture = self.gesture.take().ok_or(SelectionError::NotSelecting)?;
        let path = self.build_path(gesture, raster).inspect_err(|e| {
            tracing::warn!(error = %e, tool = ?self.tool, "selection gesture rejected");
        })?;
        let Some(path) = path else {
            return Ok(self.current.as_ref());
        };

        self.push_history();
        self.current = self.combine(path);
        tracing::debug!(
            mode = ?self.mode,
            paths = self.current.as_ref().map_or(0, |s| s.paths.len()),
            "completed selection"
        );
        Ok(self.current.as_ref())
    }

    fn build_path(
        &self,
        gesture: Gesture,
        raster: Option<&RasterImage>,
    ) -> Result<Option<SelectionPath>, SelectionError> {
        let (a, b) = (gesture.anchor, gesture.current);
        let path = match self.tool {
            SelectionTool::Rectangle => SelectionPath::rect(a, b),
            SelectionTool::Ellipse => SelectionPath::ellipse(a, b, self.config.ellipse_samples),
            SelectionTool::Lasso | SelectionTool::Polygon => {
                return SelectionPath::polygon(gesture.points).map(Some);
            }
            SelectionTool::MagicWand => {
                let image = raster.ok_or(SelectionError::MissingRaster)?;
                let (x, y) = (a.x.floor() as i64, a.y.floor() as i64);
                if x < 0 || y < 0 || x >= i64::from(image.width) || y >= i64::from(image.height)
                {
                    return Err(SelectionError::SeedOutOfBounds {
                        x,
                        y,
                        width: image.width,
                        height: image.height,
                    });
                }
                let region = magic_wand(image, (x as u32, y as u32), &self.wand);
                return Ok(SelectionPath::raster(region.mask));
            }
        };
        Ok((!path.bounds.is_empty()).then_some(path))
    }

    fn combine(&self, mut path: SelectionPath) -> Option<Selection> {
        let (feather, anti_alias) = (self.feather, self.anti_alias);
        match (self.mode, self.current.clone()) {
            (CombineMode::New, _) | (CombineMode::Add, None) => {
                Some(Selection::new(path, feather, anti_alias))
            }
            (CombineMode::Subtract | CombineMode::Intersect, None) => None,
            (CombineMode::Add, Some(mut sel)) => {
                sel.paths.push(path);
                sel.refresh();
                Some(sel)
            }
            (CombineMode::Subtract, Some(mut sel)) => {
                path.subtractive = true;
                sel.paths.push(path);
                sel.refresh();
                Some(sel)
            }
            (CombineMode::Intersect, Some(mut sel)) => {
                let clip = sel.bounding_box.intersect(&path.bounds)?;
                sel.clip = Some(clip);
                sel.refresh();
                Some(sel)
            }
        }
    }

    // --- whole-selection edits ---

    /// Select the whole image.
    pub fn select_all(&mut self, width: u32, height: u32) {
        self.push_history();
        let mut selection = Selection::all(width, height);
        selection.anti_alias = self.anti_alias;
        self.current = Some(selection);
    }

    /// Drop the selection. Returns whether there was one.
    pub fn clear_selection(&mut self) -> bool {
        if self.current.is_none() {
            return false;
        }
        self.push_history();
        self.current = None;
        true
    }

    /// Grow the selection's bounding box by `amount` pixels on each side.
    ///
    /// Only the bounding box moves; path geometry is untouched. The amount
    /// is kept on the selection so later combinations and the raster cache
    /// see it too.
    pub fn expand_selection(&mut self, amount: f32) -> bool {
        if self.current.is_none() {
            return false;
        }
        self.push_history();
        if let Some(sel) = self.current.as_mut() {
            sel.grow += amount;
            sel.refresh();
        }
        true
    }

    /// Shrink the selection's bounding box by `amount` pixels on each side.
    /// Same bounding-box-only semantics as [`Self::expand_selection`].
    pub fn contract_selection(&mut self, amount: f32) -> bool {
        self.expand_selection(-amount)
    }

    /// Hit-test the current selection.
    pub fn is_point_in_selection(&self, point: Vec2) -> bool {
        self.current.as_ref().is_some_and(|s| s.contains(point))
    }

    // --- history ---

    fn push_history(&mut self) {
        self.history.push_back(self.current.clone());
        while self.history.len() > self.config.selection_history_capacity {
            self.history.pop_front();
        }
    }

    /// Restore the selection before the last change.
    pub fn undo_selection(&mut self) -> bool {
        match self.history.pop_back() {
            Some(previous) => {
                self.current = previous;
                true
            }
            None => false,
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}
