//! Adjustment parameter shapes.
//!
//! [`AdjustmentParams`] is the single payload type handed from the layer
//! stack to the compositor. The CPU pixel path and the GPU uniform packing
//! both match on it exhaustively, so a new adjustment kind cannot be added
//! to one path without the other.

use serde::{Deserialize, Serialize};

/// The sixteen adjustment kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdjustmentKind {
    BrightnessContrast,
    Levels,
    Curves,
    Hsl,
    ColorBalance,
    Vibrance,
    Exposure,
    TemperatureTint,
    ShadowsHighlights,
    Sharpen,
    Vignette,
    Grain,
    ChromaticAberration,
    SplitToning,
    GradientMap,
    ColorLookup,
}

impl AdjustmentKind {
    /// Human-readable label, used for default layer names.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::BrightnessContrast => "Brightness/Contrast",
            Self::Levels => "Levels",
            Self::Curves => "Curves",
            Self::Hsl => "Hue/Saturation",
            Self::ColorBalance => "Color Balance",
            Self::Vibrance => "Vibrance",
            Self::Exposure => "Exposure",
            Self::TemperatureTint => "Temperature/Tint",
            Self::ShadowsHighlights => "Shadows/Highlights",
            Self::Sharpen => "Sharpen",
            Self::Vignette => "Vignette",
            Self::Grain => "Grain",
            Self::ChromaticAberration => "Chromatic Aberration",
            Self::SplitToning => "Split Toning",
            Self::GradientMap => "Gradient Map",
            Self::ColorLookup => "Color Lookup",
        }
    }

    /// Every kind, in menu order.
    pub fn all() -> &'static [Self] {
        const ALL: [AdjustmentKind; 16] = [
            AdjustmentKind::BrightnessContrast,
            AdjustmentKind::Levels,
            AdjustmentKind::Curves,
            AdjustmentKind::Hsl,
            AdjustmentKind::ColorBalance,
            AdjustmentKind::Vibrance,
            AdjustmentKind::Exposure,
            AdjustmentKind::TemperatureTint,
            AdjustmentKind::ShadowsHighlights,
            AdjustmentKind::Sharpen,
            AdjustmentKind::Vignette,
            AdjustmentKind::Grain,
            AdjustmentKind::ChromaticAberration,
            AdjustmentKind::SplitToning,
            AdjustmentKind::GradientMap,
            AdjustmentKind::ColorLookup,
        ];
        &ALL
    }

    /// Canonical default parameters for this kind.
    pub fn default_params(&self) -> AdjustmentParams {
        match self {
            Self::BrightnessContrast => {
                AdjustmentParams::BrightnessContrast(BrightnessContrastParams::default())
            }
            Self::Levels => AdjustmentParams::Levels(LevelsParams::default()),
            Self::Curves => AdjustmentParams::Curves(CurvesParams::default()),
            Self::Hsl => AdjustmentParams::Hsl(HslParams::default()),
            Self::ColorBalance => AdjustmentParams::ColorBalance(ColorBalanceParams::default()),
            Self::Vibrance => AdjustmentParams::Vibrance(VibranceParams::default()),
            Self::Exposure => AdjustmentParams::Exposure(ExposureParams::default()),
            Self::TemperatureTint => {
                AdjustmentParams::TemperatureTint(TemperatureTintParams::default())
            }
            Self::ShadowsHighlights => {
                AdjustmentParams::ShadowsHighlights(ShadowsHighlightsParams::default())
            }
            Self::Sharpen => AdjustmentParams::Sharpen(SharpenParams::default()),
            Self::Vignette => AdjustmentParams::Vignette(VignetteParams::default()),
            Self::Grain => AdjustmentParams::Grain(GrainParams::default()),
            Self::ChromaticAberration => {
                AdjustmentParams::ChromaticAberration(ChromaticAberrationParams::default())
            }
            Self::SplitToning => AdjustmentParams::SplitToning(SplitToningParams::default()),
            Self::GradientMap => AdjustmentParams::GradientMap(GradientMapParams::default()),
            Self::ColorLookup => AdjustmentParams::ColorLookup(ColorLookupParams::default()),
        }
    }
}

/// Parameters of one adjustment, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AdjustmentParams {
    BrightnessContrast(BrightnessContrastParams),
    Levels(LevelsParams),
    Curves(CurvesParams),
    Hsl(HslParams),
    ColorBalance(ColorBalanceParams),
    Vibrance(VibranceParams),
    Exposure(ExposureParams),
    TemperatureTint(TemperatureTintParams),
    ShadowsHighlights(ShadowsHighlightsParams),
    Sharpen(SharpenParams),
    Vignette(VignetteParams),
    Grain(GrainParams),
    ChromaticAberration(ChromaticAberrationParams),
    SplitToning(SplitToningParams),
    GradientMap(GradientMapParams),
    ColorLookup(ColorLookupParams),
}

impl AdjustmentParams {
    /// The kind this payload belongs to.
    pub const fn kind(&self) -> AdjustmentKind {
        match self {
            Self::BrightnessContrast(_) => AdjustmentKind::BrightnessContrast,
            Self::Levels(_) => AdjustmentKind::Levels,
            Self::Curves(_) => AdjustmentKind::Curves,
            Self::Hsl(_) => AdjustmentKind::Hsl,
            Self::ColorBalance(_) => AdjustmentKind::ColorBalance,
            Self::Vibrance(_) => AdjustmentKind::Vibrance,
            Self::Exposure(_) => AdjustmentKind::Exposure,
            Self::TemperatureTint(_) => AdjustmentKind::TemperatureTint,
            Self::ShadowsHighlights(_) => AdjustmentKind::ShadowsHighlights,
            Self::Sharpen(_) => AdjustmentKind::Sharpen,
            Self::Vignette(_) => AdjustmentKind::Vignette,
            Self::Grain(_) => AdjustmentKind::Grain,
            Self::ChromaticAberration(_) => AdjustmentKind::ChromaticAberration,
            Self::SplitToning(_) => AdjustmentKind::SplitToning,
            Self::GradientMap(_) => AdjustmentKind::GradientMap,
            Self::ColorLookup(_) => AdjustmentKind::ColorLookup,
        }
    }
}

/// Brightness and contrast, both `-100..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BrightnessContrastParams {
    pub brightness: f32,
    pub contrast: f32,
}

/// Input and output ranges in 8-bit levels plus midtone gamma.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelsParams {
    pub input_black: f32,
    pub input_white: f32,
    /// Midtone gamma, `0.01..=9.99`. 1.0 = neutral.
    pub gamma: f32,
    pub output_black: f32,
    pub output_white: f32,
}

impl Default for LevelsParams {
    fn default() -> Self {
        Self {
            input_black: 0.0,
            input_white: 255.0,
            gamma: 1.0,
            output_black: 0.0,
            output_white: 255.0,
        }
    }
}

/// One curve control point, both coordinates in 8-bit levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: f32,
    pub y: f32,
}

impl CurvePoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

fn identity_curve() -> Vec<CurvePoint> {
    vec![CurvePoint::new(0.0, 0.0), CurvePoint::new(255.0, 255.0)]
}

/// Master and per-channel tone curves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvesParams {
    pub rgb: Vec<CurvePoint>,
    pub red: Vec<CurvePoint>,
    pub green: Vec<CurvePoint>,
    pub blue: Vec<CurvePoint>,
}

impl Default for CurvesParams {
    fn default() -> Self {
        Self {
            rgb: identity_curve(),
            red: identity_curve(),
            green: identity_curve(),
            blue: identity_curve(),
        }
    }
}

/// Hue shift in degrees (`-180..=180`); saturation and lightness `-100..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HslParams {
    pub hue: f32,
    pub saturation: f32,
    pub lightness: f32,
}

/// Cyan-red, magenta-green, yellow-blue offsets (`-100..=100`) per tonal range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorBalanceParams {
    pub shadows: [f32; 3],
    pub midtones: [f32; 3],
    pub highlights: [f32; 3],
    /// Restore the original luminance after shifting.
    #[serde(default)]
    pub preserve_luminosity: bool,
}

/// Vibrance and flat saturation, both `-100..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VibranceParams {
    pub vibrance: f32,
    pub saturation: f32,
}

/// Exposure in stops, additive offset, and output gamma.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureParams {
    pub exposure: f32,
    pub offset: f32,
    pub gamma: f32,
}

impl Default for ExposureParams {
    fn default() -> Self {
        Self {
            exposure: 0.0,
            offset: 0.0,
            gamma: 1.0,
        }
    }
}

/// Temperature (blue-yellow) and tint (green-magenta), both `-100..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TemperatureTintParams {
    pub temperature: f32,
    pub tint: f32,
}

/// Shadow lift and highlight compression, both `-100..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShadowsHighlightsParams {
    pub shadows: f32,
    pub highlights: f32,
}

/// Unsharp mask strength, `0..=100` percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SharpenParams {
    pub amount: f32,
}

/// Radial darkening. `amount` is `-100..=100`; the rest `0..=100` except
/// `roundness` (`-100..=100`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VignetteParams {
    pub amount: f32,
    pub midpoint: f32,
    pub roundness: f32,
    pub feather: f32,
}

impl Default for VignetteParams {
    fn default() -> Self {
        Self {
            amount: 0.0,
            midpoint: 50.0,
            roundness: 0.0,
            feather: 50.0,
        }
    }
}

/// Film grain. Noise is a pure function of `seed` and pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrainParams {
    pub amount: f32,
    pub monochromatic: bool,
    #[serde(default)]
    pub seed: u32,
}

impl Default for GrainParams {
    fn default() -> Self {
        Self {
            amount: 0.0,
            monochromatic: true,
            seed: 0,
        }
    }
}

/// Lateral channel shift in pixels. Red moves right, blue moves left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChromaticAberrationParams {
    pub amount: f32,
}

/// Highlight and shadow tints (hue in degrees, saturation `0..=100`) and
/// their balance (`-100..=100`, positive favors highlights).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitToningParams {
    pub highlight_hue: f32,
    pub highlight_saturation: f32,
    pub shadow_hue: f32,
    pub shadow_saturation: f32,
    pub balance: f32,
}

/// One gradient stop. `position` is `0..=1`, `color` is normalized RGB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    pub position: f32,
    pub color: [f32; 3],
}

/// Luminance-indexed gradient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientMapParams {
    pub stops: Vec<GradientStop>,
}

impl Default for GradientMapParams {
    fn default() -> Self {
        Self {
            stops: vec![
                GradientStop {
                    position: 0.0,
                    color: [0.0, 0.0, 0.0],
                },
                GradientStop {
                    position: 1.0,
                    color: [1.0, 1.0, 1.0],
                },
            ],
        }
    }
}

/// External lookup table reference. Evaluated as a pass-through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorLookupParams {
    pub lut_id: String,
    pub intensity: f32,
}

impl Default for ColorLookupParams {
    fn default() -> Self {
        Self {
            lut_id: String::new(),
            intensity: 100.0,
        }
    }
}
