//! End-to-end behavior of the editing engine through its public API.

use glam::Vec2;
use strata_core::adjust::apply_blend_mode;
use strata_core::layers::params::{
    ChromaticAberrationParams, CurvePoint, CurvesParams, LevelsParams,
};
use strata_core::selection::WandOptions;
use strata_core::{
    AdjustmentKind, AdjustmentParams, AdjustmentStack, BlendMode, Compositor, CropRect,
    EngineConfig, FileStore, ImageBounds, ImageSource, RasterImage, SelectionTool,
    SelectionTools, TransformState, TransformTools,
};

const EPSILON: f32 = 1e-4;

/// Every 8-bit gray level, one per pixel.
fn gray_ramp() -> RasterImage {
    let bytes: Vec<u8> = (0..=255u8).flat_map(|v| [v, v, v, 255]).collect();
    RasterImage::from_rgba8(16, 16, &bytes).unwrap()
}

fn orders(stack: &AdjustmentStack, stack_id: &str) -> Vec<usize> {
    let mut orders: Vec<usize> = stack
        .get_stack(stack_id)
        .unwrap()
        .layers
        .iter()
        .map(|l| l.order)
        .collect();
    orders.sort_unstable();
    orders
}

#[test]
fn test_default_params_leave_pixels_unchanged() {
    let compositor = Compositor::cpu_only();
    let source = gray_ramp();
    for kind in AdjustmentKind::all() {
        let out = compositor
            .process_image(ImageSource::Raster(&source), &[kind.default_params()])
            .unwrap();
        assert_eq!(
            out.image.to_rgba8(),
            source.to_rgba8(),
            "{kind:?} with default params changed pixels"
        );
    }
}

#[test]
fn test_neutral_brightness_contrast_on_rgba8_bytes() {
    let bytes: Vec<u8> = (0..64u32)
        .flat_map(|i| [(i * 4) as u8, (255 - i * 3) as u8, (i * 7 % 256) as u8, 255])
        .collect();
    let out = Compositor::cpu_only()
        .process_image(
            ImageSource::Rgba8 {
                width: 8,
                height: 8,
                data: &bytes,
            },
            &[AdjustmentKind::BrightnessContrast.default_params()],
        )
        .unwrap();
    assert_eq!(out.image.to_rgba8().into_raw(), bytes);
    assert_eq!(out.cpu_passes, 1);
}

#[test]
fn test_adjustment_order_matters() {
    let source = RasterImage::filled(2, 2, [0.5, 0.5, 0.5, 1.0]);
    let levels = AdjustmentParams::Levels(LevelsParams {
        input_black: 100.0,
        ..LevelsParams::default()
    });
    let curves = AdjustmentParams::Curves(CurvesParams {
        rgb: vec![CurvePoint::new(0.0, 0.0), CurvePoint::new(255.0, 128.0)],
        ..CurvesParams::default()
    });

    let compositor = Compositor::cpu_only();
    let a = compositor
        .process_image(ImageSource::Raster(&source), &[levels.clone(), curves.clone()])
        .unwrap();
    let b = compositor
        .process_image(ImageSource::Raster(&source), &[curves, levels])
        .unwrap();
    let (pa, pb) = (a.image.pixels[0][0], b.image.pixels[0][0]);
    assert!((pa - pb).abs() > 0.05, "levels→curves {pa} vs curves→levels {pb}");
}

#[test]
fn test_layer_orders_stay_dense() {
    let mut engine = AdjustmentStack::in_memory();
    let stack = engine.create_stack(Some("dense"));
    let mut ids = Vec::new();
    for kind in AdjustmentKind::all().iter().take(6) {
        ids.push(engine.add_layer(&stack.id, *kind, None).unwrap().id);
    }
    assert_eq!(orders(&engine, &stack.id), (0..6).collect::<Vec<_>>());

    assert!(engine.remove_layer(&stack.id, &ids[2]));
    assert!(engine.remove_layer(&stack.id, &ids[0]));
    assert_eq!(orders(&engine, &stack.id), (0..4).collect::<Vec<_>>());

    let mut remaining: Vec<String> = engine
        .get_stack(&stack.id)
        .unwrap()
        .layers
        .iter()
        .map(|l| l.id.clone())
        .collect();
    remaining.reverse();
    assert!(engine.reorder_layers(&stack.id, &remaining));
    engine.add_layer(&stack.id, AdjustmentKind::Grain, None);
    engine.undo(&stack.id);
    engine.undo(&stack.id);
    assert_eq!(orders(&engine, &stack.id), (0..4).collect::<Vec<_>>());

    let active = engine.get_active_adjustments(&stack.id);
    assert!(active.windows(2).all(|w| w[0].order < w[1].order));
}

#[test]
fn test_undo_inverts_add() {
    let mut engine = AdjustmentStack::in_memory();
    let stack = engine.create_stack(None);
    engine.add_layer(&stack.id, AdjustmentKind::Levels, None);
    engine.add_layer(&stack.id, AdjustmentKind::Curves, None);
    let before = engine.get_stack(&stack.id).unwrap().layers.clone();
    let history_before = engine.history_len(&stack.id);

    engine.add_layer(&stack.id, AdjustmentKind::Hsl, None);
    assert!(engine.undo(&stack.id));

    assert_eq!(engine.get_stack(&stack.id).unwrap().layers, before);
    assert_eq!(engine.history_len(&stack.id), history_before);
}

#[test]
fn test_reorder_rejects_non_permutations() {
    let mut engine = AdjustmentStack::in_memory();
    let stack = engine.create_stack(None);
    let a = engine.add_layer(&stack.id, AdjustmentKind::Exposure, None).unwrap().id;
    let b = engine.add_layer(&stack.id, AdjustmentKind::Vibrance, None).unwrap().id;
    let before = engine.get_stack(&stack.id).unwrap().clone();

    assert!(!engine.reorder_layers(&stack.id, &[a.clone()]));
    assert!(!engine.reorder_layers(&stack.id, &[a.clone(), "stranger".to_string()]));
    assert!(!engine.reorder_layers(&stack.id, &[a.clone(), a.clone()]));
    assert!(!engine.reorder_layers(&stack.id, &[b.clone(), a.clone(), a]));
    assert_eq!(engine.get_stack(&stack.id).unwrap(), &before);
}

#[test]
fn test_export_import_round_trip_assigns_new_ids() {
    let mut engine = AdjustmentStack::in_memory();
    let stack = engine.create_stack(Some("look"));
    let layer = engine.add_layer(&stack.id, AdjustmentKind::Vignette, None).unwrap();
    engine.add_layer(&stack.id, AdjustmentKind::SplitToning, None);
    engine.toggle_layer_visibility(&stack.id, &layer.id);

    let json = engine.export_stack(&stack.id).unwrap();
    let imported = engine.import_stack(&json).unwrap();
    let source = engine.get_stack(&stack.id).unwrap();

    assert_ne!(imported.id, source.id);
    assert_eq!(imported.layers.len(), source.layers.len());
    for (a, b) in imported.layers.iter().zip(&source.layers) {
        assert_ne!(a.id, b.id);
        assert_eq!(a.params, b.params);
        assert_eq!(a.order, b.order);
        assert_eq!(a.visible, b.visible);
        assert_eq!(a.opacity, b.opacity);
        assert_eq!(a.blend_mode, b.blend_mode);
    }
    assert!(engine.import_stack("{ not json").is_err());
}

#[test]
fn test_blend_normal_and_zero_opacity() {
    let base = RasterImage::filled(3, 3, [0.2, 0.4, 0.6, 1.0]);
    let overlay = RasterImage::filled(3, 3, [0.9, 0.1, 0.5, 1.0]);
    assert_eq!(
        apply_blend_mode(&base, &overlay, BlendMode::Normal, 100.0).unwrap(),
        overlay
    );
    for mode in BlendMode::all() {
        assert_eq!(
            apply_blend_mode(&base, &overlay, *mode, 0.0).unwrap(),
            base,
            "{mode:?}"
        );
    }
}

#[test]
fn test_magic_wand_selects_only_the_seeded_region() {
    let a = [0.1, 0.6, 0.2, 1.0];
    let b = [0.8, 0.2, 0.7, 1.0];
    let mut image = RasterImage::filled(12, 12, a);
    for y in 4..8 {
        for x in 4..8 {
            let i = image.index(x, y);
            image.pixels[i] = b;
        }
    }

    let mut tools = SelectionTools::new(EngineConfig::default());
    tools.set_tool(SelectionTool::MagicWand);
    tools.set_wand_options(WandOptions {
        tolerance: 0.0,
        contiguous: true,
    });
    tools.start_selection(Vec2::new(5.5, 5.5));
    let selection = tools.complete_selection(Some(&image)).unwrap().unwrap().clone();
    let mask = selection.mask.as_ref().unwrap();
    for y in 0..12 {
        for x in 0..12 {
            let in_b = (4..8).contains(&x) && (4..8).contains(&y);
            assert_eq!(mask.get(x, y) == 255, in_b, "({x}, {y})");
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            assert_eq!(tools.is_point_in_selection(p), in_b, "hit-test ({x}, {y})");
        }
    }
}

#[test]
fn test_transform_matrix_composition_order() {
    let mut tools = TransformTools::new(ImageBounds::new(100.0, 100.0), EngineConfig::default());
    tools.scale(2.0, 1.0);
    tools.rotate(90.0);
    let p = tools.transform_point(Vec2::new(60.0, 50.0));
    assert!((p - Vec2::new(50.0, 70.0)).length() < EPSILON, "{p:?}");

    let state = TransformState {
        rotation: 90.0,
        scale_x: 2.0,
        ..TransformState::default()
    };
    assert_eq!(tools.state(), &state);
}

#[test]
fn test_crop_is_always_inside_the_image() {
    let bounds = ImageBounds::new(320.0, 200.0);
    let mut tools = TransformTools::new(bounds, EngineConfig::default());
    let cases = [
        CropRect::new(-100.0, -100.0, 1000.0, 1000.0),
        CropRect::new(300.0, 190.0, 80.0, 80.0),
        CropRect::new(-50.0, 50.0, 20.0, 20.0),
        CropRect {
            aspect_ratio: Some(0.25),
            ..CropRect::new(10.0, 10.0, 300.0, 50.0)
        },
        CropRect {
            aspect_ratio: Some(100.0),
            ..CropRect::new(0.0, 0.0, 100.0, 100.0)
        },
        CropRect {
            aspect_ratio: Some(0.01),
            ..CropRect::new(0.0, 0.0, 100.0, 100.0)
        },
    ];
    for rect in cases {
        let c = tools.set_crop_rect(rect);
        assert!(
            c.x >= 0.0 && c.y >= 0.0 && c.right() <= 320.0 + EPSILON && c.bottom() <= 200.0 + EPSILON,
            "{rect:?} clamped to {c:?}"
        );
        assert!(c.width >= 10.0 && c.height >= 10.0);
    }
}

#[test]
fn test_stacks_persist_through_file_store() {
    let root = std::env::temp_dir().join(format!("strata-store-{}", uuid::Uuid::new_v4()));
    let config = EngineConfig::default();
    let (stack_id, layer_id) = {
        let mut engine = AdjustmentStack::new(FileStore::new(&root), config.clone());
        let stack = engine.create_stack(Some("persisted"));
        let layer = engine.add_layer(&stack.id, AdjustmentKind::Exposure, None).unwrap();
        (stack.id, layer.id)
    };

    let engine = AdjustmentStack::new(FileStore::new(&root), config);
    let stack = engine.get_stack(&stack_id).unwrap();
    assert_eq!(stack.name, "persisted");
    assert_eq!(stack.layers[0].id, layer_id);
    assert_eq!(engine.history_len(&stack_id), 0);

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn test_flattened_stack_drives_compositor() {
    let mut engine = AdjustmentStack::in_memory();
    let stack = engine.create_stack(None);
    let layer = engine.add_layer(&stack.id, AdjustmentKind::Levels, None).unwrap();
    engine.set_params(
        &stack.id,
        &layer.id,
        AdjustmentParams::Levels(LevelsParams {
            output_white: 128.0,
            ..LevelsParams::default()
        }),
    );
    let hidden = engine.add_layer(&stack.id, AdjustmentKind::Exposure, None).unwrap();
    engine.toggle_layer_visibility(&stack.id, &hidden.id);

    let chain = engine.flatten_stack(&stack.id);
    assert_eq!(chain.len(), 1);

    let source = RasterImage::filled(4, 4, [1.0, 1.0, 1.0, 1.0]);
    let out = Compositor::cpu_only()
        .process_image(ImageSource::Raster(&source), &chain)
        .unwrap();
    let v = out.image.pixels[0][0];
    assert!((v - 128.0 / 255.0).abs() < 1e-3, "{v}");

    let layers = engine.get_active_adjustments(&stack.id);
    let composited = Compositor::cpu_only()
        .composite_layers(ImageSource::Raster(&source), &layers, None)
        .unwrap();
    assert_eq!(composited.image.to_rgba8(), out.image.to_rgba8());
}

#[test]
fn test_out_of_range_aberration_does_not_overflow() {
    let source = RasterImage::filled(2, 1, [0.25, 0.5, 0.75, 1.0]);
    let params = AdjustmentParams::ChromaticAberration(ChromaticAberrationParams { amount: 1e30 });
    let out = Compositor::cpu_only()
        .process_image(ImageSource::Raster(&source), &[params])
        .unwrap();
    assert_eq!(out.image.pixels, source.pixels);
}
