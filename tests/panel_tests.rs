//! End-to-end panel behaviour: delivery, autosize, drawing, dragging and
//! state records.

use std::time::Duration;

use image::RgbaImage;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

use image_compare_panel::export::{encode_png, MenuAction, OPEN_IMAGE, SAVE_IMAGE, SAVE_WORKFLOW};
use image_compare_panel::surface::Surface;
use image_compare_panel::{
    BlendMode, Canvas, ComparePanel, DragState, Host, ImageDelivery, Point, PointerEvent, Rect,
    Slot, StatePatch,
};

const WAIT: Duration = Duration::from_secs(10);

fn image(w: u32, h: u32, seed: u8) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        image::Rgba([(x as u8).wrapping_mul(seed), (y as u8).wrapping_add(seed), seed, 255])
    })
}

fn png(w: u32, h: u32, seed: u8) -> Vec<u8> {
    encode_png(&image(w, h, seed)).unwrap()
}

fn panel_with_both(a: RgbaImage, b: RgbaImage) -> ComparePanel {
    let mut panel = ComparePanel::with_defaults("7");
    panel.set_image(Slot::A, Some(a));
    panel.set_image(Slot::B, Some(b));
    panel
}

struct MockHost {
    origin: Point,
    redraws: usize,
}

impl Host for MockHost {
    fn panel_origin(&self) -> Point {
        self.origin
    }

    fn request_redraw(&mut self) {
        self.redraws += 1;
    }
}

// =============================================================================
// Delivery and autosize
// =============================================================================

#[test]
fn test_delivery_autosizes_after_batch() {
    let mut panel = ComparePanel::with_defaults("7");
    let delivery = ImageDelivery::from_encoded("7", Some(&png(100, 200, 3)), Some(&png(100, 200, 9)));

    assert!(panel.deliver(&delivery));
    assert!(panel.wait_for_images(WAIT));

    assert_eq!(panel.image(Slot::A).unwrap().dimensions(), (100, 200));
    assert!(panel.image(Slot::B).is_some());
    assert_eq!(panel.size(), [300.0, 670.0]);
    assert!(panel.take_redraw_request());
}

#[test]
fn test_delivery_for_other_panel_is_ignored() {
    let mut panel = panel_with_both(image(4, 4, 1), image(4, 4, 2));
    let delivery = ImageDelivery::from_encoded("8", None, None);
    assert!(!panel.deliver(&delivery));
    assert!(panel.image(Slot::A).is_some());
}

#[test]
fn test_empty_delivery_clears_images() {
    let mut panel = panel_with_both(image(4, 4, 1), image(4, 4, 2));
    panel.take_redraw_request();

    panel.deliver(&ImageDelivery::from_encoded("7", None, None));
    assert!(panel.image(Slot::A).is_none());
    assert!(panel.image(Slot::B).is_none());
    assert!(panel.take_redraw_request());
    assert!(!panel.has_pending_loads());
}

#[test]
fn test_superseded_delivery_cannot_revive_old_images() {
    let mut panel = ComparePanel::with_defaults("7");
    let first = ImageDelivery::from_encoded("7", Some(&png(100, 200, 3)), Some(&png(100, 200, 4)));
    let second = ImageDelivery::from_encoded("7", Some(&png(200, 200, 5)), None);

    panel.deliver(&first);
    panel.deliver(&second);
    assert!(panel.wait_for_images(WAIT));

    assert_eq!(panel.image(Slot::A).unwrap().dimensions(), (200, 200));
    assert!(panel.image(Slot::B).is_none());
    assert_eq!(panel.size(), [300.0, 390.0]);

    // Late stragglers from the first batch change nothing.
    assert!(!panel.pump_loads());
    assert_eq!(panel.size(), [300.0, 390.0]);
}

#[test]
fn test_failed_decode_does_not_stall_batch() {
    let mut panel = ComparePanel::with_defaults("7");
    let delivery = ImageDelivery {
        node_id: "7".into(),
        image_a_data: Some("%%%".into()),
        image_b_data: None,
        ..Default::default()
    };
    panel.deliver(&delivery);

    assert!(panel.wait_for_images(WAIT));
    assert!(!panel.has_pending_loads());
    assert!(panel.image(Slot::A).is_none());
    assert_eq!(panel.size(), [320.0, 440.0]);
}

#[test]
fn test_manual_resize_blocks_autosize() {
    let mut panel = ComparePanel::with_defaults("7");
    panel.user_resize([640.0, 200.0]);
    assert_eq!(panel.size(), [640.0, 300.0]);

    panel.set_image(Slot::A, Some(image(100, 400, 1)));
    panel.autosize();
    assert_eq!(panel.size(), [640.0, 300.0]);

    panel.deliver(&ImageDelivery::from_encoded("7", Some(&png(50, 50, 1)), None));
    panel.wait_for_images(WAIT);
    assert_eq!(panel.size(), [640.0, 300.0]);
}

#[test]
fn test_reset_restores_neutral_state() {
    let mut panel = panel_with_both(image(200, 100, 1), image(200, 100, 2));
    panel.apply_patch(StatePatch {
        slider_pos: Some(0.9),
        is_manually_resized: Some(true),
        blend_mode: Some(BlendMode::Darken),
    });
    panel.user_resize([900.0, 900.0]);

    panel.reset();
    assert_eq!(panel.split(), 0.5);
    assert!(!panel.is_manually_resized());
    assert_eq!(panel.size(), [300.0, 300.0]);
    // blend mode belongs to its own control
    assert_eq!(panel.blend_mode(), BlendMode::Darken);
}

// =============================================================================
// Drawing
// =============================================================================

#[test]
fn test_single_image_is_drawn_plain() {
    let a = image(300, 150, 7);
    let mut panel = ComparePanel::with_defaults("7");
    panel.set_image(Slot::A, Some(a.clone()));

    let render = panel.render_rect().unwrap();
    assert_eq!(render, Rect::new(10.0, 190.0, 300.0, 150.0));

    let mut drawn = Canvas::new(320, 440);
    panel.draw(&mut drawn);
    let mut expected = Canvas::new(320, 440);
    expected.draw_image(&a, render);
    assert_eq!(drawn.pixels(), expected.pixels());
}

#[test]
fn test_placeholder_when_empty() {
    let panel = ComparePanel::with_defaults("7");
    let mut canvas = Canvas::new(320, 440);
    panel.draw(&mut canvas);
    assert!(canvas.pixels().pixels().any(|p| p.0[3] > 0));
}

fn assert_lit_inside(canvas: &Canvas, area: Rect) {
    let mut lit = 0;
    for (x, y, p) in canvas.pixels().enumerate_pixels() {
        if p.0[3] == 0 {
            continue;
        }
        lit += 1;
        let (cx, cy) = (x as f32 + 0.5, y as f32 + 0.5);
        assert!(
            cx > area.x && cx < area.x + area.width && cy > area.y && cy < area.y + area.height,
            "pixel ({}, {}) outside {:?}",
            x,
            y,
            area
        );
    }
    assert!(lit > 0);
}

#[test]
fn test_placeholder_stays_inside_container() {
    let empty = ComparePanel::with_defaults("7");
    let mut only_b = ComparePanel::with_defaults("7");
    only_b.set_image(Slot::B, Some(image(40, 40, 2)));
    let mut narrow = ComparePanel::with_defaults("7");
    narrow.user_resize([120.0, 300.0]);

    for (panel, size) in [(&empty, (320, 440)), (&only_b, (320, 440)), (&narrow, (120, 300))] {
        let container = panel.container().unwrap();
        let mut canvas = Canvas::new(size.0, size.1);
        panel.draw(&mut canvas);
        assert_lit_inside(&canvas, container);
    }
}

#[test]
fn test_collapsed_panel_draws_nothing() {
    let mut panel = panel_with_both(image(40, 40, 1), image(40, 40, 2));
    panel.set_collapsed(true);
    let mut canvas = Canvas::new(320, 440);
    panel.draw(&mut canvas);
    assert!(canvas.pixels().pixels().all(|p| p.0[3] == 0));
}

#[test]
fn test_degenerate_panel_draws_nothing() {
    let mut panel = panel_with_both(image(40, 40, 1), image(40, 40, 2));
    panel.user_resize([15.0, 300.0]);
    assert!(panel.container().is_none());
    assert!(panel.render_rect().is_none());

    let mut canvas = Canvas::new(15, 300);
    panel.draw(&mut canvas);
    assert!(canvas.pixels().pixels().all(|p| p.0[3] == 0));
}

// =============================================================================
// Interaction
// =============================================================================

#[test]
fn test_drag_moves_split() {
    let mut panel = panel_with_both(image(300, 150, 1), image(300, 150, 2));
    let origin = Point::new(1000.0, 500.0);

    // render rect is (10, 190, 300, 150) in panel space
    let down = PointerEvent::primary_down(Point::new(1000.0 + 85.0, 500.0 + 250.0));
    assert!(panel.pointer_down(&down, origin));
    assert_eq!(panel.split(), 0.25);

    let mv = PointerEvent::primary_drag(Point::new(1000.0 + 10_000.0, 500.0 + 250.0));
    panel.pointer_move(&mv, origin);
    assert_eq!(panel.split(), 1.0);

    let mv = PointerEvent::primary_drag(Point::new(-10_000.0, 500.0 + 250.0));
    panel.pointer_move(&mv, origin);
    assert_eq!(panel.split(), 0.0);

    panel.pointer_up(&PointerEvent::primary_up(mv.canvas_pos));
    assert_eq!(panel.slider().state(), DragState::Idle);
}

#[test]
fn test_no_drag_with_only_image_a() {
    let mut panel = ComparePanel::with_defaults("7");
    panel.set_image(Slot::A, Some(image(300, 150, 1)));
    let render = panel.render_rect().unwrap();
    let inside = Point::new(render.x + 20.0, render.y + 20.0);

    assert!(!panel.pointer_down(&PointerEvent::primary_down(inside), Point::default()));
    assert_eq!(panel.slider().state(), DragState::Idle);
    assert_eq!(panel.split(), 0.5);
}

#[test]
fn test_no_drag_with_only_image_b() {
    let mut panel = ComparePanel::with_defaults("7");
    panel.set_image(Slot::B, Some(image(300, 150, 1)));
    let inside = Point::new(100.0, 250.0);

    assert!(!panel.pointer_down(&PointerEvent::primary_down(inside), Point::default()));
    assert_eq!(panel.slider().state(), DragState::Idle);
}

#[test]
fn test_host_adapter_forwards_redraws() {
    let mut panel = panel_with_both(image(300, 150, 1), image(300, 150, 2));
    panel.take_redraw_request();
    let mut host = MockHost {
        origin: Point::new(50.0, 60.0),
        redraws: 0,
    };

    {
        let mut attached = panel.attach_to(&mut host);
        let pos = Point::new(50.0 + 160.0, 60.0 + 250.0);
        assert!(attached.on_mouse_down(&PointerEvent::primary_down(pos)));
        attached.on_mouse_move(&PointerEvent::primary_drag(Point::new(50.0 + 310.0, 60.0 + 250.0)));
        attached.on_mouse_up(&PointerEvent::primary_up(pos));
        attached.on_blend_mode(BlendMode::Screen);

        let mut canvas = Canvas::new(320, 440);
        attached.on_draw_foreground(&mut canvas);
        assert_eq!(attached.panel().split(), 1.0);
    }

    assert_eq!(host.redraws, 3);
}

#[test]
fn test_menu_picks_hovered_image() {
    let mut panel = panel_with_both(image(300, 150, 1), image(300, 150, 2));
    let mut host = MockHost {
        origin: Point::new(100.0, 100.0),
        redraws: 0,
    };
    let attached = panel.attach_to(&mut host);

    let left = attached.extra_menu_options(Point::new(100.0 + 20.0, 100.0 + 250.0));
    let contents: Vec<_> = left.iter().map(|o| o.content).collect();
    assert_eq!(contents, vec![SAVE_IMAGE, OPEN_IMAGE, SAVE_WORKFLOW]);
    assert!(matches!(
        left[1].action,
        MenuAction::OpenImage { slot: Slot::A, .. }
    ));

    let outside = attached.extra_menu_options(Point::new(100.0, 100.0));
    assert_eq!(outside.len(), 1);
}

// =============================================================================
// State records
// =============================================================================

#[test]
fn test_serialize_merges_into_host_record() {
    let mut panel = ComparePanel::with_defaults("7");
    let mut host = MockHost {
        origin: Point::default(),
        redraws: 0,
    };
    let mut attached = panel.attach_to(&mut host);
    attached.on_resize([400.0, 500.0]);
    attached.on_blend_mode(BlendMode::Multiply);

    let mut record: Map<String, Value> = serde_json::from_value(json!({
        "id": 7,
        "pos": [10, 20],
        "properties": { "Node name for S&R": "cmp" }
    }))
    .unwrap();
    attached.serialize(&mut record);

    assert_eq!(record["id"], 7);
    assert_eq!(record["pos"], json!([10, 20]));
    assert_eq!(record["properties"]["Node name for S&R"], "cmp");
    assert_eq!(record["properties"]["blend_mode"], "multiply");
    assert_eq!(record["isManuallyResized"], true);
    assert_eq!(record["slider_pos"], 0.5);
}

#[test]
fn test_configure_leaves_absent_fields_alone() {
    let mut panel = ComparePanel::with_defaults("7");
    panel.apply_patch(StatePatch {
        slider_pos: Some(0.2),
        is_manually_resized: Some(true),
        blend_mode: Some(BlendMode::Screen),
    });

    panel.from_record(&json!({ "properties": {}, "title": "x" }));
    assert_eq!(panel.split(), 0.2);
    assert!(panel.is_manually_resized());
    assert_eq!(panel.blend_mode(), BlendMode::Screen);

    panel.from_record(&json!({ "slider_pos": 0.9 }));
    assert_eq!(panel.split(), 0.9);
    assert!(panel.is_manually_resized());
    assert_eq!(panel.blend_mode(), BlendMode::Screen);
}

#[test]
fn test_configure_keeps_valid_fields_next_to_unknown_mode() {
    let mut panel = ComparePanel::with_defaults("7");
    panel.from_record(&json!({
        "slider_pos": 0.8,
        "isManuallyResized": true,
        "properties": { "blend_mode": "overlay" }
    }));
    assert_eq!(panel.split(), 0.8);
    assert!(panel.is_manually_resized());
    assert_eq!(panel.blend_mode(), BlendMode::Normal);

    panel.from_record(&json!({ "properties": { "blend_mode": "lighter (add)" } }));
    assert_eq!(panel.blend_mode(), BlendMode::Lighten);
    assert_eq!(panel.split(), 0.8);
}

#[test]
fn test_restored_lock_survives_delivery() {
    let mut panel = ComparePanel::with_defaults("7");
    panel
        .from_record(&json!({ "isManuallyResized": true, "slider_pos": 0.1 }));
    panel.deliver(&ImageDelivery::from_encoded("7", Some(&png(100, 200, 1)), None));
    panel.wait_for_images(WAIT);

    assert_eq!(panel.size(), [320.0, 440.0]);
    assert_eq!(panel.split(), 0.1);
}

proptest! {
    #[test]
    fn prop_record_round_trip(
        split in 0.0f32..=1.0,
        manual in any::<bool>(),
        mode in 0usize..BlendMode::ALL.len(),
    ) {
        let mut original = ComparePanel::with_defaults("7");
        original.apply_patch(StatePatch {
            slider_pos: Some(split),
            is_manually_resized: Some(manual),
            blend_mode: Some(BlendMode::ALL[mode]),
        });

        let record = original.to_record().to_record();
        let mut restored = ComparePanel::with_defaults("7");
        restored.from_record(&record);

        prop_assert_eq!(restored.split(), original.split());
        prop_assert_eq!(restored.is_manually_resized(), manual);
        prop_assert_eq!(restored.blend_mode(), BlendMode::ALL[mode]);
    }
}
