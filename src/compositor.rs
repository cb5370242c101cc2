//! Split/blend compositing of the two comparison images.
//!
//! In `normal` mode image A is revealed left of the split line over image B.
//! In every other mode the blended result is shown left of the split line
//! and the untouched image B right of it.

use std::fmt;
use std::str::FromStr;

use image::RgbaImage;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::OverlayStyle;
use crate::error::CompareError;
use crate::geometry::{Point, Rect};
use crate::surface::{CompositeOp, Surface, TextAlign, TextBaseline};

/// Shown when neither image has arrived.
pub const PLACEHOLDER_NO_IMAGES: &str = "Connect Images and run workflow";

/// Shown when image B is present but the primary image A is not.
pub const PLACEHOLDER_MISSING_A: &str = "Connect Image A and B for blend modes";

/// Older records name the additive mode this way.
const LIGHTEN_ALIAS: &str = "lighter (add)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Normal,
    Difference,
    /// Additive blend, drawn with [`CompositeOp::Lighter`].
    #[serde(alias = "lighter (add)")]
    Lighten,
    Darken,
    Screen,
    Multiply,
}

impl BlendMode {
    pub const ALL: [BlendMode; 6] = [
        BlendMode::Normal,
        BlendMode::Difference,
        BlendMode::Lighten,
        BlendMode::Darken,
        BlendMode::Screen,
        BlendMode::Multiply,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Difference => "difference",
            BlendMode::Lighten => "lighten",
            BlendMode::Darken => "darken",
            BlendMode::Screen => "screen",
            BlendMode::Multiply => "multiply",
        }
    }

    pub fn composite_op(&self) -> CompositeOp {
        match self {
            BlendMode::Normal => CompositeOp::SourceOver,
            BlendMode::Difference => CompositeOp::Difference,
            BlendMode::Lighten => CompositeOp::Lighter,
            BlendMode::Darken => CompositeOp::Darken,
            BlendMode::Screen => CompositeOp::Screen,
            BlendMode::Multiply => CompositeOp::Multiply,
        }
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlendMode {
    type Err = CompareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == LIGHTEN_ALIAS {
            return Ok(BlendMode::Lighten);
        }
        BlendMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| CompareError::UnknownBlendMode(s.to_string()))
    }
}

/// X coordinate of the split line inside `render`.
pub fn split_px(render: &Rect, split: f32) -> f32 {
    render.x + split * render.width
}

/// Paint the image layer of a two-image comparison into `render`.
pub fn composite<S: Surface + ?Sized>(
    surface: &mut S,
    image_a: &RgbaImage,
    image_b: &RgbaImage,
    render: Rect,
    split: f32,
    mode: BlendMode,
) {
    let split_x = split_px(&render, split);
    debug!("compositing {} at split {:.3} (x = {:.1})", mode, split, split_x);

    if mode == BlendMode::Normal {
        surface.draw_image(image_b, render);

        surface.save();
        surface.clip_rect(Rect::new(render.x, render.y, split_x - render.x, render.height));
        surface.draw_image(image_a, render);
        surface.restore();
        return;
    }

    surface.draw_image(image_b, render);
    let previous = surface.composite_op();
    surface.set_composite_op(mode.composite_op());
    surface.draw_image(image_a, render);
    surface.set_composite_op(previous);

    surface.save();
    surface.clip_rect(Rect::new(split_x, render.y, render.right() - split_x, render.height));
    surface.draw_image(image_b, render);
    surface.restore();
}

/// Labels, divider line and handle glyphs drawn on top of the composite.
pub fn draw_overlay<S: Surface + ?Sized>(
    surface: &mut S,
    render: Rect,
    split: f32,
    style: &OverlayStyle,
) {
    let split_x = split_px(&render, split);
    let label_y = render.y + style.label_offset_y;

    surface.save();
    surface.clip_rect(Rect::new(render.x, render.y, split_x - render.x, render.height));
    draw_label(
        surface,
        "A",
        Point::new(render.x + style.label_inset, label_y),
        TextAlign::Left,
        style,
    );
    surface.restore();

    surface.save();
    surface.clip_rect(Rect::new(split_x, render.y, render.right() - split_x, render.height));
    draw_label(
        surface,
        "B",
        Point::new(render.right() - style.label_inset, label_y),
        TextAlign::Right,
        style,
    );
    surface.restore();

    surface.stroke_vertical_line(
        split_x,
        render.y,
        render.bottom(),
        style.divider_width,
        style.divider_color,
    );

    let handle_y = render.y + render.height / 2.0;
    let (size, gap) = (style.triangle_size, style.triangle_gap);

    if split > style.edge_epsilon {
        surface.fill_triangle(
            [
                Point::new(split_x - gap, handle_y - size),
                Point::new(split_x - gap, handle_y + size),
                Point::new(split_x - gap - size, handle_y),
            ],
            style.handle_color,
        );
    }

    if split < 1.0 - style.edge_epsilon {
        surface.fill_triangle(
            [
                Point::new(split_x + gap, handle_y - size),
                Point::new(split_x + gap, handle_y + size),
                Point::new(split_x + gap + size, handle_y),
            ],
            style.handle_color,
        );
    }
}

fn draw_label<S: Surface + ?Sized>(
    surface: &mut S,
    text: &str,
    at: Point,
    align: TextAlign,
    style: &OverlayStyle,
) {
    let size = style.label_font_size;
    let pad = style.label_box_padding;
    let text_width = surface.measure_text(text, size);

    let box_x = match align {
        TextAlign::Right => at.x - text_width - pad,
        _ => at.x - pad,
    };
    // 0.3 nudges the box to sit visually centred on the glyphs
    let box_y = at.y - size / 2.0 - pad - 0.3;
    let background = Rect::new(box_x, box_y, text_width + pad * 2.0, size + pad * 2.0);

    surface.fill_rounded_rect(background, style.label_box_radius, style.label_background);
    surface.fill_text(text, at, size, align, TextBaseline::Middle, style.label_color);
}

/// Placeholder for a panel without a primary image; `None` once A is present.
pub fn placeholder_text(has_a: bool, has_b: bool) -> Option<&'static str> {
    match (has_a, has_b) {
        (true, _) => None,
        (false, true) => Some(PLACEHOLDER_MISSING_A),
        (false, false) => Some(PLACEHOLDER_NO_IMAGES),
    }
}

/// Centre `text` in `container`, shrinking it until it fits the width.
pub fn draw_placeholder<S: Surface + ?Sized>(
    surface: &mut S,
    container: Rect,
    text: &str,
    style: &OverlayStyle,
) {
    let mut size = style.placeholder_font_size;
    let natural = surface.measure_text(text, size);
    if natural > container.width {
        size *= container.width / natural;
    }
    let centre = Point::new(
        container.x + container.width / 2.0,
        container.y + container.height / 2.0,
    );

    surface.save();
    surface.clip_rect(container);
    surface.fill_text(
        text,
        centre,
        size,
        TextAlign::Center,
        TextBaseline::Middle,
        style.placeholder_color,
    );
    surface.restore();
}
