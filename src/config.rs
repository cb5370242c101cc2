//! Layout and overlay constants for the comparison panel.
//!
//! The values live in plain structs handed to [`ComparePanel::new`] so tests
//! can run the engine against alternate layouts.
//!
//! [`ComparePanel::new`]: crate::panel::ComparePanel::new

use crate::surface::Rgba;

/// Padding between the panel border and the image area.
pub const PADDING: f32 = 10.0;

/// Height reserved at the top of the panel for the controls.
pub const HEADER_HEIGHT: f32 = 100.0;

/// Panel height never drops below this.
pub const MIN_HEIGHT: f32 = 300.0;

/// Split fraction at creation and after a reset.
pub const NEUTRAL_POS: f32 = 0.5;

/// Width the autosizer pins the panel to.
pub const BASE_WIDTH: f32 = 300.0;

/// Panel size before any image has arrived.
pub const INITIAL_SIZE: [f32; 2] = [320.0, 440.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub padding: f32,
    pub header_height: f32,
    pub min_height: f32,
    pub neutral_pos: f32,
    pub base_width: f32,
    pub initial_size: [f32; 2],
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            padding: PADDING,
            header_height: HEADER_HEIGHT,
            min_height: MIN_HEIGHT,
            neutral_pos: NEUTRAL_POS,
            base_width: BASE_WIDTH,
            initial_size: INITIAL_SIZE,
        }
    }
}

/// Sizes and colours of the labels, divider and handle glyphs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    pub label_font_size: f32,
    pub label_box_padding: f32,
    pub label_box_radius: f32,
    pub label_background: Rgba,
    pub label_color: Rgba,
    /// Horizontal distance of a label from its edge of the image.
    pub label_inset: f32,
    /// Vertical centre of the labels, measured from the image top.
    pub label_offset_y: f32,
    pub divider_color: Rgba,
    pub divider_width: f32,
    pub handle_color: Rgba,
    pub triangle_size: f32,
    pub triangle_gap: f32,
    /// Handles are hidden when the split is this close to an edge.
    pub edge_epsilon: f32,
    pub placeholder_color: Rgba,
    pub placeholder_font_size: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            label_font_size: 8.0,
            label_box_padding: 2.0,
            label_box_radius: 1.5,
            label_background: Rgba::new(0, 0, 0, 64),
            label_color: Rgba::WHITE,
            label_inset: 5.0,
            label_offset_y: 9.0,
            divider_color: Rgba::new(255, 255, 255, 77),
            divider_width: 0.5,
            handle_color: Rgba::WHITE,
            triangle_size: 3.5,
            triangle_gap: 2.5,
            edge_epsilon: 1e-3,
            placeholder_color: Rgba::new(0xCC, 0xCC, 0xCC, 255),
            placeholder_font_size: 11.0,
        }
    }
}
