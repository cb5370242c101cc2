//! Letterbox geometry.
//!
//! Everything here is a pure function of the panel size and the image's
//! intrinsic dimensions, recomputed every frame.

use crate::config::LayoutConfig;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Inclusive on all four edges, like the hit test for starting a drag.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Overlap of two rectangles; empty overlaps come back with zero size.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        Rect::new(x0, y0, (x1 - x0).max(0.0), (y1 - y0).max(0.0))
    }
}

/// Area left for the images once padding and the header are taken out.
///
/// Returns `None` when the area is narrower or shorter than one pixel.
pub fn container_area(panel_size: [f32; 2], layout: &LayoutConfig) -> Option<Rect> {
    let width = (panel_size[0] - layout.padding * 2.0).max(0.0);
    let height = (panel_size[1] - layout.header_height - layout.padding).max(0.0);

    if width < 1.0 || height < 1.0 {
        return None;
    }
    Some(Rect::new(layout.padding, layout.header_height, width, height))
}

/// Aspect-preserving placement of an image centered in `container`.
///
/// Degenerate inputs (zero-sized image or container) yield `None`.
pub fn resolve(natural_size: (u32, u32), container: &Rect) -> Option<Rect> {
    let (natural_width, natural_height) = natural_size;
    if natural_width == 0 || natural_height == 0 || container.width <= 0.0 || container.height <= 0.0
    {
        return None;
    }

    let image_ratio = natural_width as f32 / natural_height as f32;
    let container_ratio = container.width / container.height;

    let (width, height) = if image_ratio > container_ratio {
        (container.width, container.width / image_ratio)
    } else {
        (container.height * image_ratio, container.height)
    };

    Some(Rect::new(
        container.x + (container.width - width) / 2.0,
        container.y + (container.height - height) / 2.0,
        width,
        height,
    ))
}
