//! Drawing surface abstraction and a software raster implementation.
//!
//! [`Surface`] mirrors the small slice of a 2D drawing context the panel
//! needs: a save/restore state stack holding the clip and the compositing
//! operator, image blits, solid fills and bitmap text. [`Canvas`] implements
//! it on top of an `RgbaImage`, blending rows in parallel.
//!
//! Coverage is decided by pixel centres: a pixel belongs to a shape when its
//! centre lies inside it. Clip rectangles follow the same rule, so a clip of
//! zero width covers nothing.

use std::borrow::Cow;

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use log::trace;
use rayon::prelude::*;

use crate::geometry::{Point, Rect};

/// Straight (non-premultiplied) 8-bit colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    fn scale_alpha(self, factor: f32) -> Self {
        let a = (self.a as f32 * factor.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }

    fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Pixel combination rule applied when drawing onto the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeOp {
    #[default]
    SourceOver,
    Difference,
    /// Additive (Porter-Duff plus).
    Lighter,
    Darken,
    Screen,
    Multiply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextBaseline {
    Top,
    Middle,
}

pub trait Surface {
    /// Push the current clip and compositing operator.
    fn save(&mut self);

    /// Pop the state pushed by the matching [`Surface::save`].
    fn restore(&mut self);

    /// Intersect the current clip with `rect`.
    fn clip_rect(&mut self, rect: Rect);

    fn set_composite_op(&mut self, op: CompositeOp);

    fn composite_op(&self) -> CompositeOp;

    /// Draw `image` scaled to fill `dest`.
    fn draw_image(&mut self, image: &RgbaImage, dest: Rect);

    fn fill_rect(&mut self, rect: Rect, color: Rgba);

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, color: Rgba);

    fn fill_triangle(&mut self, points: [Point; 3], color: Rgba);

    fn stroke_vertical_line(&mut self, x: f32, y0: f32, y1: f32, width: f32, color: Rgba);

    /// Advance width of `text` at the given font size.
    fn measure_text(&self, text: &str, size: f32) -> f32;

    fn fill_text(
        &mut self,
        text: &str,
        at: Point,
        size: f32,
        align: TextAlign,
        baseline: TextBaseline,
        color: Rgba,
    );
}

#[derive(Debug, Clone, Copy, Default)]
struct DrawState {
    clip: Option<Rect>,
    op: CompositeOp,
}

/// Software surface backed by an RGBA bitmap.
pub struct Canvas {
    pixels: RgbaImage,
    state: DrawState,
    stack: Vec<DrawState>,
}

impl Canvas {
    /// Fully transparent canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
            state: DrawState::default(),
            stack: Vec::new(),
        }
    }

    pub fn with_background(width: u32, height: u32, color: Rgba) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, image::Rgba(color.to_array())),
            state: DrawState::default(),
            stack: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    /// `rect` intersected with the clip and the canvas bounds.
    fn visible(&self, rect: Rect) -> Rect {
        let bounds = Rect::new(0.0, 0.0, self.width() as f32, self.height() as f32);
        let rect = rect.intersect(&bounds);
        match self.state.clip {
            Some(clip) => rect.intersect(&clip),
            None => rect,
        }
    }

    /// Pixel ranges `(x0, x1, y0, y1)` of `rect` left after clipping.
    fn visible_span(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let region = self.visible(rect);
        let (x0, x1) = pixel_span(region.x, region.right(), self.width());
        let (y0, y1) = pixel_span(region.y, region.bottom(), self.height());
        (x0 < x1 && y0 < y1).then_some((x0, x1, y0, y1))
    }

    /// Blend `shade(x, y)` into every pixel whose centre lies in `region`.
    fn paint<F>(&mut self, region: Rect, shade: F)
    where
        F: Fn(u32, u32) -> Option<[u8; 4]> + Sync,
    {
        let Some((x0, x1, y0, y1)) = self.visible_span(region) else {
            return;
        };

        let op = self.state.op;
        let stride = self.width() as usize * 4;
        let buf: &mut [u8] = &mut self.pixels;

        buf.par_chunks_mut(stride)
            .enumerate()
            .skip(y0 as usize)
            .take((y1 - y0) as usize)
            .for_each(|(y, row)| {
                for x in x0..x1 {
                    if let Some(src) = shade(x, y as u32) {
                        let i = x as usize * 4;
                        let dst = [row[i], row[i + 1], row[i + 2], row[i + 3]];
                        row[i..i + 4].copy_from_slice(&blend_pixel(dst, src, op));
                    }
                }
            });
    }

    /// Copy `src` with its top-left pixel at `(ox, oy)`, limited to `region`.
    fn blit(&mut self, src: &RgbaImage, ox: i64, oy: i64, region: Rect) {
        self.paint(region, |x, y| {
            let sx = (x as i64 - ox) as u32;
            let sy = (y as i64 - oy) as u32;
            Some(src.get_pixel(sx, sy).0)
        });
    }
}

impl Surface for Canvas {
    fn save(&mut self) {
        self.stack.push(self.state);
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn clip_rect(&mut self, rect: Rect) {
        let clip = match self.state.clip {
            Some(current) => current.intersect(&rect),
            None => rect,
        };
        trace!("clip set to {:?}", clip);
        self.state.clip = Some(clip);
    }

    fn set_composite_op(&mut self, op: CompositeOp) {
        self.state.op = op;
    }

    fn composite_op(&self) -> CompositeOp {
        self.state.op
    }

    fn draw_image(&mut self, image: &RgbaImage, dest: Rect) {
        let (dx0, dx1) = (snap(dest.x), snap(dest.right()));
        let (dy0, dy1) = (snap(dest.y), snap(dest.bottom()));
        let (iw, ih) = image.dimensions();
        if dx1 <= dx0 || dy1 <= dy0 || iw == 0 || ih == 0 {
            return;
        }

        let (w, h) = ((dx1 - dx0) as u32, (dy1 - dy0) as u32);
        let snapped = Rect::new(dx0 as f32, dy0 as f32, w as f32, h as f32);

        if (iw, ih) == (w, h) {
            self.blit(image, dx0, dy0, snapped);
            return;
        }

        if w > iw || h > ih {
            // Enlarging: sample each visible pixel straight from the source.
            let (rx, ry) = (iw as f32 / w as f32, ih as f32 / h as f32);
            self.paint(snapped, |x, y| {
                let u = ((x as i64 - dx0) as f32 + 0.5) * rx - 0.5;
                let v = ((y as i64 - dy0) as f32 + 0.5) * ry - 0.5;
                Some(sample_bilinear(image, u, v))
            });
            return;
        }

        // Shrinking: resample only the source window behind the visible pixels.
        let Some((vx0, vx1, vy0, vy1)) = self.visible_span(snapped) else {
            return;
        };
        let (sx0, sx1, cx0, cx1) = source_window(vx0 as i64 - dx0, vx1 as i64 - dx0, w, iw);
        let (sy0, sy1, cy0, cy1) = source_window(vy0 as i64 - dy0, vy1 as i64 - dy0, h, ih);
        if cx1 <= cx0 || cy1 <= cy0 {
            return;
        }

        let source: Cow<RgbaImage> = if (sx0, sx1, sy0, sy1) == (0, iw, 0, ih) {
            Cow::Borrowed(image)
        } else {
            Cow::Owned(imageops::crop_imm(image, sx0, sy0, sx1 - sx0, sy1 - sy0).to_image())
        };
        let (cw, ch) = ((cx1 - cx0) as u32, (cy1 - cy0) as u32);
        trace!("resampling {}x{} source window to {}x{}", sx1 - sx0, sy1 - sy0, cw, ch);
        let scaled = imageops::resize(&*source, cw, ch, FilterType::Triangle);

        let (ox, oy) = (dx0 + cx0, dy0 + cy0);
        self.blit(&scaled, ox, oy, Rect::new(ox as f32, oy as f32, cw as f32, ch as f32));
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        let src = color.to_array();
        self.paint(rect, |_, _| Some(src));
    }

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, color: Rgba) {
        let src = color.to_array();
        let radius = radius.min(rect.width / 2.0).min(rect.height / 2.0).max(0.0);
        let inner_x = (rect.x + radius, rect.right() - radius);
        let inner_y = (rect.y + radius, rect.bottom() - radius);

        self.paint(rect, |x, y| {
            let (cx, cy) = (x as f32 + 0.5, y as f32 + 0.5);
            let nx = cx.clamp(inner_x.0, inner_x.1);
            let ny = cy.clamp(inner_y.0, inner_y.1);
            let (ddx, ddy) = (cx - nx, cy - ny);
            (ddx * ddx + ddy * ddy <= radius * radius).then_some(src)
        });
    }

    fn fill_triangle(&mut self, points: [Point; 3], color: Rgba) {
        let src = color.to_array();
        let min_x = points.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
        let max_x = points.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
        let min_y = points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        let max_y = points.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
        let bounds = Rect::new(min_x, min_y, max_x - min_x, max_y - min_y);
        let [a, b, c] = points;

        self.paint(bounds, |x, y| {
            let p = Point::new(x as f32 + 0.5, y as f32 + 0.5);
            let d1 = edge(a, b, p);
            let d2 = edge(b, c, p);
            let d3 = edge(c, a, p);
            let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
            let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
            (!(has_neg && has_pos)).then_some(src)
        });
    }

    fn stroke_vertical_line(&mut self, x: f32, y0: f32, y1: f32, width: f32, color: Rgba) {
        // Hairlines still touch one pixel column, with coverage folded into alpha.
        let drawn = width.max(1.0);
        let color = color.scale_alpha(width / drawn);
        let (top, bottom) = if y0 <= y1 { (y0, y1) } else { (y1, y0) };
        self.fill_rect(Rect::new(x - drawn / 2.0, top, drawn, bottom - top), color);
    }

    fn measure_text(&self, text: &str, size: f32) -> f32 {
        let units: u32 = text.chars().map(|ch| Glyph::of(ch).advance()).sum();
        units as f32 * size / 8.0
    }

    fn fill_text(
        &mut self,
        text: &str,
        at: Point,
        size: f32,
        align: TextAlign,
        baseline: TextBaseline,
        color: Rgba,
    ) {
        if size <= 0.0 || text.is_empty() {
            return;
        }
        let glyphs: Vec<Glyph> = text.chars().map(Glyph::of).collect();
        let starts: Vec<u32> = glyphs
            .iter()
            .scan(0, |pen, glyph| {
                let start = *pen;
                *pen += glyph.advance();
                Some(start)
            })
            .collect();

        let width = self.measure_text(text, size);
        let left = match align {
            TextAlign::Left => at.x,
            TextAlign::Center => at.x - width / 2.0,
            TextAlign::Right => at.x - width,
        };
        let top = match baseline {
            TextBaseline::Top => at.y,
            TextBaseline::Middle => at.y - size / 2.0,
        };
        let scale = size / 8.0;
        let src = color.to_array();

        self.paint(Rect::new(left, top, width, size), |x, y| {
            let gx = ((x as f32 + 0.5 - left) / scale).floor();
            let gy = ((y as f32 + 0.5 - top) / scale).floor();
            if gx < 0.0 || gy < 0.0 || gy >= 8.0 {
                return None;
            }
            let gx = gx as u32;
            let index = starts.partition_point(|&start| start <= gx).checked_sub(1)?;
            let glyph = &glyphs[index];
            let col = gx - starts[index];
            if col >= glyph.ink {
                return None;
            }
            let row = glyph.bits[gy as usize];
            ((row >> (glyph.first + col)) & 1 == 1).then_some(src)
        });
    }
}

/// Blank columns after each glyph, in font units.
const GLYPH_GAP: u32 = 1;

/// Advance of a glyph without ink, such as a space.
const BLANK_ADVANCE: u32 = 4;

/// A font8x8 glyph trimmed to the columns that carry ink.
struct Glyph {
    bits: [u8; 8],
    first: u32,
    ink: u32,
}

impl Glyph {
    fn of(ch: char) -> Self {
        let bits = BASIC_FONTS
            .get(ch)
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0; 8]);
        // bit 0 is the leftmost column
        let columns = bits.iter().fold(0u8, |acc, row| acc | row);
        if columns == 0 {
            return Self {
                bits,
                first: 0,
                ink: 0,
            };
        }
        let first = columns.trailing_zeros();
        let last = 7 - columns.leading_zeros();
        Self {
            bits,
            first,
            ink: last - first + 1,
        }
    }

    fn advance(&self) -> u32 {
        if self.ink == 0 {
            BLANK_ADVANCE
        } else {
            self.ink + GLYPH_GAP
        }
    }
}

/// Integer pixel range `[start, end)` whose centres fall in `[a, b)`.
fn pixel_span(a: f32, b: f32, limit: u32) -> (u32, u32) {
    let start = snap(a).clamp(0, limit as i64) as u32;
    let end = snap(b).clamp(0, limit as i64) as u32;
    (start, end)
}

/// First pixel index whose centre is at or right of `v`.
fn snap(v: f32) -> i64 {
    (v - 0.5).ceil() as i64
}

fn edge(a: Point, b: Point, p: Point) -> f32 {
    (p.x - b.x) * (a.y - b.y) - (a.x - b.x) * (p.y - b.y)
}

/// Source range `[s0, s1)` behind destination pixels `[v0, v1)` of a
/// `dest_len` box scaled from `src_len`, with the destination range
/// `[d0, d1)` that source range covers.
fn source_window(v0: i64, v1: i64, dest_len: u32, src_len: u32) -> (u32, u32, i64, i64) {
    let ratio = src_len as f64 / dest_len as f64;
    let s0 = ((v0 as f64 * ratio).floor() as i64).clamp(0, src_len as i64) as u32;
    let s1 = ((v1 as f64 * ratio).ceil() as i64).clamp(0, src_len as i64) as u32;
    let d0 = (s0 as f64 / ratio).round() as i64;
    let d1 = (s1 as f64 / ratio).round() as i64;
    (s0, s1, d0, d1)
}

/// Bilinear sample at source coordinates `(u, v)`, clamped to the edges.
fn sample_bilinear(image: &RgbaImage, u: f32, v: f32) -> [u8; 4] {
    let (max_x, max_y) = (image.width() - 1, image.height() - 1);
    let u = u.clamp(0.0, max_x as f32);
    let v = v.clamp(0.0, max_y as f32);
    let (x0, y0) = (u.floor() as u32, v.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(max_x), (y0 + 1).min(max_y));
    let (fx, fy) = (u - x0 as f32, v - y0 as f32);

    let [a, b, c, d] =
        [(x0, y0), (x1, y0), (x0, y1), (x1, y1)].map(|(x, y)| image.get_pixel(x, y).0);
    let mut out = [0u8; 4];
    for i in 0..4 {
        let top = a[i] as f32 * (1.0 - fx) + b[i] as f32 * fx;
        let bottom = c[i] as f32 * (1.0 - fx) + d[i] as f32 * fx;
        out[i] = (top * (1.0 - fy) + bottom * fy).round() as u8;
    }
    out
}

/// Composite one straight-alpha source pixel over a destination pixel.
pub fn blend_pixel(dst: [u8; 4], src: [u8; 4], op: CompositeOp) -> [u8; 4] {
    if op == CompositeOp::SourceOver {
        match src[3] {
            255 => return src,
            0 => return dst,
            _ => {}
        }
    }

    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    if sa == 0.0 && op != CompositeOp::Lighter {
        return dst;
    }

    let out_a = match op {
        CompositeOp::Lighter => (sa + da).min(1.0),
        _ => sa + da * (1.0 - sa),
    };
    if out_a <= 0.0 {
        return [0, 0, 0, 0];
    }

    let blend = separable(op);
    let mut out = [0u8; 4];
    for c in 0..3 {
        let s = src[c] as f32 / 255.0;
        let d = dst[c] as f32 / 255.0;
        let premul = match op {
            CompositeOp::Lighter => (sa * s + da * d).min(1.0),
            _ => {
                let mixed = (1.0 - da) * s + da * blend(s, d);
                sa * mixed + da * d * (1.0 - sa)
            }
        };
        out[c] = to_u8(premul / out_a);
    }
    out[3] = to_u8(out_a);
    out
}

fn separable(op: CompositeOp) -> fn(f32, f32) -> f32 {
    match op {
        CompositeOp::Difference => |s: f32, d: f32| (d - s).abs(),
        CompositeOp::Darken => |s: f32, d: f32| s.min(d),
        CompositeOp::Screen => |s: f32, d: f32| s + d - s * d,
        CompositeOp::Multiply => |s: f32, d: f32| s * d,
        CompositeOp::SourceOver | CompositeOp::Lighter => |s: f32, _: f32| s,
    }
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
