//! The comparison panel: owns the images and all interaction state and
//! wires the geometry, compositor, slider, layout and loader together.
//!
//! A host embeds the panel through [`ComparePanel::attach_to`], which hands
//! back an adapter exposing the hooks the host dispatches to (draw, pointer,
//! resize, serialize, configure, context menu).

use std::time::Duration;

use image::RgbaImage;
use log::{debug, info};
use serde_json::{Map, Value};

use crate::compositor::{self, BlendMode};
use crate::config::{LayoutConfig, OverlayStyle};
use crate::export::{self, MenuOption};
use crate::geometry::{self, Point, Rect};
use crate::layout::PanelLayout;
use crate::loader::{ImageDelivery, ImageLoader, LoaderEvent, SharedImage, Slot};
use crate::slider::{PointerEvent, SliderController};
use crate::state::{CompareState, StatePatch};
use crate::surface::Surface;

/// What the panel needs from whatever embeds it.
pub trait Host {
    /// Position of the panel's top-left corner on the host canvas.
    fn panel_origin(&self) -> Point;

    /// Ask for a repaint. Calls may be coalesced by the host.
    fn request_redraw(&mut self);
}

impl<H: Host + ?Sized> Host for &mut H {
    fn panel_origin(&self) -> Point {
        (**self).panel_origin()
    }

    fn request_redraw(&mut self) {
        (**self).request_redraw()
    }
}

pub struct ComparePanel {
    node_id: String,
    layout: PanelLayout,
    style: OverlayStyle,
    slider: SliderController,
    blend_mode: BlendMode,
    image_a: Option<SharedImage>,
    image_b: Option<SharedImage>,
    loader: ImageLoader,
    collapsed: bool,
    needs_redraw: bool,
}

impl ComparePanel {
    pub fn new(
        node_id: impl Into<String>,
        layout: LayoutConfig,
        style: OverlayStyle,
        num_load_threads: usize,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            slider: SliderController::new(layout.neutral_pos),
            layout: PanelLayout::new(layout),
            style,
            blend_mode: BlendMode::default(),
            image_a: None,
            image_b: None,
            loader: ImageLoader::new(num_load_threads),
            collapsed: false,
            needs_redraw: false,
        }
    }

    pub fn with_defaults(node_id: impl Into<String>) -> Self {
        Self::new(node_id, LayoutConfig::default(), OverlayStyle::default(), 2)
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn size(&self) -> [f32; 2] {
        self.layout.size()
    }

    pub fn split(&self) -> f32 {
        self.slider.value()
    }

    pub fn slider(&self) -> &SliderController {
        &self.slider
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn is_manually_resized(&self) -> bool {
        self.layout.is_manually_resized()
    }

    pub fn image(&self, slot: Slot) -> Option<&SharedImage> {
        match slot {
            Slot::A => self.image_a.as_ref(),
            Slot::B => self.image_b.as_ref(),
        }
    }

    pub fn set_collapsed(&mut self, collapsed: bool) {
        self.collapsed = collapsed;
        self.request_redraw();
    }

    fn request_redraw(&mut self) {
        self.needs_redraw = true;
    }

    /// Returns and clears the pending redraw request.
    pub fn take_redraw_request(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    // -------------------------------------------------------------------
    // Images
    // -------------------------------------------------------------------

    /// Replace one image with an already decoded bitmap.
    pub fn set_image(&mut self, slot: Slot, image: Option<RgbaImage>) {
        let image = image.map(SharedImage::new);
        match slot {
            Slot::A => self.image_a = image,
            Slot::B => self.image_b = image,
        }
        self.request_redraw();
    }

    /// Handle an image-delivery event. Returns `false` when the event is for
    /// another panel.
    ///
    /// Both slots are replaced right away: slots without a payload are
    /// cleared, the others fill in as their decodes finish.
    pub fn deliver(&mut self, delivery: &ImageDelivery) -> bool {
        if delivery.node_id != self.node_id {
            debug!(
                "ignoring delivery for node {} on panel {}",
                delivery.node_id, self.node_id
            );
            return false;
        }
        info!(
            "panel {}: delivery A={} B={}",
            self.node_id,
            delivery.image_a_res.as_deref().unwrap_or("-"),
            delivery.image_b_res.as_deref().unwrap_or("-")
        );

        self.image_a = None;
        self.image_b = None;
        self.loader.submit(delivery);

        if delivery.expected() == 0 {
            self.request_redraw();
        }
        true
    }

    /// Apply finished decodes. Returns whether the current batch completed.
    pub fn pump_loads(&mut self) -> bool {
        let events = self.loader.pump();
        self.apply_loader_events(events)
    }

    /// Like [`ComparePanel::pump_loads`] but waits for the batch to finish.
    pub fn wait_for_images(&mut self, timeout: Duration) -> bool {
        let events = self.loader.pump_blocking(timeout);
        self.apply_loader_events(events)
    }

    pub fn has_pending_loads(&self) -> bool {
        self.loader.is_pending()
    }

    fn apply_loader_events(&mut self, events: Vec<LoaderEvent>) -> bool {
        let mut completed = false;
        for event in events {
            match event {
                LoaderEvent::Loaded(Slot::A, image) => self.image_a = Some(image),
                LoaderEvent::Loaded(Slot::B, image) => self.image_b = Some(image),
                LoaderEvent::Failed(slot, _) => debug!("image {} left empty", slot.label()),
                LoaderEvent::BatchComplete => {
                    completed = true;
                    self.autosize();
                    self.request_redraw();
                }
            }
        }
        completed
    }

    // -------------------------------------------------------------------
    // Layout
    // -------------------------------------------------------------------

    fn natural_size_a(&self) -> Option<(u32, u32)> {
        self.image_a.as_ref().map(|image| image.dimensions())
    }

    /// Fit the panel to image A unless the user resized it by hand.
    pub fn autosize(&mut self) {
        let natural = self.natural_size_a();
        if self.layout.autosize(natural) {
            self.request_redraw();
        }
    }

    /// A resize performed by the user; disables autosize until reset.
    pub fn user_resize(&mut self, size: [f32; 2]) {
        self.layout.user_resize(size);
        self.request_redraw();
    }

    /// The "Reset Node Size" control.
    pub fn reset(&mut self) {
        info!("panel {}: reset", self.node_id);
        self.slider.reset();
        let natural = self.natural_size_a();
        self.layout.reset(natural);
        self.request_redraw();
    }

    pub fn container(&self) -> Option<Rect> {
        geometry::container_area(self.layout.size(), self.layout.config())
    }

    /// Render rectangle of image A in panel coordinates.
    pub fn render_rect(&self) -> Option<Rect> {
        let container = self.container()?;
        geometry::resolve(self.natural_size_a()?, &container)
    }

    // -------------------------------------------------------------------
    // Controls
    // -------------------------------------------------------------------

    /// The blend-mode selector.
    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        debug!("blend mode -> {}", mode);
        self.blend_mode = mode;
        self.request_redraw();
    }

    // -------------------------------------------------------------------
    // Drawing
    // -------------------------------------------------------------------

    /// Paint the panel's image area into `surface` (panel coordinates).
    pub fn draw<S: Surface + ?Sized>(&self, surface: &mut S) {
        if self.collapsed {
            return;
        }
        let Some(container) = self.container() else {
            return;
        };

        surface.save();
        match (&self.image_a, &self.image_b) {
            (Some(a), b) => {
                if let Some(render) = geometry::resolve(a.dimensions(), &container) {
                    match b {
                        None => surface.draw_image(a, render),
                        Some(b) => {
                            let split = self.slider.value();
                            compositor::composite(surface, a, b, render, split, self.blend_mode);
                            compositor::draw_overlay(surface, render, split, &self.style);
                        }
                    }
                }
            }
            (None, b) => {
                if let Some(text) = compositor::placeholder_text(false, b.is_some()) {
                    compositor::draw_placeholder(surface, container, text, &self.style);
                }
            }
        }
        surface.restore();
    }

    // -------------------------------------------------------------------
    // Pointer
    // -------------------------------------------------------------------

    fn both_present(&self) -> bool {
        self.image_a.is_some() && self.image_b.is_some()
    }

    pub fn pointer_down(&mut self, event: &PointerEvent, origin: Point) -> bool {
        let local = event.local_to(origin);
        let render = self.render_rect();
        let both = self.both_present();
        let consumed = self.slider.pointer_down(event, local, render, both);
        if consumed {
            self.request_redraw();
        }
        consumed
    }

    pub fn pointer_move(&mut self, event: &PointerEvent, origin: Point) {
        let local = event.local_to(origin);
        let render = self.render_rect();
        let both = self.both_present();
        if self.slider.pointer_move(event, local, render, both) {
            self.request_redraw();
        }
    }

    pub fn pointer_up(&mut self, _event: &PointerEvent) {
        self.slider.pointer_up();
    }

    pub fn menu_options(&self, canvas_pos: Point, origin: Point) -> Vec<MenuOption> {
        let local = Point::new(canvas_pos.x - origin.x, canvas_pos.y - origin.y);
        export::menu_options(
            local,
            self.render_rect(),
            self.slider.value(),
            self.image_b.is_some(),
            export::timestamp_millis(),
        )
    }

    // -------------------------------------------------------------------
    // State
    // -------------------------------------------------------------------

    pub fn to_record(&self) -> CompareState {
        CompareState {
            slider_pos: self.slider.value(),
            is_manually_resized: self.layout.is_manually_resized(),
            blend_mode: self.blend_mode,
        }
    }

    /// Merge the fields present in `record` into the live state.
    pub fn from_record(&mut self, record: &Value) {
        self.apply_patch(StatePatch::from_record(record));
    }

    pub fn apply_patch(&mut self, patch: StatePatch) {
        if let Some(pos) = patch.slider_pos {
            self.slider.set_value(pos);
        }
        if let Some(manual) = patch.is_manually_resized {
            self.layout.set_manually_resized(manual);
        }
        if let Some(mode) = patch.blend_mode {
            self.blend_mode = mode;
        }
        if !patch.is_empty() {
            self.request_redraw();
        }
    }

    pub fn attach_to<H: Host>(&mut self, host: H) -> Attached<'_, H> {
        Attached { panel: self, host }
    }
}

/// A panel bound to its host, exposing the hooks the host dispatches to.
pub struct Attached<'p, H: Host> {
    panel: &'p mut ComparePanel,
    host: H,
}

impl<H: Host> Attached<'_, H> {
    pub fn panel(&self) -> &ComparePanel {
        &*self.panel
    }

    pub fn panel_mut(&mut self) -> &mut ComparePanel {
        &mut *self.panel
    }

    fn flush(&mut self) {
        if self.panel.take_redraw_request() {
            self.host.request_redraw();
        }
    }

    pub fn on_draw_foreground<S: Surface + ?Sized>(&mut self, surface: &mut S) {
        self.panel.draw(surface);
    }

    pub fn on_mouse_down(&mut self, event: &PointerEvent) -> bool {
        let origin = self.host.panel_origin();
        let consumed = self.panel.pointer_down(event, origin);
        self.flush();
        consumed
    }

    pub fn on_mouse_move(&mut self, event: &PointerEvent) {
        let origin = self.host.panel_origin();
        self.panel.pointer_move(event, origin);
        self.flush();
    }

    pub fn on_mouse_up(&mut self, event: &PointerEvent) {
        self.panel.pointer_up(event);
    }

    pub fn on_resize(&mut self, size: [f32; 2]) {
        self.panel.user_resize(size);
        self.flush();
    }

    pub fn on_delivery(&mut self, delivery: &ImageDelivery) -> bool {
        let handled = self.panel.deliver(delivery);
        self.flush();
        handled
    }

    pub fn on_idle(&mut self) {
        self.panel.pump_loads();
        self.flush();
    }

    pub fn on_blend_mode(&mut self, mode: BlendMode) {
        self.panel.set_blend_mode(mode);
        self.flush();
    }

    pub fn on_reset(&mut self) {
        self.panel.reset();
        self.flush();
    }

    /// Merge the panel's fields into the host's node record.
    pub fn serialize(&self, record: &mut Map<String, Value>) {
        self.panel.to_record().write_into(record);
    }

    pub fn configure(&mut self, record: &Value) {
        self.panel.from_record(record);
        self.flush();
    }

    pub fn extra_menu_options(&self, canvas_pos: Point) -> Vec<MenuOption> {
        self.panel.menu_options(canvas_pos, self.host.panel_origin())
    }
}
