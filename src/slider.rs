//! Pointer handling for the split line.

use log::debug;

use crate::geometry::{Point, Rect};

/// `button` value of the primary mouse button.
pub const PRIMARY_BUTTON: u16 = 0;

/// Bit set in `buttons` while the primary mouse button is held.
pub const PRIMARY_BUTTON_MASK: u16 = 1;

/// A pointer event in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub canvas_pos: Point,
    /// Button that changed state (down/up events).
    pub button: u16,
    /// Bitmask of buttons held during the event.
    pub buttons: u16,
}

impl PointerEvent {
    pub fn primary_down(canvas_pos: Point) -> Self {
        Self {
            canvas_pos,
            button: PRIMARY_BUTTON,
            buttons: PRIMARY_BUTTON_MASK,
        }
    }

    pub fn primary_drag(canvas_pos: Point) -> Self {
        Self::primary_down(canvas_pos)
    }

    pub fn primary_up(canvas_pos: Point) -> Self {
        Self {
            canvas_pos,
            button: PRIMARY_BUTTON,
            buttons: 0,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.button == PRIMARY_BUTTON
    }

    pub fn primary_held(&self) -> bool {
        self.buttons & PRIMARY_BUTTON_MASK != 0
    }

    /// Position relative to a panel whose origin sits at `origin` on the canvas.
    pub fn local_to(&self, origin: Point) -> Point {
        Point::new(self.canvas_pos.x - origin.x, self.canvas_pos.y - origin.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging,
}

/// Owner of the split fraction.
#[derive(Debug, Clone)]
pub struct SliderController {
    state: DragState,
    value: f32,
    neutral: f32,
}

impl SliderController {
    pub fn new(neutral: f32) -> Self {
        let neutral = neutral.clamp(0.0, 1.0);
        Self {
            state: DragState::Idle,
            value: neutral,
            neutral,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        self.state == DragState::Dragging
    }

    /// Restore a saved split fraction. Non-finite values are ignored.
    pub fn set_value(&mut self, value: f32) {
        if value.is_finite() {
            self.value = value.clamp(0.0, 1.0);
        }
    }

    pub fn reset(&mut self) {
        self.value = self.neutral;
        self.state = DragState::Idle;
    }

    /// Start a drag if the press lands on the image and there is something to
    /// compare. Returns whether the event was consumed.
    pub fn pointer_down(
        &mut self,
        event: &PointerEvent,
        local: Point,
        render: Option<Rect>,
        both_present: bool,
    ) -> bool {
        if !event.is_primary() || !both_present {
            return false;
        }
        let Some(render) = render else {
            return false;
        };
        if !render.contains(local) {
            return false;
        }

        self.state = DragState::Dragging;
        self.update_from_x(local.x, &render);
        true
    }

    /// Returns whether the split fraction changed.
    pub fn pointer_move(
        &mut self,
        event: &PointerEvent,
        local: Point,
        render: Option<Rect>,
        both_present: bool,
    ) -> bool {
        if !self.is_dragging() {
            return false;
        }
        match render {
            Some(render) if both_present && event.primary_held() => {
                self.update_from_x(local.x, &render);
                true
            }
            _ => {
                debug!("drag conditions lost, leaving drag");
                self.state = DragState::Idle;
                false
            }
        }
    }

    pub fn pointer_up(&mut self) {
        self.state = DragState::Idle;
    }

    fn update_from_x(&mut self, local_x: f32, render: &Rect) {
        if render.width <= 0.0 {
            return;
        }
        let fraction = (local_x - render.x) / render.width;
        self.value = fraction.clamp(0.0, 1.0);
        debug!("split fraction -> {:.4}", self.value);
    }
}
