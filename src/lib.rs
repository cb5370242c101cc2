//! Interactive split/blend comparison of two images inside a fixed-size panel.
//!
//! The engine letterboxes image A into the panel, composites it against
//! image B under a selectable blend mode with a draggable split line, and
//! persists the slider position, blend mode and manual-resize lock in a
//! flat state record.

pub mod app;
pub mod compositor;
pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod layout;
pub mod loader;
pub mod panel;
pub mod slider;
pub mod state;
pub mod surface;

pub use compositor::BlendMode;
pub use config::{LayoutConfig, OverlayStyle};
pub use error::{CompareError, Result};
pub use geometry::{Point, Rect};
pub use loader::{ImageDelivery, Slot};
pub use panel::{Attached, ComparePanel, Host};
pub use slider::{DragState, PointerEvent};
pub use state::{CompareState, StatePatch};
pub use surface::{Canvas, CompositeOp, Rgba, Surface};
