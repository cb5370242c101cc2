use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context as _, Result};
use log::{debug, info, warn};
use serde_json::{json, Map, Value};

use crate::compositor::BlendMode;
use crate::config::{LayoutConfig, OverlayStyle};
use crate::export::{self, ActionOutcome, HtmlFileViewer, MenuAction};
use crate::geometry::Point;
use crate::loader::ImageDelivery;
use crate::panel::ComparePanel;
use crate::slider::PointerEvent;
use crate::state::StatePatch;
use crate::surface::{Canvas, Rgba};

const NODE_ID: &str = "1";

/// Panel background behind the image area.
const BACKGROUND: Rgba = Rgba::new(0x35, 0x35, 0x35, 255);

pub struct AppConfig {
    pub image_a: Option<String>,
    pub image_b: Option<String>,
    pub output: String,
    pub blend_mode: Option<BlendMode>,
    pub slider: Option<f32>,
    /// Drag the split line to this panel-local x coordinate.
    pub drag_to: Option<f32>,
    /// Resize the panel as a user would.
    pub panel_size: Option<(f32, f32)>,
    pub reset: bool,
    pub state_in: Option<String>,
    pub state_out: Option<String>,
    pub export_dir: Option<String>,
    /// Panel-local pointer position for the context menu actions.
    pub export_at: Option<(f32, f32)>,
    pub num_load_threads: usize,
    pub load_timeout: Duration,
}

pub struct AppState {
    config: AppConfig,
    panel: ComparePanel,
    record: Map<String, Value>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing AppState");
        let panel = ComparePanel::new(
            NODE_ID,
            LayoutConfig::default(),
            OverlayStyle::default(),
            config.num_load_threads,
        );

        let record = match &config.state_in {
            Some(path) => load_record(path)?,
            None => Map::new(),
        };

        let mut app = Self {
            config,
            panel,
            record,
        };
        app.panel.from_record(&Value::Object(app.record.clone()));
        Ok(app)
    }

    pub fn panel(&self) -> &ComparePanel {
        &self.panel
    }

    pub fn run(&mut self) -> Result<()> {
        self.load_images()?;
        self.apply_controls();
        self.render()?;

        if let Some(path) = self.config.state_out.clone() {
            self.save_record(&path)?;
        }
        if let Some(dir) = self.config.export_dir.clone() {
            self.run_exports(Path::new(&dir))?;
        }
        Ok(())
    }

    fn load_images(&mut self) -> Result<()> {
        let a = read_optional(self.config.image_a.as_deref())?;
        let b = read_optional(self.config.image_b.as_deref())?;

        let mut delivery = ImageDelivery::from_encoded(NODE_ID, a.as_deref(), b.as_deref());
        delivery.image_a_res = resolution(self.config.image_a.as_deref());
        delivery.image_b_res = resolution(self.config.image_b.as_deref());

        self.panel.deliver(&delivery);
        if delivery.expected() > 0 {
            self.panel.wait_for_images(self.config.load_timeout);
        }
        if self.panel.has_pending_loads() {
            warn!("Rendering before all images finished decoding");
        }
        Ok(())
    }

    fn apply_controls(&mut self) {
        if let Some(mode) = self.config.blend_mode {
            self.panel.set_blend_mode(mode);
        }
        if let Some((width, height)) = self.config.panel_size {
            self.panel.user_resize([width, height]);
        }
        if self.config.reset {
            self.panel.reset();
        }
        if let Some(pos) = self.config.slider {
            self.panel.apply_patch(StatePatch {
                slider_pos: Some(pos),
                ..Default::default()
            });
        }
        if let Some(x) = self.config.drag_to {
            self.drag_split_to(x);
        }
    }

    /// Press on the middle of the image, drag to `x`, release.
    fn drag_split_to(&mut self, x: f32) {
        let Some(render) = self.panel.render_rect() else {
            warn!("Nothing to drag: no image on screen");
            return;
        };
        let origin = Point::default();
        let mid_y = render.y + render.height / 2.0;
        let start = Point::new(render.x + render.width / 2.0, mid_y);

        if !self.panel.pointer_down(&PointerEvent::primary_down(start), origin) {
            warn!("Drag did not start; both images are needed to compare");
            return;
        }
        self.panel
            .pointer_move(&PointerEvent::primary_drag(Point::new(x, mid_y)), origin);
        self.panel
            .pointer_up(&PointerEvent::primary_up(Point::new(x, mid_y)));
        debug!("Split dragged to {:.3}", self.panel.split());
    }

    fn render(&mut self) -> Result<()> {
        let [width, height] = self.panel.size();
        let mut canvas =
            Canvas::with_background(width.ceil() as u32, height.ceil() as u32, BACKGROUND);
        self.panel.draw(&mut canvas);
        self.panel.take_redraw_request();

        canvas
            .pixels()
            .save(&self.config.output)
            .with_context(|| format!("Failed to write '{}'", self.config.output))?;
        info!(
            "Rendered {}x{} panel ({}, split {:.3}) to {}",
            canvas.width(),
            canvas.height(),
            self.panel.blend_mode(),
            self.panel.split(),
            self.config.output
        );
        Ok(())
    }

    fn save_record(&mut self, path: &str) -> Result<()> {
        self.panel.to_record().write_into(&mut self.record);
        let text = serde_json::to_string_pretty(&self.record)?;
        fs::write(path, text).with_context(|| format!("Failed to write state to '{}'", path))?;
        info!("Saved state to {}", path);
        Ok(())
    }

    fn run_exports(&mut self, dir: &Path) -> Result<()> {
        let (x, y) = self.config.export_at.unwrap_or_else(|| {
            let [w, h] = self.panel.size();
            (w / 2.0, h / 2.0)
        });
        let options = self.panel.menu_options(Point::new(x, y), Point::default());
        let mut viewer = HtmlFileViewer::new(dir);

        for option in options {
            debug!("Running menu option '{}'", option.content);
            let outcome = match option.action {
                MenuAction::SaveWorkflow { filename } => {
                    let mut node = self.record.clone();
                    self.panel.to_record().write_into(&mut node);
                    let graph = json!({ "nodes": [Value::Object(node)] });
                    ActionOutcome::Saved(export::save_workflow(&graph, dir, &filename)?)
                }
                MenuAction::SaveImage { slot, filename } => match self.panel.image(slot) {
                    Some(image) => ActionOutcome::Saved(export::save_image(image, dir, &filename)?),
                    None => continue,
                },
                MenuAction::OpenImage { slot, filename } => match self.panel.image(slot) {
                    Some(image) => export::open_image(&mut viewer, image, &filename)?,
                    None => continue,
                },
            };
            match outcome {
                ActionOutcome::Saved(path) | ActionOutcome::Opened(path) => {
                    info!("{}: {}", option.content, path.display())
                }
                ActionOutcome::Notice(message) => warn!("{}", message),
            }
        }
        Ok(())
    }
}

fn read_optional(path: Option<&str>) -> Result<Option<Vec<u8>>> {
    path.map(|path| fs::read(path).with_context(|| format!("Failed to read image '{}'", path)))
        .transpose()
}

fn resolution(path: Option<&str>) -> Option<String> {
    let (w, h) = image::image_dimensions(path?).ok()?;
    Some(format!("{} \u{00d7} {}", w, h))
}

fn load_record(path: &str) -> Result<Map<String, Value>> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read state '{}'", path))?;
    let value: Value =
        serde_json::from_str(&text).with_context(|| format!("Failed to parse state '{}'", path))?;
    match value {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("State file '{}' is not a JSON object: {}", path, other),
    }
}
