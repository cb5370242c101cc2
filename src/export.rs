//! Context menu actions: saving or opening the hovered image and saving the
//! surrounding workflow.
//!
//! None of this composites anything; it reads the panel's current split
//! position and render rectangle to decide which image the pointer is over.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use image::{ImageOutputFormat, RgbaImage};
use log::{error, info};
use serde_json::Value;

use crate::compositor::split_px;
use crate::error::{CompareError, Result};
use crate::geometry::{Point, Rect};
use crate::loader::Slot;

pub const SAVE_WORKFLOW: &str = "Save Workflow (.json)";
pub const OPEN_IMAGE: &str = "Open Image";
pub const SAVE_IMAGE: &str = "Save Image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    SaveWorkflow { filename: String },
    OpenImage { slot: Slot, filename: String },
    SaveImage { slot: Slot, filename: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuOption {
    pub content: &'static str,
    pub action: MenuAction,
}

/// Result of running a menu action that the user should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Saved(PathBuf),
    Opened(PathBuf),
    /// The action could not be carried out; show this to the user.
    Notice(String),
}

pub fn timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn image_filename(slot: Slot, millis: i64) -> String {
    format!("image_compare_{}_{}.png", slot.label(), millis)
}

pub fn workflow_filename(millis: i64) -> String {
    format!("workflow_{}.json", millis)
}

/// Which image sits under `local` (panel coordinates).
///
/// Left of the split line is A; right of it is B when B exists.
pub fn hovered_slot(local: Point, render: &Rect, split: f32, has_b: bool) -> Option<Slot> {
    if !render.contains(local) {
        return None;
    }
    if local.x < split_px(render, split) {
        Some(Slot::A)
    } else if has_b {
        Some(Slot::B)
    } else {
        None
    }
}

/// Menu entries for a pointer at `local`, in display order.
///
/// The image entries for the hovered image come first, the workflow entry is
/// always last.
pub fn menu_options(
    local: Point,
    render: Option<Rect>,
    split: f32,
    has_b: bool,
    millis: i64,
) -> Vec<MenuOption> {
    let mut options = Vec::with_capacity(3);

    let hovered = render.and_then(|render| hovered_slot(local, &render, split, has_b));
    if let Some(slot) = hovered {
        let filename = image_filename(slot, millis);
        options.push(MenuOption {
            content: SAVE_IMAGE,
            action: MenuAction::SaveImage {
                slot,
                filename: filename.clone(),
            },
        });
        options.push(MenuOption {
            content: OPEN_IMAGE,
            action: MenuAction::OpenImage { slot, filename },
        });
    }

    options.push(MenuOption {
        content: SAVE_WORKFLOW,
        action: MenuAction::SaveWorkflow {
            filename: workflow_filename(millis),
        },
    });
    options
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageOutputFormat::Png)?;
    Ok(out.into_inner())
}

pub fn save_image(image: &RgbaImage, dir: &Path, filename: &str) -> Result<PathBuf> {
    let path = dir.join(filename);
    fs::write(&path, encode_png(image)?)?;
    info!("saved {}", path.display());
    Ok(path)
}

/// Pretty-printed dump of the externally owned workflow graph.
pub fn save_workflow(graph: &Value, dir: &Path, filename: &str) -> Result<PathBuf> {
    let path = dir.join(filename);
    fs::write(&path, serde_json::to_string_pretty(graph)?)?;
    info!("saved workflow to {}", path.display());
    Ok(path)
}

/// Somewhere a standalone image view can be opened.
pub trait ViewSink {
    fn open_view(&mut self, title: &str, html: &str) -> Result<PathBuf>;
}

/// Opens views as HTML files in a directory.
pub struct HtmlFileViewer {
    dir: PathBuf,
}

impl HtmlFileViewer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ViewSink for HtmlFileViewer {
    fn open_view(&mut self, title: &str, html: &str) -> Result<PathBuf> {
        if !self.dir.is_dir() {
            return Err(CompareError::ViewBlocked(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }
        let path = self.dir.join(format!("{title}.html"));
        fs::write(&path, html)?;
        Ok(path)
    }
}

fn viewer_html(filename: &str, png: &[u8]) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{filename}</title></head>
<body style="margin:0; background-color:#222; height:100vh; display:flex; flex-direction:column; align-items:center; justify-content:center; gap:15px; font-family:sans-serif;">
<img src="data:image/png;base64,{data}" style="max-width:90%; max-height:85vh; object-fit:contain; box-shadow:0 0 15px rgba(0,0,0,0.5);">
<div style="color:#ddd; background-color:#3c3c3c; padding:8px 12px; border-radius:5px; font-family:monospace; user-select:all;">{filename}</div>
</body>
</html>
"#,
        data = STANDARD.encode(png),
    )
}

/// Open `image` in a new view. A view that cannot be created turns into a
/// [`ActionOutcome::Notice`] rather than an error.
pub fn open_image<V: ViewSink + ?Sized>(
    viewer: &mut V,
    image: &RgbaImage,
    filename: &str,
) -> Result<ActionOutcome> {
    let html = viewer_html(filename, &encode_png(image)?);
    match viewer.open_view(filename, &html) {
        Ok(path) => {
            info!("opened {} in {}", filename, path.display());
            Ok(ActionOutcome::Opened(path))
        }
        Err(err) => {
            error!("failed to open view for {}: {}", filename, err);
            Ok(ActionOutcome::Notice(format!(
                "Could not open a new view for {filename}. Check that views may be opened here. ({err})"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render() -> Rect {
        Rect::new(10.0, 100.0, 200.0, 100.0)
    }

    #[test]
    fn test_hovered_slot() {
        assert_eq!(hovered_slot(Point::new(50.0, 150.0), &render(), 0.5, true), Some(Slot::A));
        assert_eq!(hovered_slot(Point::new(150.0, 150.0), &render(), 0.5, true), Some(Slot::B));
        assert_eq!(hovered_slot(Point::new(150.0, 150.0), &render(), 0.5, false), None);
        assert_eq!(hovered_slot(Point::new(5.0, 150.0), &render(), 0.5, true), None);
    }

    #[test]
    fn test_menu_options() {
        let options = menu_options(Point::new(0.0, 0.0), Some(render()), 0.5, true, 42);
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].content, SAVE_WORKFLOW);
        assert_eq!(
            options[0].action,
            MenuAction::SaveWorkflow {
                filename: "workflow_42.json".into()
            }
        );

        let options = menu_options(Point::new(200.0, 150.0), Some(render()), 0.5, true, 42);
        let contents: Vec<_> = options.iter().map(|o| o.content).collect();
        assert_eq!(contents, vec![SAVE_IMAGE, OPEN_IMAGE, SAVE_WORKFLOW]);
        assert_eq!(
            options[0].action,
            MenuAction::SaveImage {
                slot: Slot::B,
                filename: "image_compare_B_42.png".into()
            }
        );
    }

    #[test]
    fn test_save_image_and_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let image = RgbaImage::from_pixel(3, 2, image::Rgba([9, 8, 7, 255]));

        let path = save_image(&image, dir.path(), "a.png").unwrap();
        let reloaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(reloaded, image);

        let graph = serde_json::json!({ "nodes": [{ "id": 1 }] });
        let path = save_workflow(&graph, dir.path(), "workflow_1.json").unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), graph);
    }

    #[test]
    fn test_open_image_writes_viewer() {
        let dir = tempfile::tempdir().unwrap();
        let mut viewer = HtmlFileViewer::new(dir.path());
        let image = RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 255]));

        let outcome = open_image(&mut viewer, &image, "image_compare_A_1.png").unwrap();
        let path = match outcome {
            ActionOutcome::Opened(path) => path,
            other => panic!("expected the view to open, got {other:?}"),
        };
        let html = fs::read_to_string(path).unwrap();
        assert!(html.contains("data:image/png;base64,"));
        assert!(html.contains("image_compare_A_1.png"));
    }

    #[test]
    fn test_blocked_view_becomes_notice() {
        let dir = tempfile::tempdir().unwrap();
        let mut viewer = HtmlFileViewer::new(dir.path().join("missing"));
        let image = RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 255]));

        let outcome = open_image(&mut viewer, &image, "x.png").unwrap();
        assert!(matches!(outcome, ActionOutcome::Notice(_)));
    }
}
