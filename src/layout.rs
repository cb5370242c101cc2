//! Panel sizing: aspect-driven autosize and the manual-resize lock.

use log::{debug, info};

use crate::config::LayoutConfig;

#[derive(Debug, Clone)]
pub struct PanelLayout {
    config: LayoutConfig,
    size: [f32; 2],
    manually_resized: bool,
}

impl PanelLayout {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            size: config.initial_size,
            config,
            manually_resized: false,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn size(&self) -> [f32; 2] {
        self.size
    }

    pub fn is_manually_resized(&self) -> bool {
        self.manually_resized
    }

    pub fn set_manually_resized(&mut self, value: bool) {
        self.manually_resized = value;
    }

    /// Fit the panel to an image of the given intrinsic size.
    ///
    /// Returns whether the panel was resized. A set manual-resize lock or a
    /// missing or degenerate image leaves everything alone.
    pub fn autosize(&mut self, natural_size: Option<(u32, u32)>) -> bool {
        if self.manually_resized {
            debug!("autosize skipped, panel was resized by hand");
            return false;
        }
        let Some((w, h)) = natural_size else {
            return false;
        };
        if w == 0 || h == 0 {
            return false;
        }

        let aspect = w as f32 / h as f32;
        let cfg = &self.config;
        let draw_height = (cfg.base_width - cfg.padding * 2.0) / aspect;
        let height = (draw_height + cfg.header_height + cfg.padding).max(cfg.min_height);

        self.size = [cfg.base_width, height];
        info!("autosized panel to {}x{:.1} for {}x{} image", cfg.base_width, height, w, h);
        true
    }

    /// A resize performed by the user. Locks out autosize from now on.
    pub fn user_resize(&mut self, size: [f32; 2]) {
        self.manually_resized = true;
        self.size = [size[0], size[1].max(self.config.min_height)];
        debug!("user resized panel to {:?}", self.size);
    }

    /// Clear the lock and refit to `natural_size` if given.
    pub fn reset(&mut self, natural_size: Option<(u32, u32)>) {
        self.manually_resized = false;
        self.autosize(natural_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autosize_square_image() {
        let mut layout = PanelLayout::new(LayoutConfig::default());
        assert!(layout.autosize(Some((512, 512))));
        // 280 drawable + 100 header + 10 padding
        assert_eq!(layout.size(), [300.0, 390.0]);
    }

    #[test]
    fn test_autosize_respects_min_height() {
        let mut layout = PanelLayout::new(LayoutConfig::default());
        layout.autosize(Some((1000, 100)));
        assert_eq!(layout.size(), [300.0, 300.0]);
    }

    #[test]
    fn test_manual_resize_locks_autosize() {
        let mut layout = PanelLayout::new(LayoutConfig::default());
        layout.user_resize([500.0, 120.0]);
        assert!(layout.is_manually_resized());
        assert_eq!(layout.size(), [500.0, 300.0]);

        for dims in [(10, 10), (1920, 1080), (1, 4000)] {
            assert!(!layout.autosize(Some(dims)));
            assert_eq!(layout.size(), [500.0, 300.0]);
        }
    }

    #[test]
    fn test_reset_clears_lock_and_refits() {
        let mut layout = PanelLayout::new(LayoutConfig::default());
        layout.user_resize([800.0, 800.0]);
        layout.reset(Some((280, 140)));
        assert!(!layout.is_manually_resized());
        assert_eq!(layout.size(), [300.0, 300.0]);

        layout.reset(Some((140, 280)));
        assert_eq!(layout.size(), [300.0, 670.0]);
    }

    #[test]
    fn test_autosize_without_image_is_noop() {
        let mut layout = PanelLayout::new(LayoutConfig::default());
        assert!(!layout.autosize(None));
        assert_eq!(layout.size(), [320.0, 440.0]);
    }

    #[test]
    fn test_injected_layout() {
        let config = LayoutConfig {
            padding: 0.0,
            header_height: 0.0,
            min_height: 10.0,
            base_width: 100.0,
            ..LayoutConfig::default()
        };
        let mut layout = PanelLayout::new(config);
        layout.autosize(Some((200, 100)));
        assert_eq!(layout.size(), [100.0, 50.0]);
    }
}
