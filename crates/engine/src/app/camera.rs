use super::geometry::{Rect, Vec2};

pub const CAMERA_ZOOM_DEFAULT: f32 = 1.0;
pub const CAMERA_ZOOM_MIN: f32 = 0.5;
pub const CAMERA_ZOOM_MAX: f32 = 2.0;
pub const CAMERA_ZOOM_STEP: f32 = 1.1;
pub const SCROLL_BORDER_PX: f32 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Size of the surface the game is presented on, in the same units as pointer
/// client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasBounds {
    pub width: f32,
    pub height: f32,
}

impl CanvasBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraConfig {
    pub resolution: Resolution,
    pub map_size_px: Vec2,
    pub zoom_min: f32,
    pub zoom_max: f32,
    pub zoom_step: f32,
    pub scroll_border: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution {
                width: 1280,
                height: 720,
            },
            map_size_px: Vec2::new(2048.0, 2048.0),
            zoom_min: CAMERA_ZOOM_MIN,
            zoom_max: CAMERA_ZOOM_MAX,
            zoom_step: CAMERA_ZOOM_STEP,
            scroll_border: SCROLL_BORDER_PX,
        }
    }
}

/// The two floats every render program reads to map game-screen pixels to NDC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldUniform {
    pub inv_half_width: f32,
    pub neg_inv_half_height: f32,
}

/// Zoom, scroll and the transform constants derived from them.
///
/// Every mutator ends in [`Camera::recompute`], so derived values are never
/// stale and the scroll offset always sits inside the map.
#[derive(Debug, Clone)]
pub struct Camera {
    zoom: f32,
    zoom_min: f32,
    zoom_max: f32,
    zoom_step: f32,
    scroll: Vec2,
    resolution: Resolution,
    map_size_px: Vec2,
    scroll_border: f32,
    canvas: CanvasBounds,
    game_screen: Vec2,
    scroll_edge: Vec2,
    max_scroll: Vec2,
    display_ratio: Vec2,
    transform_revision: u64,
}

impl Camera {
    pub fn new(config: CameraConfig, canvas: CanvasBounds) -> Self {
        let (zoom_min, zoom_max) = ordered_bounds(config.zoom_min, config.zoom_max);
        let zoom_step = if config.zoom_step.is_finite() && config.zoom_step > 1.0 {
            config.zoom_step
        } else {
            CAMERA_ZOOM_STEP
        };
        let mut camera = Self {
            zoom: CAMERA_ZOOM_DEFAULT.clamp(zoom_min, zoom_max),
            zoom_min,
            zoom_max,
            zoom_step,
            scroll: Vec2::ZERO,
            resolution: config.resolution,
            map_size_px: config.map_size_px,
            scroll_border: config.scroll_border.max(0.0),
            canvas,
            game_screen: Vec2::ZERO,
            scroll_edge: Vec2::ZERO,
            max_scroll: Vec2::ZERO,
            display_ratio: Vec2::new(1.0, 1.0),
            transform_revision: 0,
        };
        camera.recompute(canvas);
        camera
    }

    pub fn set_resolution(&mut self, resolution: Resolution, canvas: CanvasBounds) {
        self.resolution = resolution;
        self.recompute(canvas);
    }

    pub fn set_zoom(&mut self, zoom: f32, canvas: CanvasBounds) {
        self.zoom = self.clamp_zoom(zoom);
        self.recompute(canvas);
    }

    pub fn zoom_in(&mut self, canvas: CanvasBounds) {
        self.set_zoom(self.zoom * self.zoom_step, canvas);
    }

    pub fn zoom_out(&mut self, canvas: CanvasBounds) {
        self.set_zoom(self.zoom / self.zoom_step, canvas);
    }

    pub fn set_map_size(&mut self, map_size_px: Vec2, canvas: CanvasBounds) {
        self.map_size_px = map_size_px;
        self.recompute(canvas);
    }

    pub fn recompute(&mut self, canvas: CanvasBounds) {
        self.canvas = canvas;
        let game_screen = Vec2::new(
            (self.resolution.width as f32 / self.zoom).floor().max(1.0),
            (self.resolution.height as f32 / self.zoom).floor().max(1.0),
        );
        if game_screen != self.game_screen {
            self.transform_revision = self.transform_revision.wrapping_add(1);
        }
        self.game_screen = game_screen;
        self.scroll_edge = Vec2::new(
            game_screen.x - self.scroll_border,
            game_screen.y - self.scroll_border,
        );
        self.max_scroll = Vec2::new(
            self.map_size_px.x - game_screen.x + 1.0,
            self.map_size_px.y - game_screen.y + 1.0,
        );
        self.display_ratio = Vec2::new(
            game_screen.x / positive_or_one(canvas.width),
            game_screen.y / positive_or_one(canvas.height),
        );
        self.clamp_scroll();
    }

    /// Applies one simulation step's worth of net scroll velocity.
    pub fn scroll(&mut self, velocity: Vec2) {
        self.scroll = self.scroll + velocity;
        self.clamp_scroll();
    }

    /// Moves the camera so `world` sits in the middle of the view, clamped to the map.
    pub fn center_on(&mut self, world: Vec2) {
        self.scroll = Vec2::new(
            world.x - self.game_screen.x * 0.5,
            world.y - self.game_screen.y * 0.5,
        );
        self.clamp_scroll();
    }

    fn clamp_scroll(&mut self) {
        self.scroll = Vec2::new(
            clamp_axis(self.scroll.x, self.max_scroll.x),
            clamp_axis(self.scroll.y, self.max_scroll.y),
        );
    }

    fn clamp_zoom(&self, zoom: f32) -> f32 {
        if !zoom.is_finite() {
            return CAMERA_ZOOM_DEFAULT.clamp(self.zoom_min, self.zoom_max);
        }
        zoom.clamp(self.zoom_min, self.zoom_max)
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn scroll_offset(&self) -> Vec2 {
        self.scroll
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn canvas(&self) -> CanvasBounds {
        self.canvas
    }

    pub fn game_screen_size(&self) -> Vec2 {
        self.game_screen
    }

    pub fn scroll_edge(&self) -> Vec2 {
        self.scroll_edge
    }

    pub fn scroll_border(&self) -> f32 {
        self.scroll_border
    }

    /// Upper scroll bound per axis; may be negative when the map is smaller than the view.
    pub fn max_scroll(&self) -> Vec2 {
        self.max_scroll
    }

    pub fn display_ratio(&self) -> Vec2 {
        self.display_ratio
    }

    pub fn map_size_px(&self) -> Vec2 {
        self.map_size_px
    }

    /// Bumped whenever the game-screen size changes.
    pub fn transform_revision(&self) -> u64 {
        self.transform_revision
    }

    /// World-space rectangle currently on screen.
    pub fn view_rect(&self) -> Rect {
        Rect::from_origin_size(self.scroll, self.game_screen)
    }

    pub fn world_uniform(&self) -> WorldUniform {
        WorldUniform {
            inv_half_width: 2.0 / self.game_screen.x,
            neg_inv_half_height: -2.0 / self.game_screen.y,
        }
    }
}

fn clamp_axis(value: f32, max: f32) -> f32 {
    if !value.is_finite() {
        return 0.0;
    }
    value.clamp(0.0, max.max(0.0))
}

fn positive_or_one(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        1.0
    }
}

fn ordered_bounds(a: f32, b: f32) -> (f32, f32) {
    let a = if a.is_finite() && a > 0.0 { a } else { CAMERA_ZOOM_MIN };
    let b = if b.is_finite() && b > 0.0 { b } else { CAMERA_ZOOM_MAX };
    (a.min(b), a.max(b))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn canvas() -> CanvasBounds {
        CanvasBounds::new(1280.0, 720.0)
    }

    fn camera() -> Camera {
        Camera::new(CameraConfig::default(), canvas())
    }

    #[test]
    fn recompute_derives_screen_edges_and_ratio() {
        let mut cam = camera();
        cam.set_zoom(2.0, CanvasBounds::new(640.0, 360.0));

        assert_eq!(cam.game_screen_size(), Vec2::new(640.0, 360.0));
        assert_eq!(cam.scroll_edge(), Vec2::new(624.0, 344.0));
        assert_eq!(cam.max_scroll(), Vec2::new(1409.0, 1689.0));
        assert_eq!(cam.display_ratio(), Vec2::new(1.0, 1.0));
    }

    #[test]
    fn zoom_steps_are_multiplicative_and_clamped() {
        let mut cam = camera();
        cam.zoom_in(canvas());
        assert!((cam.zoom() - 1.1).abs() < 1e-6);

        for _ in 0..20 {
            cam.zoom_in(canvas());
        }
        assert_eq!(cam.zoom(), CAMERA_ZOOM_MAX);

        for _ in 0..40 {
            cam.zoom_out(canvas());
        }
        assert_eq!(cam.zoom(), CAMERA_ZOOM_MIN);
    }

    #[test]
    fn scroll_clamps_to_map_bounds() {
        let mut cam = camera();
        cam.scroll(Vec2::new(-50.0, -50.0));
        assert_eq!(cam.scroll_offset(), Vec2::ZERO);

        cam.scroll(Vec2::new(10_000.0, 10_000.0));
        assert_eq!(cam.scroll_offset(), cam.max_scroll());
    }

    #[test]
    fn zoom_out_pulls_scroll_back_inside_the_map() {
        let mut cam = camera();
        cam.set_zoom(2.0, canvas());
        cam.scroll(Vec2::new(10_000.0, 10_000.0));
        cam.set_zoom(0.5, canvas());

        let max = cam.max_scroll();
        assert_eq!(cam.scroll_offset(), Vec2::new(max.x.max(0.0), max.y.max(0.0)));
    }

    #[test]
    fn small_map_pins_scroll_at_origin() {
        let config = CameraConfig {
            map_size_px: Vec2::new(320.0, 200.0),
            ..CameraConfig::default()
        };
        let mut cam = Camera::new(config, canvas());
        cam.scroll(Vec2::new(40.0, 40.0));
        assert_eq!(cam.scroll_offset(), Vec2::ZERO);
    }

    #[test]
    fn world_uniform_is_inverse_half_screen() {
        let cam = camera();
        let uniform = cam.world_uniform();
        assert!((uniform.inv_half_width - 1.0 / 640.0).abs() < 1e-9);
        assert!((uniform.neg_inv_half_height + 1.0 / 360.0).abs() < 1e-9);
    }

    #[test]
    fn transform_revision_changes_only_with_screen_size() {
        let mut cam = camera();
        let start = cam.transform_revision();
        cam.recompute(CanvasBounds::new(800.0, 600.0));
        assert_eq!(cam.transform_revision(), start);
        cam.zoom_in(canvas());
        assert_ne!(cam.transform_revision(), start);
    }

    #[test]
    fn non_finite_zoom_resets_to_default() {
        let mut cam = camera();
        cam.set_zoom(f32::NAN, canvas());
        assert_eq!(cam.zoom(), CAMERA_ZOOM_DEFAULT);
    }

    proptest! {
        #[test]
        fn scroll_stays_inside_bounds_after_recompute(
            zoom in CAMERA_ZOOM_MIN..=CAMERA_ZOOM_MAX,
            sx in -5_000.0f32..5_000.0,
            sy in -5_000.0f32..5_000.0,
            canvas_w in 1.0f32..4_000.0,
            canvas_h in 1.0f32..4_000.0,
        ) {
            let mut cam = camera();
            cam.scroll(Vec2::new(sx, sy));
            cam.set_zoom(zoom, CanvasBounds::new(canvas_w, canvas_h));
            cam.recompute(CanvasBounds::new(canvas_w, canvas_h));

            let scroll = cam.scroll_offset();
            let max = cam.max_scroll();
            prop_assert!(scroll.x >= 0.0 && scroll.x <= max.x.max(0.0));
            prop_assert!(scroll.y >= 0.0 && scroll.y <= max.y.max(0.0));
        }
    }
}
