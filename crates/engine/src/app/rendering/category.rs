use crate::app::camera::Camera;
use crate::app::entity::{EntityId, EntityPool};
use crate::app::geometry::{Rect, Vec2};
use crate::app::map::TileMap;

use super::backend::{GraphicsBackend, RenderError};

/// An animated world-space marker, such as the move-order flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidgetInstance {
    /// Center of the widget in world pixels.
    pub position: Vec2,
    pub frame: u32,
}

/// A line of overlay text anchored in game-screen pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub origin: Vec2,
    pub text: String,
    pub glyph_size: f32,
    pub color: [f32; 4],
}

/// Read-only view of everything a frame draws.
#[derive(Debug, Clone, Copy)]
pub struct FrameData<'a> {
    pub camera: &'a Camera,
    pub map: &'a TileMap,
    /// Bumped on every map edit or load.
    pub map_revision: u64,
    pub entities: &'a EntityPool,
    pub selected: &'a [EntityId],
    pub selection_rect: Option<Rect>,
    pub widgets: &'a [WidgetInstance],
    pub text: &'a [TextLine],
    pub sprite_size: f32,
    pub widget_size: f32,
    /// Fraction of the next simulation tick already elapsed.
    pub interpolation: f32,
}

/// One renderable category. The pipeline calls, in order,
/// `update_transform_data`, `prepare` (off-screen work, outside any pass),
/// then `render` inside the main pass.
pub trait CategoryRenderer {
    fn name(&self) -> &'static str;

    fn update_transform_data(&mut self, frame: &FrameData<'_>);

    fn prepare(&mut self, _backend: &mut dyn GraphicsBackend) -> Result<(), RenderError> {
        Ok(())
    }

    fn render(&mut self, backend: &mut dyn GraphicsBackend) -> Result<(), RenderError>;

    fn instance_count(&self) -> usize;

    /// Releases every device resource the category created.
    fn dispose(&mut self, backend: &mut dyn GraphicsBackend);
}
