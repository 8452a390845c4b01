use tracing::debug;

use crate::app::camera::Camera;
use crate::app::geometry::{Rect, Vec2};

use super::backend::{
    FragmentKind, GraphicsBackend, OffscreenDesc, ProgramDesc, ProgramHandle, RenderError,
    RenderTarget, TargetHandle, TextureBinding, TextureHandle,
};
use super::category::{CategoryRenderer, FrameData};
use super::instance::{InstanceBuffer, InstanceRecord, FULL_UV};

pub const MINIMAP_MARGIN_PX: f32 = 8.0;
const MINIMAP_CLEAR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Game-screen pixels per display pixel at the current zoom.
pub fn display_scale(camera: &Camera) -> f32 {
    let width = camera.resolution().width.max(1) as f32;
    camera.game_screen_size().x / width
}

/// Where the minimap is composited, in game-screen pixels. The box keeps a
/// constant on-display size and hugs the top-right corner.
pub fn minimap_screen_rect(camera: &Camera, size_px: u32) -> Rect {
    let scale = display_scale(camera);
    let size = size_px as f32 * scale;
    let margin = MINIMAP_MARGIN_PX * scale;
    let game = camera.game_screen_size();
    Rect::from_origin_size(
        Vec2::new(game.x - margin - size, margin),
        Vec2::new(size, size),
    )
}

/// Scaled-down tile pass into an off-screen target, redrawn only when flagged,
/// then composited as a single instance in the main pass.
///
/// The off-screen pass shares the world uniform with every other program, so
/// its instance coordinates are pre-scaled by `game_screen / minimap_size`.
#[derive(Debug)]
pub struct MinimapRenderer {
    tile_program: ProgramHandle,
    composite_program: ProgramHandle,
    tiles_texture: TextureHandle,
    target: TargetHandle,
    size: u32,
    tiles: InstanceBuffer,
    composite: InstanceBuffer,
    needs_update: bool,
    pass_pending: bool,
    last_map_revision: Option<u64>,
    last_transform_revision: Option<u64>,
    redraws: u64,
}

impl MinimapRenderer {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        tiles_texture: TextureHandle,
        size: u32,
        tile_capacity: usize,
    ) -> Result<Self, RenderError> {
        let size = size.max(1);
        let tile_program = backend.create_program(&ProgramDesc {
            label: "minimap_tiles",
            fragment: FragmentKind::Textured,
        })?;
        let composite_program = backend.create_program(&ProgramDesc {
            label: "minimap_composite",
            fragment: FragmentKind::Textured,
        })?;
        let target = backend.create_offscreen_target(&OffscreenDesc {
            label: "minimap_target",
            width: size,
            height: size,
        })?;
        let tiles = InstanceBuffer::new(backend, "minimap_tile_instances", tile_capacity)?;
        let composite = InstanceBuffer::new(backend, "minimap_composite_instance", 1)?;
        Ok(Self {
            tile_program,
            composite_program,
            tiles_texture,
            target,
            size,
            tiles,
            composite,
            needs_update: true,
            pass_pending: false,
            last_map_revision: None,
            last_transform_revision: None,
            redraws: 0,
        })
    }

    pub fn mark_needs_update(&mut self) {
        self.needs_update = true;
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    pub fn redraws(&self) -> u64 {
        self.redraws
    }

    pub fn target(&self) -> TargetHandle {
        self.target
    }

    fn rebuild_tiles(&mut self, frame: &FrameData<'_>) {
        let map = frame.map;
        let game = frame.camera.game_screen_size();
        let size = self.size as f32;
        let prescale = Vec2::new(game.x / size, game.y / size);
        let cell = Vec2::new(
            size / map.width().max(1) as f32,
            size / map.height().max(1) as f32,
        );

        self.tiles.clear();
        for (index, layer) in map.tiles().iter().enumerate() {
            let x = (index % map.width().max(1) as usize) as f32;
            let y = (index / map.width().max(1) as usize) as f32;
            self.tiles.push(InstanceRecord::textured(
                x * cell.x * prescale.x,
                y * cell.y * prescale.y,
                cell.x * prescale.x,
                cell.y * prescale.y,
                FULL_UV,
                *layer as u32,
            ));
        }
    }
}

impl CategoryRenderer for MinimapRenderer {
    fn name(&self) -> &'static str {
        "minimap"
    }

    fn update_transform_data(&mut self, frame: &FrameData<'_>) {
        let transform_revision = frame.camera.transform_revision();
        if self.last_map_revision != Some(frame.map_revision)
            || self.last_transform_revision != Some(transform_revision)
        {
            self.needs_update = true;
        }
        self.last_map_revision = Some(frame.map_revision);
        self.last_transform_revision = Some(transform_revision);

        if self.needs_update {
            self.rebuild_tiles(frame);
            self.pass_pending = true;
        }

        let rect = minimap_screen_rect(frame.camera, self.size);
        let record = InstanceRecord::textured(
            rect.min.x,
            rect.min.y,
            rect.width(),
            rect.height(),
            FULL_UV,
            0,
        );
        if self.composite.records().first() != Some(&record) {
            self.composite.clear();
            self.composite.push(record);
        }
    }

    fn prepare(&mut self, backend: &mut dyn GraphicsBackend) -> Result<(), RenderError> {
        if !self.pass_pending {
            return Ok(());
        }
        backend.begin_pass(RenderTarget::Offscreen(self.target), Some(MINIMAP_CLEAR))?;
        self.tiles.draw(
            backend,
            self.tile_program,
            TextureBinding::Array(self.tiles_texture),
        )?;
        backend.end_pass()?;
        self.pass_pending = false;
        self.needs_update = false;
        self.redraws += 1;
        debug!(tiles = self.tiles.len(), "minimap_redrawn");
        Ok(())
    }

    fn render(&mut self, backend: &mut dyn GraphicsBackend) -> Result<(), RenderError> {
        self.composite.draw(
            backend,
            self.composite_program,
            TextureBinding::Target(self.target),
        )
    }

    fn instance_count(&self) -> usize {
        self.composite.len()
    }

    fn dispose(&mut self, backend: &mut dyn GraphicsBackend) {
        self.tiles.dispose(backend);
        self.composite.dispose(backend);
        backend.destroy_target(self.target);
        backend.destroy_program(self.tile_program);
        backend.destroy_program(self.composite_program);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::camera::{CameraConfig, CanvasBounds};

    #[test]
    fn minimap_rect_is_constant_on_display() {
        let mut camera = Camera::new(CameraConfig::default(), CanvasBounds::new(1280.0, 720.0));
        let at_one = minimap_screen_rect(&camera, 128);
        assert_eq!(at_one.min, Vec2::new(1280.0 - 8.0 - 128.0, 8.0));
        assert_eq!(at_one.width(), 128.0);

        camera.set_zoom(2.0, camera.canvas());
        let at_two = minimap_screen_rect(&camera, 128);
        assert_eq!(at_two.width(), 64.0);
        assert_eq!(at_two.min, Vec2::new(640.0 - 4.0 - 64.0, 4.0));
    }
}
