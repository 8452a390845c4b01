use crate::app::geometry::Vec2;

use super::backend::{
    FragmentKind, GraphicsBackend, ProgramDesc, ProgramHandle, RenderError, TextureBinding,
    TextureHandle,
};
use super::category::{CategoryRenderer, FrameData};
use super::instance::{InstanceBuffer, InstanceRecord};

/// Frames per row inside one orientation region of the sheet.
pub const REGION_FRAME_COLUMNS: u32 = 16;
/// Orientation regions per sheet row; the sheet holds 4×4 regions.
pub const REGION_GRID: u32 = 4;
pub const SHEET_COLUMNS: u32 = REGION_FRAME_COLUMNS * REGION_GRID;
pub const SHEET_ROWS: u32 = 16;

pub const CELL_U: f32 = 1.0 / SHEET_COLUMNS as f32;
pub const CELL_V: f32 = 1.0 / SHEET_ROWS as f32;
pub const QUADRANT_U: f32 = 1.0 / REGION_GRID as f32;
pub const QUADRANT_V: f32 = 1.0 / REGION_GRID as f32;

/// Top-left UV of `frame` within the region picked by `orientation`.
pub fn sprite_uv(frame: u32, orientation: u8) -> (f32, f32) {
    let orientation = orientation as u32;
    let u = (frame % REGION_FRAME_COLUMNS) as f32 * CELL_U
        + (orientation % REGION_GRID) as f32 * QUADRANT_U;
    let v = (frame / REGION_FRAME_COLUMNS) as f32 * CELL_V
        + (orientation / REGION_GRID) as f32 * QUADRANT_V;
    (u, v)
}

/// AABB test of the sprite box `[position, position + size)` against the camera
/// rectangle. A box whose far edge lands exactly on the scroll offset is culled.
pub fn sprite_visible(position: Vec2, size: f32, scroll: Vec2, game_screen: Vec2) -> bool {
    position.x + size > scroll.x
        && position.x < scroll.x + game_screen.x
        && position.y + size > scroll.y
        && position.y < scroll.y + game_screen.y
}

fn lerp(from: Vec2, to: Vec2, t: f32) -> Vec2 {
    Vec2::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t)
}

/// Rebuilt every frame; entities move and animate continuously.
#[derive(Debug)]
pub struct SpriteRenderer {
    program: ProgramHandle,
    texture: TextureHandle,
    buffer: InstanceBuffer,
    scratch: Vec<InstanceRecord>,
}

impl SpriteRenderer {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        texture: TextureHandle,
        capacity: usize,
    ) -> Result<Self, RenderError> {
        let program = backend.create_program(&ProgramDesc {
            label: "sprites",
            fragment: FragmentKind::Textured,
        })?;
        let buffer = InstanceBuffer::new(backend, "sprite_instances", capacity)?;
        Ok(Self {
            program,
            texture,
            buffer,
            scratch: Vec::with_capacity(capacity),
        })
    }

    pub fn buffer(&self) -> &InstanceBuffer {
        &self.buffer
    }
}

impl CategoryRenderer for SpriteRenderer {
    fn name(&self) -> &'static str {
        "sprites"
    }

    fn update_transform_data(&mut self, frame: &FrameData<'_>) {
        let scroll = frame.camera.scroll_offset();
        let game_screen = frame.camera.game_screen_size();
        let map_height = frame.camera.map_size_px().y.max(1.0);
        let size = frame.sprite_size;
        let uv_size = [CELL_U, CELL_V];

        self.scratch.clear();
        for entity in frame.entities.iter_active() {
            if !sprite_visible(entity.position, size, scroll, game_screen) {
                continue;
            }
            let drawn = lerp(entity.prev_position, entity.position, frame.interpolation);
            let (u, v) = sprite_uv(entity.frame, entity.facing);
            self.scratch.push(
                InstanceRecord::textured(
                    drawn.x - scroll.x,
                    drawn.y - scroll.y,
                    size,
                    size,
                    [u, v, uv_size[0], uv_size[1]],
                    entity.kind.index() as u32,
                )
                .with_depth((entity.position.y + size) / map_height),
            );
        }
        // Lower sprites overlap the ones behind them.
        self.scratch
            .sort_by(|a, b| a.layer_depth[1].total_cmp(&b.layer_depth[1]));

        self.buffer.clear();
        for record in &self.scratch {
            self.buffer.push(*record);
        }
    }

    fn render(&mut self, backend: &mut dyn GraphicsBackend) -> Result<(), RenderError> {
        self.buffer
            .draw(backend, self.program, TextureBinding::Array(self.texture))
    }

    fn instance_count(&self) -> usize {
        self.buffer.len()
    }

    fn dispose(&mut self, backend: &mut dyn GraphicsBackend) {
        self.buffer.dispose(backend);
        backend.destroy_program(self.program);
    }
}
