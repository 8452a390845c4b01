use crate::app::geometry::Vec2;
use crate::app::map::TileRange;

use super::backend::{
    FragmentKind, GraphicsBackend, ProgramDesc, ProgramHandle, RenderError, TextureBinding,
    TextureHandle,
};
use super::category::{CategoryRenderer, FrameData};
use super::instance::{InstanceBuffer, InstanceRecord, FULL_UV};

#[derive(Debug, Clone, Copy, PartialEq)]
struct TileViewKey {
    range: Option<TileRange>,
    scroll: Vec2,
    map_revision: u64,
}

/// One instance per visible tile. The buffer is rebuilt only when the visible
/// range, the scroll offset or the map contents change.
#[derive(Debug)]
pub struct TileRenderer {
    program: ProgramHandle,
    texture: TextureHandle,
    buffer: InstanceBuffer,
    last_view: Option<TileViewKey>,
    rebuilds: u64,
}

impl TileRenderer {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        texture: TextureHandle,
        capacity: usize,
    ) -> Result<Self, RenderError> {
        let program = backend.create_program(&ProgramDesc {
            label: "tiles",
            fragment: FragmentKind::Textured,
        })?;
        let buffer = InstanceBuffer::new(backend, "tile_instances", capacity)?;
        Ok(Self {
            program,
            texture,
            buffer,
            last_view: None,
            rebuilds: 0,
        })
    }

    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    pub fn buffer(&self) -> &InstanceBuffer {
        &self.buffer
    }
}

impl CategoryRenderer for TileRenderer {
    fn name(&self) -> &'static str {
        "tiles"
    }

    fn update_transform_data(&mut self, frame: &FrameData<'_>) {
        let scroll = frame.camera.scroll_offset();
        let range = frame.map.visible_tile_range(&frame.camera.view_rect());
        let key = TileViewKey {
            range,
            scroll,
            map_revision: frame.map_revision,
        };
        if self.last_view == Some(key) {
            return;
        }
        self.last_view = Some(key);
        self.rebuilds += 1;

        self.buffer.clear();
        let Some(range) = range else {
            return;
        };
        let size = frame.map.tile_size() as f32;
        for (x, y) in range.iter() {
            let Some(layer) = frame.map.tile_at(x, y) else {
                continue;
            };
            self.buffer.push(InstanceRecord::textured(
                x as f32 * size - scroll.x,
                y as f32 * size - scroll.y,
                size,
                size,
                FULL_UV,
                layer as u32,
            ));
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::camera::{Camera, CameraConfig, CanvasBounds};
    use crate::app::entity::EntityPool;
    use crate::app::map::TileMap;
    use crate::app::rendering::headless::HeadlessBackend;

    fn frame<'a>(camera: &'a Camera, map: &'a TileMap, pool: &'a EntityPool, rev: u64) -> FrameData<'a> {
        FrameData {
            camera,
            map,
            map_revision: rev,
            entities: pool,
            selected: &[],
            selection_rect: None,
            widgets: &[],
            text: &[],
            sprite_size: 32.0,
            widget_size: 16.0,
            interpolation: 0.0,
        }
    }

    #[test]
    fn visible_tiles_become_offset_instances() {
        let mut backend = HeadlessBackend::new(1280, 720);
        let mut renderer = TileRenderer::new(&mut backend, TextureHandle(7), 4096).expect("tiles");
        let mut camera = Camera::new(CameraConfig::default(), CanvasBounds::new(1280.0, 720.0));
        camera.scroll(Vec2::new(40.0, 0.0));
        let mut map = TileMap::filled(64, 64, 32, 2);
        map.set_tile(1, 0, 5);
        let pool = EntityPool::with_capacity(0);

        renderer.update_transform_data(&frame(&camera, &map, &pool, 0));

        // 1280 wide from x=40 covers columns 1..=41; 720 tall covers rows 0..=22.
        assert_eq!(renderer.instance_count(), 41 * 23);
        let first = renderer.buffer().records()[0];
        assert_eq!(first.rect, [-8.0, 0.0, 32.0, 32.0]);
        assert_eq!(first.layer_depth[0], 5.0);
    }

    #[test]
    fn unchanged_view_skips_rebuild_and_upload() {
        let mut backend = HeadlessBackend::new(1280, 720);
        let mut renderer = TileRenderer::new(&mut backend, TextureHandle(7), 4096).expect("tiles");
        let camera = Camera::new(CameraConfig::default(), CanvasBounds::new(1280.0, 720.0));
        let map = TileMap::filled(64, 64, 32, 0);
        let pool = EntityPool::with_capacity(0);

        renderer.update_transform_data(&frame(&camera, &map, &pool, 0));
        renderer.buffer.flush(&mut backend).expect("flush");
        renderer.update_transform_data(&frame(&camera, &map, &pool, 0));
        assert_eq!(renderer.rebuilds(), 1);
        assert!(!renderer.buffer().is_dirty());

        renderer.update_transform_data(&frame(&camera, &map, &pool, 1));
        assert_eq!(renderer.rebuilds(), 2);
        assert!(renderer.buffer().is_dirty());
    }
}
