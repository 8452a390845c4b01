use crate::app::geometry::Vec2;

use super::backend::{
    FragmentKind, GraphicsBackend, ProgramDesc, ProgramHandle, RenderError, TextureBinding,
    TextureHandle,
};
use super::category::{CategoryRenderer, FrameData};
use super::instance::{InstanceBuffer, InstanceRecord, FULL_UV};
use super::sprites::sprite_visible;

/// Animated world markers; each widget frame is one layer of the widget atlas.
#[derive(Debug)]
pub struct WidgetRenderer {
    program: ProgramHandle,
    texture: TextureHandle,
    layers: u32,
    buffer: InstanceBuffer,
}

impl WidgetRenderer {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        texture: TextureHandle,
        layers: u32,
        capacity: usize,
    ) -> Result<Self, RenderError> {
        let program = backend.create_program(&ProgramDesc {
            label: "widgets",
            fragment: FragmentKind::Textured,
        })?;
        let buffer = InstanceBuffer::new(backend, "widget_instances", capacity)?;
        Ok(Self {
            program,
            texture,
            layers: layers.max(1),
            buffer,
        })
    }

    pub fn buffer(&self) -> &InstanceBuffer {
        &self.buffer
    }
}

impl CategoryRenderer for WidgetRenderer {
    fn name(&self) -> &'static str {
        "widgets"
    }

    fn update_transform_data(&mut self, frame: &FrameData<'_>) {
        let scroll = frame.camera.scroll_offset();
        let game_screen = frame.camera.game_screen_size();
        let size = frame.widget_size;
        let half = size * 0.5;

        self.buffer.clear();
        for widget in frame.widgets {
            let top_left = widget.position - Vec2::new(half, half);
            if !sprite_visible(top_left, size, scroll, game_screen) {
                continue;
            }
            self.buffer.push(InstanceRecord::textured(
                top_left.x - scroll.x,
                top_left.y - scroll.y,
                size,
                size,
                FULL_UV,
                widget.frame % self.layers,
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
    use crate::app::rendering::category::WidgetInstance;
    use crate::app::rendering::headless::HeadlessBackend;
    use crate::app::rendering::TextureHandle;

    const WIDGET_SIZE: f32 = 24.0;

    fn rebuild(renderer: &mut WidgetRenderer, camera: &Camera, widgets: &[WidgetInstance]) {
        let map = TileMap::filled(64, 64, 32, 0);
        let pool = EntityPool::with_capacity(1);
        renderer.update_transform_data(&FrameData {
            camera,
            map: &map,
            map_revision: 0,
            entities: &pool,
            selected: &[],
            selection_rect: None,
            widgets,
            text: &[],
            sprite_size: 32.0,
            widget_size: WIDGET_SIZE,
            interpolation: 1.0,
        });
    }

    fn renderer(backend: &mut HeadlessBackend, layers: u32) -> WidgetRenderer {
        WidgetRenderer::new(backend, TextureHandle(7), layers, 4).expect("renderer")
    }

    #[test]
    fn marker_is_centered_on_its_point_with_frame_layer() {
        let mut backend = HeadlessBackend::new(1280, 720);
        let mut renderer = renderer(&mut backend, 4);
        let mut camera = Camera::new(CameraConfig::default(), CanvasBounds::new(1280.0, 720.0));
        camera.scroll(Vec2::new(40.0, 0.0));

        rebuild(
            &mut renderer,
            &camera,
            &[WidgetInstance {
                position: Vec2::new(300.0, 200.0),
                frame: 2,
            }],
        );

        assert_eq!(renderer.instance_count(), 1);
        let record = renderer.buffer().records()[0];
        assert_eq!(record.rect, [248.0, 188.0, WIDGET_SIZE, WIDGET_SIZE]);
        assert_eq!(record.uv, FULL_UV);
        assert_eq!(record.layer_depth[0], 2.0);
    }

    #[test]
    fn frames_past_the_atlas_wrap_onto_existing_layers() {
        let mut backend = HeadlessBackend::new(1280, 720);
        let mut renderer = renderer(&mut backend, 4);
        let camera = Camera::new(CameraConfig::default(), CanvasBounds::new(1280.0, 720.0));

        let layers: Vec<f32> = (0..6)
            .map(|frame| {
                rebuild(
                    &mut renderer,
                    &camera,
                    &[WidgetInstance {
                        position: Vec2::new(100.0, 100.0),
                        frame,
                    }],
                );
                renderer.buffer().records()[0].layer_depth[0]
            })
            .collect();
        assert_eq!(layers, vec![0.0, 1.0, 2.0, 3.0, 0.0, 1.0]);
    }

    #[test]
    fn off_screen_markers_are_culled_and_cleared() {
        let mut backend = HeadlessBackend::new(1280, 720);
        let mut renderer = renderer(&mut backend, 4);
        let camera = Camera::new(CameraConfig::default(), CanvasBounds::new(1280.0, 720.0));
        let on_screen = WidgetInstance {
            position: Vec2::new(100.0, 100.0),
            frame: 0,
        };
        let off_screen = WidgetInstance {
            position: Vec2::new(1900.0, 100.0),
            frame: 0,
        };

        rebuild(&mut renderer, &camera, &[on_screen, off_screen]);
        assert_eq!(renderer.instance_count(), 1);

        rebuild(&mut renderer, &camera, &[]);
        assert_eq!(renderer.instance_count(), 0);
    }
}
