use crate::app::geometry::{Rect, Vec2};

use super::backend::{
    FragmentKind, GraphicsBackend, ProgramDesc, ProgramHandle, RenderError, TextureBinding,
};
use super::category::{CategoryRenderer, FrameData};
use super::instance::{InstanceBuffer, InstanceRecord};
use super::minimap::{display_scale, minimap_screen_rect};

const DRAG_COLOR: [f32; 4] = [0.35, 1.0, 0.35, 1.0];
const SELECTED_COLOR: [f32; 4] = [0.3, 0.85, 1.0, 1.0];
const VIEWPORT_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 0.9];

/// Pushes the four edges of `rect` as flat quads of the given thickness.
pub fn push_outline(buffer: &mut InstanceBuffer, rect: Rect, thickness: f32, color: [f32; 4]) {
    let (w, h) = (rect.width(), rect.height());
    let t = thickness.min(w * 0.5).min(h * 0.5).max(0.0);
    if t == 0.0 {
        return;
    }
    let Vec2 { x, y } = rect.min;
    buffer.push(InstanceRecord::flat(x, y, w, t, color));
    buffer.push(InstanceRecord::flat(x, y + h - t, w, t, color));
    buffer.push(InstanceRecord::flat(x, y + t, t, h - 2.0 * t, color));
    buffer.push(InstanceRecord::flat(x + w - t, y + t, t, h - 2.0 * t, color));
}

/// Drag rectangle, boxes around selected entities and the minimap viewport
/// outline. Rebuilt every frame from the transient draw lists.
#[derive(Debug)]
pub struct SelectionRenderer {
    program: ProgramHandle,
    buffer: InstanceBuffer,
    minimap_size: u32,
}

impl SelectionRenderer {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        capacity: usize,
        minimap_size: u32,
    ) -> Result<Self, RenderError> {
        let program = backend.create_program(&ProgramDesc {
            label: "selection",
            fragment: FragmentKind::Flat,
        })?;
        let buffer = InstanceBuffer::new(backend, "selection_instances", capacity)?;
        Ok(Self {
            program,
            buffer,
            minimap_size,
        })
    }

    pub fn buffer(&self) -> &InstanceBuffer {
        &self.buffer
    }
}

impl CategoryRenderer for SelectionRenderer {
    fn name(&self) -> &'static str {
        "selection"
    }

    fn update_transform_data(&mut self, frame: &FrameData<'_>) {
        let camera = frame.camera;
        let scroll = camera.scroll_offset();
        let thickness = display_scale(camera);
        let to_screen = |rect: Rect| Rect::from_corners(rect.min - scroll, rect.max - scroll);

        self.buffer.clear();
        if let Some(drag) = frame.selection_rect {
            push_outline(&mut self.buffer, to_screen(drag), thickness, DRAG_COLOR);
        }

        let view = camera.view_rect();
        let size = Vec2::new(frame.sprite_size, frame.sprite_size);
        for id in frame.selected {
            let Some(entity) = frame.entities.get(*id) else {
                continue;
            };
            let bounds = Rect::from_origin_size(entity.position, size);
            if bounds.intersects(&view) {
                push_outline(&mut self.buffer, to_screen(bounds), thickness, SELECTED_COLOR);
            }
        }

        if self.minimap_size > 0 {
            let minimap = minimap_screen_rect(camera, self.minimap_size);
            let map_px = camera.map_size_px();
            if map_px.x > 0.0 && map_px.y > 0.0 {
                let scale = Vec2::new(minimap.width() / map_px.x, minimap.height() / map_px.y);
                let project = |p: Vec2| {
                    Vec2::new(
                        (minimap.min.x + p.x * scale.x).clamp(minimap.min.x, minimap.max.x),
                        (minimap.min.y + p.y * scale.y).clamp(minimap.min.y, minimap.max.y),
                    )
                };
                let outline = Rect::from_corners(project(view.min), project(view.max));
                push_outline(&mut self.buffer, outline, thickness, VIEWPORT_COLOR);
            }
        }
    }

    fn render(&mut self, backend: &mut dyn GraphicsBackend) -> Result<(), RenderError> {
        self.buffer.draw(backend, self.program, TextureBinding::None)
    }

    fn instance_count(&self) -> usize {
        self.buffer.len()
    }

    fn dispose(&mut self, backend: &mut dyn GraphicsBackend) {
        self.buffer.dispose(backend);
        backend.destroy_program(self.program);
    }
}
