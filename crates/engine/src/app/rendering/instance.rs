use bytemuck::{Pod, Zeroable};
use tracing::warn;

use super::backend::{
    BufferHandle, DrawCall, GraphicsBackend, ProgramHandle, RenderError, TextureBinding,
};

/// Floats per instance record.
pub const INSTANCE_STRIDE_FLOATS: usize = 16;

/// One instanced quad: `[x, y, w, h]` in game-screen pixels, `[u, v, uw, vh]`
/// in normalized texture space, an RGBA tint and `[layer, depth, 0, 0]`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceRecord {
    pub rect: [f32; 4],
    pub uv: [f32; 4],
    pub color: [f32; 4],
    pub layer_depth: [f32; 4],
}

pub const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
pub const FULL_UV: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

impl InstanceRecord {
    pub fn textured(x: f32, y: f32, w: f32, h: f32, uv: [f32; 4], layer: u32) -> Self {
        Self {
            rect: [x, y, w, h],
            uv,
            color: WHITE,
            layer_depth: [layer as f32, 0.0, 0.0, 0.0],
        }
    }

    pub fn flat(x: f32, y: f32, w: f32, h: f32, color: [f32; 4]) -> Self {
        Self {
            rect: [x, y, w, h],
            uv: FULL_UV,
            color,
            layer_depth: [0.0; 4],
        }
    }

    pub fn with_depth(mut self, depth: f32) -> Self {
        self.layer_depth[1] = depth;
        self
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }
}

/// Pre-sized CPU-side instance storage plus its GPU buffer.
///
/// Writers clear and push records; [`InstanceBuffer::flush`] uploads exactly
/// `len * INSTANCE_STRIDE_FLOATS` floats when dirty and clears the flag.
#[derive(Debug)]
pub struct InstanceBuffer {
    label: &'static str,
    records: Vec<InstanceRecord>,
    len: usize,
    dirty: bool,
    dropped: usize,
    handle: BufferHandle,
}

impl InstanceBuffer {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        label: &'static str,
        capacity: usize,
    ) -> Result<Self, RenderError> {
        let handle = backend.create_instance_buffer(label, capacity * INSTANCE_STRIDE_FLOATS)?;
        Ok(Self {
            label,
            records: vec![InstanceRecord::zeroed(); capacity],
            len: 0,
            dirty: false,
            dropped: 0,
            handle,
        })
    }

    pub fn clear(&mut self) {
        self.len = 0;
        self.dropped = 0;
        self.dirty = true;
    }

    /// Appends a record; records past capacity are counted and dropped.
    pub fn push(&mut self, record: InstanceRecord) -> bool {
        let Some(slot) = self.records.get_mut(self.len) else {
            self.dropped += 1;
            return false;
        };
        *slot = record;
        self.len += 1;
        self.dirty = true;
        true
    }

    pub fn flush(&mut self, backend: &mut dyn GraphicsBackend) -> Result<(), RenderError> {
        if !self.dirty {
            return Ok(());
        }
        if self.dropped > 0 {
            warn!(
                buffer = self.label,
                capacity = self.records.len(),
                dropped = self.dropped,
                "instance_buffer_full"
            );
        }
        backend.upload_instances(self.handle, self.as_floats())?;
        self.dirty = false;
        Ok(())
    }

    /// Flushes if needed, then issues one instanced draw for every live record.
    pub fn draw(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        program: ProgramHandle,
        texture: TextureBinding,
    ) -> Result<(), RenderError> {
        self.flush(backend)?;
        if self.len == 0 {
            return Ok(());
        }
        backend.draw_instanced(&DrawCall {
            program,
            instances: self.handle,
            texture,
            instance_count: self.len as u32,
        })
    }

    pub fn dispose(&mut self, backend: &mut dyn GraphicsBackend) {
        backend.destroy_buffer(self.handle);
        self.len = 0;
        self.dirty = false;
    }

    /// The live region as the flat float array handed to the device.
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.records[..self.len])
    }

    pub fn records(&self) -> &[InstanceRecord] {
        &self.records[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }
}
