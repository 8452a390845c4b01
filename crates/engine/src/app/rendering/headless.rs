use std::collections::BTreeMap;

use crate::app::camera::WorldUniform;

use super::backend::{
    BufferHandle, DrawCall, FragmentKind, GraphicsBackend, OffscreenDesc, ProgramDesc,
    ProgramHandle, RenderError, RenderTarget, TargetHandle, TextureArrayDesc, TextureBinding,
    TextureHandle,
};
use super::instance::INSTANCE_STRIDE_FLOATS;

#[derive(Debug, Clone)]
pub struct RecordedProgram {
    pub label: String,
    pub fragment: FragmentKind,
}

#[derive(Debug, Clone)]
pub struct RecordedBuffer {
    pub label: String,
    pub capacity_floats: usize,
    pub data: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedTexture {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPass {
    pub target: RenderTarget,
    pub clear: Option<[f32; 4]>,
    pub draws: Vec<DrawCall>,
}

/// Deterministic in-memory device. Records every upload, uniform write and
/// draw so tests and headless runs can inspect exactly what a frame did.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u32,
    surface: (u32, u32),
    programs: BTreeMap<ProgramHandle, RecordedProgram>,
    buffers: BTreeMap<BufferHandle, RecordedBuffer>,
    textures: BTreeMap<TextureHandle, RecordedTexture>,
    targets: BTreeMap<TargetHandle, RecordedTexture>,
    uploads: Vec<(BufferHandle, Vec<f32>)>,
    uniforms: Vec<WorldUniform>,
    passes: Vec<RecordedPass>,
    open_pass: Option<RecordedPass>,
    failing_program: Option<(String, String)>,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: (width, height),
            ..Self::default()
        }
    }

    /// Makes the next `create_program` with this label fail with `log`.
    pub fn fail_program(mut self, label: &str, log: &str) -> Self {
        self.failing_program = Some((label.to_string(), log.to_string()));
        self
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn uploads(&self) -> &[(BufferHandle, Vec<f32>)] {
        &self.uploads
    }

    pub fn uploads_for(&self, buffer: BufferHandle) -> Vec<&[f32]> {
        self.uploads
            .iter()
            .filter(|(handle, _)| *handle == buffer)
            .map(|(_, data)| data.as_slice())
            .collect()
    }

    pub fn buffer(&self, buffer: BufferHandle) -> Option<&RecordedBuffer> {
        self.buffers.get(&buffer)
    }

    pub fn buffer_by_label(&self, label: &str) -> Option<(BufferHandle, &RecordedBuffer)> {
        self.buffers
            .iter()
            .find(|(_, buffer)| buffer.label == label)
            .map(|(handle, buffer)| (*handle, buffer))
    }

    pub fn program_label(&self, program: ProgramHandle) -> Option<&str> {
        self.programs.get(&program).map(|p| p.label.as_str())
    }

    pub fn world_uniforms(&self) -> &[WorldUniform] {
        &self.uniforms
    }

    pub fn passes(&self) -> &[RecordedPass] {
        &self.passes
    }

    pub fn draws(&self) -> Vec<&DrawCall> {
        self.passes.iter().flat_map(|pass| pass.draws.iter()).collect()
    }

    /// Forgets recorded passes, uploads and uniform writes; live resources stay.
    pub fn clear_log(&mut self) {
        self.uploads.clear();
        self.uniforms.clear();
        self.passes.clear();
    }

    pub fn live_resource_count(&self) -> usize {
        self.programs.len() + self.buffers.len() + self.textures.len() + self.targets.len()
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.surface
    }

    fn unknown(kind: &'static str, id: u32) -> RenderError {
        RenderError::UnknownHandle { kind, id }
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramHandle, RenderError> {
        if let Some((label, log)) = &self.failing_program {
            if label == desc.label {
                return Err(RenderError::Program {
                    label: label.clone(),
                    log: log.clone(),
                });
            }
        }
        let handle = ProgramHandle(self.next_id());
        self.programs.insert(
            handle,
            RecordedProgram {
                label: desc.label.to_string(),
                fragment: desc.fragment,
            },
        );
        Ok(handle)
    }

    fn create_instance_buffer(
        &mut self,
        label: &str,
        capacity_floats: usize,
    ) -> Result<BufferHandle, RenderError> {
        let handle = BufferHandle(self.next_id());
        self.buffers.insert(
            handle,
            RecordedBuffer {
                label: label.to_string(),
                capacity_floats,
                data: vec![0.0; capacity_floats],
            },
        );
        Ok(handle)
    }

    fn upload_instances(&mut self, buffer: BufferHandle, data: &[f32]) -> Result<(), RenderError> {
        let recorded = self
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| Self::unknown("buffer", buffer.0))?;
        if data.len() > recorded.capacity_floats {
            return Err(RenderError::UploadOverflow {
                floats: data.len(),
                capacity: recorded.capacity_floats,
            });
        }
        recorded.data[..data.len()].copy_from_slice(data);
        self.uploads.push((buffer, data.to_vec()));
        Ok(())
    }

    fn create_texture_array(
        &mut self,
        desc: &TextureArrayDesc<'_>,
    ) -> Result<TextureHandle, RenderError> {
        if desc.rgba.len() != desc.expected_len() {
            return Err(RenderError::TextureData {
                label: desc.label.to_string(),
                expected: desc.expected_len(),
                actual: desc.rgba.len(),
            });
        }
        let handle = TextureHandle(self.next_id());
        self.textures.insert(
            handle,
            RecordedTexture {
                width: desc.width,
                height: desc.height,
                layers: desc.layers,
            },
        );
        Ok(handle)
    }

    fn create_offscreen_target(
        &mut self,
        desc: &OffscreenDesc<'_>,
    ) -> Result<TargetHandle, RenderError> {
        let handle = TargetHandle(self.next_id());
        self.targets.insert(
            handle,
            RecordedTexture {
                width: desc.width,
                height: desc.height,
                layers: 1,
            },
        );
        Ok(handle)
    }

    fn write_world_uniform(&mut self, uniform: WorldUniform) {
        self.uniforms.push(uniform);
    }

    fn begin_pass(
        &mut self,
        target: RenderTarget,
        clear: Option<[f32; 4]>,
    ) -> Result<(), RenderError> {
        if self.open_pass.is_some() {
            return Err(RenderError::PassState("pass already open"));
        }
        if let RenderTarget::Offscreen(handle) = target {
            if !self.targets.contains_key(&handle) {
                return Err(Self::unknown("target", handle.0));
            }
        }
        self.open_pass = Some(RecordedPass {
            target,
            clear,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn draw_instanced(&mut self, call: &DrawCall) -> Result<(), RenderError> {
        if !self.programs.contains_key(&call.program) {
            return Err(Self::unknown("program", call.program.0));
        }
        let buffer = self
            .buffers
            .get(&call.instances)
            .ok_or_else(|| Self::unknown("buffer", call.instances.0))?;
        let floats = call.instance_count as usize * INSTANCE_STRIDE_FLOATS;
        if floats > buffer.capacity_floats {
            return Err(RenderError::UploadOverflow {
                floats,
                capacity: buffer.capacity_floats,
            });
        }
        match call.texture {
            TextureBinding::Array(handle) if !self.textures.contains_key(&handle) => {
                return Err(Self::unknown("texture", handle.0));
            }
            TextureBinding::Target(handle) if !self.targets.contains_key(&handle) => {
                return Err(Self::unknown("target", handle.0));
            }
            _ => {}
        }
        let pass = self
            .open_pass
            .as_mut()
            .ok_or(RenderError::PassState("draw outside of a pass"))?;
        pass.draws.push(*call);
        Ok(())
    }

    fn end_pass(&mut self) -> Result<(), RenderError> {
        let pass = self
            .open_pass
            .take()
            .ok_or(RenderError::PassState("no pass to end"))?;
        self.passes.push(pass);
        Ok(())
    }

    fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.surface = (width, height);
        Ok(())
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
    }

    fn destroy_target(&mut self, target: TargetHandle) {
        self.targets.remove(&target);
    }
}
