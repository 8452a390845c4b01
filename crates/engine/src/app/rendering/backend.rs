use thiserror::Error;

use crate::app::camera::WorldUniform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetHandle(pub(crate) u32);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no compatible graphics context: {reason}")]
    NoContext { reason: String },
    #[error("program '{label}' failed to build:\n{log}")]
    Program { label: String, log: String },
    #[error("texture array '{label}' expects {expected} bytes of RGBA data, got {actual}")]
    TextureData {
        label: String,
        expected: usize,
        actual: usize,
    },
    #[error("instance upload of {floats} floats exceeds buffer capacity of {capacity}")]
    UploadOverflow { floats: usize, capacity: usize },
    #[error("unknown {kind} handle {id}")]
    UnknownHandle { kind: &'static str, id: u32 },
    #[error("render pass state error: {0}")]
    PassState(&'static str),
    #[error("surface error: {0}")]
    Surface(String),
}

/// How a program's fragment stage colors its quads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// Samples the bound 2D-array texture at the instance layer and multiplies by the tint.
    Textured,
    /// Tint only; any bound texture is ignored.
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramDesc<'a> {
    pub label: &'a str,
    pub fragment: FragmentKind,
}

/// `layers` square-or-not images of `width`×`height`, packed back to back as RGBA8.
#[derive(Debug, Clone, Copy)]
pub struct TextureArrayDesc<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub rgba: &'a [u8],
}

impl TextureArrayDesc<'_> {
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.layers as usize * 4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffscreenDesc<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    Screen,
    Offscreen(TargetHandle),
}

/// What a draw samples from. An off-screen target can be sampled as a one-layer array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureBinding {
    None,
    Array(TextureHandle),
    Target(TargetHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub program: ProgramHandle,
    pub instances: BufferHandle,
    pub texture: TextureBinding,
    pub instance_count: u32,
}

/// Instanced-quad graphics device.
///
/// Every program reads the same world uniform at group 0, binding 0, and
/// draws the six-vertex unit quad once per instance record.
pub trait GraphicsBackend {
    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramHandle, RenderError>;
    fn create_instance_buffer(
        &mut self,
        label: &str,
        capacity_floats: usize,
    ) -> Result<BufferHandle, RenderError>;
    /// Replaces the first `data.len()` floats of the buffer; the tail is left as is.
    fn upload_instances(&mut self, buffer: BufferHandle, data: &[f32]) -> Result<(), RenderError>;
    fn create_texture_array(
        &mut self,
        desc: &TextureArrayDesc<'_>,
    ) -> Result<TextureHandle, RenderError>;
    fn create_offscreen_target(
        &mut self,
        desc: &OffscreenDesc<'_>,
    ) -> Result<TargetHandle, RenderError>;
    fn write_world_uniform(&mut self, uniform: WorldUniform);

    fn begin_pass(&mut self, target: RenderTarget, clear: Option<[f32; 4]>)
        -> Result<(), RenderError>;
    fn draw_instanced(&mut self, call: &DrawCall) -> Result<(), RenderError>;
    fn end_pass(&mut self) -> Result<(), RenderError>;

    fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), RenderError>;

    fn destroy_program(&mut self, program: ProgramHandle);
    fn destroy_buffer(&mut self, buffer: BufferHandle);
    fn destroy_texture(&mut self, texture: TextureHandle);
    fn destroy_target(&mut self, target: TargetHandle);
}
