mod atlas;
mod backend;
mod category;
mod headless;
mod instance;
mod minimap;
mod pipeline;
mod selection;
mod sprites;
mod text;
mod tiles;
mod wgpu_backend;
mod widgets;

pub use atlas::{AtlasError, AtlasImage};
pub use backend::{
    BufferHandle, DrawCall, FragmentKind, GraphicsBackend, OffscreenDesc, ProgramDesc,
    ProgramHandle, RenderError, RenderTarget, TargetHandle, TextureArrayDesc, TextureBinding,
    TextureHandle,
};
pub use category::{CategoryRenderer, FrameData, TextLine, WidgetInstance};
pub use headless::{HeadlessBackend, RecordedBuffer, RecordedPass, RecordedProgram, RecordedTexture};
pub use instance::{InstanceBuffer, InstanceRecord, INSTANCE_STRIDE_FLOATS};
pub use minimap::{display_scale, minimap_screen_rect};
pub use pipeline::{InstanceCapacities, PipelineAtlases, PipelineConfig, RenderPipeline, RenderStats};
pub use sprites::{
    sprite_uv, sprite_visible, CELL_U, CELL_V, QUADRANT_U, QUADRANT_V, SHEET_COLUMNS, SHEET_ROWS,
};
pub use text::{glyph_layer, GLYPH_LAYERS};
pub use wgpu_backend::WgpuBackend;
