mod animation;
mod behavior;
mod camera;
mod config;
mod entity;
mod game;
mod geometry;
mod input;
mod loop_runner;
mod map;
mod metrics;
mod rendering;
mod time;
mod ui;

pub use animation::{AnimationCatalog, MOVE_MARKER_ANIMATION};
pub use behavior::{
    cycle_animation, facing_for_direction, unit_behavior, BehaviorDispatcher, BehaviorFn,
    ANIMATION_FRAMES_PER_CYCLE, UNIT_SPEED_PX_PER_TICK,
};
pub use camera::{
    Camera, CameraConfig, CanvasBounds, Resolution, WorldUniform, CAMERA_ZOOM_MAX,
    CAMERA_ZOOM_MIN, CAMERA_ZOOM_STEP, SCROLL_BORDER_PX,
};
pub use config::{CapacityConfig, GameConfig, DEFAULT_WATCHDOG_PERIOD_MS, MAX_MAP_TILES_PER_AXIS};
pub use entity::{
    BehaviorState, Entity, EntityId, EntityKind, EntityPool, EntityPoolError, Order, OrderKind,
    OrderQueue, OrderQueueFull, ENTITY_KIND_COUNT, ORDER_QUEUE_CAPACITY, ORIENTATION_COUNT,
};
pub use game::{FrameReport, Game, UpdateReport, MOVE_MARKER_LIFETIME_STEPS};
pub use geometry::{Rect, Vec2};
pub use input::{
    GameAction, InputCode, InputEvent, InputMapper, KeyStates, PointerButton, PointerInput,
    WheelInput, BUTTONS_PRIMARY, BUTTONS_SECONDARY, DEFAULT_SCROLL_SPEED_PX,
};
pub use loop_runner::{run_app, AppError, EditorPalette};
pub use map::{MapError, MapStore, TileMap, TileRange, DEFAULT_MAP_TILES, DEFAULT_TILE_SIZE_PX};
pub use metrics::LoopMetricsSnapshot;
pub use rendering::{
    display_scale, glyph_layer, minimap_screen_rect, sprite_uv, sprite_visible, AtlasError,
    AtlasImage, BufferHandle, CategoryRenderer, DrawCall, FragmentKind, FrameData,
    GraphicsBackend, HeadlessBackend, InstanceBuffer, InstanceCapacities, InstanceRecord,
    OffscreenDesc, PipelineAtlases, PipelineConfig, ProgramDesc, ProgramHandle, RecordedBuffer,
    RecordedPass, RecordedProgram, RecordedTexture,
    RenderError, RenderPipeline, RenderStats, RenderTarget, TargetHandle, TextLine,
    TextureArrayDesc, TextureBinding, TextureHandle, WgpuBackend, WidgetInstance, CELL_U,
    CELL_V, GLYPH_LAYERS, INSTANCE_STRIDE_FLOATS, QUADRANT_U, QUADRANT_V, SHEET_COLUMNS,
    SHEET_ROWS,
};
pub use time::{TimeConfig, TimeController, CATCH_UP_TICK_PERIODS};
pub use ui::{CursorStyle, HeadlessUi, UiSurface};
