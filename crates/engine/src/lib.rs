use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;

pub use app::{
    cycle_animation, display_scale, facing_for_direction, glyph_layer, minimap_screen_rect,
    run_app, sprite_uv, sprite_visible, unit_behavior, AnimationCatalog, AppError, AtlasError,
    AtlasImage, BehaviorDispatcher, BehaviorFn, BehaviorState, Camera, CameraConfig, CanvasBounds,
    CapacityConfig, CursorStyle, DrawCall, EditorPalette, Entity, EntityId, EntityKind, EntityPool,
    EntityPoolError, FrameData, FrameReport, Game, GameAction, GameConfig, GraphicsBackend,
    HeadlessBackend, HeadlessUi, InputCode, InputEvent, InputMapper, InstanceRecord,
    LoopMetricsSnapshot, MapError, MapStore, Order, OrderKind, OrderQueue, PipelineAtlases,
    PointerButton, PointerInput, RecordedBuffer, RecordedPass, Rect, RenderError, RenderPipeline,
    RenderTarget, Resolution, TextLine, TileMap, TileRange, TimeConfig, TimeController, UiSurface,
    UpdateReport, Vec2, WgpuBackend, WheelInput, WidgetInstance, WorldUniform, BUTTONS_PRIMARY,
    BUTTONS_SECONDARY, CATCH_UP_TICK_PERIODS, DEFAULT_WATCHDOG_PERIOD_MS, GLYPH_LAYERS,
    INSTANCE_STRIDE_FLOATS, MOVE_MARKER_ANIMATION, ORDER_QUEUE_CAPACITY, ORIENTATION_COUNT,
};

pub const ROOT_ENV_VAR: &str = "TILECLIENT_ROOT";
pub const CONFIG_FILE_NAME: &str = "tileclient.json";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
    pub maps_dir: PathBuf,
    pub config_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create maps directory at {path}: {source}")]
    CreateMapsDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "TILECLIENT_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/tileclient\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    app_paths_for_root(root)
}

/// Lays out the directories under `root`, creating the maps directory if needed.
pub fn app_paths_for_root(root: PathBuf) -> Result<AppPaths, StartupError> {
    let assets_dir = root.join("assets");
    let maps_dir = root.join("maps");
    let config_path = root.join(CONFIG_FILE_NAME);

    fs::create_dir_all(&maps_dir).map_err(|source| StartupError::CreateMapsDir {
        path: maps_dir.clone(),
        source,
    })?;

    Ok(AppPaths {
        root,
        assets_dir,
        maps_dir,
        config_path,
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_repo_marker(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
