use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tileclient_engine::{
    resolve_app_paths, AnimationCatalog, AppPaths, AtlasError, GameConfig, StartupError,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::assets::ClientAtlases;
use super::map_files::JsonMapStore;

const MAP_FILE_NAME: &str = "map.json";
const ANIMATIONS_FILE_NAME: &str = "animations.json";
const DEFAULT_HEADLESS_FRAMES: u32 = 600;

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid {path} at {field}: {source}")]
    Parse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Atlas(#[from] AtlasError),
    #[error("invalid --headless frame count {0:?}")]
    HeadlessFrames(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunMode {
    Windowed,
    Headless { frames: u32 },
}

pub(crate) struct AppWiring {
    pub(crate) mode: RunMode,
    pub(crate) config: GameConfig,
    pub(crate) atlases: ClientAtlases,
    pub(crate) animations: AnimationCatalog,
    pub(crate) store: JsonMapStore,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== tileclient startup ===");

    let mode = parse_run_mode(std::env::args().skip(1))?;
    let paths = resolve_app_paths()?;
    info!(
        root = %paths.root.display(),
        assets_dir = %paths.assets_dir.display(),
        maps_dir = %paths.maps_dir.display(),
        ?mode,
        "startup"
    );

    let config = load_config(&paths.config_path)?;
    let atlases = ClientAtlases::load(&paths.assets_dir, config.tile_size_px)?;
    let animations = load_animations(&paths.assets_dir.join(ANIMATIONS_FILE_NAME))?;
    let store = JsonMapStore::new(map_path(&paths));
    info!(map_file = %store.path().display(), "map_store_ready");

    Ok(AppWiring {
        mode,
        config,
        atlases,
        animations,
        store,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn map_path(paths: &AppPaths) -> PathBuf {
    paths.maps_dir.join(MAP_FILE_NAME)
}

fn parse_run_mode(mut args: impl Iterator<Item = String>) -> Result<RunMode, BootstrapError> {
    let mut mode = RunMode::Windowed;
    while let Some(arg) = args.next() {
        if arg != "--headless" {
            continue;
        }
        let frames = match args.next() {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| BootstrapError::HeadlessFrames(raw))?,
            None => DEFAULT_HEADLESS_FRAMES,
        };
        mode = RunMode::Headless { frames };
    }
    Ok(mode)
}

/// Reads `path` if it exists; a missing file means defaults. The result is
/// always normalized.
pub(crate) fn load_config(path: &Path) -> Result<GameConfig, ConfigError> {
    let mut config = match fs::read_to_string(path) {
        Ok(raw) => parse_json(path, &raw)?,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "config_missing_using_defaults");
            GameConfig::default()
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    config.normalize();
    Ok(config)
}

/// Built-in sequences overlaid with `path` when it exists.
pub(crate) fn load_animations(path: &Path) -> Result<AnimationCatalog, ConfigError> {
    let mut catalog = AnimationCatalog::default();
    match fs::read_to_string(path) {
        Ok(raw) => {
            let loaded: AnimationCatalog = parse_json(path, &raw)?;
            info!(path = %path.display(), labels = loaded.len(), "animations_loaded");
            catalog.merge(loaded);
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    }
    Ok(catalog)
}

fn parse_json<T: DeserializeOwned>(path: &Path, raw: &str) -> Result<T, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, T>(&mut deserializer).map_err(|error| {
        let field = error.path().to_string();
        ConfigError::Parse {
            path: path.to_path_buf(),
            field,
            source: error.into_inner(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> impl Iterator<Item = String> {
        raw.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn run_mode_defaults_to_windowed() {
        assert_eq!(parse_run_mode(args(&[])).expect("mode"), RunMode::Windowed);
    }

    #[test]
    fn headless_flag_takes_optional_frame_count() {
        assert_eq!(
            parse_run_mode(args(&["--headless", "30"])).expect("mode"),
            RunMode::Headless { frames: 30 }
        );
        assert_eq!(
            parse_run_mode(args(&["--headless"])).expect("mode"),
            RunMode::Headless {
                frames: DEFAULT_HEADLESS_FRAMES
            }
        );
        assert!(matches!(
            parse_run_mode(args(&["--headless", "lots"])),
            Err(BootstrapError::HeadlessFrames(_))
        ));
    }

    #[test]
    fn missing_config_file_means_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config(&dir.path().join("tileclient.json")).expect("config");
        assert_eq!(config, GameConfig::default());
    }

    #[test]
    fn config_errors_name_the_field() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tileclient.json");
        fs::write(&path, r#"{ "capacities": { "tiles": "many" } }"#).expect("write");
        let error = load_config(&path).unwrap_err();
        match &error {
            ConfigError::Parse { field, .. } => assert_eq!(field, "capacities.tiles"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(error.to_string().contains("capacities.tiles"));
    }

    #[test]
    fn animations_file_overlays_builtin_sequences() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(ANIMATIONS_FILE_NAME);
        assert_eq!(
            load_animations(&path).expect("defaults"),
            AnimationCatalog::default()
        );

        fs::write(&path, r#"{ "pulse": [0, 1, 0] }"#).expect("write");
        let catalog = load_animations(&path).expect("catalog");
        assert_eq!(catalog.get("pulse"), Some(&[0, 1, 0][..]));
        assert!(catalog.get(tileclient_engine::MOVE_MARKER_ANIMATION).is_some());

        fs::write(&path, r#"{ "pulse": [0, -1] }"#).expect("write");
        match load_animations(&path).unwrap_err() {
            ConfigError::Parse { field, .. } => assert_eq!(field, "pulse[1]"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn loaded_config_is_normalized() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tileclient.json");
        fs::write(&path, r#"{ "tick_period_ms": 0, "zoom_min": 4.0, "zoom_max": 1.0 }"#)
            .expect("write");
        let config = load_config(&path).expect("config");
        assert_eq!(config.tick_period_ms, GameConfig::default().tick_period_ms);
        assert_eq!((config.zoom_min, config.zoom_max), (1.0, 4.0));
    }
}
