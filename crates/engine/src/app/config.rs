use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use super::camera::{
    CameraConfig, Resolution, CAMERA_ZOOM_MAX, CAMERA_ZOOM_MIN, CAMERA_ZOOM_STEP, SCROLL_BORDER_PX,
};
use super::geometry::Vec2;
use super::input::DEFAULT_SCROLL_SPEED_PX;
use super::map::{DEFAULT_MAP_TILES, DEFAULT_TILE_SIZE_PX};
use super::rendering::{InstanceCapacities, PipelineConfig};
use super::time::TimeConfig;

pub const DEFAULT_WATCHDOG_PERIOD_MS: u64 = 500;
/// Largest accepted map side, in tiles.
pub const MAX_MAP_TILES_PER_AXIS: u32 = 4096;

/// Per-category instance capacities as they appear in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CapacityConfig {
    pub tiles: usize,
    pub sprites: usize,
    pub selection: usize,
    pub widgets: usize,
    pub glyphs: usize,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        let defaults = InstanceCapacities::default();
        Self {
            tiles: defaults.tiles,
            sprites: defaults.sprites,
            selection: defaults.selection,
            widgets: defaults.widgets,
            glyphs: defaults.glyphs,
        }
    }
}

/// Everything tunable about a session. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameConfig {
    pub window_title: String,
    pub resolution_width: u32,
    pub resolution_height: u32,
    pub map_width_tiles: u32,
    pub map_height_tiles: u32,
    pub tile_size_px: u32,
    pub sprite_size_px: f32,
    pub widget_size_px: f32,
    pub tick_period_ms: u64,
    pub anim_period_ms: u64,
    pub fps_display_interval_ms: u64,
    pub watchdog_period_ms: u64,
    pub metrics_interval_ms: u64,
    pub entity_capacity: usize,
    pub zoom_min: f32,
    pub zoom_max: f32,
    pub zoom_step: f32,
    pub scroll_speed_px: f32,
    pub scroll_border_px: f32,
    pub minimap_size_px: u32,
    /// Draw sprites between their last two tick positions.
    pub interpolate_sprites: bool,
    pub show_stats: bool,
    pub capacities: CapacityConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            window_title: "tileclient".to_string(),
            resolution_width: 1280,
            resolution_height: 720,
            map_width_tiles: DEFAULT_MAP_TILES,
            map_height_tiles: DEFAULT_MAP_TILES,
            tile_size_px: DEFAULT_TILE_SIZE_PX,
            sprite_size_px: 32.0,
            widget_size_px: 24.0,
            tick_period_ms: 50,
            anim_period_ms: 100,
            fps_display_interval_ms: 1000,
            watchdog_period_ms: DEFAULT_WATCHDOG_PERIOD_MS,
            metrics_interval_ms: 5000,
            entity_capacity: 256,
            zoom_min: CAMERA_ZOOM_MIN,
            zoom_max: CAMERA_ZOOM_MAX,
            zoom_step: CAMERA_ZOOM_STEP,
            scroll_speed_px: DEFAULT_SCROLL_SPEED_PX,
            scroll_border_px: SCROLL_BORDER_PX,
            minimap_size_px: 160,
            interpolate_sprites: false,
            show_stats: true,
            capacities: CapacityConfig::default(),
        }
    }
}

impl GameConfig {
    /// Replaces out-of-range values with defaults, logging each correction.
    /// Returns how many fields were changed.
    pub fn normalize(&mut self) -> usize {
        let defaults = Self::default();
        let mut corrections = 0;

        let mut fix_zero_u64 = |field: &'static str, value: &mut u64, fallback: u64| {
            if *value == 0 {
                warn!(field, fallback, "config_value_replaced");
                *value = fallback;
                corrections += 1;
            }
        };
        fix_zero_u64("tick_period_ms", &mut self.tick_period_ms, defaults.tick_period_ms);
        fix_zero_u64("anim_period_ms", &mut self.anim_period_ms, defaults.anim_period_ms);
        fix_zero_u64(
            "fps_display_interval_ms",
            &mut self.fps_display_interval_ms,
            defaults.fps_display_interval_ms,
        );
        fix_zero_u64(
            "watchdog_period_ms",
            &mut self.watchdog_period_ms,
            defaults.watchdog_period_ms,
        );
        fix_zero_u64(
            "metrics_interval_ms",
            &mut self.metrics_interval_ms,
            defaults.metrics_interval_ms,
        );

        let mut fix_zero_u32 = |field: &'static str, value: &mut u32, fallback: u32| {
            if *value == 0 {
                warn!(field, fallback, "config_value_replaced");
                *value = fallback;
                corrections += 1;
            }
        };
        fix_zero_u32(
            "resolution_width",
            &mut self.resolution_width,
            defaults.resolution_width,
        );
        fix_zero_u32(
            "resolution_height",
            &mut self.resolution_height,
            defaults.resolution_height,
        );
        fix_zero_u32("map_width_tiles", &mut self.map_width_tiles, defaults.map_width_tiles);
        fix_zero_u32(
            "map_height_tiles",
            &mut self.map_height_tiles,
            defaults.map_height_tiles,
        );
        fix_zero_u32("tile_size_px", &mut self.tile_size_px, defaults.tile_size_px);
        fix_zero_u32("minimap_size_px", &mut self.minimap_size_px, defaults.minimap_size_px);

        let side_fits = |tiles: u32, tile_size: u32| {
            tiles <= MAX_MAP_TILES_PER_AXIS && tiles.checked_mul(tile_size).is_some()
        };
        if !side_fits(self.map_width_tiles, self.tile_size_px)
            || !side_fits(self.map_height_tiles, self.tile_size_px)
        {
            warn!(
                map_width_tiles = self.map_width_tiles,
                map_height_tiles = self.map_height_tiles,
                tile_size_px = self.tile_size_px,
                "config_map_size_rejected"
            );
            self.map_width_tiles = defaults.map_width_tiles;
            self.map_height_tiles = defaults.map_height_tiles;
            self.tile_size_px = defaults.tile_size_px;
            corrections += 1;
        }

        let mut fix_positive_f32 = |field: &'static str, value: &mut f32, fallback: f32| {
            if !value.is_finite() || *value <= 0.0 {
                warn!(field, fallback, "config_value_replaced");
                *value = fallback;
                corrections += 1;
            }
        };
        fix_positive_f32("sprite_size_px", &mut self.sprite_size_px, defaults.sprite_size_px);
        fix_positive_f32("widget_size_px", &mut self.widget_size_px, defaults.widget_size_px);
        fix_positive_f32("zoom_min", &mut self.zoom_min, defaults.zoom_min);
        fix_positive_f32("zoom_max", &mut self.zoom_max, defaults.zoom_max);
        fix_positive_f32(
            "scroll_speed_px",
            &mut self.scroll_speed_px,
            defaults.scroll_speed_px,
        );

        if !self.zoom_step.is_finite() || self.zoom_step <= 1.0 {
            warn!(
                field = "zoom_step",
                fallback = defaults.zoom_step,
                "config_value_replaced"
            );
            self.zoom_step = defaults.zoom_step;
            corrections += 1;
        }
        if self.zoom_min > self.zoom_max {
            warn!(
                zoom_min = self.zoom_min,
                zoom_max = self.zoom_max,
                "config_zoom_bounds_reordered"
            );
            std::mem::swap(&mut self.zoom_min, &mut self.zoom_max);
            corrections += 1;
        }
        if !self.scroll_border_px.is_finite() || self.scroll_border_px < 0.0 {
            warn!(
                field = "scroll_border_px",
                fallback = defaults.scroll_border_px,
                "config_value_replaced"
            );
            self.scroll_border_px = defaults.scroll_border_px;
            corrections += 1;
        }
        if self.entity_capacity == 0 {
            warn!(
                field = "entity_capacity",
                fallback = defaults.entity_capacity,
                "config_value_replaced"
            );
            self.entity_capacity = defaults.entity_capacity;
            corrections += 1;
        }

        corrections
    }

    pub fn time_config(&self) -> TimeConfig {
        TimeConfig {
            tick_period: Duration::from_millis(self.tick_period_ms),
            anim_period: Duration::from_millis(self.anim_period_ms),
            fps_display_interval: Duration::from_millis(self.fps_display_interval_ms),
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.resolution_width,
            height: self.resolution_height,
        }
    }

    pub fn map_size_px(&self) -> Vec2 {
        Vec2::new(
            self.map_width_tiles as f32 * self.tile_size_px as f32,
            self.map_height_tiles as f32 * self.tile_size_px as f32,
        )
    }

    pub fn camera_config(&self) -> CameraConfig {
        CameraConfig {
            resolution: self.resolution(),
            map_size_px: self.map_size_px(),
            zoom_min: self.zoom_min,
            zoom_max: self.zoom_max,
            zoom_step: self.zoom_step,
            scroll_border: self.scroll_border_px,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let capacities = self.capacities;
        PipelineConfig {
            capacities: InstanceCapacities {
                tiles: capacities.tiles,
                sprites: capacities.sprites,
                selection: capacities.selection,
                widgets: capacities.widgets,
                glyphs: capacities.glyphs,
            },
            minimap_size: self.minimap_size_px,
            map_tiles: self.map_width_tiles as usize * self.map_height_tiles as usize,
        }
    }

    pub fn watchdog_period(&self) -> Duration {
        Duration::from_millis(self.watchdog_period_ms)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }
}
