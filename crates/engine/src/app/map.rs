use serde_json::Value;
use thiserror::Error;

use super::geometry::{Rect, Vec2};

pub const DEFAULT_MAP_TILES: u32 = 64;
pub const DEFAULT_TILE_SIZE_PX: u32 = 32;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
    #[error("map data must be a JSON array of tile indices")]
    NotAnArray,
    #[error("tile {index} is not a valid atlas layer index: {value}")]
    InvalidTile { index: usize, value: String },
    #[error("map data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("map store failed: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// External collaborator that persists the map as a JSON array of layer indices.
pub trait MapStore {
    fn load(&mut self) -> Result<String, MapError>;
    fn save(&mut self, json: &str) -> Result<(), MapError>;
}

/// Inclusive tile-coordinate range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl TileRange {
    pub fn len(&self) -> usize {
        (self.x_max - self.x_min + 1) as usize * (self.y_max - self.y_min + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> {
        let range = *self;
        (range.y_min..=range.y_max)
            .flat_map(move |y| (range.x_min..=range.x_max).map(move |x| (x, y)))
    }
}

/// Row-major grid of tile-atlas layer indices. Tile (0,0) covers world pixels
/// `[0, tile_size)` on both axes.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMap {
    width: u32,
    height: u32,
    tile_size: u32,
    tiles: Vec<u16>,
}

impl TileMap {
    pub fn new(width: u32, height: u32, tile_size: u32, tiles: Vec<u16>) -> Result<Self, MapError> {
        let expected = width as usize * height as usize;
        if tiles.len() != expected {
            return Err(MapError::TileCountMismatch {
                expected,
                actual: tiles.len(),
            });
        }
        Ok(Self {
            width,
            height,
            tile_size: tile_size.max(1),
            tiles,
        })
    }

    pub fn filled(width: u32, height: u32, tile_size: u32, layer: u16) -> Self {
        Self {
            width,
            height,
            tile_size: tile_size.max(1),
            tiles: vec![layer; width as usize * height as usize],
        }
    }

    /// Swaps in tiles parsed from a JSON array. Any validation failure leaves
    /// the current tiles untouched.
    pub fn replace_from_json(&mut self, json: &str) -> Result<(), MapError> {
        let tiles = parse_tiles(json)?;
        self.replace_tiles(tiles)
    }

    pub fn replace_tiles(&mut self, tiles: Vec<u16>) -> Result<(), MapError> {
        let expected = self.tile_count();
        if tiles.len() != expected {
            return Err(MapError::TileCountMismatch {
                expected,
                actual: tiles.len(),
            });
        }
        self.tiles = tiles;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, MapError> {
        Ok(serde_json::to_string(&self.tiles)?)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn tile_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn tiles(&self) -> &[u16] {
        &self.tiles
    }

    pub fn pixel_size(&self) -> Vec2 {
        Vec2::new(
            self.width as f32 * self.tile_size as f32,
            self.height as f32 * self.tile_size as f32,
        )
    }

    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn tile_at(&self, x: u32, y: u32) -> Option<u16> {
        self.index_of(x, y).map(|index| self.tiles[index])
    }

    /// Returns `true` when the stored layer actually changed.
    pub fn set_tile(&mut self, x: u32, y: u32, layer: u16) -> bool {
        match self.index_of(x, y) {
            Some(index) if self.tiles[index] != layer => {
                self.tiles[index] = layer;
                true
            }
            _ => false,
        }
    }

    pub fn tile_at_world(&self, world: Vec2) -> Option<(u32, u32)> {
        if world.x < 0.0 || world.y < 0.0 {
            return None;
        }
        let x = (world.x / self.tile_size as f32).floor() as u32;
        let y = (world.y / self.tile_size as f32).floor() as u32;
        self.index_of(x, y).map(|_| (x, y))
    }

    /// Tiles overlapping `view`, clamped to the map; `None` when nothing is visible.
    pub fn visible_tile_range(&self, view: &Rect) -> Option<TileRange> {
        if self.width == 0 || self.height == 0 || view.width() <= 0.0 || view.height() <= 0.0 {
            return None;
        }
        let size = self.tile_size as f32;
        let x_min = (view.min.x / size).floor();
        let y_min = (view.min.y / size).floor();
        let x_max = (view.max.x / size).ceil() - 1.0;
        let y_max = (view.max.y / size).ceil() - 1.0;
        if x_max < 0.0 || y_max < 0.0 || x_min >= self.width as f32 || y_min >= self.height as f32 {
            return None;
        }
        Some(TileRange {
            x_min: x_min.max(0.0) as u32,
            y_min: y_min.max(0.0) as u32,
            x_max: (x_max as u32).min(self.width - 1),
            y_max: (y_max as u32).min(self.height - 1),
        })
    }
}

fn parse_tiles(json: &str) -> Result<Vec<u16>, MapError> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Array(items) = value else {
        return Err(MapError::NotAnArray);
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_u64()
                .and_then(|layer| u16::try_from(layer).ok())
                .ok_or_else(|| MapError::InvalidTile {
                    index,
                    value: item.to_string(),
                })
        })
        .collect()
}
