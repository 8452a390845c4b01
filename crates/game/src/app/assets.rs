use std::f32::consts::TAU;
use std::path::Path;

use tileclient_engine::{
    AtlasError, AtlasImage, EntityKind, PipelineAtlases, GLYPH_LAYERS, ORIENTATION_COUNT,
};
use tracing::info;

const TILE_TEXTURE_PX: u32 = 32;
const SPRITE_CELL_PX: u32 = 8;
const SHEET_COLUMNS: u32 = 64;
const SHEET_ROWS: u32 = 16;
const REGION_COLUMNS: u32 = 16;
const REGION_ROWS: u32 = 4;
const WIDGET_PX: u32 = 16;
const WIDGET_FRAMES: u32 = 4;
const GLYPH_PX: u32 = 16;
const GLYPH_SCALE: u32 = 3;

const TERRAIN_COLORS: [[u8; 3]; 8] = [
    [58, 112, 52],
    [84, 138, 60],
    [132, 116, 72],
    [170, 156, 110],
    [44, 86, 140],
    [96, 96, 104],
    [30, 70, 40],
    [190, 190, 196],
];

const KIND_COLORS: [[u8; 3]; 3] = [[220, 200, 70], [170, 90, 60], [120, 200, 230]];

/// 3×5 bitmaps, one byte per row, bit 2 is the leftmost column.
const FONT_3X5: &[(char, [u8; 5])] = &[
    ('0', [7, 5, 5, 5, 7]),
    ('1', [2, 6, 2, 2, 7]),
    ('2', [7, 1, 7, 4, 7]),
    ('3', [7, 1, 7, 1, 7]),
    ('4', [5, 5, 7, 1, 1]),
    ('5', [7, 4, 7, 1, 7]),
    ('6', [7, 4, 7, 5, 7]),
    ('7', [7, 1, 1, 1, 1]),
    ('8', [7, 5, 7, 5, 7]),
    ('9', [7, 5, 7, 1, 7]),
    ('A', [2, 5, 7, 5, 5]),
    ('B', [6, 5, 6, 5, 6]),
    ('C', [3, 4, 4, 4, 3]),
    ('D', [6, 5, 5, 5, 6]),
    ('E', [7, 4, 6, 4, 7]),
    ('F', [7, 4, 6, 4, 4]),
    ('G', [3, 4, 5, 5, 3]),
    ('H', [5, 5, 7, 5, 5]),
    ('I', [7, 2, 2, 2, 7]),
    ('J', [1, 1, 1, 5, 2]),
    ('K', [5, 5, 6, 5, 5]),
    ('L', [4, 4, 4, 4, 7]),
    ('M', [5, 7, 7, 5, 5]),
    ('N', [6, 5, 5, 5, 5]),
    ('O', [2, 5, 5, 5, 2]),
    ('P', [6, 5, 6, 4, 4]),
    ('Q', [2, 5, 5, 6, 3]),
    ('R', [6, 5, 6, 5, 5]),
    ('S', [3, 4, 2, 1, 6]),
    ('T', [7, 2, 2, 2, 2]),
    ('U', [5, 5, 5, 5, 7]),
    ('V', [5, 5, 5, 5, 2]),
    ('W', [5, 5, 7, 7, 5]),
    ('X', [5, 5, 2, 5, 5]),
    ('Y', [5, 5, 2, 2, 2]),
    ('Z', [7, 1, 2, 4, 7]),
    ('/', [1, 1, 2, 4, 4]),
    (':', [0, 2, 0, 2, 0]),
    ('.', [0, 0, 0, 0, 2]),
    ('-', [0, 0, 7, 0, 0]),
    ('?', [7, 1, 2, 0, 2]),
];

/// The four texture arrays the render pipeline samples.
#[derive(Debug, Clone)]
pub(crate) struct ClientAtlases {
    pub(crate) tiles: AtlasImage,
    pub(crate) sprites: AtlasImage,
    pub(crate) widgets: AtlasImage,
    pub(crate) glyphs: AtlasImage,
}

impl ClientAtlases {
    /// Loads each atlas from `assets_dir` when its PNG exists and generates it
    /// otherwise. A PNG that exists but does not decode is an error.
    pub(crate) fn load(assets_dir: &Path, tile_size_px: u32) -> Result<Self, AtlasError> {
        let tiles = load_or(assets_dir, "tiles.png", tile_size_px, tile_size_px, || {
            tile_atlas(TILE_TEXTURE_PX)
        })?;
        // One full sprite sheet per entity kind, stacked vertically.
        let sprites = load_or(
            assets_dir,
            "sprites.png",
            SHEET_COLUMNS * SPRITE_CELL_PX,
            SHEET_ROWS * SPRITE_CELL_PX,
            sprite_atlas,
        )?;
        let widgets = load_or(assets_dir, "widgets.png", WIDGET_PX, WIDGET_PX, widget_atlas)?;
        let glyphs = load_or(assets_dir, "font.png", GLYPH_PX, GLYPH_PX, glyph_atlas)?;
        Ok(Self {
            tiles,
            sprites,
            widgets,
            glyphs,
        })
    }

    pub(crate) fn generated() -> Self {
        Self {
            tiles: tile_atlas(TILE_TEXTURE_PX),
            sprites: sprite_atlas(),
            widgets: widget_atlas(),
            glyphs: glyph_atlas(),
        }
    }

    pub(crate) fn pipeline(&self) -> PipelineAtlases<'_> {
        PipelineAtlases {
            tiles: &self.tiles,
            sprites: &self.sprites,
            widgets: &self.widgets,
            glyphs: &self.glyphs,
        }
    }
}

fn load_or(
    assets_dir: &Path,
    file_name: &str,
    cell_width: u32,
    cell_height: u32,
    generate: impl FnOnce() -> AtlasImage,
) -> Result<AtlasImage, AtlasError> {
    let path = assets_dir.join(file_name);
    if path.is_file() {
        let atlas = AtlasImage::load_grid(&path, cell_width, cell_height)?;
        info!(path = %path.display(), layers = atlas.layers, "atlas_loaded");
        return Ok(atlas);
    }
    let atlas = generate();
    info!(atlas = file_name, layers = atlas.layers, "atlas_generated");
    Ok(atlas)
}

struct Canvas {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Canvas {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rgba: vec![0; (width * height * 4) as usize],
        }
    }

    fn put(&mut self, x: u32, y: u32, color: [u8; 4]) {
        if x < self.width && y < self.height {
            let offset = ((y * self.width + x) * 4) as usize;
            self.rgba[offset..offset + 4].copy_from_slice(&color);
        }
    }
}

fn shade(color: [u8; 3], amount: i32) -> [u8; 4] {
    let channel = |value: u8| (i32::from(value) + amount).clamp(0, 255) as u8;
    [channel(color[0]), channel(color[1]), channel(color[2]), 255]
}

fn speckle(x: u32, y: u32, seed: u32) -> i32 {
    let hash = x
        .wrapping_mul(73_856_093)
        ^ y.wrapping_mul(19_349_663)
        ^ seed.wrapping_mul(83_492_791);
    (hash % 17) as i32 - 8
}

fn tile_atlas(size: u32) -> AtlasImage {
    let layers = TERRAIN_COLORS
        .iter()
        .enumerate()
        .map(|(index, color)| {
            let mut canvas = Canvas::new(size, size);
            for y in 0..size {
                for x in 0..size {
                    let edge = x == 0 || y == 0;
                    let amount = speckle(x, y, index as u32) - if edge { 18 } else { 0 };
                    canvas.put(x, y, shade(*color, amount));
                }
            }
            canvas.rgba
        })
        .collect();
    generated(size, size, layers)
}

/// Every cell is a disc in the kind's color with a notch pointing along the
/// cell's orientation; brightness pulses with the frame index.
fn sprite_atlas() -> AtlasImage {
    let width = SHEET_COLUMNS * SPRITE_CELL_PX;
    let height = SHEET_ROWS * SPRITE_CELL_PX;
    let layers = EntityKind::ALL
        .iter()
        .map(|kind| {
            let color = KIND_COLORS[kind.index()];
            let mut canvas = Canvas::new(width, height);
            for row in 0..SHEET_ROWS {
                for column in 0..SHEET_COLUMNS {
                    let orientation = (row / REGION_ROWS) * 4 + column / REGION_COLUMNS;
                    let frame = (row % REGION_ROWS) * REGION_COLUMNS + column % REGION_COLUMNS;
                    draw_sprite_cell(
                        &mut canvas,
                        column * SPRITE_CELL_PX,
                        row * SPRITE_CELL_PX,
                        color,
                        orientation,
                        frame,
                    );
                }
            }
            canvas.rgba
        })
        .collect();
    generated(width, height, layers)
}

fn draw_sprite_cell(
    canvas: &mut Canvas,
    origin_x: u32,
    origin_y: u32,
    color: [u8; 3],
    orientation: u32,
    frame: u32,
) {
    let half = SPRITE_CELL_PX as f32 / 2.0;
    let radius = half - 1.0;
    let pulse = (frame % 4) as i32 * 12 - 18;
    for y in 0..SPRITE_CELL_PX {
        for x in 0..SPRITE_CELL_PX {
            let dx = x as f32 + 0.5 - half;
            let dy = y as f32 + 0.5 - half;
            if dx * dx + dy * dy <= radius * radius {
                canvas.put(origin_x + x, origin_y + y, shade(color, pulse));
            }
        }
    }
    let angle = orientation as f32 * TAU / f32::from(ORIENTATION_COUNT);
    let notch_x = (half + angle.cos() * (radius - 0.5)).floor() as u32;
    let notch_y = (half + angle.sin() * (radius - 0.5)).floor() as u32;
    canvas.put(
        origin_x + notch_x.min(SPRITE_CELL_PX - 1),
        origin_y + notch_y.min(SPRITE_CELL_PX - 1),
        [30, 30, 30, 255],
    );
}

/// Expanding ring, one frame per layer.
fn widget_atlas() -> AtlasImage {
    let half = WIDGET_PX as f32 / 2.0;
    let layers = (0..WIDGET_FRAMES)
        .map(|frame| {
            let mut canvas = Canvas::new(WIDGET_PX, WIDGET_PX);
            let ring = 2.5 + frame as f32 * 1.5;
            for y in 0..WIDGET_PX {
                for x in 0..WIDGET_PX {
                    let dx = x as f32 + 0.5 - half;
                    let dy = y as f32 + 0.5 - half;
                    let distance = (dx * dx + dy * dy).sqrt();
                    if (distance - ring).abs() < 0.9 {
                        canvas.put(x, y, [250, 230, 80, 255]);
                    }
                }
            }
            canvas.rgba
        })
        .collect();
    generated(WIDGET_PX, WIDGET_PX, layers)
}

fn glyph_bitmap(ch: char) -> Option<[u8; 5]> {
    let upper = ch.to_ascii_uppercase();
    FONT_3X5
        .iter()
        .find(|(glyph, _)| *glyph == upper)
        .map(|(_, rows)| *rows)
}

/// Printable ASCII from space, one glyph per layer. Characters without a
/// bitmap draw as `?`; space stays blank.
fn glyph_atlas() -> AtlasImage {
    let fallback = glyph_bitmap('?').unwrap_or([0; 5]);
    let offset_x = (GLYPH_PX - 3 * GLYPH_SCALE) / 2;
    let layers = (0..GLYPH_LAYERS)
        .map(|layer| {
            let mut canvas = Canvas::new(GLYPH_PX, GLYPH_PX);
            let ch = char::from(b' ' + layer as u8);
            if ch != ' ' {
                let rows = glyph_bitmap(ch).unwrap_or(fallback);
                for (row, bits) in rows.iter().enumerate() {
                    for column in 0..3u32 {
                        if bits & (4 >> column) == 0 {
                            continue;
                        }
                        for sy in 0..GLYPH_SCALE {
                            for sx in 0..GLYPH_SCALE {
                                canvas.put(
                                    offset_x + column * GLYPH_SCALE + sx,
                                    row as u32 * GLYPH_SCALE + sy,
                                    [255, 255, 255, 255],
                                );
                            }
                        }
                    }
                }
            }
            canvas.rgba
        })
        .collect();
    generated(GLYPH_PX, GLYPH_PX, layers)
}

fn generated(width: u32, height: u32, layers: Vec<Vec<u8>>) -> AtlasImage {
    let layer_count = layers.len() as u32;
    let rgba: Vec<u8> = layers.into_iter().flatten().collect();
    AtlasImage {
        width,
        height,
        layers: layer_count,
        rgba,
    }
}
