use std::path::{Path, PathBuf};

use image::{ImageReader, RgbaImage};
use thiserror::Error;

use super::backend::TextureArrayDesc;

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("failed to open atlas image {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode atlas image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("atlas image is {width}x{height}, not a whole grid of {cell_width}x{cell_height} cells")]
    Grid {
        width: u32,
        height: u32,
        cell_width: u32,
        cell_height: u32,
    },
    #[error("atlas layer {index} has {actual} bytes, expected {expected}")]
    LayerSize {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("atlas needs at least one layer")]
    Empty,
}

/// CPU-side texture array: `layers` RGBA8 images of identical size, packed
/// back to back in the order they are addressed by instance layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasImage {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub rgba: Vec<u8>,
}

impl AtlasImage {
    pub fn from_layers(width: u32, height: u32, layers: Vec<Vec<u8>>) -> Result<Self, AtlasError> {
        if layers.is_empty() {
            return Err(AtlasError::Empty);
        }
        let expected = width as usize * height as usize * 4;
        let mut rgba = Vec::with_capacity(expected * layers.len());
        for (index, layer) in layers.iter().enumerate() {
            if layer.len() != expected {
                return Err(AtlasError::LayerSize {
                    index,
                    expected,
                    actual: layer.len(),
                });
            }
            rgba.extend_from_slice(layer);
        }
        Ok(Self {
            width,
            height,
            layers: layers.len() as u32,
            rgba,
        })
    }

    /// One flat-colored layer per entry of `colors`.
    pub fn solid(width: u32, height: u32, colors: &[[u8; 4]]) -> Self {
        let pixels = width as usize * height as usize;
        let rgba = colors
            .iter()
            .flat_map(|color| std::iter::repeat(*color).take(pixels).flatten())
            .collect();
        Self {
            width,
            height,
            layers: colors.len() as u32,
            rgba,
        }
    }

    /// Slices `sheet` row-major into `cell_width`×`cell_height` layers.
    pub fn from_grid(
        sheet: &RgbaImage,
        cell_width: u32,
        cell_height: u32,
    ) -> Result<Self, AtlasError> {
        let (width, height) = sheet.dimensions();
        let grid_error = || AtlasError::Grid {
            width,
            height,
            cell_width,
            cell_height,
        };
        if cell_width == 0 || cell_height == 0 || width % cell_width != 0 || height % cell_height != 0
        {
            return Err(grid_error());
        }
        let columns = width / cell_width;
        let rows = height / cell_height;
        if columns == 0 || rows == 0 {
            return Err(grid_error());
        }

        let mut layers = Vec::with_capacity((columns * rows) as usize);
        for row in 0..rows {
            for column in 0..columns {
                let cell = image::imageops::crop_imm(
                    sheet,
                    column * cell_width,
                    row * cell_height,
                    cell_width,
                    cell_height,
                )
                .to_image();
                layers.push(cell.into_raw());
            }
        }
        Self::from_layers(cell_width, cell_height, layers)
    }

    pub fn load_grid(path: &Path, cell_width: u32, cell_height: u32) -> Result<Self, AtlasError> {
        let reader = ImageReader::open(path).map_err(|source| AtlasError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let decoded = reader.decode().map_err(|source| AtlasError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_grid(&decoded.to_rgba8(), cell_width, cell_height)
    }

    pub fn desc<'a>(&'a self, label: &'a str) -> TextureArrayDesc<'a> {
        TextureArrayDesc {
            label,
            width: self.width,
            height: self.height,
            layers: self.layers,
            rgba: &self.rgba,
        }
    }
}
