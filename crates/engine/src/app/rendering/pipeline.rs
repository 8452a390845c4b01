use tracing::{debug, info};

use super::atlas::AtlasImage;
use super::backend::{GraphicsBackend, RenderError, RenderTarget, TextureHandle};
use super::category::{CategoryRenderer, FrameData};
use super::minimap::MinimapRenderer;
use super::selection::SelectionRenderer;
use super::sprites::SpriteRenderer;
use super::text::TextRenderer;
use super::tiles::TileRenderer;
use super::widgets::WidgetRenderer;

const CLEAR_COLOR: [f32; 4] = [0.08, 0.086, 0.11, 1.0];

/// Pre-sized instance capacity per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceCapacities {
    pub tiles: usize,
    pub sprites: usize,
    pub selection: usize,
    pub widgets: usize,
    pub glyphs: usize,
}

impl Default for InstanceCapacities {
    fn default() -> Self {
        Self {
            tiles: 4096,
            sprites: 1024,
            selection: 1024,
            widgets: 64,
            glyphs: 256,
        }
    }
}

/// Source images for every texture array the categories sample.
#[derive(Debug, Clone, Copy)]
pub struct PipelineAtlases<'a> {
    pub tiles: &'a AtlasImage,
    pub sprites: &'a AtlasImage,
    pub widgets: &'a AtlasImage,
    pub glyphs: &'a AtlasImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub capacities: InstanceCapacities,
    pub minimap_size: u32,
    /// Upper bound on tile count for the minimap pass.
    pub map_tiles: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub instances: usize,
    pub uniform_written: bool,
}

/// Composes the category renderers into one frame: uniform update, per-category
/// transform rebuild, off-screen work, then a single main pass in draw order.
pub struct RenderPipeline {
    categories: Vec<Box<dyn CategoryRenderer>>,
    textures: Vec<TextureHandle>,
    uniform_revision: Option<u64>,
    disposed: bool,
}

impl std::fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPipeline")
            .field(
                "categories",
                &self.categories.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("textures", &self.textures.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl RenderPipeline {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        config: PipelineConfig,
        atlases: PipelineAtlases<'_>,
    ) -> Result<Self, RenderError> {
        let tiles_texture = backend.create_texture_array(&atlases.tiles.desc("tile_atlas"))?;
        let sprites_texture =
            backend.create_texture_array(&atlases.sprites.desc("sprite_atlas"))?;
        let widgets_texture =
            backend.create_texture_array(&atlases.widgets.desc("widget_atlas"))?;
        let glyphs_texture = backend.create_texture_array(&atlases.glyphs.desc("glyph_atlas"))?;
        let capacities = config.capacities;

        let categories: Vec<Box<dyn CategoryRenderer>> = vec![
            Box::new(TileRenderer::new(backend, tiles_texture, capacities.tiles)?),
            Box::new(SpriteRenderer::new(
                backend,
                sprites_texture,
                capacities.sprites,
            )?),
            Box::new(WidgetRenderer::new(
                backend,
                widgets_texture,
                atlases.widgets.layers,
                capacities.widgets,
            )?),
            Box::new(MinimapRenderer::new(
                backend,
                tiles_texture,
                config.minimap_size,
                config.map_tiles,
            )?),
            Box::new(SelectionRenderer::new(
                backend,
                capacities.selection,
                config.minimap_size,
            )?),
            Box::new(TextRenderer::new(backend, glyphs_texture, capacities.glyphs)?),
        ];
        info!(
            categories = categories.len(),
            minimap_size = config.minimap_size,
            "render_pipeline_ready"
        );
        Ok(Self {
            categories,
            textures: vec![tiles_texture, sprites_texture, widgets_texture, glyphs_texture],
            uniform_revision: None,
            disposed: false,
        })
    }

    pub fn render_frame(
        &mut self,
        backend: &mut dyn GraphicsBackend,
        frame: &FrameData<'_>,
    ) -> Result<RenderStats, RenderError> {
        if self.disposed {
            return Err(RenderError::PassState("render pipeline already disposed"));
        }
        let mut stats = RenderStats::default();

        let revision = frame.camera.transform_revision();
        if self.uniform_revision != Some(revision) {
            backend.write_world_uniform(frame.camera.world_uniform());
            self.uniform_revision = Some(revision);
            stats.uniform_written = true;
            debug!(revision, "world_uniform_updated");
        }

        for category in &mut self.categories {
            category.update_transform_data(frame);
        }
        for category in &mut self.categories {
            category.prepare(backend)?;
        }

        backend.begin_pass(RenderTarget::Screen, Some(CLEAR_COLOR))?;
        for category in &mut self.categories {
            if let Err(error) = category.render(backend) {
                // Close the pass so the backend is left in a usable state.
                let _ = backend.end_pass();
                return Err(error);
            }
            stats.instances += category.instance_count();
        }
        backend.end_pass()?;
        Ok(stats)
    }

    /// Per-category live instance counts, in draw order.
    pub fn instance_counts(&self) -> Vec<(&'static str, usize)> {
        self.categories
            .iter()
            .map(|category| (category.name(), category.instance_count()))
            .collect()
    }

    /// Releases category resources first, then the shared textures. Safe to call twice.
    pub fn dispose(&mut self, backend: &mut dyn GraphicsBackend) {
        if self.disposed {
            return;
        }
        for category in &mut self.categories {
            category.dispose(backend);
        }
        for texture in self.textures.drain(..) {
            backend.destroy_texture(texture);
        }
        self.disposed = true;
        info!("render_pipeline_disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
