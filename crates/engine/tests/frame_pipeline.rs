use std::time::Duration;

use tileclient_engine::{
    AtlasImage, CanvasBounds, EntityKind, Game, GameConfig, HeadlessBackend, HeadlessUi,
    InputCode, InputEvent, MapError, MapStore, Order, PipelineAtlases, PointerButton,
    PointerInput, RenderTarget, Vec2, GLYPH_LAYERS, INSTANCE_STRIDE_FLOATS,
};

struct Atlases {
    tiles: AtlasImage,
    sprites: AtlasImage,
    widgets: AtlasImage,
    glyphs: AtlasImage,
}

impl Atlases {
    fn new() -> Self {
        Self {
            tiles: AtlasImage::solid(2, 2, &[[40, 120, 40, 255], [30, 30, 160, 255]]),
            sprites: AtlasImage::solid(4, 4, &[[255; 4]; 3]),
            widgets: AtlasImage::solid(2, 2, &[[255, 255, 0, 255]; 4]),
            glyphs: AtlasImage::solid(1, 1, &vec![[255; 4]; GLYPH_LAYERS as usize]),
        }
    }

    fn pipeline(&self) -> PipelineAtlases<'_> {
        PipelineAtlases {
            tiles: &self.tiles,
            sprites: &self.sprites,
            widgets: &self.widgets,
            glyphs: &self.glyphs,
        }
    }
}

#[derive(Default)]
struct MemoryStore {
    json: String,
}

impl MapStore for MemoryStore {
    fn load(&mut self) -> Result<String, MapError> {
        Ok(self.json.clone())
    }

    fn save(&mut self, json: &str) -> Result<(), MapError> {
        self.json = json.to_string();
        Ok(())
    }
}

fn game() -> Game<HeadlessBackend> {
    let atlases = Atlases::new();
    let config = GameConfig {
        resolution_width: 640,
        resolution_height: 480,
        ..GameConfig::default()
    };
    Game::new(
        config,
        HeadlessBackend::new(640, 480),
        atlases.pipeline(),
        CanvasBounds::new(640.0, 480.0),
        Duration::ZERO,
    )
    .expect("game")
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn latest_upload(game: &Game<HeadlessBackend>, label: &str) -> Vec<f32> {
    let backend = game.backend();
    let (handle, _) = backend.buffer_by_label(label).expect("buffer");
    backend
        .uploads_for(handle)
        .last()
        .map(|floats| floats.to_vec())
        .expect("upload")
}

fn offscreen_passes(game: &Game<HeadlessBackend>) -> usize {
    game.backend()
        .passes()
        .iter()
        .filter(|pass| matches!(pass.target, RenderTarget::Offscreen(_)))
        .count()
}

#[test]
fn ticks_run_before_sprites_are_uploaded() {
    let mut game = game();
    let ui = HeadlessUi::default();
    let unit = game
        .spawn(EntityKind::Unit, Vec2::new(100.0, 100.0))
        .expect("spawn");
    game.pool_mut()
        .get_mut(unit)
        .expect("unit")
        .orders
        .push(Order::move_to(Vec2::new(300.0, 100.0)))
        .expect("order");

    let report = game.frame(ms(50), &ui).expect("frame");
    assert_eq!(report.update.ticks, 1);

    let sprites = latest_upload(&game, "sprite_instances");
    assert_eq!(sprites.len(), INSTANCE_STRIDE_FLOATS);
    assert_eq!(sprites[0], 104.0);
    assert_eq!(sprites[1], 100.0);
}

#[test]
fn culled_sprites_take_no_instance_slot() {
    let mut game = game();
    let ui = HeadlessUi::default();
    game.spawn(EntityKind::Unit, Vec2::new(10.0, 10.0))
        .expect("spawn");
    game.spawn(EntityKind::Critter, Vec2::new(1000.0, 1000.0))
        .expect("spawn");

    game.frame(ms(16), &ui).expect("frame");
    let sprites = latest_upload(&game, "sprite_instances");
    assert_eq!(sprites.len(), INSTANCE_STRIDE_FLOATS);
    assert_eq!(&sprites[..2], &[10.0, 10.0]);
}

#[test]
fn world_uniform_is_rewritten_only_after_zoom() {
    let mut game = game();
    let mut ui = HeadlessUi::default();
    game.frame(ms(16), &ui).expect("frame");
    game.frame(ms(32), &ui).expect("frame");
    assert_eq!(game.backend().world_uniforms().len(), 1);

    game.handle_input(
        InputEvent::Key {
            code: InputCode::ZoomIn,
            pressed: true,
        },
        &mut ui,
    );
    let report = game.frame(ms(48), &ui).expect("frame");
    assert!(report.uniform_written);

    let uniforms = game.backend().world_uniforms();
    assert_eq!(uniforms.len(), 2);
    let game_width = game.camera().game_screen_size().x;
    assert_eq!(game_width, (640.0f32 / game.camera().zoom()).floor());
    assert!((uniforms[1].inv_half_width - 2.0 / game_width).abs() < 1e-6);
}

#[test]
fn minimap_redraws_after_map_edits_only() {
    let mut game = game();
    let mut ui = HeadlessUi::default();

    game.frame(ms(16), &ui).expect("frame");
    assert_eq!(offscreen_passes(&game), 1);

    game.backend_mut().clear_log();
    game.frame(ms(32), &ui).expect("frame");
    assert_eq!(offscreen_passes(&game), 0);

    ui.map_editor_visible = true;
    ui.selected_tile = Some(1);
    game.handle_input(
        InputEvent::PointerDown(PointerInput::at(40.0, 200.0).with_button(PointerButton::Primary)),
        &mut ui,
    );
    game.backend_mut().clear_log();
    game.frame(ms(48), &ui).expect("frame");
    assert_eq!(game.map().tile_at(1, 6), Some(1));
    assert_eq!(offscreen_passes(&game), 1);

    let mut store = MemoryStore {
        json: "[0, 1, 2]".to_string(),
    };
    assert!(game.load_map(&mut store).is_err());
    game.backend_mut().clear_log();
    game.frame(ms(64), &ui).expect("frame");
    assert_eq!(offscreen_passes(&game), 0);
}

#[test]
fn minimap_redraws_once_per_zoom_step() {
    let mut game = game();
    let mut ui = HeadlessUi::default();
    game.frame(ms(16), &ui).expect("frame");

    let zoom_in = |pressed| InputEvent::Key {
        code: InputCode::ZoomIn,
        pressed,
    };
    game.handle_input(zoom_in(true), &mut ui);
    game.backend_mut().clear_log();
    game.frame(ms(32), &ui).expect("frame");
    assert_eq!(offscreen_passes(&game), 1);

    game.backend_mut().clear_log();
    game.frame(ms(48), &ui).expect("frame");
    assert_eq!(offscreen_passes(&game), 0);

    // A zoom that hits the clamp leaves the game screen unchanged.
    game.handle_input(zoom_in(false), &mut ui);
    game.camera_mut().set_zoom(2.0, CanvasBounds::new(640.0, 480.0));
    game.frame(ms(64), &ui).expect("frame");
    game.handle_input(zoom_in(true), &mut ui);
    game.backend_mut().clear_log();
    game.frame(ms(80), &ui).expect("frame");
    assert_eq!(offscreen_passes(&game), 0);
}

#[test]
fn map_load_accepts_only_full_grids() {
    let mut game = game();
    let tile_count = game.map().tile_count();
    let revision = game.map_revision();

    let short = vec!["1"; tile_count - 1].join(",");
    let mut store = MemoryStore {
        json: format!("[{short}]"),
    };
    assert!(matches!(
        game.load_map(&mut store),
        Err(MapError::TileCountMismatch { .. })
    ));
    assert_eq!(game.map_revision(), revision);
    assert!(game.map().tiles().iter().all(|&tile| tile == 0));

    let full = vec!["1"; tile_count].join(",");
    store.json = format!("[{full}]");
    game.load_map(&mut store).expect("load");
    assert_eq!(game.map_revision(), revision + 1);
    assert!(game.map().tiles().iter().all(|&tile| tile == 1));

    let mut saved = MemoryStore::default();
    game.save_map(&mut saved).expect("save");
    assert_eq!(saved.json, store.json.replace(' ', ""));
}

#[test]
fn watchdog_catches_up_without_drawing() {
    let mut game = game();
    let ui = HeadlessUi::default();
    game.frame(ms(16), &ui).expect("frame");
    game.backend_mut().clear_log();

    let ticks = game.watchdog_pass(ms(400));
    assert!(ticks >= 3);
    assert!(game.backend().passes().is_empty());
    assert!(game.backend().draws().is_empty());
}

#[test]
fn resize_updates_camera_now_and_surface_next_frame() {
    let mut game = game();
    let ui = HeadlessUi::default();
    game.resize(CanvasBounds::new(320.0, 240.0), 1280, 960);

    assert_eq!(game.camera().display_ratio(), Vec2::new(2.0, 2.0));
    assert_eq!(game.backend().surface_size(), (640, 480));

    game.frame(ms(16), &ui).expect("frame");
    assert_eq!(game.backend().surface_size(), (1280, 960));
}

#[test]
fn selection_outlines_follow_the_selected_set() {
    let mut game = game();
    let mut ui = HeadlessUi::default();
    let unit = game
        .spawn(EntityKind::Unit, Vec2::new(100.0, 100.0))
        .expect("spawn");
    game.spawn(EntityKind::Unit, Vec2::new(400.0, 300.0))
        .expect("spawn");

    game.handle_input(
        InputEvent::PointerDown(PointerInput::at(90.0, 90.0).with_button(PointerButton::Primary)),
        &mut ui,
    );
    game.handle_input(
        InputEvent::PointerUp(PointerInput::at(140.0, 140.0).with_button(PointerButton::Primary)),
        &mut ui,
    );
    game.frame(ms(16), &ui).expect("frame");
    assert_eq!(game.selected(), &[unit]);

    // One outline for the unit plus the minimap viewport outline.
    let selection = latest_upload(&game, "selection_instances");
    assert_eq!(selection.len(), 8 * INSTANCE_STRIDE_FLOATS);
}

#[test]
fn dispose_releases_every_backend_resource() {
    let mut game = game();
    let ui = HeadlessUi::default();
    game.frame(ms(16), &ui).expect("frame");
    game.dispose();
    assert_eq!(game.backend().live_resource_count(), 0);
    assert!(game.pipeline().is_disposed());
}
