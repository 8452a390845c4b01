use std::time::Duration;

use tracing::{debug, info, warn};

use super::animation::{AnimationCatalog, MOVE_MARKER_ANIMATION};
use super::behavior::BehaviorDispatcher;
use super::camera::{Camera, CanvasBounds};
use super::config::GameConfig;
use super::entity::{EntityId, EntityKind, EntityPool, EntityPoolError, Order};
use super::geometry::{Rect, Vec2};
use super::input::{GameAction, InputEvent, InputMapper};
use super::map::{MapError, MapStore, TileMap};
use super::metrics::{LoopMetricsSnapshot, MetricsAccumulator};
use super::rendering::{
    display_scale, FrameData, GraphicsBackend, PipelineAtlases, RenderError, RenderPipeline,
    TextLine, WidgetInstance,
};
use super::time::TimeController;
use super::ui::UiSurface;

/// How many animation ticks a move marker stays on screen.
pub const MOVE_MARKER_LIFETIME_STEPS: u64 = 12;
const OVERLAY_GLYPH_PX: f32 = 8.0;
const OVERLAY_MARGIN_PX: f32 = 6.0;
const OVERLAY_COLOR: [f32; 4] = [0.95, 0.95, 0.8, 1.0];

#[derive(Debug, Clone, Copy, PartialEq)]
struct MoveMarker {
    position: Vec2,
    step: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub delta: Duration,
    pub ticks: u32,
    pub anim_ticked: bool,
    pub actions: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub update: UpdateReport,
    pub instances: usize,
    pub uniform_written: bool,
}

/// Owns every component of a running session and sequences them.
///
/// A frame runs: time advance, one-shot actions, simulation ticks, at most one
/// animation tick, pending surface resize, draw-list build, render, FPS
/// bookkeeping. [`Game::watchdog_pass`] runs the same update half without
/// rendering when frames stop arriving.
pub struct Game<B: GraphicsBackend> {
    config: GameConfig,
    backend: B,
    time: TimeController,
    camera: Camera,
    input: InputMapper,
    map: TileMap,
    map_revision: u64,
    pool: EntityPool,
    dispatcher: BehaviorDispatcher,
    animations: AnimationCatalog,
    selected: Vec<EntityId>,
    marker: Option<MoveMarker>,
    widgets: Vec<WidgetInstance>,
    text: Vec<TextLine>,
    pipeline: RenderPipeline,
    metrics: MetricsAccumulator,
    last_metrics: Option<LoopMetricsSnapshot>,
    pending_surface: Option<(u32, u32)>,
    disposed: bool,
}

impl<B: GraphicsBackend> std::fmt::Debug for Game<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("tick_count", &self.time.tick_count())
            .field("active_entities", &self.pool.active_count())
            .field("selected", &self.selected.len())
            .field("map_revision", &self.map_revision)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl<B: GraphicsBackend> Game<B> {
    pub fn new(
        mut config: GameConfig,
        mut backend: B,
        atlases: PipelineAtlases<'_>,
        canvas: CanvasBounds,
        start: Duration,
    ) -> Result<Self, RenderError> {
        config.normalize();
        let pipeline = RenderPipeline::new(&mut backend, config.pipeline_config(), atlases)?;
        let map = TileMap::filled(
            config.map_width_tiles,
            config.map_height_tiles,
            config.tile_size_px,
            0,
        );
        let mut time = TimeController::new(config.time_config(), start);
        time.reset_last_time(start);

        info!(
            map_width = map.width(),
            map_height = map.height(),
            entity_capacity = config.entity_capacity,
            tick_ms = config.tick_period_ms,
            anim_ms = config.anim_period_ms,
            "game_ready"
        );

        Ok(Self {
            camera: Camera::new(config.camera_config(), canvas),
            input: InputMapper::new(config.scroll_speed_px),
            pool: EntityPool::with_capacity(config.entity_capacity),
            metrics: MetricsAccumulator::new(config.metrics_interval(), start),
            backend,
            time,
            map,
            map_revision: 0,
            dispatcher: BehaviorDispatcher::default(),
            animations: AnimationCatalog::default(),
            selected: Vec::new(),
            marker: None,
            widgets: Vec::new(),
            text: Vec::new(),
            pipeline,
            last_metrics: None,
            pending_surface: None,
            disposed: false,
            config,
        })
    }

    pub fn handle_input(&mut self, event: InputEvent, ui: &mut dyn UiSurface) {
        self.input.handle_event(event, &mut self.camera, ui);
    }

    /// Canvas changes apply to the camera immediately so pointer mapping never
    /// reads a stale ratio; the surface itself is resized at the next frame.
    pub fn resize(&mut self, canvas: CanvasBounds, surface_width: u32, surface_height: u32) {
        self.camera.recompute(canvas);
        self.input.remap_pointer(&self.camera);
        self.pending_surface = Some((surface_width, surface_height));
        debug!(
            canvas_width = canvas.width,
            canvas_height = canvas.height,
            surface_width,
            surface_height,
            "resize_requested"
        );
    }

    pub fn frame(&mut self, now: Duration, ui: &dyn UiSurface) -> Result<FrameReport, RenderError> {
        let update = self.update(now);
        let delta = update.delta;

        if let Some((width, height)) = self.pending_surface.take() {
            self.backend.resize_surface(width, height)?;
        }

        self.build_widgets();
        self.build_text(ui);
        let interpolation = if self.config.interpolate_sprites {
            self.time.interpolation_factor()
        } else {
            1.0
        };
        let frame = FrameData {
            camera: &self.camera,
            map: &self.map,
            map_revision: self.map_revision,
            entities: &self.pool,
            selected: &self.selected,
            selection_rect: self.input.active_selection(),
            widgets: &self.widgets,
            text: &self.text,
            sprite_size: self.config.sprite_size_px,
            widget_size: self.config.widget_size_px,
            interpolation,
        };
        let stats = self.pipeline.render_frame(&mut self.backend, &frame)?;

        self.time.record_frame(now, delta);
        self.metrics.record_frame(delta);
        self.emit_metrics(now);

        Ok(FrameReport {
            update,
            instances: stats.instances,
            uniform_written: stats.uniform_written,
        })
    }

    /// Forces a non-rendering update when frames have stopped arriving long
    /// enough to owe several ticks. Returns how many ticks ran.
    pub fn watchdog_pass(&mut self, now: Duration) -> u32 {
        if !self.time.needs_catch_up(now) {
            return 0;
        }
        let update = self.update(now);
        self.metrics.record_catch_up(update.ticks);
        info!(
            ticks = update.ticks,
            tick_count = self.time.tick_count(),
            "catch_up_pass"
        );
        self.emit_metrics(now);
        update.ticks
    }

    fn update(&mut self, now: Duration) -> UpdateReport {
        let delta = self.time.advance(now);

        let actions = self.input.take_actions();
        let action_count = actions.len();
        for action in actions {
            self.apply_action(action);
        }

        let mut ticks = 0;
        while self.time.consume_tick_if_due() {
            let velocity = self.input.poll_keyboard();
            self.camera.scroll(velocity);
            self.input.remap_pointer(&self.camera);
            self.pool.tick(&self.dispatcher);
            self.metrics.record_tick();
            ticks += 1;
        }

        let anim_ticked = self.time.consume_anim_if_due();
        if anim_ticked {
            self.advance_animations();
        }

        UpdateReport {
            delta,
            ticks,
            anim_ticked,
            actions: action_count,
        }
    }

    fn apply_action(&mut self, action: GameAction) {
        match action {
            GameAction::DefaultActionAt(point) => self.order_move(point),
            GameAction::SelectionReleased(rect) => self.select_in(rect),
            GameAction::PaintAt { world, layer } => self.paint(world, layer),
        }
    }

    fn order_move(&mut self, point: Vec2) {
        if self.selected.is_empty() {
            return;
        }
        let half = self.config.sprite_size_px * 0.5;
        let target = point - Vec2::new(half, half);
        let mut queued = 0;
        for &id in &self.selected {
            let Some(entity) = self.pool.get_mut(id) else {
                continue;
            };
            match entity.orders.push(Order::move_to(target)) {
                Ok(()) => queued += 1,
                Err(_) => warn!(slot = id.slot(), "order_queue_full"),
            }
        }
        if queued > 0 {
            self.marker = Some(MoveMarker {
                position: point,
                step: 0,
            });
        }
        debug!(x = point.x, y = point.y, queued, "move_ordered");
    }

    fn select_in(&mut self, rect: Rect) {
        let size = Vec2::new(self.config.sprite_size_px, self.config.sprite_size_px);
        self.selected = self
            .pool
            .iter_active()
            .filter(|entity| Rect::from_origin_size(entity.position, size).intersects(&rect))
            .map(|entity| entity.id())
            .collect();
        debug!(selected = self.selected.len(), "selection_replaced");
    }

    fn paint(&mut self, world: Vec2, layer: u16) {
        let Some((x, y)) = self.map.tile_at_world(world) else {
            return;
        };
        if self.map.set_tile(x, y, layer) {
            self.map_revision += 1;
        }
    }

    fn advance_animations(&mut self) {
        if let Some(marker) = self.marker.as_mut() {
            marker.step += 1;
            if marker.step >= MOVE_MARKER_LIFETIME_STEPS {
                self.marker = None;
            }
        }
    }

    fn build_widgets(&mut self) {
        self.widgets.clear();
        if let Some(marker) = self.marker {
            if let Some(frame) = self.animations.frame_at(MOVE_MARKER_ANIMATION, marker.step) {
                self.widgets.push(WidgetInstance {
                    position: marker.position,
                    frame,
                });
            }
        }
    }

    fn build_text(&mut self, ui: &dyn UiSurface) {
        self.text.clear();
        if !self.config.show_stats {
            return;
        }
        let scale = display_scale(&self.camera);
        let glyph_size = OVERLAY_GLYPH_PX * scale;
        let margin = OVERLAY_MARGIN_PX * scale;
        let mut lines = vec![
            format!("FPS {} TICK {}", self.time.fps(), self.time.tick_count()),
            format!(
                "ENT {}/{} SEL {}",
                self.pool.active_count(),
                self.pool.total(),
                self.selected.len()
            ),
        ];
        if ui.is_map_editor_visible() {
            match ui.selected_tile_index() {
                Some(tile) => lines.push(format!("EDIT TILE {tile}")),
                None => lines.push("EDIT".to_string()),
            }
        }
        for (row, text) in lines.into_iter().enumerate() {
            self.text.push(TextLine {
                origin: Vec2::new(margin, margin + row as f32 * (glyph_size + scale * 2.0)),
                text,
                glyph_size,
                color: OVERLAY_COLOR,
            });
        }
    }

    fn emit_metrics(&mut self, now: Duration) {
        let Some(snapshot) = self.metrics.maybe_snapshot(now) else {
            return;
        };
        info!(
            fps = snapshot.fps,
            tps = snapshot.tps,
            frame_time_ms = snapshot.frame_time_ms,
            catch_up_passes = snapshot.catch_up_passes,
            catch_up_ticks = snapshot.catch_up_ticks,
            active_entities = self.pool.active_count(),
            "frame_metrics"
        );
        self.last_metrics = Some(snapshot);
    }

    pub fn spawn(&mut self, kind: EntityKind, position: Vec2) -> Result<EntityId, EntityPoolError> {
        let entity = self.pool.spawn(kind)?;
        entity.place_at(position);
        Ok(entity.id())
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        self.selected.retain(|selected| *selected != id);
        self.pool.despawn(id)
    }

    pub fn save_map(&self, store: &mut dyn MapStore) -> Result<(), MapError> {
        let json = self.map.to_json()?;
        store.save(&json)?;
        info!(tiles = self.map.tile_count(), "map_saved");
        Ok(())
    }

    /// Replaces the map from `store`. A rejected load leaves the current map untouched.
    pub fn load_map(&mut self, store: &mut dyn MapStore) -> Result<(), MapError> {
        let result = store
            .load()
            .and_then(|json| self.map.replace_from_json(&json));
        match result {
            Ok(()) => {
                self.map_revision += 1;
                info!(tiles = self.map.tile_count(), "map_loaded");
                Ok(())
            }
            Err(error) => {
                warn!(error = %error, "map_load_rejected");
                Err(error)
            }
        }
    }

    /// Releases every GPU resource in a fixed order. Later frames fail instead of drawing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.pipeline.dispose(&mut self.backend);
        self.selected.clear();
        self.marker = None;
        self.disposed = true;
        info!(tick_count = self.time.tick_count(), "game_disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn input(&self) -> &InputMapper {
        &self.input
    }

    pub fn time(&self) -> &TimeController {
        &self.time
    }

    pub fn map(&self) -> &TileMap {
        &self.map
    }

    pub fn map_revision(&self) -> u64 {
        self.map_revision
    }

    pub fn pool(&self) -> &EntityPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut EntityPool {
        &mut self.pool
    }

    pub fn animations_mut(&mut self) -> &mut AnimationCatalog {
        &mut self.animations
    }

    pub fn selected(&self) -> &[EntityId] {
        &self.selected
    }

    pub fn widgets(&self) -> &[WidgetInstance] {
        &self.widgets
    }

    pub fn text_lines(&self) -> &[TextLine] {
        &self.text
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    pub fn last_metrics(&self) -> Option<LoopMetricsSnapshot> {
        self.last_metrics
    }
}

impl<B: GraphicsBackend> Drop for Game<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::input::{PointerButton, PointerInput};
    use crate::app::rendering::{AtlasImage, HeadlessBackend, GLYPH_LAYERS};
    use crate::app::ui::HeadlessUi;

    struct Atlases {
        tiles: AtlasImage,
        sprites: AtlasImage,
        widgets: AtlasImage,
        glyphs: AtlasImage,
    }

    impl Atlases {
        fn new() -> Self {
            Self {
                tiles: AtlasImage::solid(2, 2, &[[0, 128, 0, 255], [0, 0, 200, 255]]),
                sprites: AtlasImage::solid(4, 4, &[[255; 4]; 3]),
                widgets: AtlasImage::solid(2, 2, &[[255, 0, 0, 255]; 4]),
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

    #[test]
    fn frame_runs_due_ticks_before_rendering() {
        let mut game = game();
        let ui = HeadlessUi::default();
        let report = game.frame(ms(120), &ui).expect("frame");
        assert_eq!(report.update.ticks, 2);
        assert!(report.update.anim_ticked);
        assert_eq!(game.time().tick_count(), 2);
        assert!(!game.backend().passes().is_empty());
        assert!(report.uniform_written);
    }

    #[test]
    fn right_click_orders_selected_units_and_shows_marker() {
        let mut game = game();
        let mut ui = HeadlessUi::default();
        let unit = game
            .spawn(EntityKind::Unit, Vec2::new(100.0, 100.0))
            .expect("spawn");

        game.handle_input(
            InputEvent::PointerDown(
                PointerInput::at(90.0, 90.0).with_button(PointerButton::Primary),
            ),
            &mut ui,
        );
        game.handle_input(
            InputEvent::PointerUp(
                PointerInput::at(140.0, 140.0).with_button(PointerButton::Primary),
            ),
            &mut ui,
        );
        game.frame(ms(1), &ui).expect("frame");
        assert_eq!(game.selected(), &[unit]);

        game.handle_input(
            InputEvent::PointerDown(
                PointerInput::at(300.0, 200.0).with_button(PointerButton::Secondary),
            ),
            &mut ui,
        );
        game.frame(ms(2), &ui).expect("frame");
        let entity = game.pool().get(unit).expect("unit");
        assert_eq!(entity.orders.len(), 1);
        assert_eq!(
            entity.orders.front().map(|order| order.target),
            Some(Vec2::new(284.0, 184.0))
        );
        assert_eq!(game.widgets().len(), 1);
        assert_eq!(game.widgets()[0].position, Vec2::new(300.0, 200.0));
    }

    #[test]
    fn move_marker_expires_after_its_lifetime() {
        let mut game = game();
        let ui = HeadlessUi::default();
        game.marker = Some(MoveMarker {
            position: Vec2::new(10.0, 10.0),
            step: 0,
        });
        let mut now = 0;
        for _ in 0..MOVE_MARKER_LIFETIME_STEPS {
            now += 100;
            game.frame(ms(now), &ui).expect("frame");
        }
        assert!(game.widgets().is_empty());
    }

    #[test]
    fn marker_frames_follow_the_catalog_on_anim_ticks() {
        let mut game = game();
        let ui = HeadlessUi::default();
        game.marker = Some(MoveMarker {
            position: Vec2::new(50.0, 50.0),
            step: 0,
        });
        let mut frames = Vec::new();
        for step in 1..MOVE_MARKER_LIFETIME_STEPS {
            game.frame(ms(step * 100), &ui).expect("frame");
            frames.push(game.widgets()[0].frame);
        }
        assert_eq!(frames, vec![1, 2, 3, 2, 1, 0, 1, 2, 3, 2, 1]);

        game.frame(ms(MOVE_MARKER_LIFETIME_STEPS * 100), &ui)
            .expect("frame");
        assert!(game.widgets().is_empty());
    }

    #[test]
    fn stall_advances_the_marker_by_one_step() {
        let mut game = game();
        let ui = HeadlessUi::default();
        game.marker = Some(MoveMarker {
            position: Vec2::new(50.0, 50.0),
            step: 0,
        });
        assert!(game.watchdog_pass(ms(2_000)) > 0);
        game.frame(ms(2_016), &ui).expect("frame");
        game.frame(ms(2_032), &ui).expect("frame");
        assert_eq!(game.marker.map(|marker| marker.step), Some(1));
    }

    #[test]
    fn despawn_drops_the_entity_from_the_selection() {
        let mut game = game();
        let ui = HeadlessUi::default();
        let kept = game
            .spawn(EntityKind::Unit, Vec2::new(10.0, 10.0))
            .expect("spawn");
        let removed = game
            .spawn(EntityKind::Unit, Vec2::new(60.0, 10.0))
            .expect("spawn");
        game.selected = vec![kept, removed];

        assert!(game.despawn(removed));
        assert_eq!(game.selected(), &[kept]);
        assert_eq!(game.pool().active_count(), 1);
        assert!(!game.despawn(removed));

        game.frame(ms(16), &ui).expect("frame");
        assert_eq!(game.pipeline().instance_counts()[1], ("sprites", 1));
    }

    #[test]
    fn painting_bumps_revision_only_on_change() {
        let mut game = game();
        let mut ui = HeadlessUi {
            map_editor_visible: true,
            selected_tile: Some(1),
            ..HeadlessUi::default()
        };
        let press = PointerInput::at(40.0, 8.0).with_button(PointerButton::Primary);
        game.handle_input(InputEvent::PointerDown(press), &mut ui);
        game.frame(ms(1), &ui).expect("frame");
        assert_eq!(game.map().tile_at(1, 0), Some(1));
        assert_eq!(game.map_revision(), 1);

        game.handle_input(InputEvent::PointerDown(press), &mut ui);
        game.frame(ms(2), &ui).expect("frame");
        assert_eq!(game.map_revision(), 1);
    }

    #[test]
    fn watchdog_only_runs_with_enough_backlog() {
        let mut game = game();
        assert_eq!(game.watchdog_pass(ms(100)), 0);
        assert_eq!(game.time().tick_count(), 0);
        assert_eq!(game.watchdog_pass(ms(160)), 3);
        assert_eq!(game.time().tick_count(), 3);
    }

    #[test]
    fn dispose_releases_everything_once() {
        let mut game = game();
        let ui = HeadlessUi::default();
        game.frame(ms(16), &ui).expect("frame");
        game.dispose();
        assert_eq!(game.backend().live_resource_count(), 0);
        assert!(game.frame(ms(32), &ui).is_err());
        game.dispose();
        assert!(game.is_disposed());
    }
}
