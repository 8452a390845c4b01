use std::time::Duration;

use tileclient_engine::{
    AnimationCatalog, CanvasBounds, Game, GameConfig, HeadlessBackend, HeadlessUi, InputEvent,
    PointerButton, PointerInput, RenderError,
};
use tracing::{debug, info};

use super::assets::ClientAtlases;
use super::scenario;

const FRAME_STEP: Duration = Duration::from_millis(16);
const STALL: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct HeadlessSummary {
    pub(crate) frames: u32,
    pub(crate) ticks: u64,
    pub(crate) catch_up_ticks: u32,
    pub(crate) selected: usize,
    pub(crate) draw_calls: usize,
    pub(crate) leaked_resources: usize,
}

/// Drives a full session against the recording backend: select everything on
/// screen, issue one move order, stall once so the watchdog has to catch up,
/// then dispose and report what is left alive.
pub(crate) fn run_headless(
    config: GameConfig,
    atlases: &ClientAtlases,
    animations: AnimationCatalog,
    frames: u32,
) -> Result<HeadlessSummary, RenderError> {
    let canvas = CanvasBounds::new(
        config.resolution_width as f32,
        config.resolution_height as f32,
    );
    let backend = HeadlessBackend::new(config.resolution_width, config.resolution_height);
    let mut game = Game::new(config, backend, atlases.pipeline(), canvas, Duration::ZERO)?;
    *game.animations_mut() = animations;
    scenario::populate(&mut game);

    let mut ui = HeadlessUi::default();
    let primary = PointerButton::Primary;
    game.handle_input(
        InputEvent::PointerDown(PointerInput::at(1.0, 1.0).with_button(primary)),
        &mut ui,
    );
    game.handle_input(
        InputEvent::PointerUp(
            PointerInput::at(canvas.width - 1.0, canvas.height - 1.0).with_button(primary),
        ),
        &mut ui,
    );

    let mut now = Duration::ZERO;
    let mut summary = HeadlessSummary::default();
    for frame in 0..frames {
        if frame == 1 {
            let target = PointerInput::at(canvas.width * 0.25, canvas.height * 0.25)
                .with_button(PointerButton::Secondary);
            game.handle_input(InputEvent::PointerDown(target), &mut ui);
        }
        if frame == frames / 2 {
            summary.catch_up_ticks += game.watchdog_pass(now + STALL);
            now += STALL;
        }
        now += FRAME_STEP;
        game.frame(now, &ui)?;
        summary.draw_calls += game.backend().draws().len();
        game.backend_mut().clear_log();
        summary.frames += 1;
    }

    summary.ticks = game.time().tick_count();
    summary.selected = game.selected().len();
    debug!(instances = ?game.pipeline().instance_counts(), "headless_final_instances");
    game.dispose();
    summary.leaked_resources = game.backend().live_resource_count();

    info!(
        frames = summary.frames,
        ticks = summary.ticks,
        catch_up_ticks = summary.catch_up_ticks,
        selected = summary.selected,
        draw_calls = summary.draw_calls,
        leaked_resources = summary.leaked_resources,
        "headless_run_complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_session_ticks_catches_up_and_cleans_up() {
        let atlases = ClientAtlases::generated();
        let summary = run_headless(
            GameConfig::default(),
            &atlases,
            AnimationCatalog::default(),
            60,
        )
        .expect("run");

        assert_eq!(summary.frames, 60);
        assert!(summary.catch_up_ticks >= 3);
        // 60 frames of 16 ms plus the stall, at 50 ms per tick.
        assert_eq!(summary.ticks, (60 * 16 + 400) / 50);
        assert!(summary.selected > 0);
        assert!(summary.draw_calls > 0);
        assert_eq!(summary.leaked_resources, 0);
    }
}
