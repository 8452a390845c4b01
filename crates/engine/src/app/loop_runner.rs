use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorIcon, Window, WindowBuilder};

use super::camera::CanvasBounds;
use super::config::GameConfig;
use super::game::Game;
use super::geometry::Vec2;
use super::input::{
    InputCode, InputEvent, PointerButton, PointerInput, WheelInput, BUTTONS_PRIMARY,
    BUTTONS_SECONDARY,
};
use super::map::MapStore;
use super::rendering::{PipelineAtlases, RenderError, WgpuBackend};
use super::ui::{CursorStyle, UiSurface};

const BUTTONS_AUXILIARY: u8 = 4;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

/// Map editor state the window owns: visibility and the palette selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorPalette {
    visible: bool,
    tile: u16,
    tile_count: u16,
}

impl EditorPalette {
    pub fn new(tile_count: u16) -> Self {
        Self {
            visible: false,
            tile: 0,
            tile_count: tile_count.max(1),
        }
    }

    pub fn toggle(&mut self) -> bool {
        self.visible = !self.visible;
        self.visible
    }

    /// Steps the palette by `delta`, wrapping at either end.
    pub fn step(&mut self, delta: i32) -> u16 {
        let count = i32::from(self.tile_count);
        self.tile = (i32::from(self.tile) + delta).rem_euclid(count) as u16;
        self.tile
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn tile(&self) -> u16 {
        self.tile
    }
}

struct WindowUi {
    window: Arc<Window>,
    palette: EditorPalette,
    cursor: CursorStyle,
}

impl UiSurface for WindowUi {
    fn is_map_editor_visible(&self) -> bool {
        self.palette.is_visible()
    }

    fn selected_tile_index(&self) -> Option<u16> {
        Some(self.palette.tile())
    }

    fn set_cursor(&mut self, style: CursorStyle) {
        if style == self.cursor {
            return;
        }
        self.cursor = style;
        self.window.set_cursor_icon(cursor_icon(style));
    }
}

/// Tracks pointer position and held buttons between winit events so every
/// pointer event can carry the full device state.
#[derive(Debug, Default)]
struct PointerCollector {
    position: Vec2,
    buttons: u8,
    ctrl_key: bool,
}

impl PointerCollector {
    fn set_position(&mut self, position: PhysicalPosition<f64>, scale_factor: f64) {
        let logical = position.to_logical::<f32>(scale_factor);
        self.position = Vec2::new(logical.x, logical.y);
    }

    fn pointer(&self) -> PointerInput {
        PointerInput {
            client: self.position,
            button: None,
            buttons: self.buttons,
            ctrl_key: self.ctrl_key,
        }
    }

    fn handle_mouse_input(&mut self, button: MouseButton, state: ElementState) -> Option<InputEvent> {
        let (button, bit) = pointer_button(button)?;
        let pointer = match state {
            ElementState::Pressed => {
                self.buttons |= bit;
                self.pointer().with_button(button)
            }
            ElementState::Released => {
                self.buttons &= !bit;
                self.pointer().with_button(button)
            }
        };
        Some(match state {
            ElementState::Pressed => InputEvent::PointerDown(pointer),
            ElementState::Released => InputEvent::PointerUp(pointer),
        })
    }

    fn wheel(&self, delta: MouseScrollDelta) -> InputEvent {
        InputEvent::Wheel(WheelInput {
            delta_y: wheel_delta_y(delta),
            ctrl_key: self.ctrl_key,
        })
    }
}

pub fn run_app<S: MapStore>(
    config: GameConfig,
    atlases: PipelineAtlases<'_>,
    mut store: S,
    setup: impl FnOnce(&mut Game<WgpuBackend>),
) -> Result<(), AppError> {
    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.resolution_width as f64,
                config.resolution_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );

    let backend = WgpuBackend::new(Arc::clone(&window))?;
    let loop_start = Instant::now();
    let mut game = Game::new(
        config,
        backend,
        atlases,
        canvas_bounds(&window),
        Duration::ZERO,
    )?;
    setup(&mut game);

    let mut ui = WindowUi {
        window: Arc::clone(&window),
        palette: EditorPalette::new(atlases.tiles.layers.min(u32::from(u16::MAX)) as u16),
        cursor: CursorStyle::Default,
    };
    let mut pointer = PointerCollector::default();
    let watchdog_period = game.config().watchdog_period();
    let mut next_watchdog = loop_start + watchdog_period;
    let mut occluded = false;
    let mut failure: Option<AppError> = None;

    info!(
        watchdog_ms = watchdog_period.as_millis() as u64,
        entities = game.pool().active_count(),
        "loop_started"
    );
    event_loop.set_control_flow(ControlFlow::Poll);

    event_loop
        .run(|event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(size) => {
                    game.resize(canvas_bounds(&window), size.width, size.height);
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    game.resize(canvas_bounds(&window), size.width, size.height);
                }
                WindowEvent::Occluded(now_occluded) => {
                    occluded = now_occluded;
                    info!(occluded, "window_occlusion_changed");
                }
                WindowEvent::ModifiersChanged(modifiers) => {
                    pointer.ctrl_key = modifiers.state().control_key();
                }
                WindowEvent::Focused(false) => {
                    debug!("window_focus_lost");
                    game.handle_input(InputEvent::FocusLost, &mut ui);
                }
                WindowEvent::CursorLeft { .. } => {
                    game.handle_input(InputEvent::PointerLeft, &mut ui);
                }
                WindowEvent::CursorMoved { position, .. } => {
                    pointer.set_position(position, window.scale_factor());
                    game.handle_input(InputEvent::PointerMove(pointer.pointer()), &mut ui);
                }
                WindowEvent::MouseInput { state, button, .. } => {
                    if let Some(event) = pointer.handle_mouse_input(button, state) {
                        game.handle_input(event, &mut ui);
                    }
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    game.handle_input(pointer.wheel(delta), &mut ui);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    let PhysicalKey::Code(key) = event.physical_key else {
                        return;
                    };
                    let Some(code) = input_code_for_key(key) else {
                        return;
                    };
                    let pressed = event.state == ElementState::Pressed;
                    game.handle_input(InputEvent::Key { code, pressed }, &mut ui);
                    if !pressed || event.repeat {
                        return;
                    }
                    match code {
                        InputCode::ToggleMapEditor => {
                            let visible = ui.palette.toggle();
                            info!(visible, "map_editor_toggled");
                        }
                        InputCode::NextTile => {
                            let tile = ui.palette.step(1);
                            info!(tile, "palette_tile_selected");
                        }
                        InputCode::PreviousTile => {
                            let tile = ui.palette.step(-1);
                            info!(tile, "palette_tile_selected");
                        }
                        InputCode::SaveMap => {
                            if let Err(error) = game.save_map(&mut store) {
                                warn!(error = %error, "map_save_failed");
                            }
                        }
                        InputCode::LoadMap => {
                            // Rejections are logged by the game and leave the map as it was.
                            let _ = game.load_map(&mut store);
                        }
                        InputCode::Quit => {
                            info!(reason = "escape_key", "shutdown_requested");
                            window_target.exit();
                        }
                        _ => {}
                    }
                }
                WindowEvent::RedrawRequested => {
                    if let Err(render_error) = game.frame(loop_start.elapsed(), &ui) {
                        error!(error = %render_error, "frame_failed");
                        failure = Some(render_error.into());
                        window_target.exit();
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                let now = Instant::now();
                if now >= next_watchdog {
                    game.watchdog_pass(now.saturating_duration_since(loop_start));
                    next_watchdog = now + watchdog_period;
                }
                if occluded {
                    window_target.set_control_flow(ControlFlow::WaitUntil(next_watchdog));
                } else {
                    window_target.set_control_flow(ControlFlow::Poll);
                    window.request_redraw();
                }
            }
            Event::LoopExiting => {
                game.dispose();
                info!(tick_count = game.time().tick_count(), "shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)?;

    match failure {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

fn canvas_bounds(window: &Window) -> CanvasBounds {
    let logical = window
        .inner_size()
        .to_logical::<f32>(window.scale_factor());
    CanvasBounds::new(logical.width, logical.height)
}

fn cursor_icon(style: CursorStyle) -> CursorIcon {
    match style {
        CursorStyle::Default => CursorIcon::Default,
        CursorStyle::Selecting => CursorIcon::Crosshair,
        CursorStyle::Paint => CursorIcon::Pointer,
    }
}

fn pointer_button(button: MouseButton) -> Option<(PointerButton, u8)> {
    match button {
        MouseButton::Left => Some((PointerButton::Primary, BUTTONS_PRIMARY)),
        MouseButton::Right => Some((PointerButton::Secondary, BUTTONS_SECONDARY)),
        MouseButton::Middle => Some((PointerButton::Auxiliary, BUTTONS_AUXILIARY)),
        _ => None,
    }
}

/// Positive when scrolling toward the user, the direction that zooms out.
fn wheel_delta_y(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => -y,
        MouseScrollDelta::PixelDelta(position) => -(position.y as f32),
    }
}

fn input_code_for_key(key: KeyCode) -> Option<InputCode> {
    Some(match key {
        KeyCode::KeyW | KeyCode::ArrowUp => InputCode::ScrollUp,
        KeyCode::KeyS | KeyCode::ArrowDown => InputCode::ScrollDown,
        KeyCode::KeyA | KeyCode::ArrowLeft => InputCode::ScrollLeft,
        KeyCode::KeyD | KeyCode::ArrowRight => InputCode::ScrollRight,
        KeyCode::Equal | KeyCode::NumpadAdd => InputCode::ZoomIn,
        KeyCode::Minus | KeyCode::NumpadSubtract => InputCode::ZoomOut,
        KeyCode::F2 => InputCode::ToggleMapEditor,
        KeyCode::BracketRight => InputCode::NextTile,
        KeyCode::BracketLeft => InputCode::PreviousTile,
        KeyCode::F5 => InputCode::SaveMap,
        KeyCode::F9 => InputCode::LoadMap,
        KeyCode::Escape => InputCode::Quit,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wasd_and_arrow_keys_map_to_scroll_codes() {
        assert_eq!(input_code_for_key(KeyCode::KeyW), Some(InputCode::ScrollUp));
        assert_eq!(input_code_for_key(KeyCode::ArrowUp), Some(InputCode::ScrollUp));
        assert_eq!(input_code_for_key(KeyCode::KeyA), Some(InputCode::ScrollLeft));
        assert_eq!(
            input_code_for_key(KeyCode::ArrowRight),
            Some(InputCode::ScrollRight)
        );
        assert_eq!(input_code_for_key(KeyCode::KeyQ), None);
    }

    #[test]
    fn editor_and_file_keys_map_to_commands() {
        assert_eq!(
            input_code_for_key(KeyCode::F2),
            Some(InputCode::ToggleMapEditor)
        );
        assert_eq!(input_code_for_key(KeyCode::F5), Some(InputCode::SaveMap));
        assert_eq!(input_code_for_key(KeyCode::F9), Some(InputCode::LoadMap));
        assert_eq!(input_code_for_key(KeyCode::Escape), Some(InputCode::Quit));
    }

    #[test]
    fn wheel_up_is_negative_delta() {
        assert_eq!(wheel_delta_y(MouseScrollDelta::LineDelta(0.0, 1.0)), -1.0);
        assert_eq!(
            wheel_delta_y(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -30.0))),
            30.0
        );
    }

    #[test]
    fn mouse_buttons_track_held_mask() {
        let mut collector = PointerCollector::default();
        let down = collector
            .handle_mouse_input(MouseButton::Left, ElementState::Pressed)
            .expect("left press");
        assert!(matches!(
            down,
            InputEvent::PointerDown(PointerInput {
                button: Some(PointerButton::Primary),
                buttons: BUTTONS_PRIMARY,
                ..
            })
        ));
        collector.handle_mouse_input(MouseButton::Right, ElementState::Pressed);
        assert_eq!(collector.buttons, BUTTONS_PRIMARY | BUTTONS_SECONDARY);

        let up = collector
            .handle_mouse_input(MouseButton::Left, ElementState::Released)
            .expect("left release");
        assert!(matches!(up, InputEvent::PointerUp(_)));
        assert_eq!(collector.buttons, BUTTONS_SECONDARY);
        assert!(collector
            .handle_mouse_input(MouseButton::Back, ElementState::Pressed)
            .is_none());
    }

    #[test]
    fn cursor_position_is_logical() {
        let mut collector = PointerCollector::default();
        collector.set_position(PhysicalPosition::new(200.0, 100.0), 2.0);
        assert_eq!(collector.pointer().client, Vec2::new(100.0, 50.0));
    }

    #[test]
    fn palette_steps_wrap_both_ways() {
        let mut palette = EditorPalette::new(3);
        assert_eq!(palette.step(-1), 2);
        assert_eq!(palette.step(1), 0);
        assert_eq!(palette.step(4), 1);
        assert!(palette.toggle());
        assert!(!palette.toggle());
    }
}
