use super::camera::Camera;
use super::geometry::{Rect, Vec2};
use super::ui::{CursorStyle, UiSurface};

pub const DEFAULT_SCROLL_SPEED_PX: f32 = 12.0;

/// Bit values of [`PointerInput::buttons`], matching the usual device convention.
pub const BUTTONS_PRIMARY: u8 = 1;
pub const BUTTONS_SECONDARY: u8 = 2;

/// Every key the client recognizes. Anything else is dropped at the platform edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputCode {
    ScrollUp,
    ScrollDown,
    ScrollLeft,
    ScrollRight,
    ZoomIn,
    ZoomOut,
    ToggleMapEditor,
    NextTile,
    PreviousTile,
    SaveMap,
    LoadMap,
    Quit,
}

const INPUT_CODE_COUNT: usize = 12;

impl InputCode {
    const fn index(self) -> usize {
        match self {
            InputCode::ScrollUp => 0,
            InputCode::ScrollDown => 1,
            InputCode::ScrollLeft => 2,
            InputCode::ScrollRight => 3,
            InputCode::ZoomIn => 4,
            InputCode::ZoomOut => 5,
            InputCode::ToggleMapEditor => 6,
            InputCode::NextTile => 7,
            InputCode::PreviousTile => 8,
            InputCode::SaveMap => 9,
            InputCode::LoadMap => 10,
            InputCode::Quit => 11,
        }
    }

    fn is_scroll(self) -> bool {
        matches!(
            self,
            InputCode::ScrollUp | InputCode::ScrollDown | InputCode::ScrollLeft | InputCode::ScrollRight
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeyStates {
    down: [bool; INPUT_CODE_COUNT],
}

impl KeyStates {
    pub fn set(&mut self, code: InputCode, is_down: bool) {
        self.down[code.index()] = is_down;
    }

    pub fn is_down(&self, code: InputCode) -> bool {
        self.down[code.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Auxiliary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub client: Vec2,
    pub button: Option<PointerButton>,
    pub buttons: u8,
    pub ctrl_key: bool,
}

impl PointerInput {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            client: Vec2::new(x, y),
            button: None,
            buttons: 0,
            ctrl_key: false,
        }
    }

    pub fn with_button(mut self, button: PointerButton) -> Self {
        self.button = Some(button);
        self
    }

    pub fn with_buttons(mut self, buttons: u8) -> Self {
        self.buttons = buttons;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelInput {
    pub delta_y: f32,
    pub ctrl_key: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerMove(PointerInput),
    PointerDown(PointerInput),
    PointerUp(PointerInput),
    Wheel(WheelInput),
    Key { code: InputCode, pressed: bool },
    /// The window lost keyboard focus; releases for held keys will not arrive.
    FocusLost,
    /// The cursor left the canvas.
    PointerLeft,
}

/// One-shot results of input, consumed once per frame by the game loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameAction {
    DefaultActionAt(Vec2),
    SelectionReleased(Rect),
    PaintAt { world: Vec2, layer: u16 },
}

/// Turns raw pointer and key events into game-space state.
///
/// The mapper is the only writer of scroll intent and selection endpoints. It
/// reads camera ratios on every event and keeps none of its own.
#[derive(Debug, Clone)]
pub struct InputMapper {
    keys: KeyStates,
    scroll_speed: f32,
    pointer_client: Option<Vec2>,
    pointer_screen: Vec2,
    pointer_world: Vec2,
    selecting: bool,
    selection_start: Vec2,
    selection_end: Vec2,
    edge_velocity: Vec2,
    scroll_velocity: Vec2,
    pending: Vec<GameAction>,
}

impl Default for InputMapper {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLL_SPEED_PX)
    }
}

impl InputMapper {
    pub fn new(scroll_speed: f32) -> Self {
        Self {
            keys: KeyStates::default(),
            scroll_speed: scroll_speed.abs(),
            pointer_client: None,
            pointer_screen: Vec2::ZERO,
            pointer_world: Vec2::ZERO,
            selecting: false,
            selection_start: Vec2::ZERO,
            selection_end: Vec2::ZERO,
            edge_velocity: Vec2::ZERO,
            scroll_velocity: Vec2::ZERO,
            pending: Vec::new(),
        }
    }

    pub fn handle_event(&mut self, event: InputEvent, camera: &mut Camera, ui: &mut dyn UiSurface) {
        match event {
            InputEvent::PointerMove(pointer) => self.on_pointer_move(pointer, camera, ui),
            InputEvent::PointerDown(pointer) => self.on_pointer_down(pointer, camera, ui),
            InputEvent::PointerUp(pointer) => self.on_pointer_up(pointer, camera, ui),
            InputEvent::Wheel(wheel) => self.on_wheel(wheel, camera),
            InputEvent::Key { code, pressed } => self.on_key(code, pressed, camera),
            InputEvent::FocusLost => self.release_all_keys(),
            InputEvent::PointerLeft => self.stop_edge_scroll(),
        }
    }

    fn on_pointer_move(&mut self, pointer: PointerInput, camera: &Camera, ui: &mut dyn UiSurface) {
        self.map_pointer(pointer.client, camera);
        if ui.is_map_editor_visible() && pointer.buttons & BUTTONS_PRIMARY != 0 {
            self.queue_paint(ui);
        }
    }

    fn on_pointer_down(&mut self, pointer: PointerInput, camera: &Camera, ui: &mut dyn UiSurface) {
        self.map_pointer(pointer.client, camera);
        match pointer.button {
            Some(PointerButton::Primary) if ui.is_map_editor_visible() => {
                ui.set_cursor(CursorStyle::Paint);
                self.queue_paint(ui);
            }
            Some(PointerButton::Primary) if !self.selecting => {
                self.selection_start = self.pointer_world;
                self.selection_end = self.pointer_world;
                self.selecting = true;
                ui.set_cursor(CursorStyle::Selecting);
            }
            Some(PointerButton::Secondary) if !ui.is_map_editor_visible() => {
                self.pending.push(GameAction::DefaultActionAt(self.pointer_world));
            }
            _ => {}
        }
    }

    fn on_pointer_up(&mut self, pointer: PointerInput, camera: &Camera, ui: &mut dyn UiSurface) {
        self.map_pointer(pointer.client, camera);
        if pointer.button != Some(PointerButton::Primary) {
            return;
        }
        if self.selecting {
            self.selection_end = self.pointer_world;
            self.selecting = false;
            self.pending.push(GameAction::SelectionReleased(Rect::from_corners(
                self.selection_start,
                self.selection_end,
            )));
        }
        ui.set_cursor(CursorStyle::Default);
    }

    fn on_wheel(&mut self, wheel: WheelInput, camera: &mut Camera) {
        // Scale changes mid-drag would warp the selection rectangle.
        if self.selecting || wheel.delta_y == 0.0 {
            return;
        }
        let canvas = camera.canvas();
        if wheel.delta_y < 0.0 {
            camera.zoom_in(canvas);
        } else {
            camera.zoom_out(canvas);
        }
        self.remap_pointer(camera);
    }

    fn on_key(&mut self, code: InputCode, pressed: bool, camera: &mut Camera) {
        let was_down = self.keys.is_down(code);
        self.keys.set(code, pressed);
        if code.is_scroll() {
            self.refresh_scroll_velocity();
            return;
        }
        if !pressed || was_down || self.selecting {
            return;
        }
        let canvas = camera.canvas();
        match code {
            InputCode::ZoomIn => camera.zoom_in(canvas),
            InputCode::ZoomOut => camera.zoom_out(canvas),
            _ => return,
        }
        self.remap_pointer(camera);
    }

    fn release_all_keys(&mut self) {
        self.keys = KeyStates::default();
        self.refresh_scroll_velocity();
    }

    fn stop_edge_scroll(&mut self) {
        // No client position means no remap will revive the edge velocity.
        self.pointer_client = None;
        self.edge_velocity = Vec2::ZERO;
        self.refresh_scroll_velocity();
    }

    /// Re-derives scroll velocity from held keys; called once per simulation tick.
    pub fn poll_keyboard(&mut self) -> Vec2 {
        self.refresh_scroll_velocity();
        self.scroll_velocity
    }

    /// Recomputes pointer coordinates after the camera moved or zoomed underneath it.
    pub fn remap_pointer(&mut self, camera: &Camera) {
        if let Some(client) = self.pointer_client {
            self.map_pointer(client, camera);
        }
    }

    pub fn take_actions(&mut self) -> Vec<GameAction> {
        std::mem::take(&mut self.pending)
    }

    fn map_pointer(&mut self, client: Vec2, camera: &Camera) {
        let ratio = camera.display_ratio();
        let scroll = camera.scroll_offset();
        self.pointer_client = Some(client);
        self.pointer_screen = Vec2::new(client.x * ratio.x, client.y * ratio.y);
        self.pointer_world = self.pointer_screen + scroll;
        self.edge_velocity = edge_scroll_velocity(self.pointer_screen, camera, self.scroll_speed);
        self.refresh_scroll_velocity();
    }

    fn refresh_scroll_velocity(&mut self) {
        let keyboard = self.keyboard_velocity();
        self.scroll_velocity = Vec2::new(
            if keyboard.x != 0.0 { keyboard.x } else { self.edge_velocity.x },
            if keyboard.y != 0.0 { keyboard.y } else { self.edge_velocity.y },
        );
    }

    fn keyboard_velocity(&self) -> Vec2 {
        let axis = |negative: InputCode, positive: InputCode| -> f32 {
            match (self.keys.is_down(negative), self.keys.is_down(positive)) {
                (true, false) => -self.scroll_speed,
                (false, true) => self.scroll_speed,
                _ => 0.0,
            }
        };
        Vec2::new(
            axis(InputCode::ScrollLeft, InputCode::ScrollRight),
            axis(InputCode::ScrollUp, InputCode::ScrollDown),
        )
    }

    fn queue_paint(&mut self, ui: &dyn UiSurface) {
        if let Some(layer) = ui.selected_tile_index() {
            self.pending.push(GameAction::PaintAt {
                world: self.pointer_world,
                layer,
            });
        }
    }

    pub fn keys(&self) -> &KeyStates {
        &self.keys
    }

    pub fn pointer_screen(&self) -> Vec2 {
        self.pointer_screen
    }

    pub fn pointer_world(&self) -> Vec2 {
        self.pointer_world
    }

    pub fn is_selecting(&self) -> bool {
        self.selecting
    }

    pub fn scroll_velocity(&self) -> Vec2 {
        self.scroll_velocity
    }

    /// The rectangle being dragged out right now, if any.
    pub fn active_selection(&self) -> Option<Rect> {
        self.selecting
            .then(|| Rect::from_corners(self.selection_start, self.pointer_world))
    }

    pub fn selection_endpoints(&self) -> (Vec2, Vec2) {
        (self.selection_start, self.selection_end)
    }
}

fn edge_scroll_velocity(screen: Vec2, camera: &Camera, speed: f32) -> Vec2 {
    let edge = camera.scroll_edge();
    let border = camera.scroll_border();
    let axis = |value: f32, edge: f32| -> f32 {
        if value > edge {
            speed
        } else if value < border {
            -speed
        } else {
            0.0
        }
    };
    Vec2::new(axis(screen.x, edge.x), axis(screen.y, edge.y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::camera::{CameraConfig, CanvasBounds};
    use crate::app::ui::HeadlessUi;

    fn camera() -> Camera {
        Camera::new(CameraConfig::default(), CanvasBounds::new(1280.0, 720.0))
    }

    fn press(button: PointerButton, x: f32, y: f32) -> InputEvent {
        InputEvent::PointerDown(PointerInput::at(x, y).with_button(button))
    }

    fn release(button: PointerButton, x: f32, y: f32) -> InputEvent {
        InputEvent::PointerUp(PointerInput::at(x, y).with_button(button))
    }

    fn key(code: InputCode, pressed: bool) -> InputEvent {
        InputEvent::Key { code, pressed }
    }

    #[test]
    fn pointer_maps_through_ratio_and_scroll() {
        let mut cam = Camera::new(CameraConfig::default(), CanvasBounds::new(640.0, 360.0));
        cam.scroll(Vec2::new(100.0, 40.0));
        let mut ui = HeadlessUi::default();
        let mut input = InputMapper::default();

        input.handle_event(
            InputEvent::PointerMove(PointerInput::at(320.0, 180.0)),
            &mut cam,
            &mut ui,
        );

        assert_eq!(input.pointer_screen(), Vec2::new(640.0, 360.0));
        assert_eq!(input.pointer_world(), Vec2::new(740.0, 400.0));
    }

    #[test]
    fn ratio_is_read_fresh_after_zoom() {
        let mut cam = camera();
        let mut ui = HeadlessUi::default();
        let mut input = InputMapper::default();
        input.handle_event(
            InputEvent::PointerMove(PointerInput::at(640.0, 360.0)),
            &mut cam,
            &mut ui,
        );
        assert_eq!(input.pointer_screen(), Vec2::new(640.0, 360.0));

        cam.set_zoom(2.0, cam.canvas());
        input.handle_event(
            InputEvent::PointerMove(PointerInput::at(640.0, 360.0)),
            &mut cam,
            &mut ui,
        );
        assert_eq!(input.pointer_screen(), Vec2::new(320.0, 180.0));
    }

    #[test]
    fn edge_scroll_follows_pointer_position() {
        let mut cam = camera();
        let mut ui = HeadlessUi::default();
        let mut input = InputMapper::new(10.0);

        input.handle_event(
            InputEvent::PointerMove(PointerInput::at(1270.0, 5.0)),
            &mut cam,
            &mut ui,
        );
        assert_eq!(input.scroll_velocity(), Vec2::new(10.0, -10.0));

        input.handle_event(
            InputEvent::PointerMove(PointerInput::at(640.0, 360.0)),
            &mut cam,
            &mut ui,
        );
        assert_eq!(input.scroll_velocity(), Vec2::ZERO);
    }

    #[test]
    fn focus_loss_releases_held_scroll_keys() {
        let mut cam = camera();
        let mut ui = HeadlessUi::default();
        let mut input = InputMapper::new(10.0);

        input.handle_event(key(InputCode::ScrollRight, true), &mut cam, &mut ui);
        input.handle_event(key(InputCode::ScrollDown, true), &mut cam, &mut ui);
        assert_eq!(input.poll_keyboard(), Vec2::new(10.0, 10.0));

        input.handle_event(InputEvent::FocusLost, &mut cam, &mut ui);
        assert!(!input.keys().is_down(InputCode::ScrollRight));
        assert!(!input.keys().is_down(InputCode::ScrollDown));
        assert_eq!(input.poll_keyboard(), Vec2::ZERO);
    }

    #[test]
    fn leaving_the_canvas_stops_edge_scroll() {
        let mut cam = camera();
        let mut ui = HeadlessUi::default();
        let mut input = InputMapper::new(10.0);
        input.handle_event(
            InputEvent::PointerMove(PointerInput::at(1275.0, 5.0)),
            &mut cam,
            &mut ui,
        );
        assert_eq!(input.poll_keyboard(), Vec2::new(10.0, -10.0));

        input.handle_event(InputEvent::PointerLeft, &mut cam, &mut ui);
        assert_eq!(input.poll_keyboard(), Vec2::ZERO);

        // A camera move after leaving must not re-derive edge scroll from the stale position.
        input.remap_pointer(&cam);
        assert_eq!(input.poll_keyboard(), Vec2::ZERO);
    }

    #[test]
    fn held_keys_override_edge_scroll_until_released() {
        let mut cam = camera();
        let mut ui = HeadlessUi::default();
        let mut input = InputMapper::new(10.0);
        input.handle_event(
            InputEvent::PointerMove(PointerInput::at(1275.0, 360.0)),
            &mut cam,
            &mut ui,
        );

        input.handle_event(key(InputCode::ScrollLeft, true), &mut cam, &mut ui);
        assert_eq!(input.poll_keyboard(), Vec2::new(-10.0, 0.0));

        input.handle_event(key(InputCode::ScrollLeft, false), &mut cam, &mut ui);
        assert_eq!(input.scroll_velocity(), Vec2::new(10.0, 0.0));
    }

    #[test]
    fn selection_round_trip_normalizes_corners() {
        let mut cam = camera();
        let mut ui = HeadlessUi::default();
        let mut input = InputMapper::default();

        input.handle_event(press(PointerButton::Primary, 300.0, 200.0), &mut cam, &mut ui);
        assert!(input.is_selecting());
        assert_eq!(ui.cursor, CursorStyle::Selecting);
        input.handle_event(release(PointerButton::Primary, 100.0, 50.0), &mut cam, &mut ui);

        let actions = input.take_actions();
        assert_eq!(
            actions,
            vec![GameAction::SelectionReleased(Rect::from_corners(
                Vec2::new(100.0, 50.0),
                Vec2::new(300.0, 200.0),
            ))]
        );
        assert!(!input.is_selecting());
        assert_eq!(ui.cursor, CursorStyle::Default);
        assert!(input.take_actions().is_empty());
    }

    #[test]
    fn one_release_action_per_completed_drag() {
        let mut cam = camera();
        let mut ui = HeadlessUi::default();
        let mut input = InputMapper::default();

        input.handle_event(press(PointerButton::Primary, 100.0, 50.0), &mut cam, &mut ui);
        input.handle_event(press(PointerButton::Primary, 120.0, 60.0), &mut cam, &mut ui);
        input.handle_event(release(PointerButton::Primary, 300.0, 200.0), &mut cam, &mut ui);
        input.handle_event(release(PointerButton::Primary, 310.0, 210.0), &mut cam, &mut ui);

        let releases = input
            .take_actions()
            .into_iter()
            .filter(|action| matches!(action, GameAction::SelectionReleased(_)))
            .count();
        assert_eq!(releases, 1);
        assert_eq!(
            input.selection_endpoints(),
            (Vec2::new(100.0, 50.0), Vec2::new(300.0, 200.0))
        );
    }

    #[test]
    fn secondary_press_emits_default_action_at_world_pointer() {
        let mut cam = camera();
        cam.scroll(Vec2::new(64.0, 32.0));
        let mut ui = HeadlessUi::default();
        let mut input = InputMapper::default();

        input.handle_event(press(PointerButton::Secondary, 10.0, 20.0), &mut cam, &mut ui);

        assert_eq!(
            input.take_actions(),
            vec![GameAction::DefaultActionAt(Vec2::new(74.0, 52.0))]
        );
    }

    #[test]
    fn wheel_zoom_is_suppressed_while_selecting() {
        let mut cam = camera();
        let mut ui = HeadlessUi::default();
        let mut input = InputMapper::default();

        input.handle_event(press(PointerButton::Primary, 10.0, 10.0), &mut cam, &mut ui);
        input.handle_event(
            InputEvent::Wheel(WheelInput {
                delta_y: -100.0,
                ctrl_key: false,
            }),
            &mut cam,
            &mut ui,
        );
        assert_eq!(cam.zoom(), 1.0);

        input.handle_event(release(PointerButton::Primary, 10.0, 10.0), &mut cam, &mut ui);
        input.handle_event(
            InputEvent::Wheel(WheelInput {
                delta_y: -100.0,
                ctrl_key: false,
            }),
            &mut cam,
            &mut ui,
        );
        assert!(cam.zoom() > 1.0);
    }

    #[test]
    fn editor_mode_paints_instead_of_selecting() {
        let mut cam = camera();
        let mut ui = HeadlessUi {
            map_editor_visible: true,
            selected_tile: Some(7),
            ..HeadlessUi::default()
        };
        let mut input = InputMapper::default();

        input.handle_event(press(PointerButton::Primary, 40.0, 40.0), &mut cam, &mut ui);
        input.handle_event(
            InputEvent::PointerMove(PointerInput::at(80.0, 40.0).with_buttons(BUTTONS_PRIMARY)),
            &mut cam,
            &mut ui,
        );
        input.handle_event(
            InputEvent::PointerMove(PointerInput::at(120.0, 40.0)),
            &mut cam,
            &mut ui,
        );

        assert!(!input.is_selecting());
        assert_eq!(
            input.take_actions(),
            vec![
                GameAction::PaintAt {
                    world: Vec2::new(40.0, 40.0),
                    layer: 7
                },
                GameAction::PaintAt {
                    world: Vec2::new(80.0, 40.0),
                    layer: 7
                },
            ]
        );
    }

    #[test]
    fn zoom_keys_are_edge_triggered() {
        let mut cam = camera();
        let mut ui = HeadlessUi::default();
        let mut input = InputMapper::default();

        input.handle_event(key(InputCode::ZoomIn, true), &mut cam, &mut ui);
        let once = cam.zoom();
        input.handle_event(key(InputCode::ZoomIn, true), &mut cam, &mut ui);
        assert_eq!(cam.zoom(), once);

        input.handle_event(key(InputCode::ZoomIn, false), &mut cam, &mut ui);
        input.handle_event(key(InputCode::ZoomIn, true), &mut cam, &mut ui);
        assert!(cam.zoom() > once);
    }

    #[test]
    fn active_selection_tracks_pointer_while_dragging() {
        let mut cam = camera();
        let mut ui = HeadlessUi::default();
        let mut input = InputMapper::default();
        assert!(input.active_selection().is_none());

        input.handle_event(press(PointerButton::Primary, 50.0, 50.0), &mut cam, &mut ui);
        input.handle_event(
            InputEvent::PointerMove(PointerInput::at(10.0, 90.0).with_buttons(BUTTONS_PRIMARY)),
            &mut cam,
            &mut ui,
        );

        let rect = input.active_selection().expect("dragging");
        assert_eq!(rect.min, Vec2::new(10.0, 50.0));
        assert_eq!(rect.max, Vec2::new(50.0, 90.0));
    }
}
