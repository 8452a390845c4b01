#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorStyle {
    #[default]
    Default,
    Selecting,
    Paint,
}

/// What the input layer needs from the surrounding UI: which pointer mode is
/// active, which tile the editor palette has picked, and a way to change the cursor.
pub trait UiSurface {
    fn is_map_editor_visible(&self) -> bool;
    fn selected_tile_index(&self) -> Option<u16>;
    fn set_cursor(&mut self, style: CursorStyle);
}

/// In-memory UI state for headless runs and tests.
#[derive(Debug, Clone, Default)]
pub struct HeadlessUi {
    pub map_editor_visible: bool,
    pub selected_tile: Option<u16>,
    pub cursor: CursorStyle,
    pub cursor_changes: usize,
}

impl UiSurface for HeadlessUi {
    fn is_map_editor_visible(&self) -> bool {
        self.map_editor_visible
    }

    fn selected_tile_index(&self) -> Option<u16> {
        self.selected_tile
    }

    fn set_cursor(&mut self, style: CursorStyle) {
        self.cursor = style;
        self.cursor_changes += 1;
    }
}
