use super::backend::{
    FragmentKind, GraphicsBackend, ProgramDesc, ProgramHandle, RenderError, TextureBinding,
    TextureHandle,
};
use super::category::{CategoryRenderer, FrameData, TextLine};
use super::instance::{InstanceBuffer, InstanceRecord, FULL_UV};

pub const FIRST_GLYPH: char = ' ';
pub const LAST_GLYPH: char = '~';
pub const GLYPH_LAYERS: u32 = LAST_GLYPH as u32 - FIRST_GLYPH as u32 + 1;

/// Atlas layer for `ch`; anything outside printable ASCII renders as `?`.
pub fn glyph_layer(ch: char) -> u32 {
    let ch = if (FIRST_GLYPH..=LAST_GLYPH).contains(&ch) {
        ch
    } else {
        '?'
    };
    ch as u32 - FIRST_GLYPH as u32
}

fn push_line(buffer: &mut InstanceBuffer, line: &TextLine) {
    let mut x = line.origin.x;
    for ch in line.text.chars() {
        if ch != ' ' {
            buffer.push(
                InstanceRecord::textured(
                    x,
                    line.origin.y,
                    line.glyph_size,
                    line.glyph_size,
                    FULL_UV,
                    glyph_layer(ch),
                )
                .with_color(line.color),
            );
        }
        x += line.glyph_size;
    }
}

/// Monospaced glyph quads for overlay readouts.
#[derive(Debug)]
pub struct TextRenderer {
    program: ProgramHandle,
    texture: TextureHandle,
    buffer: InstanceBuffer,
    last_lines: Vec<TextLine>,
}

impl TextRenderer {
    pub fn new(
        backend: &mut dyn GraphicsBackend,
        texture: TextureHandle,
        capacity: usize,
    ) -> Result<Self, RenderError> {
        let program = backend.create_program(&ProgramDesc {
            label: "text",
            fragment: FragmentKind::Textured,
        })?;
        let buffer = InstanceBuffer::new(backend, "glyph_instances", capacity)?;
        Ok(Self {
            program,
            texture,
            buffer,
            last_lines: Vec::new(),
        })
    }

    pub fn buffer(&self) -> &InstanceBuffer {
        &self.buffer
    }
}

impl CategoryRenderer for TextRenderer {
    fn name(&self) -> &'static str {
        "text"
    }

    fn update_transform_data(&mut self, frame: &FrameData<'_>) {
        // The readout only changes once per FPS interval.
        if self.last_lines.as_slice() == frame.text {
            return;
        }
        self.last_lines = frame.text.to_vec();
        self.buffer.clear();
        for line in frame.text {
            push_line(&mut self.buffer, line);
        }
    }

    fn render(&mut self, backend: &mut dyn GraphicsBackend) -> Result<(), RenderError> {
        self.buffer
            .draw(backend, self.program, TextureBinding::Array(self.texture))
    }

    fn instance_count(&self) -> usize {
        self.buffer.len()
    }

    fn dispose(&mut self, backend: &mut dyn GraphicsBackend) {
        self.buffer.dispose(backend);
        backend.destroy_program(self.program);
    }
}
