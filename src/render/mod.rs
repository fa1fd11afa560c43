use crate::{
    config::{CELL_PX_H, CELL_PX_W},
    project::{ElementTransform, HostSurface},
    types::{Body, BodyId, ColorTag},
};

/// Glyphs from faintest to most opaque.
const SHADES: [char; 4] = ['░', '▒', '▓', '█'];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderCell {
    pub ch: char,
    pub depth: f32,
    pub color: Option<ColorTag>,
}

const EMPTY_CELL: RenderCell = RenderCell {
    ch: ' ',
    depth: f32::NEG_INFINITY,
    color: None,
};

#[derive(Debug)]
pub struct FrameBuffer {
    width: u16,
    height: u16,
    cells: Vec<RenderCell>,
}

impl FrameBuffer {
    pub fn new(width: u16, height: u16) -> Self {
        let mut buffer = Self {
            width,
            height,
            cells: Vec::new(),
        };
        buffer.resize(width, height);
        buffer
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let len = (width as usize).saturating_mul(height as usize);
        if self.cells.len() != len {
            self.cells.resize(len, EMPTY_CELL);
        }
        self.clear();
    }

    pub fn clear(&mut self) {
        self.cells.fill(EMPTY_CELL);
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn get(&self, x: u16, y: u16) -> RenderCell {
        debug_assert!(x < self.width && y < self.height, "get() out of bounds");
        let idx = (y as usize) * (self.width as usize) + (x as usize);
        self.cells[idx]
    }

    /// Writes a cell unless something nearer already occupies it.
    fn set(&mut self, x: i32, y: i32, ch: char, depth: f32, color: ColorTag) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let idx = (y as usize) * (self.width as usize) + (x as usize);
        let cell = &mut self.cells[idx];
        if depth >= cell.depth {
            cell.depth = depth;
            cell.ch = ch;
            cell.color = Some(color);
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Element {
    color: ColorTag,
    size: (f32, f32),
    transform: Option<ElementTransform>,
    opacity: f32,
    visible: bool,
}

/// Host surface backed by a grid of terminal cells. Each cell spans
/// `CELL_PX_W`x`CELL_PX_H` surface pixels.
#[derive(Debug)]
pub struct TerminalSurface {
    cols: u16,
    rows: u16,
    elements: Vec<Element>,
}

impl TerminalSurface {
    /// One element per body, styled by the body's colour tag.
    pub fn new(bodies: &[Body]) -> Self {
        let elements = bodies
            .iter()
            .map(|b| Element {
                color: b.color,
                size: (0.0, 0.0),
                transform: None,
                opacity: b.base_opacity,
                visible: false,
            })
            .collect();
        Self {
            cols: 0,
            rows: 0,
            elements,
        }
    }

    /// Returns true when the grid size actually changed.
    pub fn resize(&mut self, cols: u16, rows: u16) -> bool {
        if self.cols == cols && self.rows == rows {
            return false;
        }
        self.cols = cols;
        self.rows = rows;
        true
    }

    pub fn visible_count(&self) -> usize {
        self.elements.iter().filter(|e| e.visible).count()
    }

    pub fn rasterize(&self, frame: &mut FrameBuffer) {
        if frame.width() != self.cols || frame.height() != self.rows {
            frame.resize(self.cols, self.rows);
        } else {
            frame.clear();
        }

        for element in self.elements.iter().filter(|e| e.visible) {
            let Some(t) = element.transform else {
                continue;
            };
            let (w, h) = element.size;
            let cx = t.dx + w * 0.5;
            let cy = t.dy + h * 0.5;
            let radius = w.max(h) * 0.5 * t.scale;
            let glyph = shade(element.opacity);

            let x0 = ((cx - radius) / CELL_PX_W).floor() as i32;
            let x1 = ((cx + radius) / CELL_PX_W).ceil() as i32;
            let y0 = ((cy - radius) / CELL_PX_H).floor() as i32;
            let y1 = ((cy + radius) / CELL_PX_H).ceil() as i32;
            for y in y0..=y1 {
                for x in x0..=x1 {
                    let px = (x as f32 + 0.5) * CELL_PX_W - cx;
                    let py = (y as f32 + 0.5) * CELL_PX_H - cy;
                    if px * px + py * py <= radius * radius {
                        frame.set(x, y, glyph, t.dz, element.color);
                    }
                }
            }
            let center_x = (cx / CELL_PX_W).floor() as i32;
            let center_y = (cy / CELL_PX_H).floor() as i32;
            frame.set(center_x, center_y, glyph, t.dz, element.color);
        }
    }

    fn element_mut(&mut self, id: BodyId) -> Option<&mut Element> {
        self.elements.get_mut(id)
    }
}

impl HostSurface for TerminalSurface {
    fn dimensions(&self) -> (f32, f32) {
        (self.cols as f32 * CELL_PX_W, self.rows as f32 * CELL_PX_H)
    }

    fn set_element_transform(&mut self, id: BodyId, transform: ElementTransform) {
        if let Some(element) = self.element_mut(id) {
            element.transform = Some(transform);
        }
    }

    fn set_element_opacity(&mut self, id: BodyId, opacity: f32) {
        if let Some(element) = self.element_mut(id) {
            element.opacity = opacity;
        }
    }

    fn set_element_visible(&mut self, id: BodyId, visible: bool) {
        if let Some(element) = self.element_mut(id) {
            element.visible = visible;
        }
    }

    fn set_element_size(&mut self, id: BodyId, width: f32, height: f32) {
        if let Some(element) = self.element_mut(id) {
            element.size = (width, height);
        }
    }
}

fn shade(opacity: f32) -> char {
    let idx = (opacity.clamp(0.0, 1.0) * SHADES.len() as f32) as usize;
    SHADES[idx.min(SHADES.len() - 1)]
}
