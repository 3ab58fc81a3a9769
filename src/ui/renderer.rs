/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// Two levels of diffing:
///   1. The grid pushes `RenderOp`s only when a block kind changes (plus
///      sub-cell offsets of falling blocks). They are applied to `visuals`,
///      the renderer's own picture of the grid.
///   2. Each frame is composed into the `front` buffer and compared with
///      `back`; only changed terminal cells are written, batched with
///      `queue!` and flushed once.
///
/// Each grid cell is two terminal columns wide.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::cell::BlockKind;
use crate::domain::entity::Facing;
use crate::sim::grid::RenderOp;
use crate::sim::world::{Phase, World};

// ── TermCell: the unit of the frame buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct TermCell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl TermCell {
    /// Explicit dark background so cell gaps match the cleared screen.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: TermCell = TermCell { ch: ' ', fg: Color::White, bg: TermCell::BASE_BG };

    /// Differs from any real cell, so every position will be diff'd.
    const INVALID: TermCell = TermCell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        TermCell { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of TermCells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<TermCell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![TermCell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![TermCell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(TermCell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: TermCell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> TermCell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            TermCell::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width {
                break;
            }
            self.set(x + i, y, TermCell::new(ch, fg, TermCell::BASE_BG));
        }
    }
}

// ── Visual grid ──

/// What the renderer currently shows for one grid cell.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
struct Visual {
    kind: BlockKind,
    dy: f32,
}

/// Two-column glyph and colour for a block kind.
fn block_style(kind: BlockKind) -> ([char; 2], Color) {
    match kind {
        BlockKind::Empty => ([' ', ' '], Color::White),
        BlockKind::Solid => (['█', '█'], Color::Grey),
        BlockKind::Movable => (['[', ']'], Color::Yellow),
        BlockKind::Fallable => (['{', '}'], Color::Rgb { r: 255, g: 150, b: 40 }),
        BlockKind::Switch => (['_', '_'], Color::Cyan),
        BlockKind::SwitchPressed => (['.', '.'], Color::Cyan),
        BlockKind::SwitchBase => (['▀', '▀'], Color::DarkCyan),
        BlockKind::SwitchingOff => ([':', ':'], Color::DarkMagenta),
        BlockKind::SwitchingOn => (['#', '#'], Color::Magenta),
        BlockKind::Goal => (['(', ')'], Color::Green),
        BlockKind::Spike => (['^', '^'], Color::Red),
    }
}

// ── Renderer ──

const CELL_W: usize = 2;

/// Vertical layout
const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    visuals: Vec<Vec<Visual>>,
    generation: Option<u64>,
    block_size: f32,
}

impl Renderer {
    pub fn new(block_size: f32) -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            visuals: vec![],
            generation: None,
            block_size,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(TermCell::BASE_BG),
            Clear(ClearType::All)
        )?;
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.resize(tw as usize, th as usize);
        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(self.writer, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    fn resize(&mut self, w: usize, h: usize) {
        self.term_w = w;
        self.term_h = h;
        self.front.resize(w, h);
        self.back.resize(w, h);
        // Force full repaint: back ≠ front for every cell.
        self.back.cells.fill(TermCell::INVALID);
    }

    /// Apply queued grid changes to the visual grid.
    fn apply(&mut self, ops: Vec<RenderOp>) {
        for op in ops {
            let (x, y) = match op {
                RenderOp::Put { x, y, .. } | RenderOp::Remove { x, y } | RenderOp::Offset { x, y, .. } => (x, y),
            };
            let Some(v) = self.visuals.get_mut(y).and_then(|r| r.get_mut(x)) else {
                log::debug!("render op outside the visual grid: {op:?}");
                continue;
            };
            match op {
                RenderOp::Put { kind, .. } => *v = Visual { kind, dy: 0.0 },
                RenderOp::Remove { .. } => *v = Visual::default(),
                RenderOp::Offset { dy, .. } => v.dy = dy,
            }
        }
    }

    pub fn render(&mut self, world: &mut World) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.resize(tw as usize, th as usize);
            queue!(self.writer, SetBackgroundColor(TermCell::BASE_BG), Clear(ClearType::All))?;
        }

        // New stage: drop the old picture, the fresh grid republishes everything.
        if self.generation != Some(world.generation()) {
            let (w, h) = (world.grid().width(), world.grid().height());
            self.visuals = vec![vec![Visual::default(); w]; h];
            self.generation = Some(world.generation());
            self.back.cells.fill(TermCell::INVALID);
            queue!(self.writer, SetBackgroundColor(TermCell::BASE_BG), Clear(ClearType::All))?;
        }
        let ops = world.grid_mut().take_render_ops();
        self.apply(ops);

        self.front.clear();
        self.compose_hud(world);
        self.compose_map(world);
        self.compose_footer(world);

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = TermCell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        queue!(self.writer, SetForegroundColor(last_fg), SetBackgroundColor(last_bg))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    continue;
                }
                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }
        self.writer.flush()
    }

    // ── Compose ──

    fn compose_hud(&mut self, w: &World) {
        let state = w.grid().state();
        let hud = format!(
            "Stage {}/{}  {}   moves {}   history {}/{}",
            w.stage_index() + 1,
            w.stage_count(),
            w.stage_name(),
            state.usage,
            w.history().index() / 2,
            w.history().len() / 2,
        );
        self.front.put_str(0, HUD_ROW, &hud, Color::White);
        if let Some(kind) = state.inventory {
            let tag = if state.inventory_is_infinite { "∞" } else { "1" };
            let inv = format!("  holding {} x{tag}", kind.glyph());
            let x = hud.chars().count();
            self.front.put_str(x, HUD_ROW, &inv, Color::DarkGrey);
        }
    }

    fn compose_map(&mut self, w: &World) {
        // Blocks; a falling block is drawn in the row its offset rounds to.
        for (gy, row) in self.visuals.iter().enumerate() {
            for (gx, v) in row.iter().enumerate() {
                if v.kind == BlockKind::Empty {
                    continue;
                }
                let (glyph, fg) = block_style(v.kind);
                let ty = MAP_ROW + gy + v.dy.round() as usize;
                for (i, ch) in glyph.iter().enumerate() {
                    let tx = gx * CELL_W + i;
                    if tx < self.front.width && ty < self.front.height {
                        self.front.cells[ty * self.front.width + tx] = TermCell::new(*ch, fg, TermCell::BASE_BG);
                    }
                }
            }
        }

        // Player
        let p = &w.sim.player;
        let px = (p.x / self.block_size).floor();
        let py = (p.y / self.block_size).floor();
        if px >= 0.0 && py >= 0.0 {
            let glyph = match p.facing {
                Facing::Left => ['<', '@'],
                Facing::Right => ['@', '>'],
            };
            let fg = if w.phase() == Phase::GameOver { Color::Red } else { Color::White };
            for (i, ch) in glyph.iter().enumerate() {
                self.front.set(px as usize * CELL_W + i, MAP_ROW + py as usize, TermCell::new(*ch, fg, TermCell::BASE_BG));
            }
        }
    }

    fn compose_footer(&mut self, w: &World) {
        let y = MAP_ROW + self.visuals.len() + 1;
        let (msg, fg) = match w.phase() {
            Phase::AllCleared => ("All stages cleared!  [q] quit".to_string(), Color::Green),
            Phase::Paused => ("PAUSED  [p] resume".to_string(), Color::Yellow),
            _ => (w.message.clone(), Color::Yellow),
        };
        self.front.put_str(0, y, &msg, fg);
        self.front.put_str(
            0,
            y + 1,
            "←/→ move  ↑/space jump  [z] undo  [y] redo  [r] restart  [p] pause  [n] next  [q] quit",
            Color::DarkGrey,
        );
        if let Some(last) = w.grid().diagnostics().last() {
            self.front.put_str(0, y + 2, last, Color::DarkRed);
        }
    }
}
