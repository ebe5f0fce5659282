//! Terminal surface abstraction and the cell-level canvas built on top of it.
//!
//! The core never formats escape sequences itself. Game objects talk to a
//! [`Canvas`], which maps logical cells to screen cells and forwards plain
//! cursor/glyph requests to a [`Surface`].

use std::io::{self, Write};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossterm::QueueableCommand;
use crossterm::cursor::MoveTo;
use crossterm::style::{
    Color as TermColor, Print, ResetColor, SetBackgroundColor, SetForegroundColor,
};
use crossterm::terminal::{Clear, ClearType, SetSize};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use unicode_width::UnicodeWidthStr;

use crate::config::{CELL_COLUMNS, EngineConfig, GLYPH_BLANK};
use crate::position::Position;

/// Cell-level drawing primitives a terminal backend must provide.
pub trait Surface: Send {
    fn set_cursor(&mut self, column: u16, row: u16) -> io::Result<()>;

    /// Writes `text` at the cursor and advances the cursor past it.
    fn write_glyph(&mut self, text: &str, fg: Color, bg: Color) -> io::Result<()>;

    fn clear_screen(&mut self) -> io::Result<()>;

    fn set_window_geometry(&mut self, columns: u16, rows: u16) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Surface that queues crossterm commands onto any writer.
pub struct CrosstermSurface<W: Write + Send> {
    writer: W,
}

impl CrosstermSurface<io::Stdout> {
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> CrosstermSurface<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Surface for CrosstermSurface<W> {
    fn set_cursor(&mut self, column: u16, row: u16) -> io::Result<()> {
        self.writer.queue(MoveTo(column, row))?;
        Ok(())
    }

    fn write_glyph(&mut self, text: &str, fg: Color, bg: Color) -> io::Result<()> {
        self.writer
            .queue(SetForegroundColor(to_term_color(fg)))?
            .queue(SetBackgroundColor(to_term_color(bg)))?
            .queue(Print(text))?;
        Ok(())
    }

    fn clear_screen(&mut self) -> io::Result<()> {
        self.writer
            .queue(ResetColor)?
            .queue(Clear(ClearType::All))?;
        Ok(())
    }

    fn set_window_geometry(&mut self, columns: u16, rows: u16) -> io::Result<()> {
        self.writer.queue(SetSize(columns, rows))?;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.queue(ResetColor)?;
        self.writer.flush()
    }
}

fn to_term_color(color: Color) -> TermColor {
    match color {
        Color::Reset => TermColor::Reset,
        Color::Black => TermColor::Black,
        Color::Red => TermColor::DarkRed,
        Color::Green => TermColor::DarkGreen,
        Color::Yellow => TermColor::DarkYellow,
        Color::Blue => TermColor::DarkBlue,
        Color::Magenta => TermColor::DarkMagenta,
        Color::Cyan => TermColor::DarkCyan,
        Color::Gray => TermColor::Grey,
        Color::DarkGray => TermColor::DarkGrey,
        Color::LightRed => TermColor::Red,
        Color::LightGreen => TermColor::Green,
        Color::LightYellow => TermColor::Yellow,
        Color::LightBlue => TermColor::Blue,
        Color::LightMagenta => TermColor::Magenta,
        Color::LightCyan => TermColor::Cyan,
        Color::White => TermColor::White,
        Color::Indexed(index) => TermColor::AnsiValue(index),
        Color::Rgb(r, g, b) => TermColor::Rgb { r, g, b },
    }
}

/// One recorded `write_glyph` call on a [`BufferSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphWrite {
    pub column: u16,
    pub row: u16,
    pub text: String,
    pub fg: Color,
    pub bg: Color,
}

#[derive(Debug)]
struct BufferState {
    buffer: Buffer,
    cursor: (u16, u16),
    history: VecDeque<GlyphWrite>,
    history_limit: usize,
    writes: usize,
    clears: usize,
    flushes: usize,
}

/// Glyph writes a [`BufferSurface`] remembers by default.
pub const DEFAULT_HISTORY_LIMIT: usize = 4096;

/// In-memory surface backed by a ratatui [`Buffer`].
///
/// Clones share the same buffer, so a test can hand one clone to the engine
/// and inspect the screen through another. Only the most recent glyph
/// writes are kept in the history, so long headless runs stay bounded.
#[derive(Debug, Clone)]
pub struct BufferSurface {
    state: Arc<Mutex<BufferState>>,
}

impl BufferSurface {
    #[must_use]
    pub fn new(columns: u16, rows: u16) -> Self {
        Self::with_history_limit(columns, rows, DEFAULT_HISTORY_LIMIT)
    }

    /// Creates a surface that keeps at most `limit` glyph writes.
    #[must_use]
    pub fn with_history_limit(columns: u16, rows: u16, limit: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(BufferState {
                buffer: Buffer::empty(Rect::new(0, 0, columns, rows)),
                cursor: (0, 0),
                history: VecDeque::with_capacity(limit.min(DEFAULT_HISTORY_LIMIT)),
                history_limit: limit,
                writes: 0,
                clears: 0,
                flushes: 0,
            })),
        }
    }

    /// Returns the symbol drawn at a screen cell.
    #[must_use]
    pub fn symbol_at(&self, column: u16, row: u16) -> Option<String> {
        let state = self.lock();
        state
            .buffer
            .cell((column, row))
            .map(|cell| cell.symbol().to_owned())
    }

    /// Returns the background color of a screen cell.
    #[must_use]
    pub fn background_at(&self, column: u16, row: u16) -> Option<Color> {
        let state = self.lock();
        state.buffer.cell((column, row)).map(|cell| cell.bg)
    }

    /// Recent glyph writes, oldest first, since creation or the last
    /// [`take_history`](Self::take_history).
    #[must_use]
    pub fn history(&self) -> Vec<GlyphWrite> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn take_history(&self) -> Vec<GlyphWrite> {
        self.lock().history.drain(..).collect()
    }

    /// Total glyph writes since creation, including those no longer kept
    /// in the history.
    #[must_use]
    pub fn glyph_writes(&self) -> usize {
        self.lock().writes
    }

    #[must_use]
    pub fn clears(&self) -> usize {
        self.lock().clears
    }

    #[must_use]
    pub fn flushes(&self) -> usize {
        self.lock().flushes
    }

    #[must_use]
    pub fn size(&self) -> (u16, u16) {
        let area = self.lock().buffer.area;
        (area.width, area.height)
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Surface for BufferSurface {
    fn set_cursor(&mut self, column: u16, row: u16) -> io::Result<()> {
        self.lock().cursor = (column, row);
        Ok(())
    }

    fn write_glyph(&mut self, text: &str, fg: Color, bg: Color) -> io::Result<()> {
        let mut state = self.lock();
        let (column, row) = state.cursor;
        state.writes += 1;
        if state.history_limit > 0 {
            if state.history.len() == state.history_limit {
                state.history.pop_front();
            }
            state.history.push_back(GlyphWrite {
                column,
                row,
                text: text.to_owned(),
                fg,
                bg,
            });
        }

        let area = state.buffer.area;
        if column < area.right() && row < area.bottom() {
            state
                .buffer
                .set_string(column, row, text, Style::new().fg(fg).bg(bg));
        }

        let advance = u16::try_from(text.width()).unwrap_or(u16::MAX);
        state.cursor = (column.saturating_add(advance), row);
        Ok(())
    }

    fn clear_screen(&mut self) -> io::Result<()> {
        let mut state = self.lock();
        state.buffer.reset();
        state.cursor = (0, 0);
        state.clears += 1;
        Ok(())
    }

    fn set_window_geometry(&mut self, columns: u16, rows: u16) -> io::Result<()> {
        self.lock().buffer.resize(Rect::new(0, 0, columns, rows));
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock().flushes += 1;
        Ok(())
    }
}

/// Shared, cell-addressed drawing handle used by every core component.
///
/// Each cell draw moves the cursor and writes the glyph under one lock, so
/// draws from the render thread and from game logic never interleave.
#[derive(Clone)]
pub struct Canvas {
    config: Arc<EngineConfig>,
    surface: Arc<Mutex<Box<dyn Surface>>>,
    /// Set by [`Canvas::draw_frame`], cleared by every other write.
    pristine: Arc<AtomicBool>,
}

impl Canvas {
    pub fn new(config: Arc<EngineConfig>, surface: impl Surface + 'static) -> Self {
        Self {
            config,
            surface: Arc::new(Mutex::new(Box::new(surface))),
            pristine: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn shared_config(&self) -> Arc<EngineConfig> {
        Arc::clone(&self.config)
    }

    /// Draws the cell glyph at `position` in `color`.
    ///
    /// Returns `Ok(false)` without touching the surface when the position is
    /// outside the drawable interior.
    pub fn draw_cell(&self, position: Position, color: Color) -> io::Result<bool> {
        let Some((column, row)) = self.config.screen_cell(position) else {
            return Ok(false);
        };

        let mut surface = self.lock();
        self.pristine.store(false, Ordering::Release);
        surface.set_cursor(column, row)?;
        surface.write_glyph(&self.config.cell_glyph, color, color)?;
        Ok(true)
    }

    /// Blanks the cell at `position` with the background color.
    pub fn erase_cell(&self, position: Position) -> io::Result<bool> {
        let Some((column, row)) = self.config.screen_cell(position) else {
            return Ok(false);
        };

        let background = self.config.background;
        let mut surface = self.lock();
        self.pristine.store(false, Ordering::Release);
        surface.set_cursor(column, row)?;
        surface.write_glyph(GLYPH_BLANK, background, background)?;
        Ok(true)
    }

    pub fn clear(&self) -> io::Result<()> {
        let mut surface = self.lock();
        self.pristine.store(false, Ordering::Release);
        surface.clear_screen()?;
        surface.flush()
    }

    /// Draws the map border around the interior.
    pub fn draw_border(&self) -> io::Result<()> {
        let mut surface = self.lock();
        self.pristine.store(false, Ordering::Release);
        self.write_border(&mut **surface)?;
        surface.flush()
    }

    /// Clears the surface and draws the border as one step.
    pub fn draw_frame(&self) -> io::Result<()> {
        let mut surface = self.lock();
        self.pristine.store(false, Ordering::Release);
        surface.clear_screen()?;
        self.write_border(&mut **surface)?;
        surface.flush()?;
        self.pristine.store(true, Ordering::Release);
        Ok(())
    }

    /// True while the surface shows a freshly drawn frame and nothing else.
    #[must_use]
    pub fn is_pristine(&self) -> bool {
        self.pristine.load(Ordering::Acquire)
    }

    fn write_border(&self, surface: &mut dyn Surface) -> io::Result<()> {
        let border = i32::from(self.config.border_thickness);
        if border == 0 {
            return Ok(());
        }

        let width = i32::from(self.config.grid.width);
        let height = i32::from(self.config.grid.height);
        let color = self.config.border_color;

        for y in 0..height + 2 * border {
            for x in 0..width + 2 * border {
                let in_border =
                    y < border || y >= height + border || x < border || x >= width + border;
                if !in_border {
                    continue;
                }

                let (Ok(column), Ok(row)) = (
                    u16::try_from(x * CELL_COLUMNS as i32),
                    u16::try_from(y),
                ) else {
                    continue;
                };
                surface.set_cursor(column, row)?;
                surface.write_glyph(&self.config.border_glyph, color, color)?;
            }
        }
        Ok(())
    }

    /// Requests the window geometry derived from the map dimensions.
    pub fn apply_window_geometry(&self) -> io::Result<()> {
        let (columns, rows) = self.config.window_size();
        self.lock().set_window_geometry(columns, rows)
    }

    pub fn flush(&self) -> io::Result<()> {
        self.lock().flush()
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Surface>> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ratatui::style::Color;

    use super::{BufferSurface, Canvas, CrosstermSurface, Surface};
    use crate::config::EngineConfig;
    use crate::position::Position;

    fn canvas_10x10(border: u16) -> (Canvas, BufferSurface) {
        let config = Arc::new(EngineConfig::new(10, 10).unwrap().with_border(border));
        let (columns, rows) = config.window_size();
        let surface = BufferSurface::new(columns, rows);
        (Canvas::new(config, surface.clone()), surface)
    }

    #[test]
    fn draw_cell_writes_glyph_at_mapped_screen_cell() {
        let (canvas, surface) = canvas_10x10(1);

        assert!(canvas.draw_cell(Position::new(3, 1), Color::Blue).unwrap());

        assert_eq!(surface.symbol_at(6, 1).as_deref(), Some("#"));
        assert_eq!(surface.symbol_at(7, 1).as_deref(), Some("#"));
        assert_eq!(surface.background_at(6, 1), Some(Color::Blue));
    }

    #[test]
    fn erase_cell_restores_background() {
        let (canvas, surface) = canvas_10x10(1);
        canvas.draw_cell(Position::new(2, 2), Color::Red).unwrap();

        assert!(canvas.erase_cell(Position::new(2, 2)).unwrap());

        assert_eq!(surface.symbol_at(4, 2).as_deref(), Some(" "));
        assert_eq!(surface.background_at(4, 2), Some(Color::Black));
    }

    #[test]
    fn out_of_range_positions_are_clipped_silently() {
        let (canvas, surface) = canvas_10x10(1);

        assert!(!canvas.draw_cell(Position::new(0, 1), Color::Red).unwrap());
        assert!(!canvas.erase_cell(Position::new(11, 11)).unwrap());
        assert_eq!(surface.glyph_writes(), 0);
    }

    #[test]
    fn border_surrounds_interior_only() {
        let (canvas, surface) = canvas_10x10(1);

        canvas.draw_border().unwrap();

        // 12x12 frame minus the 10x10 interior.
        assert_eq!(surface.glyph_writes(), 144 - 100);
        assert_eq!(surface.symbol_at(0, 0).as_deref(), Some("0"));
        assert_eq!(surface.background_at(22, 11), Some(Color::White));
        assert_eq!(surface.background_at(2, 1), Some(Color::Reset));
    }

    #[test]
    fn crossterm_surface_emits_escape_sequences() {
        let mut surface = CrosstermSurface::new(Vec::new());

        surface.set_cursor(4, 2).unwrap();
        surface
            .write_glyph("##", Color::Green, Color::Green)
            .unwrap();
        surface.flush().unwrap();

        let output = String::from_utf8(surface.into_inner()).unwrap();
        assert!(output.contains("\u{1b}[3;5H"));
        assert!(output.contains("##"));
    }

    #[test]
    fn history_keeps_only_the_most_recent_writes() {
        let mut surface = BufferSurface::with_history_limit(20, 1, 3);

        for column in 0..10 {
            surface.set_cursor(column, 0).unwrap();
            surface.write_glyph("x", Color::Red, Color::Red).unwrap();
        }

        let columns: Vec<u16> = surface.history().iter().map(|write| write.column).collect();
        assert_eq!(columns, vec![7, 8, 9]);
        assert_eq!(surface.glyph_writes(), 10);
        assert_eq!(surface.take_history().len(), 3);
        assert!(surface.history().is_empty());
    }

    #[test]
    fn frame_stays_pristine_until_a_cell_is_drawn() {
        let (canvas, surface) = canvas_10x10(1);
        assert!(!canvas.is_pristine());

        canvas.draw_frame().unwrap();
        assert!(canvas.is_pristine());
        assert_eq!(surface.clears(), 1);
        assert_eq!(surface.glyph_writes(), 144 - 100);

        canvas.draw_cell(Position::new(1, 1), Color::Blue).unwrap();
        assert!(!canvas.is_pristine());

        canvas.draw_frame().unwrap();
        canvas.clear().unwrap();
        assert!(!canvas.is_pristine());
    }
}
