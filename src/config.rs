use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ratatui::style::Color;
use serde::Deserialize;
use unicode_width::UnicodeWidthStr;

use crate::error::{EngineError, Result};
use crate::position::Position;

const APP_DIR_NAME: &str = "console-grid";
const CONFIG_FILE_NAME: &str = "config.json";

/// Glyph drawn for every occupied cell.
pub const GLYPH_CELL: &str = "##";

/// Glyph drawn for every border cell.
pub const GLYPH_BORDER: &str = "00";

/// Glyph written when a cell is erased.
pub const GLYPH_BLANK: &str = "  ";

/// Every logical cell occupies this many terminal columns.
pub const CELL_COLUMNS: usize = 2;

/// Default pause between two render cycles.
pub const DEFAULT_CYCLE_INTERVAL_MS: u64 = 16;

pub const DEFAULT_MAP_WIDTH: u16 = 20;
pub const DEFAULT_MAP_HEIGHT: u16 = 20;

/// Interior map dimensions.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct GridSize {
    pub width: u16,
    pub height: u16,
}

impl GridSize {
    /// Returns the total number of interior cells.
    #[must_use]
    pub fn total_cells(self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }
}

/// Immutable engine configuration produced once at init time.
///
/// Every core component reads map bounds, border geometry and colors from a
/// shared `Arc<EngineConfig>` instead of global state.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub grid: GridSize,
    pub border_thickness: u16,
    pub border_color: Color,
    /// Color written into erased cells.
    pub background: Color,
    pub title: Option<String>,
    pub cell_glyph: String,
    pub border_glyph: String,
    pub cycle_interval: Duration,
}

impl EngineConfig {
    /// Creates a borderless configuration for a `width` x `height` map.
    pub fn new(width: u16, height: u16) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(EngineError::InvalidDimensions { width, height });
        }

        Ok(Self {
            grid: GridSize { width, height },
            border_thickness: 0,
            border_color: Color::White,
            background: Color::Black,
            title: None,
            cell_glyph: GLYPH_CELL.to_owned(),
            border_glyph: GLYPH_BORDER.to_owned(),
            cycle_interval: Duration::from_millis(DEFAULT_CYCLE_INTERVAL_MS),
        })
    }

    /// Replaces the map dimensions, keeping every other setting.
    pub fn with_grid(mut self, width: u16, height: u16) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(EngineError::InvalidDimensions { width, height });
        }

        self.grid = GridSize { width, height };
        Ok(self)
    }

    #[must_use]
    pub fn with_border(mut self, thickness: u16) -> Self {
        self.border_thickness = thickness;
        self
    }

    #[must_use]
    pub fn with_border_color(mut self, color: Color) -> Self {
        self.border_color = color;
        self
    }

    #[must_use]
    pub fn with_background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_cycle_interval(mut self, interval: Duration) -> Self {
        self.cycle_interval = interval;
        self
    }

    /// Replaces the glyph drawn for occupied cells.
    ///
    /// The glyph must fill exactly one logical cell (two terminal columns).
    pub fn with_cell_glyph(mut self, glyph: impl Into<String>) -> Result<Self> {
        let glyph = glyph.into();
        let width = glyph.width();
        if width != CELL_COLUMNS {
            return Err(EngineError::InvalidGlyph { glyph, width });
        }

        self.cell_glyph = glyph;
        Ok(self)
    }

    /// Returns true when `position` lies inside the bordered interior.
    #[must_use]
    pub fn is_drawable(&self, position: Position) -> bool {
        position.x >= 1
            && position.y >= 1
            && position.x <= i32::from(self.grid.width)
            && position.y <= i32::from(self.grid.height)
    }

    /// Maps an interior position to its `(column, row)` on screen.
    ///
    /// Returns `None` for positions in the border or outside the map.
    #[must_use]
    pub fn screen_cell(&self, position: Position) -> Option<(u16, u16)> {
        if !self.is_drawable(position) {
            return None;
        }

        let x = u16::try_from(position.x).ok()?;
        let y = u16::try_from(position.y).ok()?;
        let column = self
            .border_thickness
            .checked_add(x - 1)?
            .checked_mul(CELL_COLUMNS as u16)?;
        let row = self.border_thickness.checked_add(y - 1)?;

        Some((column, row))
    }

    /// Screen columns and rows spanned by the map including its border.
    #[must_use]
    pub fn frame_size(&self) -> (u16, u16) {
        let border = self.border_thickness.saturating_mul(2);
        let columns = self
            .grid
            .width
            .saturating_add(border)
            .saturating_mul(CELL_COLUMNS as u16);
        let rows = self.grid.height.saturating_add(border);
        (columns, rows)
    }

    /// Window geometry requested from the terminal at init.
    ///
    /// One spare column and row keep the cursor from scrolling the frame.
    #[must_use]
    pub fn window_size(&self) -> (u16, u16) {
        let (columns, rows) = self.frame_size();
        (columns.saturating_add(2), rows.saturating_add(1))
    }

    /// Applies toroidal wrap-around to both axes independently.
    ///
    /// A coordinate below 1 re-enters at the far edge and a coordinate past
    /// the far edge re-enters at 1.
    #[must_use]
    pub fn wrap(&self, position: Position) -> Position {
        Position {
            x: wrap_axis(position.x, i32::from(self.grid.width)),
            y: wrap_axis(position.y, i32::from(self.grid.height)),
        }
    }

    /// Loads configuration from the platform config directory.
    ///
    /// Falls back to defaults when no config file exists yet.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&config_path())
    }

    /// Loads configuration from a JSON file at `path`.
    ///
    /// Returns defaults when the file does not exist and `Err` when it exists
    /// but cannot be read or parsed.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Self::new(DEFAULT_MAP_WIDTH, DEFAULT_MAP_HEIGHT);
            }
            Err(e) => return Err(e.into()),
        };

        let file = serde_json::from_str::<ConfigFile>(&raw).map_err(|source| {
            EngineError::Config {
                path: path.to_path_buf(),
                source,
            }
        })?;

        file.into_config()
    }
}

/// Returns the platform-correct config file path.
#[must_use]
pub fn config_path() -> PathBuf {
    let mut base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.push(APP_DIR_NAME);
    base.push(CONFIG_FILE_NAME);
    base
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    width: Option<u16>,
    height: Option<u16>,
    border_thickness: Option<u16>,
    border_color: Option<String>,
    background: Option<String>,
    title: Option<String>,
    cycle_interval_ms: Option<u64>,
    cell_glyph: Option<String>,
}

impl ConfigFile {
    fn into_config(self) -> Result<EngineConfig> {
        let mut config = EngineConfig::new(
            self.width.unwrap_or(DEFAULT_MAP_WIDTH),
            self.height.unwrap_or(DEFAULT_MAP_HEIGHT),
        )?;

        if let Some(thickness) = self.border_thickness {
            config = config.with_border(thickness);
        }
        if let Some(value) = self.border_color.as_deref() {
            config = config.with_border_color(parse_color(value)?);
        }
        if let Some(value) = self.background.as_deref() {
            config = config.with_background(parse_color(value)?);
        }
        if let Some(title) = self.title {
            config = config.with_title(title);
        }
        if let Some(ms) = self.cycle_interval_ms {
            config = config.with_cycle_interval(Duration::from_millis(ms));
        }
        if let Some(glyph) = self.cell_glyph {
            config = config.with_cell_glyph(glyph)?;
        }

        Ok(config)
    }
}

/// Parses a named ANSI color or a `#rrggbb` hex color.
pub fn parse_color(value: &str) -> Result<Color> {
    let trimmed = value.trim();
    parse_named_ansi_color(trimmed)
        .or_else(|| parse_hex_color(trimmed))
        .ok_or_else(|| EngineError::UnknownColor(value.to_owned()))
}

fn parse_named_ansi_color(value: &str) -> Option<Color> {
    let normalized: String = value
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect();

    match normalized.as_str() {
        "black" => Some(Color::Black),
        "red" => Some(Color::Red),
        "green" => Some(Color::Green),
        "yellow" => Some(Color::Yellow),
        "blue" => Some(Color::Blue),
        "magenta" => Some(Color::Magenta),
        "cyan" => Some(Color::Cyan),
        "white" | "lightwhite" => Some(Color::White),
        "gray" | "grey" => Some(Color::Gray),
        "darkgray" | "darkgrey" => Some(Color::DarkGray),
        "lightred" => Some(Color::LightRed),
        "lightgreen" => Some(Color::LightGreen),
        "lightyellow" => Some(Color::LightYellow),
        "lightblue" => Some(Color::LightBlue),
        "lightmagenta" => Some(Color::LightMagenta),
        "lightcyan" => Some(Color::LightCyan),
        _ => None,
    }
}

fn parse_hex_color(value: &str) -> Option<Color> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }

    let red = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let green = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let blue = u8::from_str_radix(&hex[4..6], 16).ok()?;

    Some(Color::Rgb(red, green, blue))
}

fn wrap_axis(value: i32, upper_bound: i32) -> i32 {
    if value < 1 {
        upper_bound
    } else if value > upper_bound {
        1
    } else {
        value
    }
}
