use std::sync::Arc;

use ratatui::style::Color;
use tracing::info;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::game_object::GameObject;
use crate::game_object_group::GameObjectGroup;
use crate::position::Position;
use crate::render_loop::RenderLoop;
use crate::surface::{Canvas, Surface};

/// Initialized engine: map configuration, canvas and render loop.
///
/// Game entities borrow the engine's render loop at construction and
/// deregister themselves when disposed or dropped.
pub struct Engine {
    render_loop: RenderLoop,
}

impl Engine {
    /// Sizes the window, clears the surface and draws the map border.
    ///
    /// A following [`Engine::start`] finds the frame untouched and does not
    /// draw it again.
    pub fn init(config: EngineConfig, surface: impl Surface + 'static) -> Result<Self> {
        let config = Arc::new(config);
        let canvas = Canvas::new(Arc::clone(&config), surface);

        canvas.apply_window_geometry()?;
        canvas.draw_frame()?;

        info!(
            width = config.grid.width,
            height = config.grid.height,
            border = config.border_thickness,
            "engine initialized"
        );

        Ok(Self {
            render_loop: RenderLoop::new(canvas),
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        self.render_loop.config()
    }

    #[must_use]
    pub fn canvas(&self) -> &Canvas {
        self.render_loop.canvas()
    }

    #[must_use]
    pub fn render_loop(&self) -> &RenderLoop {
        &self.render_loop
    }

    pub fn start(&self) -> Result<()> {
        self.render_loop.start()
    }

    pub fn stop(&self, flush_surface: bool) -> Result<()> {
        self.render_loop.stop(flush_surface)
    }

    /// Creates a game object registered with this engine's render loop.
    pub fn spawn_object(&self, position: Position, color: Color, wrap: bool) -> GameObject {
        GameObject::new(&self.render_loop, position, color, wrap)
    }

    /// Creates a group from parallel position and color sequences.
    pub fn spawn_group(&self, positions: Vec<Position>, colors: Vec<Color>) -> Result<GameObjectGroup> {
        GameObjectGroup::from_parts(&self.render_loop, positions, colors)
    }
}
