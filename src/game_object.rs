use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ratatui::style::Color;
use tracing::{debug, warn};

use crate::collision::CollidesWith;
use crate::error::Result;
use crate::game_object_group::GameObjectGroup;
use crate::position::Position;
use crate::render_loop::{Registration, RenderId, RenderLoop, Renderable};
use crate::surface::Canvas;

#[derive(Debug)]
struct ObjectState {
    position: Position,
    /// Position drawn by the most recent completed render.
    last_position: Option<Position>,
    /// Whether the glyph at `last_position` is currently on screen.
    on_screen: bool,
    color: Color,
    visible: bool,
    dirty: bool,
    disposed: bool,
}

impl ObjectState {
    fn render(&mut self, canvas: &Canvas) -> io::Result<()> {
        if self.disposed || !self.visible || !self.dirty {
            return Ok(());
        }

        if self.on_screen {
            if let Some(last) = self.last_position.filter(|last| *last != self.position) {
                canvas.erase_cell(last)?;
            }
        }

        self.on_screen = canvas.draw_cell(self.position, self.color)?;
        self.last_position = Some(self.position);
        self.dirty = false;
        Ok(())
    }

    fn erase(&mut self, canvas: &Canvas) -> io::Result<()> {
        if self.on_screen {
            if let Some(last) = self.last_position {
                canvas.erase_cell(last)?;
            }
        }

        self.on_screen = false;
        Ok(())
    }
}

struct ObjectCore {
    state: Mutex<ObjectState>,
}

impl ObjectCore {
    fn state(&self) -> MutexGuard<'_, ObjectState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Renderable for ObjectCore {
    fn render(&self, canvas: &Canvas) {
        if let Err(error) = self.state().render(canvas) {
            warn!(%error, "failed to render game object");
        }
    }

    fn invalidate(&self) {
        let mut state = self.state();
        state.on_screen = false;
        state.dirty = true;
    }
}

/// A single-cell entity drawn by the render loop.
///
/// Mutators only update state and mark the object dirty; the glyph is
/// redrawn on the next render cycle. Dropping the object disposes it.
pub struct GameObject {
    core: Arc<ObjectCore>,
    canvas: Canvas,
    registration: Registration,
    wrap: bool,
}

impl GameObject {
    /// Creates an object at `position` and registers it with `render_loop`.
    ///
    /// With `wrap` enabled, moves past a map edge re-enter from the opposite
    /// edge.
    pub fn new(render_loop: &RenderLoop, position: Position, color: Color, wrap: bool) -> Self {
        let core = Arc::new(ObjectCore {
            state: Mutex::new(ObjectState {
                position,
                last_position: None,
                on_screen: false,
                color,
                visible: true,
                dirty: true,
                disposed: false,
            }),
        });

        let target: Arc<dyn Renderable> = core.clone();
        let registration = render_loop.attach(&target);

        Self {
            core,
            canvas: render_loop.canvas().clone(),
            registration,
            wrap,
        }
    }

    /// Creates an object drawn in the configured border color.
    pub fn with_border_color(render_loop: &RenderLoop, position: Position, wrap: bool) -> Self {
        let color = render_loop.config().border_color;
        Self::new(render_loop, position, color, wrap)
    }

    #[must_use]
    pub fn id(&self) -> RenderId {
        self.registration.id()
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.core.state().position
    }

    /// Position drawn by the most recent completed render, if any.
    #[must_use]
    pub fn last_position(&self) -> Option<Position> {
        self.core.state().last_position
    }

    #[must_use]
    pub fn color(&self) -> Color {
        self.core.state().color
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.core.state().visible
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.core.state().dirty
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.core.state().disposed
    }

    #[must_use]
    pub fn wraps(&self) -> bool {
        self.wrap
    }

    pub fn move_to(&self, position: Position) {
        let position = if self.wrap {
            self.canvas.config().wrap(position)
        } else {
            position
        };

        let mut state = self.core.state();
        if state.disposed {
            return;
        }
        state.position = position;
        state.dirty = true;
    }

    pub fn move_by(&self, dx: i32, dy: i32) {
        self.move_to(self.position().offset(dx, dy));
    }

    /// Shows or hides the object.
    ///
    /// Hiding erases the glyph immediately. Showing marks the object dirty
    /// so it reappears on the next cycle. Repeating the current state does
    /// nothing.
    pub fn set_visible(&self, visible: bool) -> Result<()> {
        let mut state = self.core.state();
        if state.disposed || state.visible == visible {
            return Ok(());
        }

        state.visible = visible;
        if visible {
            state.dirty = true;
        } else {
            state.erase(&self.canvas)?;
        }
        Ok(())
    }

    pub fn hide(&self) -> Result<()> {
        self.set_visible(false)
    }

    pub fn show(&self) -> Result<()> {
        self.set_visible(true)
    }

    /// Changes the color and redraws the object right away.
    pub fn change_color(&self, color: Color) -> Result<()> {
        let mut state = self.core.state();
        if state.disposed {
            return Ok(());
        }

        state.color = color;
        state.dirty = true;
        state.render(&self.canvas)?;
        Ok(())
    }

    /// Renders this object alone, outside the render loop's schedule.
    pub fn render_now(&self) -> Result<()> {
        self.core.state().render(&self.canvas)?;
        Ok(())
    }

    /// Deregisters from the render loop and erases the last drawn glyph.
    ///
    /// Disposing twice does nothing.
    pub fn dispose(&self) {
        // Deregister before taking the state lock: a running cycle may hold
        // this object's render gate while it waits for the same lock.
        self.registration.release();

        let mut state = self.core.state();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.on_screen = false;

        if let Some(last) = state.last_position {
            if let Err(error) = self.canvas.erase_cell(last) {
                warn!(%error, "failed to erase disposed game object");
            }
        }

        debug!(id = ?self.registration.id(), "game object disposed");
    }
}

impl Drop for GameObject {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for GameObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameObject")
            .field("id", &self.registration.id())
            .field("state", &*self.core.state())
            .field("wrap", &self.wrap)
            .finish()
    }
}

impl CollidesWith<GameObject> for GameObject {
    fn collides_with(&self, other: &GameObject) -> bool {
        self.position() == other.position()
    }
}

impl CollidesWith<Position> for GameObject {
    fn collides_with(&self, other: &Position) -> bool {
        self.position() == *other
    }
}

impl CollidesWith<GameObjectGroup> for GameObject {
    fn collides_with(&self, other: &GameObjectGroup) -> bool {
        other.occupies(self.position())
    }
}
