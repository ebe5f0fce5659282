use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ratatui::style::Color;
use tracing::{debug, warn};

use crate::collision::{CollidesWith, CollisionBox};
use crate::error::{EngineError, Result};
use crate::position::Position;
use crate::render_loop::{Registration, RenderId, RenderLoop, Renderable};
use crate::surface::Canvas;

#[derive(Debug)]
struct GroupState {
    positions: Vec<Position>,
    colors: Vec<Color>,
    bounds: Option<CollisionBox>,
    /// Cells drawn by the most recent completed render.
    drawn: Vec<Position>,
    visible: bool,
    dirty: bool,
    disposed: bool,
}

impl GroupState {
    /// Must follow every change to `positions`.
    fn refresh(&mut self) {
        debug_assert_eq!(self.positions.len(), self.colors.len());
        self.bounds = CollisionBox::from_positions(&self.positions);
        self.dirty = true;
    }

    fn occupies(&self, position: Position) -> bool {
        match self.bounds {
            Some(bounds) if bounds.contains(position) => self.positions.contains(&position),
            _ => false,
        }
    }

    fn render(&mut self, canvas: &Canvas) -> io::Result<()> {
        if self.disposed || !self.visible || !self.dirty {
            return Ok(());
        }

        for stale in self
            .drawn
            .iter()
            .filter(|cell| !self.positions.contains(cell))
        {
            canvas.erase_cell(*stale)?;
        }

        let mut drawn = Vec::with_capacity(self.positions.len());
        for (position, color) in self.positions.iter().zip(&self.colors) {
            if canvas.draw_cell(*position, *color)? {
                drawn.push(*position);
            }
        }

        self.drawn = drawn;
        self.dirty = false;
        Ok(())
    }

    fn erase(&mut self, canvas: &Canvas) -> io::Result<()> {
        for cell in self.drawn.drain(..) {
            canvas.erase_cell(cell)?;
        }
        Ok(())
    }

    fn check_index(&self, index: usize, bound: usize) -> Result<()> {
        if index < bound {
            Ok(())
        } else {
            Err(EngineError::IndexOutOfRange {
                index,
                len: self.positions.len(),
            })
        }
    }
}

struct GroupCore {
    state: Mutex<GroupState>,
}

impl GroupCore {
    fn state(&self) -> MutexGuard<'_, GroupState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Renderable for GroupCore {
    fn render(&self, canvas: &Canvas) {
        if let Err(error) = self.state().render(canvas) {
            warn!(%error, "failed to render game object group");
        }
    }

    fn invalidate(&self) {
        let mut state = self.state();
        state.drawn.clear();
        state.dirty = true;
    }
}

/// An ordered multi-cell body, such as a snake, sharing one collision box.
///
/// Body parts are kept as parallel position and color sequences that always
/// have equal length. The collision box is recomputed on every structural
/// change.
pub struct GameObjectGroup {
    core: Arc<GroupCore>,
    canvas: Canvas,
    registration: Registration,
}

impl GameObjectGroup {
    /// Creates an empty group registered with `render_loop`.
    pub fn new(render_loop: &RenderLoop) -> Self {
        Self::with_parts(render_loop, Vec::new(), Vec::new())
    }

    /// Creates a group from parallel position and color sequences.
    pub fn from_parts(
        render_loop: &RenderLoop,
        positions: Vec<Position>,
        colors: Vec<Color>,
    ) -> Result<Self> {
        if positions.len() != colors.len() {
            return Err(EngineError::LengthMismatch {
                positions: positions.len(),
                colors: colors.len(),
            });
        }

        Ok(Self::with_parts(render_loop, positions, colors))
    }

    fn with_parts(render_loop: &RenderLoop, positions: Vec<Position>, colors: Vec<Color>) -> Self {
        let mut state = GroupState {
            positions,
            colors,
            bounds: None,
            drawn: Vec::new(),
            visible: true,
            dirty: true,
            disposed: false,
        };
        state.refresh();

        let core = Arc::new(GroupCore {
            state: Mutex::new(state),
        });
        let target: Arc<dyn Renderable> = core.clone();
        let registration = render_loop.attach(&target);

        Self {
            core,
            canvas: render_loop.canvas().clone(),
            registration,
        }
    }

    #[must_use]
    pub fn id(&self) -> RenderId {
        self.registration.id()
    }

    /// Appends a body part.
    pub fn add_body_part(&self, position: Position, color: Color) {
        let mut state = self.core.state();
        state.positions.push(position);
        state.colors.push(color);
        state.refresh();
    }

    /// Inserts a body part at `index` in both sequences.
    ///
    /// Fails without modifying the group when `index` is past the end.
    pub fn insert_body_part(&self, index: usize, position: Position, color: Color) -> Result<()> {
        let mut state = self.core.state();
        let len = state.positions.len();
        state.check_index(index, len + 1)?;

        state.positions.insert(index, position);
        state.colors.insert(index, color);
        state.refresh();
        Ok(())
    }

    /// Inserts a body part at the front, e.g. a new snake head.
    pub fn push_front(&self, position: Position, color: Color) {
        let mut state = self.core.state();
        state.positions.insert(0, position);
        state.colors.insert(0, color);
        state.refresh();
    }

    pub fn remove_body_part(&self, index: usize) -> Result<(Position, Color)> {
        let mut state = self.core.state();
        let len = state.positions.len();
        state.check_index(index, len)?;

        let position = state.positions.remove(index);
        let color = state.colors.remove(index);
        state.refresh();
        Ok((position, color))
    }

    /// Removes the last body part, e.g. a snake tail.
    pub fn pop_back(&self) -> Option<(Position, Color)> {
        let mut state = self.core.state();
        let position = state.positions.pop()?;
        let color = state.colors.pop()?;
        state.refresh();
        Some((position, color))
    }

    pub fn set_part_position(&self, index: usize, position: Position) -> Result<()> {
        let mut state = self.core.state();
        let len = state.positions.len();
        state.check_index(index, len)?;

        state.positions[index] = position;
        state.refresh();
        Ok(())
    }

    pub fn set_part_color(&self, index: usize, color: Color) -> Result<()> {
        let mut state = self.core.state();
        let len = state.colors.len();
        state.check_index(index, len)?;

        state.colors[index] = color;
        state.dirty = true;
        Ok(())
    }

    #[must_use]
    pub fn positions(&self) -> Vec<Position> {
        self.core.state().positions.clone()
    }

    #[must_use]
    pub fn colors(&self) -> Vec<Color> {
        self.core.state().colors.clone()
    }

    #[must_use]
    pub fn part(&self, index: usize) -> Option<(Position, Color)> {
        let state = self.core.state();
        Some((*state.positions.get(index)?, *state.colors.get(index)?))
    }

    /// First body part.
    #[must_use]
    pub fn head(&self) -> Option<Position> {
        self.core.state().positions.first().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.core.state().positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn collision_box(&self) -> Option<CollisionBox> {
        self.core.state().bounds
    }

    /// Returns true when a body part sits at `position`.
    ///
    /// Positions outside the collision box are rejected before the body
    /// parts are scanned.
    #[must_use]
    pub fn occupies(&self, position: Position) -> bool {
        self.core.state().occupies(position)
    }

    /// Returns true when two body parts share a cell.
    #[must_use]
    pub fn has_overlapping_parts(&self) -> bool {
        let state = self.core.state();
        state
            .positions
            .iter()
            .enumerate()
            .any(|(index, position)| state.positions[index + 1..].contains(position))
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.core.state().visible
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.core.state().dirty
    }

    /// Shows or hides every body part; see [`GameObject::set_visible`].
    ///
    /// [`GameObject::set_visible`]: crate::game_object::GameObject::set_visible
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

    pub fn render_now(&self) -> Result<()> {
        self.core.state().render(&self.canvas)?;
        Ok(())
    }

    /// Deregisters from the render loop and erases every drawn body part.
    pub fn dispose(&self) {
        self.registration.release();

        let mut state = self.core.state();
        if state.disposed {
            return;
        }
        state.disposed = true;

        if let Err(error) = state.erase(&self.canvas) {
            warn!(%error, "failed to erase disposed game object group");
        }

        debug!(id = ?self.registration.id(), "game object group disposed");
    }

    fn snapshot(&self) -> (Option<CollisionBox>, Vec<Position>) {
        let state = self.core.state();
        (state.bounds, state.positions.clone())
    }
}

impl Drop for GameObjectGroup {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for GameObjectGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameObjectGroup")
            .field("id", &self.registration.id())
            .field("state", &*self.core.state())
            .finish()
    }
}

impl CollidesWith<Position> for GameObjectGroup {
    fn collides_with(&self, other: &Position) -> bool {
        self.occupies(*other)
    }
}

impl CollidesWith<GameObjectGroup> for GameObjectGroup {
    /// Two distinct groups collide when any of their parts share a cell; a
    /// group collides with itself when two of its own parts overlap.
    fn collides_with(&self, other: &GameObjectGroup) -> bool {
        if Arc::ptr_eq(&self.core, &other.core) {
            return self.has_overlapping_parts();
        }

        let (Some(bounds), positions) = self.snapshot() else {
            return false;
        };
        let other_state = other.core.state();
        match other_state.bounds {
            Some(other_bounds) if bounds.intersects(other_bounds) => positions
                .iter()
                .any(|position| other_state.occupies(*position)),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ratatui::style::Color;

    use super::GameObjectGroup;
    use crate::collision::{CollidesWith, CollisionBox};
    use crate::config::EngineConfig;
    use crate::error::EngineError;
    use crate::game_object::GameObject;
    use crate::position::Position;
    use crate::render_loop::RenderLoop;
    use crate::surface::{BufferSurface, Canvas};

    fn test_loop() -> (RenderLoop, BufferSurface) {
        let config = Arc::new(EngineConfig::new(10, 10).unwrap().with_border(1));
        let (columns, rows) = config.window_size();
        let surface = BufferSurface::new(columns, rows);
        (RenderLoop::new(Canvas::new(config, surface.clone())), surface)
    }

    fn two_part_group(render_loop: &RenderLoop) -> GameObjectGroup {
        GameObjectGroup::from_parts(
            render_loop,
            vec![Position::new(2, 2), Position::new(3, 2)],
            vec![Color::Green, Color::Green],
        )
        .unwrap()
    }

    #[test]
    fn mismatched_sequences_are_rejected() {
        let (render_loop, _surface) = test_loop();

        let result = GameObjectGroup::from_parts(
            &render_loop,
            vec![Position::new(1, 1), Position::new(2, 1)],
            vec![Color::Red],
        );

        assert!(matches!(
            result,
            Err(EngineError::LengthMismatch {
                positions: 2,
                colors: 1
            })
        ));
        assert!(render_loop.is_empty());
    }

    #[test]
    fn collision_box_covers_members() {
        let (render_loop, _surface) = test_loop();
        let group = two_part_group(&render_loop);

        assert_eq!(
            group.collision_box(),
            Some(CollisionBox {
                origin: Position::new(2, 2),
                width: 1,
                height: 0,
            })
        );
    }

    #[test]
    fn point_outside_box_does_not_collide() {
        let (render_loop, _surface) = test_loop();
        let group = two_part_group(&render_loop);
        let outside = GameObject::new(&render_loop, Position::new(4, 2), Color::Red, false);
        let inside = GameObject::new(&render_loop, Position::new(3, 2), Color::Red, false);

        assert!(!outside.collides_with(&group));
        assert!(inside.collides_with(&group));
    }

    #[test]
    fn box_rejection_runs_before_member_scan() {
        let (render_loop, _surface) = test_loop();
        let group = two_part_group(&render_loop);
        group.core.state().bounds = Some(CollisionBox {
            origin: Position::new(2, 2),
            width: 0,
            height: 0,
        });

        assert!(!group.occupies(Position::new(3, 2)));
        assert!(group.occupies(Position::new(2, 2)));
    }

    #[test]
    fn add_body_part_recomputes_box() {
        let (render_loop, _surface) = test_loop();
        let group = two_part_group(&render_loop);

        group.add_body_part(Position::new(3, 5), Color::Blue);

        let bounds = group.collision_box().unwrap();
        assert_eq!(bounds.origin, Position::new(2, 2));
        assert_eq!((bounds.width, bounds.height), (1, 3));
        assert!(group.occupies(Position::new(3, 5)));
    }

    #[test]
    fn insert_places_pair_at_same_index() {
        let (render_loop, _surface) = test_loop();
        let group = two_part_group(&render_loop);

        group
            .insert_body_part(1, Position::new(9, 9), Color::Yellow)
            .unwrap();

        assert_eq!(group.len(), 3);
        assert_eq!(group.positions().len(), group.colors().len());
        assert_eq!(group.part(1), Some((Position::new(9, 9), Color::Yellow)));
        assert_eq!(group.collision_box().unwrap().width, 7);
    }

    #[test]
    fn insert_past_end_leaves_group_untouched() {
        let (render_loop, _surface) = test_loop();
        let group = two_part_group(&render_loop);

        let result = group.insert_body_part(3, Position::new(1, 1), Color::Red);

        assert!(matches!(
            result,
            Err(EngineError::IndexOutOfRange { index: 3, len: 2 })
        ));
        assert_eq!(group.positions(), vec![Position::new(2, 2), Position::new(3, 2)]);
        assert_eq!(group.colors().len(), 2);
    }

    #[test]
    fn removing_parts_shrinks_box() {
        let (render_loop, _surface) = test_loop();
        let group = two_part_group(&render_loop);

        assert_eq!(group.pop_back(), Some((Position::new(3, 2), Color::Green)));
        assert_eq!(group.collision_box().unwrap().width, 0);

        assert!(group.remove_body_part(0).is_ok());
        assert_eq!(group.collision_box(), None);
        assert!(!group.occupies(Position::new(2, 2)));
        assert!(group.remove_body_part(0).is_err());
    }

    #[test]
    fn render_erases_vacated_cells_and_draws_members() {
        let (render_loop, surface) = test_loop();
        let group = two_part_group(&render_loop);
        render_loop.render_once();
        assert_eq!(surface.background_at(4, 2), Some(Color::Green));

        group.push_front(Position::new(4, 2), Color::White);
        group.pop_back();
        render_loop.render_once();

        assert_eq!(surface.background_at(8, 2), Some(Color::White));
        assert_eq!(surface.background_at(4, 2), Some(Color::Green));
        assert_eq!(surface.background_at(6, 2), Some(Color::Black));
        assert!(!group.is_dirty());
    }

    #[test]
    fn dispose_erases_all_parts() {
        let (render_loop, surface) = test_loop();
        let group = two_part_group(&render_loop);
        render_loop.render_once();

        drop(group);

        assert!(render_loop.is_empty());
        assert_eq!(surface.background_at(4, 2), Some(Color::Black));
        assert_eq!(surface.background_at(6, 2), Some(Color::Black));
    }

    #[test]
    fn groups_collide_through_shared_cells() {
        let (render_loop, _surface) = test_loop();
        let snake = two_part_group(&render_loop);
        let wall = GameObjectGroup::from_parts(
            &render_loop,
            vec![Position::new(3, 1), Position::new(3, 3)],
            vec![Color::White, Color::White],
        )
        .unwrap();

        assert!(!snake.collides_with(&wall));

        wall.set_part_position(1, Position::new(3, 2)).unwrap();
        assert!(snake.collides_with(&wall));
        assert!(wall.collides_with(&snake));
    }

    #[test]
    fn group_self_collision_detects_overlapping_parts() {
        let (render_loop, _surface) = test_loop();
        let snake = two_part_group(&render_loop);
        assert!(!snake.collides_with(&snake));

        snake.push_front(Position::new(3, 2), Color::White);

        assert!(snake.collides_with(&snake));
    }
}
