//! Snake played on the engine: a wrapping body group chasing one food object.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use ratatui::style::Color;

use crate::collision::CollidesWith;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::game_object::GameObject;
use crate::game_object_group::GameObjectGroup;
use crate::input::{Direction, GameInput};
use crate::position::Position;
use crate::render_loop::RenderLoop;

pub const SNAKE_HEAD_COLOR: Color = Color::White;
pub const SNAKE_BODY_COLOR: Color = Color::Green;
pub const FOOD_COLOR: Color = Color::Red;

/// Current high-level gameplay state.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum GameStatus {
    Playing,
    Paused,
    GameOver,
    Victory,
}

/// Complete mutable state for one demo session.
#[derive(Debug)]
pub struct SnakeDemo {
    pub snake: GameObjectGroup,
    pub food: GameObject,
    pub direction: Direction,
    pub score: u32,
    pub tick_count: u64,
    pub status: GameStatus,
    config: EngineConfig,
    rng: StdRng,
}

impl SnakeDemo {
    /// Creates a deterministic session for tests and reproducible runs.
    pub fn new_with_seed(render_loop: &RenderLoop, seed: u64) -> Result<Self> {
        let config = render_loop.config().clone();
        let mut rng = StdRng::seed_from_u64(seed);

        let start = Position::new(
            i32::from(config.grid.width / 2).max(1),
            i32::from(config.grid.height / 2).max(1),
        );
        let snake = GameObjectGroup::from_parts(render_loop, vec![start], vec![SNAKE_HEAD_COLOR])?;

        let food_position = spawn_position(&mut rng, &config, &snake).unwrap_or(start);
        let food = GameObject::new(render_loop, food_position, FOOD_COLOR, false);

        Ok(Self {
            snake,
            food,
            direction: Direction::Right,
            score: 0,
            tick_count: 0,
            status: GameStatus::Playing,
            config,
            rng,
        })
    }

    /// Advances the session by one step.
    pub fn tick(&mut self) -> Result<()> {
        if self.status != GameStatus::Playing {
            return Ok(());
        }
        let Some(head) = self.snake.head() else {
            self.status = GameStatus::GameOver;
            return Ok(());
        };

        self.tick_count += 1;
        let (dx, dy) = self.direction.delta();
        let next = self.config.wrap(head.offset(dx, dy));

        self.snake.set_part_color(0, SNAKE_BODY_COLOR)?;
        self.snake.push_front(next, SNAKE_HEAD_COLOR);

        if self.food.collides_with(&next) {
            self.score += 1;
            match spawn_position(&mut self.rng, &self.config, &self.snake) {
                Some(position) => self.food.move_to(position),
                None => {
                    self.food.hide()?;
                    self.status = GameStatus::Victory;
                    return Ok(());
                }
            }
        } else {
            self.snake.pop_back();
        }

        if self.snake.collides_with(&self.snake) {
            self.status = GameStatus::GameOver;
        }
        Ok(())
    }

    /// Applies one input event. Direct reversals are ignored.
    pub fn apply_input(&mut self, input: GameInput) {
        match input {
            GameInput::Direction(direction) => {
                if self.status == GameStatus::Playing && direction != self.direction.opposite() {
                    self.direction = direction;
                }
            }
            GameInput::Pause => {
                self.status = match self.status {
                    GameStatus::Playing => GameStatus::Paused,
                    GameStatus::Paused => GameStatus::Playing,
                    other => other,
                };
            }
            GameInput::Quit => {}
        }
    }
}

/// Picks a random interior cell not occupied by the snake.
///
/// Returns `None` when the snake fills the whole map.
pub fn spawn_position<R: Rng + ?Sized>(
    rng: &mut R,
    config: &EngineConfig,
    snake: &GameObjectGroup,
) -> Option<Position> {
    let mut candidates = Vec::with_capacity(config.grid.total_cells());

    for y in 1..=i32::from(config.grid.height) {
        for x in 1..=i32::from(config.grid.width) {
            let position = Position::new(x, y);
            if !snake.occupies(position) {
                candidates.push(position);
            }
        }
    }

    if candidates.is_empty() {
        return None;
    }

    let index = rng.gen_range(0..candidates.len());
    Some(candidates[index])
}
