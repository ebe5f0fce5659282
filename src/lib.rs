//! Minimal terminal-grid game engine.
//!
//! A bordered cell grid is drawn through a [`surface::Surface`]. Game
//! objects and object groups register with a [`render_loop::RenderLoop`],
//! which redraws only the entities whose state changed since the previous
//! cycle. Collision checks work on positions, single-cell objects and
//! bounding-box-indexed groups.

pub mod collision;
pub mod config;
pub mod demo;
pub mod engine;
pub mod error;
pub mod game_object;
pub mod game_object_group;
pub mod input;
pub mod position;
pub mod render_loop;
pub mod surface;
pub mod terminal_runtime;

pub use collision::{CollidesWith, CollisionBox};
pub use config::{EngineConfig, GridSize};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use game_object::GameObject;
pub use game_object_group::GameObjectGroup;
pub use position::Position;
pub use render_loop::{RenderId, RenderLoop, Renderable};
pub use surface::{BufferSurface, Canvas, CrosstermSurface, Surface};
