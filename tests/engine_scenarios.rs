use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use console_grid::demo::{GameStatus, SnakeDemo};
use console_grid::input::{Direction, GameInput};
use console_grid::{
    BufferSurface, Canvas, CollidesWith, CollisionBox, Engine, EngineConfig, GameObject,
    GameObjectGroup, Position, Renderable,
};
use ratatui::style::Color;

fn engine_10x10() -> (Engine, BufferSurface) {
    let surface = BufferSurface::new(1, 1);
    let config = EngineConfig::new(10, 10)
        .unwrap()
        .with_border(1)
        .with_cycle_interval(Duration::from_millis(1));
    let engine = Engine::init(config, surface.clone()).unwrap();
    (engine, surface)
}

fn wait_for_cycles(engine: &Engine, extra: u64) {
    let render_loop = engine.render_loop();
    let target = render_loop.cycles() + extra;
    let deadline = Instant::now() + Duration::from_secs(5);
    while render_loop.cycles() < target {
        assert!(Instant::now() < deadline, "render loop made no progress");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn moved_object_is_redrawn_and_old_cell_cleared() {
    let (engine, surface) = engine_10x10();
    let a = engine.spawn_object(Position::new(1, 1), Color::Blue, false);
    engine.render_loop().render_once();

    a.move_to(Position::new(3, 1));
    engine.render_loop().render_once();

    let (column, row) = engine.config().screen_cell(Position::new(3, 1)).unwrap();
    assert_eq!(surface.background_at(column, row), Some(Color::Blue));
    let (column, row) = engine.config().screen_cell(Position::new(1, 1)).unwrap();
    assert_eq!(surface.background_at(column, row), Some(engine.config().background));
}

#[test]
fn background_loop_picks_up_moves() {
    let (engine, surface) = engine_10x10();
    let a = engine.spawn_object(Position::new(2, 2), Color::Magenta, true);

    engine.start().unwrap();
    wait_for_cycles(&engine, 2);
    a.move_by(-2, 0);
    wait_for_cycles(&engine, 2);
    engine.stop(false).unwrap();

    assert_eq!(a.position(), Position::new(10, 2));
    assert_eq!(surface.background_at(20, 2), Some(Color::Magenta));
    assert_eq!(surface.background_at(4, 2), Some(engine.config().background));
}

#[test]
fn group_collision_uses_bounding_box_then_members() {
    let (engine, _surface) = engine_10x10();
    let group = engine
        .spawn_group(
            vec![Position::new(2, 2), Position::new(3, 2)],
            vec![Color::Green, Color::Green],
        )
        .unwrap();

    assert_eq!(
        group.collision_box(),
        Some(CollisionBox {
            origin: Position::new(2, 2),
            width: 1,
            height: 0,
        })
    );

    let outside = engine.spawn_object(Position::new(4, 2), Color::Red, false);
    let inside = engine.spawn_object(Position::new(3, 2), Color::Red, false);
    assert!(!outside.collides_with(&group));
    assert!(inside.collides_with(&group));
}

#[test]
fn unregister_mid_run_then_stop_with_flush() {
    let (engine, surface) = engine_10x10();
    let calls = Arc::new(AtomicUsize::new(0));
    let callback: Arc<dyn Renderable> = {
        let calls = Arc::clone(&calls);
        Arc::new(move |canvas: &Canvas| {
            calls.fetch_add(1, Ordering::SeqCst);
            let _ = canvas.draw_cell(Position::new(4, 4), Color::Cyan);
        })
    };

    engine.start().unwrap();
    let id = engine.render_loop().register(&callback);
    wait_for_cycles(&engine, 2);
    engine.render_loop().unregister(id);
    let calls_at_unregister = calls.load(Ordering::SeqCst);
    engine.stop(true).unwrap();

    let writes = surface.glyph_writes();
    thread::sleep(Duration::from_millis(20));

    assert!(calls_at_unregister > 0);
    assert_eq!(calls.load(Ordering::SeqCst), calls_at_unregister);
    assert_eq!(surface.glyph_writes(), writes);
    assert_eq!(surface.background_at(8, 4), Some(Color::Reset));
    assert!(!engine.render_loop().is_running());
}

#[test]
fn objects_can_be_created_and_disposed_while_loop_runs() {
    let (engine, surface) = engine_10x10();
    engine.start().unwrap();

    for step in 1..=10 {
        let object = engine.spawn_object(Position::new(step, 5), Color::Yellow, false);
        wait_for_cycles(&engine, 1);
        object.dispose();
    }
    wait_for_cycles(&engine, 2);
    engine.stop(false).unwrap();

    assert!(engine.render_loop().is_empty());
    for step in 1..=10 {
        let (column, row) = engine.config().screen_cell(Position::new(step, 5)).unwrap();
        assert_ne!(surface.background_at(column, row), Some(Color::Yellow));
    }
}

#[test]
fn snake_demo_eats_and_wraps_on_engine() {
    let (engine, _surface) = engine_10x10();
    let mut demo = SnakeDemo::new_with_seed(engine.render_loop(), 42).unwrap();
    demo.snake = GameObjectGroup::from_parts(
        engine.render_loop(),
        vec![Position::new(10, 1)],
        vec![Color::White],
    )
    .unwrap();
    demo.food = GameObject::new(engine.render_loop(), Position::new(1, 1), Color::Red, false);

    demo.tick().unwrap();
    assert_eq!(demo.snake.head(), Some(Position::new(1, 1)));
    assert_eq!(demo.score, 1);
    assert_eq!(demo.snake.len(), 2);

    demo.apply_input(GameInput::Direction(Direction::Down));
    demo.tick().unwrap();
    assert_eq!(demo.snake.head(), Some(Position::new(1, 2)));
    assert_eq!(demo.status, GameStatus::Playing);
    assert!(demo.snake.len() >= 2);
}

#[test]
fn still_entities_reappear_after_a_flushing_pause() {
    let (engine, surface) = engine_10x10();
    let _object = engine.spawn_object(Position::new(3, 3), Color::Blue, false);
    let _group = engine
        .spawn_group(
            vec![Position::new(5, 5), Position::new(6, 5)],
            vec![Color::Green; 2],
        )
        .unwrap();

    engine.start().unwrap();
    wait_for_cycles(&engine, 3);
    assert_eq!(surface.background_at(6, 3), Some(Color::Blue));

    engine.stop(true).unwrap();
    assert_eq!(surface.background_at(6, 3), Some(Color::Reset));
    assert_eq!(surface.background_at(10, 5), Some(Color::Reset));

    engine.start().unwrap();
    wait_for_cycles(&engine, 3);
    engine.stop(false).unwrap();

    assert_eq!(surface.background_at(6, 3), Some(Color::Blue));
    assert_eq!(surface.background_at(10, 5), Some(Color::Green));
    assert_eq!(surface.background_at(12, 5), Some(Color::Green));
    assert_eq!(surface.background_at(0, 0), Some(engine.config().border_color));
}

#[test]
fn entities_stepped_before_start_are_redrawn_by_the_loop() {
    let (engine, surface) = engine_10x10();
    let _object = engine.spawn_object(Position::new(3, 3), Color::Blue, false);
    engine.render_loop().render_once();

    engine.start().unwrap();
    wait_for_cycles(&engine, 3);
    engine.stop(false).unwrap();

    assert_eq!(surface.background_at(6, 3), Some(Color::Blue));
}
