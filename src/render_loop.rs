//! Continuous render loop driving every registered render callback.
//!
//! The loop keeps only weak references to its callbacks. Each cycle takes a
//! snapshot of the registry, so registration changes made while a cycle is
//! running apply from the next cycle on.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};
use std::thread::{self, JoinHandle, ThreadId};

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::surface::Canvas;

const RENDER_THREAD_NAME: &str = "render-loop";

/// Entry point the render loop invokes once per cycle.
///
/// Implementations must not block; a cycle only ends once every callback
/// has returned.
pub trait Renderable: Send + Sync {
    fn render(&self, canvas: &Canvas);

    /// Called after the surface was wiped: forget what is on screen and
    /// redraw in full on the next cycle.
    fn invalidate(&self) {}
}

impl<F> Renderable for F
where
    F: Fn(&Canvas) + Send + Sync,
{
    fn render(&self, canvas: &Canvas) {
        self(canvas);
    }
}

/// Identifies one registration in a [`RenderLoop`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct RenderId(u64);

struct Entry {
    id: RenderId,
    target: Weak<dyn Renderable>,
    live: AtomicBool,
    /// Held for the duration of one invocation of `target`.
    gate: Mutex<()>,
}

struct Shared {
    canvas: Canvas,
    running: AtomicBool,
    cycles: AtomicU64,
    next_id: AtomicU64,
    entries: Mutex<Vec<Arc<Entry>>>,
    /// Held for the duration of one cycle; only one cycle runs at a time.
    cycle: Mutex<()>,
    cycle_thread: Mutex<Option<ThreadId>>,
}

impl Shared {
    fn entries(&self) -> MutexGuard<'_, Vec<Arc<Entry>>> {
        lock(&self.entries)
    }

    fn register(&self, target: Weak<dyn Renderable>) -> RenderId {
        let id = RenderId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries().push(Arc::new(Entry {
            id,
            target,
            live: AtomicBool::new(true),
            gate: Mutex::new(()),
        }));

        debug!(id = id.0, "render callback registered");
        id
    }

    fn unregister(&self, id: RenderId) {
        let removed = {
            let mut entries = self.entries();
            entries
                .iter()
                .position(|entry| entry.id == id)
                .map(|index| entries.remove(index))
        };

        let Some(entry) = removed else {
            return;
        };

        entry.live.store(false, Ordering::Release);

        // Wait out an in-flight invocation so the callback never runs after
        // this returns. Inside a callback the in-flight invocation is our own.
        if !self.is_cycle_thread() {
            drop(lock(&entry.gate));
        }

        debug!(id = id.0, "render callback unregistered");
    }

    fn is_cycle_thread(&self) -> bool {
        *lock(&self.cycle_thread) == Some(thread::current().id())
    }

    /// Marks every live callback for a full redraw.
    fn invalidate_all(&self) {
        let snapshot: Vec<Arc<Entry>> = self.entries().clone();
        for entry in snapshot {
            if !entry.live.load(Ordering::Acquire) {
                continue;
            }
            if let Some(target) = entry.target.upgrade() {
                target.invalidate();
            }
        }
    }

    /// Wipes the surface and redraws the border, unless nothing was drawn
    /// since the last time.
    fn redraw_frame(&self) -> Result<()> {
        if !self.canvas.is_pristine() {
            self.canvas.draw_frame()?;
            self.invalidate_all();
        }
        Ok(())
    }

    /// Runs one full pass over a snapshot of the registry. `_cycle` is the
    /// held single-cycle guard.
    fn run_cycle(&self, _cycle: MutexGuard<'_, ()>) {
        *lock(&self.cycle_thread) = Some(thread::current().id());

        let snapshot: Vec<Arc<Entry>> = self.entries().clone();
        let mut orphaned = false;

        for entry in &snapshot {
            let _gate = lock(&entry.gate);
            if !entry.live.load(Ordering::Acquire) {
                continue;
            }

            match entry.target.upgrade() {
                Some(target) => target.render(&self.canvas),
                None => orphaned = true,
            }
        }

        if orphaned {
            self.entries()
                .retain(|entry| entry.target.strong_count() > 0);
        }

        if let Err(error) = self.canvas.flush() {
            warn!(%error, "failed to flush surface after render cycle");
        }

        *lock(&self.cycle_thread) = None;
        self.cycles.fetch_add(1, Ordering::Release);
    }
}

/// Non-owning link between a game entity and the loop it registered with.
///
/// Releasing it deregisters the callback. Releasing twice, or after the loop
/// itself is gone, does nothing.
#[derive(Debug)]
pub struct Registration {
    id: RenderId,
    shared: Weak<Shared>,
}

impl Registration {
    #[must_use]
    pub fn id(&self) -> RenderId {
        self.id
    }

    pub fn release(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.unregister(self.id);
        }
    }
}

/// Owns the background render thread and the callback registry.
pub struct RenderLoop {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RenderLoop {
    #[must_use]
    pub fn new(canvas: Canvas) -> Self {
        Self {
            shared: Arc::new(Shared {
                canvas,
                running: AtomicBool::new(false),
                cycles: AtomicU64::new(0),
                next_id: AtomicU64::new(0),
                entries: Mutex::new(Vec::new()),
                cycle: Mutex::new(()),
                cycle_thread: Mutex::new(None),
            }),
            worker: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn canvas(&self) -> &Canvas {
        &self.shared.canvas
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        self.shared.canvas.config()
    }

    /// Clears the surface, redraws the border and starts cycling on a
    /// background thread. Every registered callback is asked to redraw in
    /// full. The wipe is skipped when nothing was drawn since the frame was
    /// last put up.
    ///
    /// Does nothing when the loop is already running, when called from
    /// inside a callback, or when a previous cycle thread is still draining
    /// after a stop requested from inside a callback.
    pub fn start(&self) -> Result<()> {
        if self.shared.is_cycle_thread() {
            debug!("start requested from a render callback, ignored");
            return Ok(());
        }

        let mut worker = lock(&self.worker);
        if self.shared.running.load(Ordering::Acquire) {
            return Ok(());
        }

        if let Some(handle) = worker.take() {
            if !handle.is_finished() {
                debug!("previous render cycle still draining, start rejected");
                *worker = Some(handle);
                return Ok(());
            }
            if handle.join().is_err() {
                warn!("previous render thread panicked");
            }
        }

        self.shared.redraw_frame()?;

        self.shared.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(RENDER_THREAD_NAME.to_owned())
            .spawn(move || cycle_until_stopped(&shared));

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                debug!("render loop started");
                Ok(())
            }
            Err(error) => {
                self.shared.running.store(false, Ordering::Release);
                Err(EngineError::Spawn(error))
            }
        }
    }

    /// Stops cycling and waits for the render thread to exit.
    ///
    /// The running cycle finishes its current pass first; no callback is
    /// interrupted. With `flush_surface` the surface is cleared afterwards
    /// and every callback redraws in full once cycling resumes.
    pub fn stop(&self, flush_surface: bool) -> Result<()> {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        // Inside a callback the render thread exits after this pass. Its
        // handle stays in `worker` for the next `start` to reap, and the
        // worker lock is not touched: an outside `stop` may hold it while
        // joining this very thread.
        if !self.shared.is_cycle_thread() {
            let mut worker = lock(&self.worker);
            if let Some(handle) = worker.take() {
                if handle.join().is_err() {
                    warn!("render thread panicked");
                }
            }
        }

        if flush_surface {
            self.shared.canvas.clear()?;
            self.shared.invalidate_all();
        }

        debug!(flush_surface, "render loop stopped");
        Ok(())
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Runs exactly one cycle on the calling thread.
    ///
    /// Returns `false` without rendering while the background cycle is
    /// active or another synchronous cycle is in progress.
    pub fn render_once(&self) -> bool {
        if self.is_running() {
            return false;
        }

        // Reject rather than queue behind a cycle running elsewhere.
        let guard = match self.shared.cycle.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };

        self.shared.run_cycle(guard);
        true
    }

    /// Number of completed cycles since creation.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.shared.cycles.load(Ordering::Acquire)
    }

    /// Registers a callback, invoked in registration order from the next
    /// cycle on. The loop keeps only a weak reference.
    pub fn register(&self, target: &Arc<dyn Renderable>) -> RenderId {
        self.shared.register(Arc::downgrade(target))
    }

    /// Removes a callback. Unknown ids are ignored.
    pub fn unregister(&self, id: RenderId) {
        self.shared.unregister(id);
    }

    /// Registers `target` and returns a handle that can deregister it later.
    pub fn attach(&self, target: &Arc<dyn Renderable>) -> Registration {
        Registration {
            id: self.register(target),
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        if let Err(error) = self.stop(false) {
            warn!(%error, "failed to stop render loop on drop");
        }
    }
}

fn cycle_until_stopped(shared: &Shared) {
    let interval = shared.canvas.config().cycle_interval;

    while shared.running.load(Ordering::Acquire) {
        shared.run_cycle(lock(&shared.cycle));

        if interval.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(interval);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
