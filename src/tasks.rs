//! Per-frame cooperative task pool.
//!
//! Long-running sequences (shuffling a cube, staged intro animations) are
//! written as `async` blocks and spawned here. The render loop polls the pool
//! once per frame, after the experiment hook, so every task advances on the
//! same tick as the animations it awaits. Everything stays on one thread.

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;

/// Single-threaded executor driven by the render loop.
pub struct Tasks {
    pool: LocalPool,
    spawner: LocalSpawner,
    live: Rc<Cell<usize>>,
}

impl Tasks {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            pool,
            spawner,
            live: Rc::new(Cell::new(0)),
        }
    }

    /// Queue a future. It first runs on the next [`Tasks::run_until_stalled`].
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        let live = Rc::clone(&self.live);
        live.set(live.get() + 1);
        let tracked = async move {
            future.await;
            live.set(live.get() - 1);
        };
        if let Err(e) = self.spawner.spawn_local(tracked) {
            log::error!("Failed to spawn task: {}", e);
            self.live.set(self.live.get() - 1);
        }
    }

    /// Poll every task until none can make progress this frame.
    pub fn run_until_stalled(&mut self) {
        self.pool.run_until_stalled();
    }

    /// Spawned tasks that have not finished.
    pub fn pending(&self) -> usize {
        self.live.get()
    }
}

impl Default for Tasks {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Tasks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tasks").field("pending", &self.pending()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;

    #[test]
    fn test_task_waits_for_signal() {
        let mut tasks = Tasks::new();
        let (tx, rx) = oneshot::channel::<u32>();
        let seen = Rc::new(Cell::new(0));
        let seen_task = Rc::clone(&seen);
        tasks.spawn(async move {
            if let Ok(v) = rx.await {
                seen_task.set(v);
            }
        });

        tasks.run_until_stalled();
        assert_eq!(tasks.pending(), 1);
        assert_eq!(seen.get(), 0);

        tx.send(7).unwrap();
        tasks.run_until_stalled();
        assert_eq!(tasks.pending(), 0);
        assert_eq!(seen.get(), 7);
    }
}
