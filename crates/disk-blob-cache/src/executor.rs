//! Where background work (startup index population) runs

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::warn;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Executor: Send + Sync {
    fn execute(&self, task: Task);
}

/// Runs each task on its own named thread, or inline if no thread can be spawned
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn execute(&self, task: Task) {
        let slot = Arc::new(Mutex::new(Some(task)));
        let thread_slot = Arc::clone(&slot);
        let spawned = std::thread::Builder::new()
            .name("disk-cache-index".to_string())
            .spawn(move || {
                let task = thread_slot.lock().take();
                if let Some(task) = task {
                    task();
                }
            });
        if let Err(e) = spawned {
            warn!(error = %e, "Failed to spawn background cache thread, running inline");
            let task = slot.lock().take();
            if let Some(task) = task {
                task();
            }
        }
    }
}

/// Runs tasks on a tokio runtime's blocking pool
#[derive(Debug, Clone)]
pub struct TokioBlockingExecutor {
    handle: Handle,
}

impl TokioBlockingExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime the caller is running on
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Executor for TokioBlockingExecutor {
    fn execute(&self, task: Task) {
        drop(self.handle.spawn_blocking(task));
    }
}
