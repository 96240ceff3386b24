//! Thread creation as an injected capability.
//!
//! The runtime never calls `std::thread` directly; it asks a [`Spawner`]. A
//! board port supplies its own (RTOS tasks, fixed stacks), tests can wrap
//! [`StdSpawner`] to count or name threads.

use std::fmt;
use std::thread;

use crate::error::RuntimeError;

/// Work handed to a spawner.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Spawns named long-running tasks.
pub trait Spawner: Send + Sync {
    /// Starts `task` on its own thread of execution.
    fn spawn(&self, name: &str, task: Task) -> Result<TaskHandle, RuntimeError>;
}

/// Join side of a spawned task.
pub struct TaskHandle {
    name: String,
    join: Box<dyn FnOnce() -> bool + Send>,
}

impl TaskHandle {
    /// Wraps a join function that returns `false` if the task panicked.
    pub fn new(name: impl Into<String>, join: impl FnOnce() -> bool + Send + 'static) -> Self {
        Self {
            name: name.into(),
            join: Box::new(join),
        }
    }

    /// Task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Waits for the task to finish.
    pub fn join(self) -> Result<(), RuntimeError> {
        if (self.join)() {
            Ok(())
        } else {
            Err(RuntimeError::Panicked(self.name))
        }
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle").field("name", &self.name).finish()
    }
}

/// Spawns OS threads through `std::thread::Builder`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdSpawner {
    stack_size: Option<usize>,
}

impl StdSpawner {
    /// Platform default stack size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed stack size for every thread.
    pub fn with_stack_size(bytes: usize) -> Self {
        Self {
            stack_size: Some(bytes),
        }
    }
}

impl Spawner for StdSpawner {
    fn spawn(&self, name: &str, task: Task) -> Result<TaskHandle, RuntimeError> {
        let mut builder = thread::Builder::new().name(name.to_owned());
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }
        let handle = builder
            .spawn(task)
            .map_err(|source| RuntimeError::spawn(name, source))?;
        tracing::debug!(thread = name, "spawned");
        Ok(TaskHandle::new(name, move || handle.join().is_ok()))
    }
}
