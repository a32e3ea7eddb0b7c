use std::fmt::{self, Debug};

use tokio::task::JoinHandle;

/// A task spawned on behalf of an actor.
///
/// The task is aborted when this handle is dropped. Keep it in the actor
/// state for as long as the task is wanted.
pub struct TaskHandle {
    join_handle: JoinHandle<()>,
}

impl TaskHandle {
    #[inline]
    pub(crate) fn new(join_handle: JoinHandle<()>) -> Self {
        Self { join_handle }
    }

    /// Aborts the task. This is a no-op if the task already finished.
    #[inline]
    pub fn abort(&self) {
        self.join_handle.abort();
    }

    /// Returns `true` if the task has finished or was aborted.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.join_handle.abort();
    }
}

impl Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}
