//! Nullable output stager: records publications instead of uploading.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use vsolve_solver::{OutputStager, Solution, StagingError};
use vsolve_types::TaskId;

#[derive(Default)]
pub struct NullStager {
    published: Mutex<Vec<TaskId>>,
    failing: AtomicBool,
}

impl NullStager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later publication fail.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Tasks whose outputs were published, in order.
    pub fn published(&self) -> Vec<TaskId> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutputStager for NullStager {
    async fn publish_outputs(
        &self,
        task_id: TaskId,
        _solution: &Solution,
    ) -> Result<(), StagingError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StagingError(format!("storage unavailable for {task_id}")));
        }
        self.published.lock().unwrap().push(task_id);
        Ok(())
    }
}
