//! Tracked tasks and games.
//!
//! Both registries are async `RwLock`-guarded maps. Handlers and upkeep
//! checks run concurrently, so every mutation re-checks presence under the
//! write lock: a record removed by one unit of work is never resurrected by
//! another.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;

use vsolve_types::{Amount, GameId, TaskId, TaskInfo};

use crate::{EngineError, Solution, SolverError};

/// Where a tracked task is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Registered, waiting for solver selection.
    Candidate,
    /// Selected; descriptor fetched.
    Selected,
    /// Executing, or committed submission failed.
    Solving,
    Committed,
    Revealed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Candidate => "candidate",
            Self::Selected => "selected",
            Self::Solving => "solving",
            Self::Committed => "committed",
            Self::Revealed => "revealed",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug)]
pub struct TaskRecord {
    pub id: TaskId,
    pub min_deposit: Amount,
    pub reward: Amount,
    pub state: TaskState,
    pub info: Option<TaskInfo>,
    pub solution: Option<Solution>,
}

/// Read-only view of a tracked task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id: TaskId,
    pub state: TaskState,
    pub reward: Amount,
    pub steps: Option<u64>,
}

impl From<&TaskRecord> for TaskSummary {
    fn from(record: &TaskRecord) -> Self {
        Self {
            id: record.id,
            state: record.state,
            reward: record.reward,
            steps: record.solution.as_ref().map(|s| s.steps),
        }
    }
}

#[derive(Default)]
pub struct TaskRegistry {
    inner: RwLock<HashMap<TaskId, TaskRecord>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a task as a registration candidate. Returns `false` if it was
    /// already tracked, in which case the existing record is kept.
    pub async fn insert_candidate(&self, id: TaskId, min_deposit: Amount, reward: Amount) -> bool {
        let mut map = self.inner.write().await;
        if map.contains_key(&id) {
            return false;
        }
        map.insert(
            id,
            TaskRecord {
                id,
                min_deposit,
                reward,
                state: TaskState::Candidate,
                info: None,
                solution: None,
            },
        );
        true
    }

    /// Record the descriptor of a task this solver was selected for. A task
    /// registered before a restart is tracked afresh.
    pub async fn mark_selected(&self, id: TaskId, info: TaskInfo) {
        let mut map = self.inner.write().await;
        let record = map.entry(id).or_insert_with(|| TaskRecord {
            id,
            min_deposit: Amount::ZERO,
            reward: Amount::ZERO,
            state: TaskState::Candidate,
            info: None,
            solution: None,
        });
        record.info = Some(info);
        record.state = TaskState::Selected;
    }

    /// Attach the computed solution. Returns `false` if the task stopped
    /// being tracked while it was executing.
    pub async fn attach_solution(&self, id: TaskId, solution: Solution) -> bool {
        let mut map = self.inner.write().await;
        match map.get_mut(&id) {
            Some(record) => {
                record.solution = Some(solution);
                record.state = TaskState::Solving;
                true
            }
            None => false,
        }
    }

    pub async fn set_state(&self, id: TaskId, state: TaskState) -> bool {
        let mut map = self.inner.write().await;
        match map.get_mut(&id) {
            Some(record) => {
                record.state = state;
                true
            }
            None => false,
        }
    }

    pub async fn state(&self, id: TaskId) -> Option<TaskState> {
        self.inner.read().await.get(&id).map(|r| r.state)
    }

    pub async fn solution(&self, id: TaskId) -> Option<Solution> {
        self.inner
            .read()
            .await
            .get(&id)
            .and_then(|r| r.solution.clone())
    }

    pub async fn contains(&self, id: TaskId) -> bool {
        self.inner.read().await.contains_key(&id)
    }

    pub async fn remove(&self, id: TaskId) -> Option<TaskRecord> {
        self.inner.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub async fn ids(&self) -> Vec<TaskId> {
        self.inner.read().await.keys().copied().collect()
    }

    /// Summaries of every tracked task, ordered by id.
    pub async fn snapshot(&self) -> Vec<TaskSummary> {
        let mut out: Vec<TaskSummary> = self
            .inner
            .read()
            .await
            .values()
            .map(TaskSummary::from)
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }
}

/// A verification game this solver is defending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub id: GameId,
    pub task_id: TaskId,
    pub low: u64,
    pub high: u64,
    /// Steps of the defended execution; bounds never exceed `total_steps + 1`.
    pub total_steps: u64,
}

impl GameRecord {
    /// Fails when `total_steps + 1` does not fit the step index.
    pub fn new(id: GameId, task_id: TaskId, total_steps: u64) -> Result<Self, EngineError> {
        let high = total_steps
            .checked_add(1)
            .ok_or(EngineError::TooManySteps(total_steps))?;
        Ok(Self {
            id,
            task_id,
            low: 0,
            high,
            total_steps,
        })
    }

    /// Check `0 <= low < high <= total_steps + 1`.
    pub fn check_bounds(&self, low: u64, high: u64) -> Result<(), SolverError> {
        let limit = self.total_steps.saturating_add(1);
        if low < high && high <= limit {
            Ok(())
        } else {
            Err(SolverError::InvalidBounds {
                game: self.id,
                low,
                high,
                limit,
            })
        }
    }

    /// Whether the bisection has collapsed onto a single step.
    pub fn is_terminal(&self) -> bool {
        self.low + 1 == self.high
    }
}

#[derive(Default)]
pub struct GameRegistry {
    inner: RwLock<HashMap<GameId, GameRecord>>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a game. An existing record for the same id is replaced.
    pub async fn insert(&self, record: GameRecord) {
        self.inner.write().await.insert(record.id, record);
    }

    pub async fn get(&self, id: GameId) -> Option<GameRecord> {
        self.inner.read().await.get(&id).copied()
    }

    /// Narrow a game to new bounds after validating them. Returns the
    /// updated record, or `None` if the game is not tracked.
    pub async fn set_bounds(
        &self,
        id: GameId,
        low: u64,
        high: u64,
    ) -> Result<Option<GameRecord>, SolverError> {
        let mut map = self.inner.write().await;
        let Some(record) = map.get_mut(&id) else {
            return Ok(None);
        };
        record.check_bounds(low, high)?;
        record.low = low;
        record.high = high;
        Ok(Some(*record))
    }

    pub async fn contains(&self, id: GameId) -> bool {
        self.inner.read().await.contains_key(&id)
    }

    pub async fn remove(&self, id: GameId) -> Option<GameRecord> {
        self.inner.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn ids(&self) -> Vec<GameId> {
        self.inner.read().await.keys().copied().collect()
    }

    /// Every tracked game, ordered by id.
    pub async fn snapshot(&self) -> Vec<GameRecord> {
        let mut out: Vec<GameRecord> = self.inner.read().await.values().copied().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }
}
