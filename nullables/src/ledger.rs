//! Nullable ledger: scripted reads, recorded writes, injectable events.
//!
//! Reads answer from maps the test fills in. Every successful
//! [`LedgerCall`] is recorded for assertions. Events are injected with
//! [`NullLedger::emit`] (live) or [`NullLedger::push_history`] (already on
//! the ledger before the solver subscribed).

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

use vsolve_solver::{ContractHandle, EventStream, Ledger, LedgerCall, LedgerError};
use vsolve_types::{
    Account, CodeType, EventKind, EventRecord, GameId, Hash32, SolutionInfo, StorageType,
    SubscribeFrom, TaskId, TaskInfo,
};

const STREAM_CAPACITY: usize = 1024;

/// The four task eligibility predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Predicate {
    EndChallengePeriod,
    EndRevealPeriod,
    RunVerificationGame,
    FinalizeTask,
}

pub struct NullLedger {
    block_number: AtomicU64,
    solutions: Mutex<HashMap<TaskId, SolutionInfo>>,
    task_infos: Mutex<HashMap<TaskId, TaskInfo>>,
    game_tasks: Mutex<HashMap<GameId, TaskId>>,
    game_indices: Mutex<HashMap<GameId, (u64, u64)>>,
    predicates: Mutex<HashSet<(Predicate, TaskId)>>,
    games_over: Mutex<HashSet<GameId>>,
    failing_calls: Mutex<HashSet<&'static str>>,
    refused: Mutex<HashSet<EventKind>>,
    calls: Mutex<Vec<(Account, LedgerCall)>>,
    history: Mutex<Vec<EventRecord>>,
    subscribers: Mutex<HashMap<EventKind, Vec<mpsc::Sender<EventRecord>>>>,
    subscriptions: Mutex<Vec<(EventKind, SubscribeFrom, Account)>>,
}

impl NullLedger {
    pub fn new() -> Self {
        Self {
            block_number: AtomicU64::new(1_000),
            solutions: Mutex::new(HashMap::new()),
            task_infos: Mutex::new(HashMap::new()),
            game_tasks: Mutex::new(HashMap::new()),
            game_indices: Mutex::new(HashMap::new()),
            predicates: Mutex::new(HashSet::new()),
            games_over: Mutex::new(HashSet::new()),
            failing_calls: Mutex::new(HashSet::new()),
            refused: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            subscribers: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    // ── Scripting ───────────────────────────────────────────────────────

    pub fn set_block_number(&self, height: u64) {
        self.block_number.store(height, Ordering::SeqCst);
    }

    pub fn set_solution_info(&self, task_id: TaskId, info: SolutionInfo) {
        self.solutions.lock().unwrap().insert(task_id, info);
    }

    pub fn set_task_info(&self, task_id: TaskId, info: TaskInfo) {
        self.task_infos.lock().unwrap().insert(task_id, info);
    }

    /// Open a game for `task_id` with the given ledger-side bounds.
    pub fn set_game(&self, game_id: GameId, task_id: TaskId, bounds: (u64, u64)) {
        self.game_tasks.lock().unwrap().insert(game_id, task_id);
        self.set_game_indices(game_id, bounds);
    }

    pub fn set_game_indices(&self, game_id: GameId, bounds: (u64, u64)) {
        self.game_indices.lock().unwrap().insert(game_id, bounds);
    }

    pub fn set_predicate(&self, predicate: Predicate, task_id: TaskId, holds: bool) {
        let mut predicates = self.predicates.lock().unwrap();
        if holds {
            predicates.insert((predicate, task_id));
        } else {
            predicates.remove(&(predicate, task_id));
        }
    }

    pub fn set_game_over(&self, game_id: GameId, over: bool) {
        let mut games = self.games_over.lock().unwrap();
        if over {
            games.insert(game_id);
        } else {
            games.remove(&game_id);
        }
    }

    /// Make every later call with this method name fail with a transport error.
    pub fn fail_call(&self, name: &'static str) {
        self.failing_calls.lock().unwrap().insert(name);
    }

    pub fn restore_call(&self, name: &'static str) {
        self.failing_calls.lock().unwrap().remove(name);
    }

    /// Make subscriptions to `kind` fail.
    pub fn refuse_subscription(&self, kind: EventKind) {
        self.refused.lock().unwrap().insert(kind);
    }

    // ── Events ──────────────────────────────────────────────────────────

    /// Record an event as already emitted, without notifying subscribers.
    pub fn push_history(&self, record: EventRecord) {
        self.history.lock().unwrap().push(record);
    }

    /// Emit an event to current subscribers of its kind. Returns how many
    /// subscribers received it.
    pub fn emit(&self, record: EventRecord) -> usize {
        self.history.lock().unwrap().push(record.clone());
        let mut subscribers = self.subscribers.lock().unwrap();
        let Some(senders) = subscribers.get_mut(&record.kind()) else {
            return 0;
        };
        senders.retain(|tx| !tx.is_closed());
        senders
            .iter()
            .filter(|tx| tx.try_send(record.clone()).is_ok())
            .count()
    }

    /// Drop every sender, ending all open event streams.
    pub fn close_streams(&self) {
        self.subscribers.lock().unwrap().clear();
    }

    // ── Inspection ──────────────────────────────────────────────────────

    /// Every successful call, in submission order.
    pub fn calls(&self) -> Vec<LedgerCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn calls_named(&self, name: &str) -> Vec<LedgerCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.name() == name)
            .collect()
    }

    pub fn senders(&self) -> Vec<Account> {
        self.calls.lock().unwrap().iter().map(|(from, _)| *from).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Subscriptions opened so far: kind, start point and contract address.
    pub fn subscriptions(&self) -> Vec<(EventKind, SubscribeFrom, Account)> {
        self.subscriptions.lock().unwrap().clone()
    }

    fn default_task_info() -> TaskInfo {
        TaskInfo {
            giver: Account::ZERO,
            init_state_hash: Hash32::ZERO,
            code_type: CodeType::Wasm,
            storage_type: StorageType::Ipfs,
            storage_address: String::new(),
        }
    }

    fn predicate(&self, predicate: Predicate, task_id: TaskId) -> bool {
        self.predicates
            .lock()
            .unwrap()
            .contains(&(predicate, task_id))
    }
}

impl Default for NullLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for NullLedger {
    async fn block_number(&self) -> Result<u64, LedgerError> {
        Ok(self.block_number.load(Ordering::SeqCst))
    }

    async fn solution_info(&self, task_id: TaskId) -> Result<SolutionInfo, LedgerError> {
        Ok(self
            .solutions
            .lock()
            .unwrap()
            .get(&task_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn task_info(&self, task_id: TaskId) -> Result<TaskInfo, LedgerError> {
        Ok(self
            .task_infos
            .lock()
            .unwrap()
            .get(&task_id)
            .cloned()
            .unwrap_or_else(Self::default_task_info))
    }

    async fn game_task(&self, game_id: GameId) -> Result<TaskId, LedgerError> {
        self.game_tasks
            .lock()
            .unwrap()
            .get(&game_id)
            .copied()
            .ok_or_else(|| LedgerError::Reverted {
                call: "gameTask",
                reason: format!("unknown game {game_id}"),
            })
    }

    async fn game_indices(&self, game_id: GameId) -> Result<(u64, u64), LedgerError> {
        self.game_indices
            .lock()
            .unwrap()
            .get(&game_id)
            .copied()
            .ok_or_else(|| LedgerError::Reverted {
                call: "getIndices",
                reason: format!("unknown game {game_id}"),
            })
    }

    async fn can_end_challenge_period(&self, task_id: TaskId) -> Result<bool, LedgerError> {
        Ok(self.predicate(Predicate::EndChallengePeriod, task_id))
    }

    async fn can_end_reveal_period(&self, task_id: TaskId) -> Result<bool, LedgerError> {
        Ok(self.predicate(Predicate::EndRevealPeriod, task_id))
    }

    async fn can_run_verification_game(&self, task_id: TaskId) -> Result<bool, LedgerError> {
        Ok(self.predicate(Predicate::RunVerificationGame, task_id))
    }

    async fn can_finalize_task(&self, task_id: TaskId) -> Result<bool, LedgerError> {
        Ok(self.predicate(Predicate::FinalizeTask, task_id))
    }

    async fn is_game_over(&self, game_id: GameId) -> Result<bool, LedgerError> {
        Ok(self.games_over.lock().unwrap().contains(&game_id))
    }

    async fn submit(&self, from: Account, call: LedgerCall) -> Result<(), LedgerError> {
        if self.failing_calls.lock().unwrap().contains(call.name()) {
            return Err(LedgerError::Transport(format!("{} unavailable", call.name())));
        }
        self.calls.lock().unwrap().push((from, call));
        Ok(())
    }

    async fn subscribe(
        &self,
        contract: &ContractHandle,
        kind: EventKind,
        from: SubscribeFrom,
    ) -> Result<EventStream, LedgerError> {
        if self.refused.lock().unwrap().contains(&kind) {
            return Err(LedgerError::NoEventSource(kind.to_string()));
        }
        self.subscriptions
            .lock()
            .unwrap()
            .push((kind, from, contract.address));

        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        if let SubscribeFrom::Block(start) = from {
            let history = self.history.lock().unwrap();
            for record in history
                .iter()
                .filter(|r| r.kind() == kind && r.position.block >= start)
            {
                let _ = tx.try_send(record.clone());
            }
        }
        self.subscribers
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsolve_types::{EventPosition, LedgerEvent};

    fn handle() -> ContractHandle {
        ContractHandle {
            name: "incentiveLayer",
            address: Account::repeat_byte(1),
        }
    }

    fn timeout(block: u64, n: u64) -> EventRecord {
        EventRecord::new(
            EventPosition::new(block, 0),
            LedgerEvent::TaskTimeout {
                task_id: TaskId::from_u64(n),
            },
        )
    }

    #[tokio::test]
    async fn replays_history_from_requested_block() {
        let ledger = NullLedger::new();
        ledger.push_history(timeout(5, 1));
        ledger.push_history(timeout(10, 2));

        let mut rx = ledger
            .subscribe(&handle(), EventKind::TaskTimeout, SubscribeFrom::Block(8))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap(), timeout(10, 2));

        assert_eq!(ledger.emit(timeout(11, 3)), 1);
        assert_eq!(rx.recv().await.unwrap(), timeout(11, 3));
    }

    #[tokio::test]
    async fn records_calls_and_scripted_failures() {
        let ledger = NullLedger::new();
        let me = Account::repeat_byte(7);
        let game_id = GameId::from_u64(1);
        ledger
            .submit(me, LedgerCall::GameOver { game_id })
            .await
            .unwrap();
        ledger.fail_call("gameOver");
        assert!(matches!(
            ledger.submit(me, LedgerCall::GameOver { game_id }).await,
            Err(LedgerError::Transport(_))
        ));
        assert_eq!(ledger.calls_named("gameOver").len(), 1);
        assert_eq!(ledger.senders(), vec![me]);
    }

    #[tokio::test]
    async fn refused_subscriptions_error() {
        let ledger = NullLedger::new();
        ledger.refuse_subscription(EventKind::Queried);
        assert!(ledger
            .subscribe(&handle(), EventKind::Queried, SubscribeFrom::Live)
            .await
            .is_err());
    }
}
