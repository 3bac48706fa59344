//! Span constructors shared by the handlers and the upkeep loop, so every
//! log line about one task or game carries the same fields.

use tracing::{info_span, Span};
use vsolve_types::{EventKind, EventPosition, GameId, TaskId};

/// Span covering one handler invocation for a delivered event.
pub fn event_span(kind: EventKind, position: EventPosition) -> Span {
    info_span!(
        "event",
        kind = %kind,
        block = position.block,
        log_index = position.log_index
    )
}

pub fn task_span(task: TaskId) -> Span {
    info_span!("task", task = %task)
}

pub fn game_span(game: GameId) -> Span {
    info_span!("game", game = %game)
}

/// Span covering one upkeep tick.
pub fn upkeep_span(tick: u64) -> Span {
    info_span!("upkeep", tick)
}

/// Span covering the one-shot replay of buffered historical events.
pub fn recovery_span(events: usize) -> Span {
    info_span!("recovery", events)
}
