//! Event subscriptions and delivery.
//!
//! One pump task per subscribed [`EventKind`] reads its stream and hands each
//! record to the handler registered for that kind, as an independent
//! supervised unit of work. Ordering holds within one kind only. While
//! recovery is active records are buffered instead of delivered.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use vsolve_types::{EventKind, EventRecord, SubscribeFrom};

use crate::tracing_spans::event_span;
use crate::{
    ContractsDocument, Effects, EventStream, RecoveryBuffer, ShutdownController, SolverContext,
    SolverError,
};

/// Reaction to one kind of ledger event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, record: &EventRecord, effects: Effects) -> Result<(), SolverError>;
}

pub struct Dispatcher {
    ctx: Arc<SolverContext>,
    contracts: ContractsDocument,
    from: SubscribeFrom,
    recovery: Arc<RecoveryBuffer>,
    shutdown: Arc<ShutdownController>,
    handlers: HashMap<EventKind, Arc<dyn EventHandler>>,
    pumps: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn new(
        ctx: Arc<SolverContext>,
        contracts: ContractsDocument,
        from: SubscribeFrom,
        recovery: Arc<RecoveryBuffer>,
        shutdown: Arc<ShutdownController>,
    ) -> Self {
        Self {
            ctx,
            contracts,
            from,
            recovery,
            shutdown,
            handlers: HashMap::new(),
            pumps: Vec::new(),
        }
    }

    /// Register `handler` for `kind` and open its subscription.
    ///
    /// Returns `false` if the kind has no event source; the handler stays
    /// registered for direct delivery but no events arrive for it.
    pub async fn subscribe(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) -> bool {
        self.handlers.insert(kind, handler.clone());

        if self.shutdown.is_triggered() {
            warn!(kind = %kind, "dispatcher closed, not subscribing");
            return false;
        }
        let Some(contract) = self.contracts.handle(kind.contract()) else {
            error!(
                kind = %kind,
                contract = kind.contract().document_name(),
                "contract missing from contracts document, events will not be delivered"
            );
            return false;
        };
        let stream = match self.ctx.ledger.subscribe(&contract, kind, self.from).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(kind = %kind, error = %e, "subscription failed, events will not be delivered");
                return false;
            }
        };

        let pump = pump(
            kind,
            stream,
            handler,
            self.ctx.clone(),
            self.recovery.clone(),
            self.shutdown.subscribe(),
        );
        self.pumps.push(tokio::spawn(pump));
        debug!(kind = %kind, from = ?self.from, "subscribed");
        true
    }

    pub fn handler(&self, kind: EventKind) -> Option<Arc<dyn EventHandler>> {
        self.handlers.get(&kind).cloned()
    }

    /// Kinds with a live subscription pump.
    pub fn active_subscriptions(&self) -> usize {
        self.pumps.iter().filter(|p| !p.is_finished()).count()
    }

    /// Stop every subscription and wait for the pumps to exit. Safe to call
    /// more than once.
    pub async fn close(&mut self) {
        self.shutdown.shutdown();
        let pumps: Vec<_> = self.pumps.drain(..).collect();
        if pumps.is_empty() {
            return;
        }
        for pump in pumps {
            let _ = pump.await;
        }
        info!("event subscriptions closed");
    }
}

async fn pump(
    kind: EventKind,
    mut stream: EventStream,
    handler: Arc<dyn EventHandler>,
    ctx: Arc<SolverContext>,
    recovery: Arc<RecoveryBuffer>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        let record = tokio::select! {
            _ = shutdown_rx.recv() => break,
            next = stream.recv() => match next {
                Some(record) => record,
                None => {
                    warn!(kind = %kind, "event stream ended");
                    break;
                }
            },
        };
        ctx.metrics.events_received.inc();

        if record.kind() != kind {
            warn!(expected = %kind, got = %record.kind(), "ignoring event of unexpected kind");
            continue;
        }
        if let Some(record) = recovery.offer(record, &handler) {
            deliver(&ctx, handler.clone(), record);
        }
    }
    debug!(kind = %kind, "subscription stopped");
}

/// Hand one record to its handler as a supervised unit of work.
fn deliver(ctx: &SolverContext, handler: Arc<dyn EventHandler>, record: EventRecord) {
    let kind = record.kind();
    let span = event_span(kind, record.position);
    ctx.supervisor.spawn(kind.name(), span, async move {
        handler.handle(&record, Effects::Live).await
    });
}
