//! Supervised units of work.
//!
//! Every event handler invocation and upkeep check runs as its own tokio
//! task. The spawner never waits for it; failures and panics are logged and
//! counted here instead of propagating.

use prometheus::IntCounter;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use tokio::task::JoinSet;
use tracing::{error, warn, Instrument, Span};

use crate::SolverError;

pub struct Supervisor {
    units: Mutex<JoinSet<()>>,
    failures: IntCounter,
}

impl Supervisor {
    pub fn new(failures: IntCounter) -> Self {
        Self {
            units: Mutex::new(JoinSet::new()),
            failures,
        }
    }

    /// Run `work` in the background under `span`. `label` names the unit in
    /// failure logs.
    pub fn spawn<F>(&self, label: &'static str, span: Span, work: F)
    where
        F: Future<Output = Result<(), SolverError>> + Send + 'static,
    {
        let failures = self.failures.clone();
        let inner = tokio::spawn(work.instrument(span.clone()));
        let watcher = async move {
            match inner.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures.inc();
                    if e.is_transient() {
                        warn!(unit = label, error = %e, "unit of work failed, will retry");
                    } else {
                        error!(unit = label, error = %e, "unit of work failed");
                    }
                }
                Err(join) if join.is_panic() => {
                    failures.inc();
                    error!(unit = label, "unit of work panicked");
                }
                Err(_) => {}
            }
        }
        .instrument(span);

        let mut units = self.units.lock().unwrap_or_else(PoisonError::into_inner);
        while units.try_join_next().is_some() {}
        units.spawn(watcher);
    }

    /// Units spawned and not yet reaped.
    pub fn in_flight(&self) -> usize {
        self.units
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Wait until every unit, including ones spawned meanwhile, has finished.
    pub async fn drain(&self) {
        loop {
            let mut batch =
                std::mem::take(&mut *self.units.lock().unwrap_or_else(PoisonError::into_inner));
            if batch.is_empty() {
                return;
            }
            while batch.join_next().await.is_some() {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn supervisor() -> Supervisor {
        Supervisor::new(IntCounter::new("failures", "test failures").unwrap())
    }

    #[tokio::test]
    async fn drain_waits_for_spawned_work() {
        let supervisor = supervisor();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let done = done.clone();
            supervisor.spawn("count", Span::none(), async move {
                tokio::task::yield_now().await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        supervisor.drain().await;
        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert_eq!(supervisor.in_flight(), 0);
    }

    #[tokio::test]
    async fn failures_and_panics_are_counted_not_propagated() {
        let supervisor = supervisor();
        supervisor.spawn("fails", Span::none(), async {
            Err(SolverError::Other("boom".into()))
        });
        let bug = Arc::new(AtomicUsize::new(1));
        supervisor.spawn("panics", Span::none(), async move {
            if bug.load(Ordering::SeqCst) == 1 {
                panic!("handler bug");
            }
            Ok(())
        });
        supervisor.spawn("succeeds", Span::none(), async { Ok(()) });
        supervisor.drain().await;
        assert_eq!(supervisor.failures.get(), 2);
    }
}
