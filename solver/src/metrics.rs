//! Prometheus metrics for the solver.
//!
//! [`SolverMetrics`] owns a dedicated [`Registry`]; an embedding process can
//! expose it over HTTP or dump it with [`SolverMetrics::encode_text`].

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

/// Central collection of solver-level metrics.
pub struct SolverMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Events received from all subscriptions, including buffered ones.
    pub events_received: IntCounter,
    /// Ledger-mutating calls submitted.
    pub calls_submitted: IntCounter,
    /// Ledger-mutating calls that failed.
    pub calls_failed: IntCounter,
    /// Calls skipped because a replayed event's effect was already on the ledger.
    pub calls_suppressed: IntCounter,
    /// Handler or upkeep units of work that returned an error or panicked.
    pub handler_failures: IntCounter,
    pub tasks_registered: IntCounter,
    pub games_started: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub tracked_tasks: IntGauge,
    pub tracked_games: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time of off-chain execution, in milliseconds.
    pub solve_time_ms: Histogram,
}

impl SolverMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let events_received = register_int_counter_with_registry!(
            Opts::new("vsolve_events_received_total", "Ledger events received"),
            registry
        )
        .expect("failed to register events_received counter");

        let calls_submitted = register_int_counter_with_registry!(
            Opts::new(
                "vsolve_ledger_calls_submitted_total",
                "Ledger-mutating calls submitted"
            ),
            registry
        )
        .expect("failed to register calls_submitted counter");

        let calls_failed = register_int_counter_with_registry!(
            Opts::new(
                "vsolve_ledger_calls_failed_total",
                "Ledger-mutating calls that failed"
            ),
            registry
        )
        .expect("failed to register calls_failed counter");

        let calls_suppressed = register_int_counter_with_registry!(
            Opts::new(
                "vsolve_ledger_calls_suppressed_total",
                "Calls skipped during recovery replay"
            ),
            registry
        )
        .expect("failed to register calls_suppressed counter");

        let handler_failures = register_int_counter_with_registry!(
            Opts::new(
                "vsolve_handler_failures_total",
                "Units of work that failed or panicked"
            ),
            registry
        )
        .expect("failed to register handler_failures counter");

        let tasks_registered = register_int_counter_with_registry!(
            Opts::new("vsolve_tasks_registered_total", "Tasks registered for"),
            registry
        )
        .expect("failed to register tasks_registered counter");

        let games_started = register_int_counter_with_registry!(
            Opts::new("vsolve_games_started_total", "Verification games started"),
            registry
        )
        .expect("failed to register games_started counter");

        let tracked_tasks = register_int_gauge_with_registry!(
            Opts::new("vsolve_tracked_tasks", "Tasks currently tracked"),
            registry
        )
        .expect("failed to register tracked_tasks gauge");

        let tracked_games = register_int_gauge_with_registry!(
            Opts::new("vsolve_tracked_games", "Games currently tracked"),
            registry
        )
        .expect("failed to register tracked_games gauge");

        // 1 ms to roughly 9 hours.
        let solve_time_ms = register_histogram_with_registry!(
            HistogramOpts::new("vsolve_solve_time_ms", "Off-chain execution time in milliseconds")
                .buckets(prometheus::exponential_buckets(1.0, 4.0, 13).unwrap()),
            registry
        )
        .expect("failed to register solve_time_ms histogram");

        Self {
            registry,
            events_received,
            calls_submitted,
            calls_failed,
            calls_suppressed,
            handler_failures,
            tasks_registered,
            games_started,
            tracked_tasks,
            tracked_games,
            solve_time_ms,
        }
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        if TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .is_err()
        {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for SolverMetrics {
    fn default() -> Self {
        Self::new()
    }
}
