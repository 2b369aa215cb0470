// Prometheus metrics definitions for the snakepit backend.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Heat games currently running on the board engine.
    pub static ref ACTIVE_GAMES: IntGauge =
        IntGauge::new("snakepit_active_games", "Heat games currently running").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Total brackets created.
    pub static ref BRACKETS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "snakepit_brackets_created_total",
        "Total brackets created",
    )
    .unwrap();

    /// Total bracket rounds seeded.
    pub static ref ROUNDS_SEEDED_TOTAL: IntCounter = IntCounter::new(
        "snakepit_rounds_seeded_total",
        "Total bracket rounds seeded",
    )
    .unwrap();

    /// Total heat games dispatched to the engine.
    pub static ref GAMES_STARTED_TOTAL: IntCounter = IntCounter::new(
        "snakepit_games_started_total",
        "Heat games dispatched to the engine",
    )
    .unwrap();

    /// Total heat game results recorded.
    pub static ref RESULTS_RECORDED_TOTAL: IntCounter = IntCounter::new(
        "snakepit_results_recorded_total",
        "Heat game results recorded",
    )
    .unwrap();

    /// Total CSV exports served.
    pub static ref CSV_EXPORTS_TOTAL: IntCounter = IntCounter::new(
        "snakepit_csv_exports_total",
        "Bracket CSV exports served",
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(ACTIVE_GAMES.clone()),
        Box::new(BRACKETS_CREATED_TOTAL.clone()),
        Box::new(ROUNDS_SEEDED_TOTAL.clone()),
        Box::new(GAMES_STARTED_TOTAL.clone()),
        Box::new(RESULTS_RECORDED_TOTAL.clone()),
        Box::new(CSV_EXPORTS_TOTAL.clone()),
    ];

    for c in collectors {
        REGISTRY.register(c).expect("failed to register metric");
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
