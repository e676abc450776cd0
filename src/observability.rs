use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests served. Labels: route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "courtslot_http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "courtslot_http_request_duration_seconds";

// ── Booking lifecycle ───────────────────────────────────────────

/// Counter: bookings created. Labels: status (pending, finding_team).
pub const BOOKINGS_CREATED_TOTAL: &str = "courtslot_bookings_created_total";

/// Counter: explicit status transitions. Labels: to.
pub const TRANSITIONS_TOTAL: &str = "courtslot_transitions_total";

/// Counter: matchmaking pairs confirmed.
pub const MATCHES_MADE_TOTAL: &str = "courtslot_matches_made_total";

/// Counter: bookings advanced by the scheduler. Labels: rule.
pub const SWEEP_ACTIONS_TOTAL: &str = "courtslot_sweep_actions_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: journal group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "courtslot_wal_flush_duration_seconds";

/// Histogram: journal group-commit batch size (records per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "courtslot_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics"),
        Err(e) => tracing::error!("failed to install Prometheus metrics exporter: {e}"),
    }
}
