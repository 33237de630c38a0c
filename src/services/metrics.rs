//! Prometheus metrics (default registry, exposed at GET /metrics)

use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

lazy_static! {
    pub static ref REFRESH_TOTAL: IntCounter = register_int_counter!(
        "catalog_refresh_total",
        "Completed catalog refresh runs"
    )
    .unwrap();
    pub static ref REFRESH_FAILURES: IntCounter = register_int_counter!(
        "catalog_refresh_failures_total",
        "Catalog refresh runs aborted by an unreadable source"
    )
    .unwrap();
    pub static ref CHANNELS: IntGauge = register_int_gauge!(
        "catalog_channels",
        "Channels in the published catalog"
    )
    .unwrap();
    pub static ref REMAP_CONFLICTS: IntCounter = register_int_counter!(
        "catalog_remap_conflicts_total",
        "Identity collisions reported while applying remap rules"
    )
    .unwrap();
}
