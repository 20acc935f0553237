//! Prometheus metrics recorder and `/metrics` rendering.
//!
//! Counters and gauges are recorded with the `metrics` macros at the call
//! sites; the names live here.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Sessions accepted.
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Sessions ended.
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Sessions currently registered.
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Well-formed messages read from clients.
pub const MESSAGES_RECEIVED_TOTAL: &str = "relay_messages_received_total";
/// Payloads that failed to decode.
pub const MESSAGES_MALFORMED_TOTAL: &str = "relay_messages_malformed_total";
/// Messages fanned out by the broadcaster.
pub const BROADCASTS_TOTAL: &str = "relay_broadcasts_total";
/// Frames handed to connection writers.
pub const DELIVERIES_TOTAL: &str = "relay_deliveries_total";
/// Connections removed after a failed send.
pub const PRUNED_TOTAL: &str = "relay_pruned_total";

/// Install the Prometheus recorder as the global `metrics` recorder.
///
/// Call once at startup. Fails if another recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Handle to a recorder that is not installed globally. For tests.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Render Prometheus text format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}
