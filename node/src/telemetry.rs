// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::sync::OnceLock;

pub const REPORTS_INGESTED: &str = "busline_reports_ingested_total";
pub const REPORTS_REJECTED: &str = "busline_reports_rejected_total";
pub const NOTIFICATIONS_DROPPED: &str = "busline_notifications_dropped_total";
pub const STREAM_SUBSCRIBERS: &str = "busline_stream_subscribers";
pub const DEVICES_TRACKED: &str = "busline_devices_tracked";
pub const REPLAY_DURATION: &str = "busline_replay_duration_seconds";

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "busline_node=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROM_HANDLE.set(handle).is_err() {
                tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
            }
        }
        Err(e) => tracing::warn!("metrics disabled, recorder install failed: {}", e),
    }

    metrics::describe_counter!(REPORTS_INGESTED, "Location reports accepted and stored");
    metrics::describe_counter!(REPORTS_REJECTED, "Location reports refused by validation");
    metrics::describe_counter!(NOTIFICATIONS_DROPPED, "Notifications discarded from full subscriber queues");
    metrics::describe_gauge!(STREAM_SUBSCRIBERS, "Live stream subscribers");
    metrics::describe_gauge!(DEVICES_TRACKED, "Devices with at least one stored report");
    metrics::describe_histogram!(REPLAY_DURATION, "Time taken to replay the record log at startup");

    metrics::gauge!("busline_node_up", 1.0);
}

/// Get the Prometheus handle to render metrics
pub fn get_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
