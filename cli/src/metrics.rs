//! # Prometheus Metrics
//!
//! Operational counters for the `serve` subcommand, scraped at `/metrics`
//! on the metrics port. Everything lives in a dedicated registry under the
//! `vault` namespace.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use vault_client::VaultError;

/// Metric handles for one served session.
#[derive(Clone)]
pub struct VaultMetrics {
    registry: Registry,
    /// Transactions the gateway accepted.
    pub transactions_submitted_total: IntCounter,
    /// Withdrawals refused by the local precondition check.
    pub withdrawals_rejected_total: IntCounter,
    /// Reads, scans or submissions that failed at the gateway.
    pub gateway_failures_total: IntCounter,
    /// Successful history rebuilds.
    pub history_refreshes_total: IntCounter,
    /// Entries in the most recently loaded history.
    pub history_entries: IntGauge,
}

fn register<C: Collector + Clone + 'static>(registry: &Registry, metric: C) -> prometheus::Result<C> {
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

impl VaultMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("vault".into()), None)?;

        let transactions_submitted_total = register(
            &registry,
            IntCounter::new(
                "transactions_submitted_total",
                "Deposit and withdraw transactions accepted by the gateway",
            )?,
        )?;
        let withdrawals_rejected_total = register(
            &registry,
            IntCounter::new(
                "withdrawals_rejected_total",
                "Withdrawals refused locally before submission",
            )?,
        )?;
        let gateway_failures_total = register(
            &registry,
            IntCounter::new(
                "gateway_failures_total",
                "Submissions or history scans that failed at the gateway",
            )?,
        )?;
        let history_refreshes_total = register(
            &registry,
            IntCounter::new(
                "history_refreshes_total",
                "Successful history reconstructions",
            )?,
        )?;
        let history_entries = register(
            &registry,
            IntGauge::new("history_entries", "Entries in the current history")?,
        )?;

        Ok(Self {
            registry,
            transactions_submitted_total,
            withdrawals_rejected_total,
            gateway_failures_total,
            history_refreshes_total,
            history_entries,
        })
    }

    /// Bumps the counter matching `err`. Malformed input and missing
    /// accounts are not counted.
    pub fn record_failure(&self, err: &VaultError) {
        match err {
            VaultError::Rejected(_) => self.withdrawals_rejected_total.inc(),
            VaultError::GatewayFailure { .. } | VaultError::PartialHistoryFailure { .. } => {
                self.gateway_failures_total.inc()
            }
            VaultError::MalformedAmount(_) | VaultError::NotConnected => {}
        }
    }

    /// Records a successful history rebuild of `entries` rows.
    pub fn record_history(&self, entries: usize) {
        self.history_refreshes_total.inc();
        self.history_entries
            .set(i64::try_from(entries).unwrap_or(i64::MAX));
    }

    /// Encodes all registered metrics into the Prometheus text format.
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub type SharedMetrics = Arc<VaultMetrics>;

/// `GET /metrics` in Prometheus text format.
pub async fn metrics_handler(State(metrics): State<SharedMetrics>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
