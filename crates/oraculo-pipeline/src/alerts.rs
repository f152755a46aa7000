//! Delivery of price-drop alerts to whatever notifies the user.

use oraculo_core::{AlertSeverity, DealAlert};
use tokio::sync::mpsc::UnboundedSender;

/// Receives deal alerts as the pipeline writes offers.
///
/// Implementations must not block; formatting and delivery belong to the
/// consumer on the other side.
pub trait AlertSink: Send + Sync {
    fn emit(&self, alert: DealAlert);
}

/// Writes every alert as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn emit(&self, alert: DealAlert) {
        match alert.severity {
            AlertSeverity::Anomaly => tracing::warn!(
                product = %alert.product_name,
                shop = %alert.shop_name,
                url = %alert.url,
                price = %alert.price,
                max_price = %alert.max_price,
                discount = %alert.discount,
                "price anomaly detected"
            ),
            AlertSeverity::Deal => tracing::info!(
                product = %alert.product_name,
                shop = %alert.shop_name,
                url = %alert.url,
                price = %alert.price,
                max_price = %alert.max_price,
                discount = %alert.discount,
                "deal detected"
            ),
        }
    }
}

/// Forwards alerts to an external notifier task.
#[derive(Debug, Clone)]
pub struct ChannelAlertSink {
    tx: UnboundedSender<DealAlert>,
}

impl ChannelAlertSink {
    #[must_use]
    pub fn new(tx: UnboundedSender<DealAlert>) -> Self {
        Self { tx }
    }
}

impl AlertSink for ChannelAlertSink {
    fn emit(&self, alert: DealAlert) {
        if let Err(err) = self.tx.send(alert) {
            tracing::warn!(url = %err.0.url, "alert receiver dropped; discarding alert");
        }
    }
}
