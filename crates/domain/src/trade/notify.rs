//! Outbound notification contract.
//!
//! The notification relay is an external collaborator: after a successful
//! create or update the trade store hands it a summary fact, fire-and-forget.
//! A delivery failure must never fail or roll back the command that
//! triggered it — the store logs and moves on.

use async_trait::async_trait;
use common::StreamId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// What happened to the trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeChangeKind {
    Created,
    Updated,
}

/// Summary fact published after a successful create or update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeChanged {
    pub trade_id: StreamId,
    pub kind: TradeChangeKind,
    pub counterparty: String,
    pub booked_by: String,
    pub notional_amount: Decimal,
    pub notional_currency: String,
    pub npv: Option<Decimal>,
}

/// Delivery failure at the relay boundary.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Fans "trade changed" facts out to live subscribers.
#[async_trait]
pub trait TradeNotifier: Send + Sync {
    async fn publish(&self, change: TradeChanged) -> Result<(), NotifyError>;
}

/// Notifier that drops every fact. Default for tests and headless runs.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

#[async_trait]
impl TradeNotifier for NoopNotifier {
    async fn publish(&self, _change: TradeChanged) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// In-process relay over a broadcast channel.
///
/// Subscribers (e.g. a push gateway in the API layer) receive every fact
/// published while they are attached; having no subscribers is not a
/// delivery failure.
#[derive(Debug, Clone)]
pub struct BroadcastRelay {
    tx: broadcast::Sender<TradeChanged>,
}

impl BroadcastRelay {
    /// Creates a relay with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Attaches a live subscriber.
    pub fn subscribe(&self) -> broadcast::Receiver<TradeChanged> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastRelay {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl TradeNotifier for BroadcastRelay {
    async fn publish(&self, change: TradeChanged) -> Result<(), NotifyError> {
        // send only errors when there are no receivers, which is fine.
        let _ = self.tx.send(change);
        Ok(())
    }
}
