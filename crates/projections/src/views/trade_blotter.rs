//! Trade blotter read model — one row per trade, queryable by id and owner.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::StreamId;
use domain::{Aggregate, SwapTrade, TradeEvent, TradeLookup, TradeRow};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::error::ProjectionError;
use crate::projection::Projection;
use crate::read_model::ReadModel;

/// Internal state for the blotter.
struct BlotterState {
    rows: HashMap<StreamId, TradeRow>,
    /// Insertion order per trade, used to break trade-date ties newest-first.
    arrival: HashMap<StreamId, u64>,
    next_arrival: u64,
}

/// Denormalized trade table maintained exclusively by the projection engine.
///
/// `SwapTradeCreated` inserts a row keyed by trade id, so a duplicate
/// delivery overwrites with identical data instead of producing a second
/// row. The other event kinds patch the matching fields and bump
/// `updated_at`; each row's version watermark turns redelivery into a no-op.
#[derive(Clone)]
pub struct TradeBlotterView {
    state: Arc<RwLock<BlotterState>>,
}

impl TradeBlotterView {
    /// Creates a new empty blotter.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(BlotterState {
                rows: HashMap::new(),
                arrival: HashMap::new(),
                next_arrival: 0,
            })),
        }
    }

    /// Returns the row for a trade id, cancelled or not.
    pub async fn get(&self, trade_id: &StreamId) -> Option<TradeRow> {
        self.state.read().await.rows.get(trade_id).cloned()
    }

    /// Returns every row in the blotter.
    pub async fn all(&self) -> Vec<TradeRow> {
        self.state.read().await.rows.values().cloned().collect()
    }

    /// Non-cancelled trades for an owner, trade date descending; trades
    /// sharing a trade date come back newest-booked first.
    pub async fn for_owner(&self, booked_by: &str) -> Vec<TradeRow> {
        let state = self.state.read().await;
        let mut rows: Vec<(u64, TradeRow)> = state
            .rows
            .values()
            .filter(|row| !row.is_cancelled && row.booked_by == booked_by)
            .map(|row| {
                let seq = state.arrival.get(&row.id).copied().unwrap_or(0);
                (seq, row.clone())
            })
            .collect();
        rows.sort_by(|(seq_a, a), (seq_b, b)| {
            b.trade_date
                .cmp(&a.trade_date)
                .then_with(|| seq_b.cmp(seq_a))
        });
        rows.into_iter().map(|(_, row)| row).collect()
    }
}

impl Default for TradeBlotterView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for TradeBlotterView {
    fn name(&self) -> &'static str {
        "TradeBlotterView"
    }

    async fn apply(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != SwapTrade::aggregate_type() {
            return Ok(());
        }

        let trade_event: TradeEvent = serde_json::from_value(event.payload.clone())?;

        let mut state = self.state.write().await;

        // Idempotency watermark: anything already reflected is a no-op.
        if let Some(row) = state.rows.get(&event.stream_id)
            && event.version <= row.version
        {
            return Ok(());
        }

        match trade_event {
            TradeEvent::SwapTradeCreated(data) => {
                let row = TradeRow::from_created(&data, event.version);
                if !state.arrival.contains_key(&event.stream_id) {
                    let seq = state.next_arrival;
                    state.arrival.insert(event.stream_id.clone(), seq);
                    state.next_arrival += 1;
                }
                state.rows.insert(event.stream_id.clone(), row);
            }
            TradeEvent::SwapTradeUpdated(data) => {
                let row = Self::row_mut(&mut state, &event.stream_id)?;
                row.apply_updated(&data, event.version);
            }
            TradeEvent::TradePriced(data) => {
                let row = Self::row_mut(&mut state, &event.stream_id)?;
                row.apply_priced(&data, event.version);
            }
            TradeEvent::TradeCancelled(data) => {
                let row = Self::row_mut(&mut state, &event.stream_id)?;
                row.apply_cancelled(&data, event.version);
            }
        }

        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.rows.clear();
        state.arrival.clear();
        state.next_arrival = 0;
        Ok(())
    }
}

impl TradeBlotterView {
    fn row_mut<'a>(
        state: &'a mut BlotterState,
        trade_id: &StreamId,
    ) -> Result<&'a mut TradeRow> {
        state.rows.get_mut(trade_id).ok_or_else(|| {
            // In-order delivery means the creation event comes first; a miss
            // is an anomaly worth redelivering.
            ProjectionError::Apply(format!("no blotter row for {trade_id}"))
        })
    }
}

#[async_trait]
impl TradeLookup for TradeBlotterView {
    async fn trade(&self, id: &StreamId) -> Option<TradeRow> {
        self.get(id).await
    }

    async fn trades_for_owner(&self, booked_by: &str) -> Vec<TradeRow> {
        self.for_owner(booked_by).await
    }
}

impl ReadModel for TradeBlotterView {
    fn name(&self) -> &'static str {
        "TradeBlotterView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.rows.len()).unwrap_or(0)
    }
}
