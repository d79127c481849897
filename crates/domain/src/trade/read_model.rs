//! Denormalized trade row and the query-side lookup contract.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::StreamId;
use event_store::Version;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{
    SwapLeg,
    events::{SwapTradeCreatedData, SwapTradeUpdatedData, TradeCancelledData, TradePricedData},
};

/// The queryable projection of one trade: one row per trade id, overwritten
/// in place as projection events arrive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRow {
    pub id: StreamId,
    pub counterparty: String,
    pub effective_date: NaiveDate,
    pub maturity_date: NaiveDate,
    pub notional_amount: Decimal,
    pub notional_currency: String,
    pub trade_date: NaiveDate,
    pub booked_by: String,
    pub npv: Option<Decimal>,
    pub is_cancelled: bool,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub leg1: SwapLeg,
    pub leg2: SwapLeg,

    /// Highest stream version reflected in this row. Re-delivery of an
    /// event at or below this watermark is a no-op.
    pub version: Version,
}

impl TradeRow {
    /// Builds a row from a creation event. Used both by the projection and
    /// by the write path when it synthesizes an immediate create response.
    pub fn from_created(data: &SwapTradeCreatedData, version: Version) -> Self {
        Self {
            id: data.trade_id.clone(),
            counterparty: data.counterparty.clone(),
            effective_date: data.effective_date,
            maturity_date: data.maturity_date,
            notional_amount: data.notional_amount,
            notional_currency: data.notional_currency.clone(),
            trade_date: data.trade_date,
            booked_by: data.booked_by.clone(),
            npv: None,
            is_cancelled: false,
            cancellation_reason: None,
            created_at: data.timestamp,
            updated_at: None,
            leg1: data.leg1.clone(),
            leg2: data.leg2.clone(),
            version,
        }
    }

    /// Patches the fields present in an update event.
    pub fn apply_updated(&mut self, data: &SwapTradeUpdatedData, version: Version) {
        if let Some(ref counterparty) = data.counterparty {
            self.counterparty = counterparty.clone();
        }
        if let Some(effective_date) = data.effective_date {
            self.effective_date = effective_date;
        }
        if let Some(maturity_date) = data.maturity_date {
            self.maturity_date = maturity_date;
        }
        if let Some(notional_amount) = data.notional_amount {
            self.notional_amount = notional_amount;
        }
        if let Some(ref leg1) = data.leg1 {
            self.leg1 = leg1.clone();
        }
        if let Some(ref leg2) = data.leg2 {
            self.leg2 = leg2.clone();
        }
        self.updated_at = Some(data.timestamp);
        self.version = version;
    }

    /// Replaces the NPV.
    pub fn apply_priced(&mut self, data: &TradePricedData, version: Version) {
        self.npv = Some(data.npv);
        self.updated_at = Some(data.timestamp);
        self.version = version;
    }

    /// Marks the row cancelled (soft delete).
    pub fn apply_cancelled(&mut self, data: &TradeCancelledData, version: Version) {
        self.is_cancelled = true;
        self.cancellation_reason = Some(data.reason.clone());
        self.updated_at = Some(data.timestamp);
        self.version = version;
    }
}

/// Query access to the trade read model.
///
/// Implemented by the projection-side view; the trade store routes every
/// read (other than the synthesized create response) through this contract.
#[async_trait]
pub trait TradeLookup: Send + Sync {
    /// Point lookup by trade id. Returns the row regardless of cancellation
    /// state; soft-delete filtering is the caller's policy.
    async fn trade(&self, id: &StreamId) -> Option<TradeRow>;

    /// All non-cancelled trades for an owner, ordered by trade date
    /// descending with ties broken newest-first.
    async fn trades_for_owner(&self, booked_by: &str) -> Vec<TradeRow>;
}
