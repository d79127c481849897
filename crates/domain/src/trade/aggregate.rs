//! Swap trade aggregate implementation.

use chrono::{DateTime, NaiveDate, Utc};
use common::StreamId;
use event_store::Version;
use rust_decimal::Decimal;

use crate::aggregate::Aggregate;

use super::{
    SwapLeg, TradeAmendment, TradeBooking, TradeError, TradeEvent,
    events::{SwapTradeCreatedData, SwapTradeUpdatedData},
};

/// Swap trade aggregate root.
///
/// Reconstructed purely by folding its stream's events in order. Once a
/// `TradeCancelled` event has been applied the aggregate is terminal: every
/// further command is rejected. The fold itself stays permissive — an
/// events-after-cancel anomaly in the log replays without error so that
/// history is always reproducible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwapTrade {
    id: Option<StreamId>,
    version: Version,
    counterparty: String,
    effective_date: Option<NaiveDate>,
    maturity_date: Option<NaiveDate>,
    notional_amount: Decimal,
    notional_currency: String,
    trade_date: Option<NaiveDate>,
    booked_by: String,
    npv: Option<Decimal>,
    created_at: Option<DateTime<Utc>>,
    cancelled: bool,
    cancellation_reason: Option<String>,
    leg1: Option<SwapLeg>,
    leg2: Option<SwapLeg>,
}

impl Aggregate for SwapTrade {
    type Event = TradeEvent;
    type Error = TradeError;

    fn aggregate_type() -> &'static str {
        "SwapTrade"
    }

    fn id(&self) -> Option<&StreamId> {
        self.id.as_ref()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            TradeEvent::SwapTradeCreated(data) => self.apply_created(data),
            TradeEvent::SwapTradeUpdated(data) => self.apply_updated(data),
            TradeEvent::TradePriced(data) => {
                self.npv = Some(data.npv);
            }
            TradeEvent::TradeCancelled(data) => {
                self.cancelled = true;
                self.cancellation_reason = Some(data.reason);
            }
        }
    }
}

// Query methods
impl SwapTrade {
    pub fn counterparty(&self) -> &str {
        &self.counterparty
    }

    pub fn effective_date(&self) -> Option<NaiveDate> {
        self.effective_date
    }

    pub fn maturity_date(&self) -> Option<NaiveDate> {
        self.maturity_date
    }

    pub fn notional_amount(&self) -> Decimal {
        self.notional_amount
    }

    pub fn notional_currency(&self) -> &str {
        &self.notional_currency
    }

    pub fn trade_date(&self) -> Option<NaiveDate> {
        self.trade_date
    }

    pub fn booked_by(&self) -> &str {
        &self.booked_by
    }

    /// Most recent NPV; None until the trade has been priced.
    pub fn npv(&self) -> Option<Decimal> {
        self.npv
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn leg1(&self) -> Option<&SwapLeg> {
        self.leg1.as_ref()
    }

    pub fn leg2(&self) -> Option<&SwapLeg> {
        self.leg2.as_ref()
    }
}

// Command methods (return events)
impl SwapTrade {
    /// Books a new trade under the given identity.
    pub fn book(
        &self,
        trade_id: StreamId,
        booking: &TradeBooking,
        booked_by: &str,
    ) -> Result<Vec<TradeEvent>, TradeError> {
        if self.id.is_some() {
            return Err(TradeError::AlreadyBooked);
        }
        booking.validate()?;

        Ok(vec![TradeEvent::created(trade_id, booking, booked_by)])
    }

    /// Amends the trade's terms. Present fields replace, absent fields stay.
    pub fn amend(
        &self,
        amendment: &TradeAmendment,
        actor: &str,
    ) -> Result<Vec<TradeEvent>, TradeError> {
        let id = self.guard_mutable()?;
        amendment.validate()?;

        // Date ordering holds on the merged view of current and new terms.
        let effective = amendment.effective_date.or(self.effective_date);
        let maturity = amendment.maturity_date.or(self.maturity_date);
        if let (Some(effective), Some(maturity)) = (effective, maturity)
            && maturity <= effective
        {
            return Err(TradeError::InvalidDateOrder {
                effective,
                maturity,
            });
        }

        Ok(vec![TradeEvent::updated(id.clone(), amendment, actor)])
    }

    /// Records a pricing result.
    pub fn reprice(&self, npv: Decimal, actor: &str) -> Result<Vec<TradeEvent>, TradeError> {
        let id = self.guard_mutable()?;
        Ok(vec![TradeEvent::priced(id.clone(), npv, actor)])
    }

    /// Cancels the trade. Terminal: nothing mutates a cancelled trade.
    pub fn cancel(&self, reason: &str, actor: &str) -> Result<Vec<TradeEvent>, TradeError> {
        let id = self.guard_mutable()?;
        if reason.trim().is_empty() {
            return Err(TradeError::ReasonRequired);
        }
        Ok(vec![TradeEvent::cancelled(id.clone(), reason, actor)])
    }

    fn guard_mutable(&self) -> Result<&StreamId, TradeError> {
        let Some(id) = &self.id else {
            return Err(TradeError::NotBooked);
        };
        if self.cancelled {
            return Err(TradeError::Cancelled);
        }
        Ok(id)
    }
}

// Apply event helpers
impl SwapTrade {
    fn apply_created(&mut self, data: SwapTradeCreatedData) {
        self.id = Some(data.trade_id);
        self.counterparty = data.counterparty;
        self.effective_date = Some(data.effective_date);
        self.maturity_date = Some(data.maturity_date);
        self.notional_amount = data.notional_amount;
        self.notional_currency = data.notional_currency;
        self.trade_date = Some(data.trade_date);
        self.booked_by = data.booked_by;
        self.created_at = Some(data.timestamp);
        self.leg1 = Some(data.leg1);
        self.leg2 = Some(data.leg2);
        self.cancelled = false;
    }

    fn apply_updated(&mut self, data: SwapTradeUpdatedData) {
        if let Some(counterparty) = data.counterparty {
            self.counterparty = counterparty;
        }
        if let Some(effective_date) = data.effective_date {
            self.effective_date = Some(effective_date);
        }
        if let Some(maturity_date) = data.maturity_date {
            self.maturity_date = Some(maturity_date);
        }
        if let Some(notional_amount) = data.notional_amount {
            self.notional_amount = notional_amount;
        }
        if let Some(leg1) = data.leg1 {
            self.leg1 = Some(leg1);
        }
        if let Some(leg2) = data.leg2 {
            self.leg2 = Some(leg2);
        }
    }
}
