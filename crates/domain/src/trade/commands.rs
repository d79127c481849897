//! Trade commands and their payloads.

use chrono::NaiveDate;
use common::StreamId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::command::Command;

use super::{SwapLeg, SwapTrade, TradeError};

/// Payload of a booking (create) command: every term of a new swap trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeBooking {
    pub counterparty: String,
    pub trade_date: NaiveDate,
    pub effective_date: NaiveDate,
    pub maturity_date: NaiveDate,
    pub notional_amount: Decimal,
    pub notional_currency: String,
    pub leg1: SwapLeg,
    pub leg2: SwapLeg,
}

impl TradeBooking {
    /// Validates the booking payload. Rejection happens before any event
    /// is appended; there are no partial writes.
    pub fn validate(&self) -> Result<(), TradeError> {
        if self.counterparty.trim().is_empty() {
            return Err(TradeError::CounterpartyRequired);
        }
        if self.notional_currency.trim().is_empty() {
            return Err(TradeError::CurrencyRequired);
        }
        if self.notional_amount <= Decimal::ZERO {
            return Err(TradeError::NonPositiveNotional(self.notional_amount));
        }
        if self.maturity_date <= self.effective_date {
            return Err(TradeError::InvalidDateOrder {
                effective: self.effective_date,
                maturity: self.maturity_date,
            });
        }
        self.leg1.validate()?;
        self.leg2.validate()?;
        Ok(())
    }
}

/// Payload of an update command.
///
/// Each field is an explicit presence indicator: present means replace,
/// absent means leave unchanged. Legs are replaced wholesale, never patched
/// term by term.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeAmendment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maturity_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notional_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leg1: Option<SwapLeg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leg2: Option<SwapLeg>,
}

impl TradeAmendment {
    /// Validates the fields that are present.
    ///
    /// Date ordering is checked against the merged view of the trade, so it
    /// lives in the aggregate's command method where current state is known.
    pub fn validate(&self) -> Result<(), TradeError> {
        if let Some(ref counterparty) = self.counterparty
            && counterparty.trim().is_empty()
        {
            return Err(TradeError::CounterpartyRequired);
        }
        if let Some(notional) = self.notional_amount
            && notional <= Decimal::ZERO
        {
            return Err(TradeError::NonPositiveNotional(notional));
        }
        if let Some(ref leg) = self.leg1 {
            leg.validate()?;
        }
        if let Some(ref leg) = self.leg2 {
            leg.validate()?;
        }
        Ok(())
    }

    /// Returns true if no field is present.
    pub fn is_empty(&self) -> bool {
        self.counterparty.is_none()
            && self.effective_date.is_none()
            && self.maturity_date.is_none()
            && self.notional_amount.is_none()
            && self.leg1.is_none()
            && self.leg2.is_none()
    }
}

/// Command to book a new trade.
#[derive(Debug, Clone)]
pub struct BookTrade {
    /// The identity the new stream will be created under.
    pub trade_id: StreamId,

    /// The booking payload.
    pub booking: TradeBooking,

    /// The owner booking the trade.
    pub booked_by: String,
}

impl BookTrade {
    /// Creates a booking command with a freshly generated trade identity.
    pub fn new(booking: TradeBooking, booked_by: impl Into<String>) -> Self {
        Self {
            trade_id: StreamId::generate("trade"),
            booking,
            booked_by: booked_by.into(),
        }
    }
}

impl Command for BookTrade {
    type Aggregate = SwapTrade;

    fn stream_id(&self) -> &StreamId {
        &self.trade_id
    }
}

/// Command to amend an existing trade.
#[derive(Debug, Clone)]
pub struct AmendTrade {
    pub trade_id: StreamId,
    pub amendment: TradeAmendment,
    pub actor: String,
}

impl AmendTrade {
    /// Creates a new AmendTrade command.
    pub fn new(trade_id: StreamId, amendment: TradeAmendment, actor: impl Into<String>) -> Self {
        Self {
            trade_id,
            amendment,
            actor: actor.into(),
        }
    }
}

impl Command for AmendTrade {
    type Aggregate = SwapTrade;

    fn stream_id(&self) -> &StreamId {
        &self.trade_id
    }
}

/// Command to record a pricing result on a trade.
#[derive(Debug, Clone)]
pub struct PriceTrade {
    pub trade_id: StreamId,
    pub npv: Decimal,
}

impl PriceTrade {
    /// Creates a new PriceTrade command.
    pub fn new(trade_id: StreamId, npv: Decimal) -> Self {
        Self { trade_id, npv }
    }
}

impl Command for PriceTrade {
    type Aggregate = SwapTrade;

    fn stream_id(&self) -> &StreamId {
        &self.trade_id
    }
}

/// Command to cancel a trade.
#[derive(Debug, Clone)]
pub struct CancelTrade {
    pub trade_id: StreamId,
    pub reason: String,
}

impl CancelTrade {
    /// Creates a new CancelTrade command.
    pub fn new(trade_id: StreamId, reason: impl Into<String>) -> Self {
        Self {
            trade_id,
            reason: reason.into(),
        }
    }
}

impl Command for CancelTrade {
    type Aggregate = SwapTrade;

    fn stream_id(&self) -> &StreamId {
        &self.trade_id
    }
}
