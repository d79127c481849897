//! Swap trade domain events.

use chrono::{DateTime, NaiveDate, Utc};
use common::StreamId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{SwapLeg, TradeAmendment, TradeBooking};

/// Events that can occur on a swap trade stream.
///
/// Every payload carries the stream identity, the event timestamp and the
/// actor that caused it; ordering within the stream is the sole source of
/// truth for state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TradeEvent {
    /// Trade was booked.
    SwapTradeCreated(SwapTradeCreatedData),

    /// One or more trade terms were amended.
    SwapTradeUpdated(SwapTradeUpdatedData),

    /// Trade was priced; NPV replaced.
    TradePriced(TradePricedData),

    /// Trade was cancelled (terminal).
    TradeCancelled(TradeCancelledData),
}

impl DomainEvent for TradeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TradeEvent::SwapTradeCreated(_) => "SwapTradeCreated",
            TradeEvent::SwapTradeUpdated(_) => "SwapTradeUpdated",
            TradeEvent::TradePriced(_) => "TradePriced",
            TradeEvent::TradeCancelled(_) => "TradeCancelled",
        }
    }
}

/// Data for the SwapTradeCreated event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapTradeCreatedData {
    /// The trade identity (stream key).
    pub trade_id: StreamId,

    pub counterparty: String,
    pub effective_date: NaiveDate,
    pub maturity_date: NaiveDate,
    pub notional_amount: Decimal,
    pub notional_currency: String,
    pub trade_date: NaiveDate,

    /// The owner the trade is booked under.
    pub booked_by: String,

    /// Leg details, full replacements of whatever was proposed.
    pub leg1: SwapLeg,
    pub leg2: SwapLeg,

    /// When the event happened.
    pub timestamp: DateTime<Utc>,

    /// Who caused the event.
    pub actor: String,
}

/// Data for the SwapTradeUpdated event.
///
/// Partial update: a field that is present replaces the aggregate's value,
/// an absent field leaves it unchanged. Legs are replaced wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapTradeUpdatedData {
    pub trade_id: StreamId,

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

    pub timestamp: DateTime<Utc>,
    pub actor: String,
}

/// Data for the TradePriced event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePricedData {
    pub trade_id: StreamId,

    /// Net present value produced by the pricing run.
    pub npv: Decimal,

    /// When the pricing was performed.
    pub pricing_date: DateTime<Utc>,

    pub timestamp: DateTime<Utc>,
    pub actor: String,
}

/// Data for the TradeCancelled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeCancelledData {
    pub trade_id: StreamId,

    /// Reason for the cancellation.
    pub reason: String,

    pub timestamp: DateTime<Utc>,
    pub actor: String,
}

// Convenience constructors for events
impl TradeEvent {
    /// Creates a SwapTradeCreated event from a validated booking.
    pub fn created(trade_id: StreamId, booking: &TradeBooking, booked_by: &str) -> Self {
        TradeEvent::SwapTradeCreated(SwapTradeCreatedData {
            trade_id,
            counterparty: booking.counterparty.clone(),
            effective_date: booking.effective_date,
            maturity_date: booking.maturity_date,
            notional_amount: booking.notional_amount,
            notional_currency: booking.notional_currency.clone(),
            trade_date: booking.trade_date,
            booked_by: booked_by.to_string(),
            leg1: booking.leg1.clone(),
            leg2: booking.leg2.clone(),
            timestamp: Utc::now(),
            actor: booked_by.to_string(),
        })
    }

    /// Creates a SwapTradeUpdated event from an amendment.
    pub fn updated(trade_id: StreamId, amendment: &TradeAmendment, actor: &str) -> Self {
        TradeEvent::SwapTradeUpdated(SwapTradeUpdatedData {
            trade_id,
            counterparty: amendment.counterparty.clone(),
            effective_date: amendment.effective_date,
            maturity_date: amendment.maturity_date,
            notional_amount: amendment.notional_amount,
            leg1: amendment.leg1.clone(),
            leg2: amendment.leg2.clone(),
            timestamp: Utc::now(),
            actor: actor.to_string(),
        })
    }

    /// Creates a TradePriced event.
    pub fn priced(trade_id: StreamId, npv: Decimal, actor: &str) -> Self {
        let now = Utc::now();
        TradeEvent::TradePriced(TradePricedData {
            trade_id,
            npv,
            pricing_date: now,
            timestamp: now,
            actor: actor.to_string(),
        })
    }

    /// Creates a TradeCancelled event.
    pub fn cancelled(trade_id: StreamId, reason: impl Into<String>, actor: &str) -> Self {
        TradeEvent::TradeCancelled(TradeCancelledData {
            trade_id,
            reason: reason.into(),
            timestamp: Utc::now(),
            actor: actor.to_string(),
        })
    }

    /// Returns the trade identity the event belongs to.
    pub fn trade_id(&self) -> &StreamId {
        match self {
            TradeEvent::SwapTradeCreated(d) => &d.trade_id,
            TradeEvent::SwapTradeUpdated(d) => &d.trade_id,
            TradeEvent::TradePriced(d) => &d.trade_id,
            TradeEvent::TradeCancelled(d) => &d.trade_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::{PayerReceiver, SwapLeg};
    use rust_decimal_macros::dec;

    fn booking() -> TradeBooking {
        TradeBooking {
            counterparty: "BankA".to_string(),
            trade_date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            effective_date: NaiveDate::from_ymd_opt(2025, 6, 4).unwrap(),
            maturity_date: NaiveDate::from_ymd_opt(2030, 6, 4).unwrap(),
            notional_amount: dec!(1_000_000),
            notional_currency: "USD".to_string(),
            leg1: SwapLeg::fixed(PayerReceiver::Pay, dec!(0.025), "SEMI_ANNUAL", "30/360"),
            leg2: SwapLeg::floating(
                PayerReceiver::Receive,
                "SOFR",
                dec!(0.001),
                "QUARTERLY",
                "ACT/360",
            ),
        }
    }

    #[test]
    fn test_event_type() {
        let trade_id = StreamId::generate("trade");

        let event = TradeEvent::created(trade_id.clone(), &booking(), "alice");
        assert_eq!(event.event_type(), "SwapTradeCreated");

        let event = TradeEvent::updated(trade_id.clone(), &TradeAmendment::default(), "alice");
        assert_eq!(event.event_type(), "SwapTradeUpdated");

        let event = TradeEvent::priced(trade_id.clone(), dec!(12345.67), "system");
        assert_eq!(event.event_type(), "TradePriced");

        let event = TradeEvent::cancelled(trade_id, "booking error", "alice");
        assert_eq!(event.event_type(), "TradeCancelled");
    }

    #[test]
    fn test_created_event_serialization() {
        let trade_id = StreamId::generate("trade");
        let event = TradeEvent::created(trade_id.clone(), &booking(), "alice");

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("SwapTradeCreated"));

        let deserialized: TradeEvent = serde_json::from_str(&json).unwrap();
        if let TradeEvent::SwapTradeCreated(data) = deserialized {
            assert_eq!(data.trade_id, trade_id);
            assert_eq!(data.counterparty, "BankA");
            assert_eq!(data.booked_by, "alice");
            assert_eq!(data.notional_amount, dec!(1_000_000));
        } else {
            panic!("Expected SwapTradeCreated event");
        }
    }

    #[test]
    fn test_updated_event_omits_absent_fields() {
        let trade_id = StreamId::generate("trade");
        let amendment = TradeAmendment {
            counterparty: Some("NewCo".to_string()),
            ..Default::default()
        };

        let event = TradeEvent::updated(trade_id, &amendment, "alice");
        let json = serde_json::to_value(&event).unwrap();
        let data = &json["data"];

        assert_eq!(data["counterparty"], "NewCo");
        assert!(data.get("effective_date").is_none());
        assert!(data.get("notional_amount").is_none());
        assert!(data.get("leg1").is_none());
    }

    #[test]
    fn test_cancelled_event_serialization() {
        let trade_id = StreamId::generate("trade");
        let event = TradeEvent::cancelled(trade_id, "booking error", "alice");

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: TradeEvent = serde_json::from_str(&json).unwrap();

        if let TradeEvent::TradeCancelled(data) = deserialized {
            assert_eq!(data.reason, "booking error");
            assert_eq!(data.actor, "alice");
        } else {
            panic!("Expected TradeCancelled event");
        }
    }
}
