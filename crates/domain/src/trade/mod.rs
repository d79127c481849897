//! Swap trade aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod notify;
mod pricing;
mod read_model;
mod store;
mod value_objects;

pub use aggregate::SwapTrade;
pub use commands::{AmendTrade, BookTrade, CancelTrade, PriceTrade, TradeAmendment, TradeBooking};
pub use events::{
    SwapTradeCreatedData, SwapTradeUpdatedData, TradeCancelledData, TradeEvent, TradePricedData,
};
pub use notify::{BroadcastRelay, NoopNotifier, NotifyError, TradeChangeKind, TradeChanged, TradeNotifier};
pub use pricing::seeded_npv;
pub use read_model::{TradeLookup, TradeRow};
pub use store::TradeStore;
pub use value_objects::{LegType, PayerReceiver, SwapLeg};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur during trade operations.
#[derive(Debug, Error)]
pub enum TradeError {
    /// Counterparty is required.
    #[error("Counterparty is required")]
    CounterpartyRequired,

    /// Notional currency is required.
    #[error("Notional currency is required")]
    CurrencyRequired,

    /// Notional amount must be positive.
    #[error("Notional amount must be positive, got {0}")]
    NonPositiveNotional(Decimal),

    /// Maturity must fall strictly after the effective date.
    #[error("Maturity date {maturity} must be after effective date {effective}")]
    InvalidDateOrder {
        effective: NaiveDate,
        maturity: NaiveDate,
    },

    /// A fixed leg is missing its fixed rate.
    #[error("Fixed leg requires a fixed rate")]
    MissingFixedRate,

    /// A floating leg is missing its reference rate.
    #[error("Floating leg requires a reference rate")]
    MissingReferenceRate,

    /// A cancellation needs a reason.
    #[error("Cancellation reason is required")]
    ReasonRequired,

    /// The trade was already booked under this identity.
    #[error("Trade already booked")]
    AlreadyBooked,

    /// The trade does not exist.
    #[error("Trade not booked")]
    NotBooked,

    /// The trade was cancelled; no further mutation is accepted.
    #[error("Trade is cancelled")]
    Cancelled,
}

impl TradeError {
    /// Returns true if the error means the target trade is absent or
    /// already cancelled — the commands that hit this report `false`
    /// instead of failing.
    pub fn is_gone(&self) -> bool {
        matches!(self, TradeError::NotBooked | TradeError::Cancelled)
    }
}
