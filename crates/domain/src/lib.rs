//! Domain layer for the event-sourced trade store.
//!
//! This crate provides the core domain abstractions including:
//! - Aggregate trait for event-sourced entities
//! - DomainEvent trait for domain events
//! - Command trait and CommandHandler for command processing
//! - SwapTrade aggregate with its full event lifecycle
//! - The TradeStore facade turning commands into events

pub mod aggregate;
pub mod command;
pub mod error;
pub mod trade;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
pub use trade::{
    AmendTrade, BookTrade, BroadcastRelay, CancelTrade, LegType, NoopNotifier, NotifyError,
    PayerReceiver, PriceTrade, SwapLeg, SwapTrade, TradeAmendment, TradeBooking, TradeChangeKind,
    TradeChanged, TradeError, TradeEvent, TradeLookup, TradeNotifier, TradeRow, TradeStore,
    seeded_npv,
};
