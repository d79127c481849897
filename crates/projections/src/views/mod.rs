//! Read model views for the CQRS query side.

pub mod trade_blotter;

pub use trade_blotter::TradeBlotterView;
