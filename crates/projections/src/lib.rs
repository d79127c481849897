//! Read models and projections for the CQRS query side.
//!
//! This crate provides the query side of the trade store:
//! - [`Projection`] trait for folding events into read models
//! - [`ProjectionCursor`] for the per-stream acknowledged position
//! - [`ProjectionEngine`] — the background consumer loop (catch-up plus
//!   live subscription) with graceful shutdown
//! - [`TradeBlotterView`] — the denormalized trade table the UI queries

pub mod cursor;
pub mod engine;
pub mod error;
pub mod projection;
pub mod read_model;
pub mod views;

pub use cursor::{InMemoryCursorStore, ProjectionCursor};
pub use engine::ProjectionEngine;
pub use error::{ProjectionError, Result};
pub use projection::Projection;
pub use read_model::ReadModel;
pub use views::TradeBlotterView;
