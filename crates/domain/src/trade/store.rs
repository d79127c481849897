//! Trade store: the single place where commands turn into events.

use std::sync::Arc;

use common::StreamId;
use event_store::EventStore;
use rust_decimal::Decimal;

use crate::aggregate::Aggregate;
use crate::command::CommandHandler;
use crate::error::DomainError;

use super::{
    AmendTrade, BookTrade, CancelTrade, PriceTrade, SwapTrade, TradeChangeKind, TradeChanged,
    TradeError, TradeEvent, TradeLookup, TradeNotifier, TradeRow, seeded_npv,
};

/// Command and query facade over one trade per event stream.
///
/// Writes go through the command handler (full-replay load, validation,
/// append with expected version). Reads go through the read-model lookup,
/// which lags the write path by the projection's catch-up latency — except
/// the create response, which is synthesized from the command inputs.
pub struct TradeStore<S: EventStore> {
    handler: CommandHandler<S, SwapTrade>,
    lookup: Arc<dyn TradeLookup>,
    notifier: Arc<dyn TradeNotifier>,
}

impl<S: EventStore> TradeStore<S> {
    /// Creates a trade store over the given event store, read model and
    /// notification relay.
    pub fn new(store: S, lookup: Arc<dyn TradeLookup>, notifier: Arc<dyn TradeNotifier>) -> Self {
        Self {
            handler: CommandHandler::new(store),
            lookup,
            notifier,
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, SwapTrade> {
        &self.handler
    }

    /// Books a new trade and returns its read-model row.
    ///
    /// The returned row is synthesized from the command inputs plus the
    /// newly minted identity and timestamp; it does not wait for the
    /// projection engine to catch up.
    #[tracing::instrument(skip(self, cmd), fields(trade_id = %cmd.trade_id))]
    pub async fn create(&self, cmd: BookTrade) -> Result<TradeRow, DomainError> {
        let trade_id = cmd.trade_id.clone();
        let booking = cmd.booking;
        let booked_by = cmd.booked_by;

        let result = self
            .handler
            .execute(&cmd.trade_id, |trade| {
                trade.book(trade_id, &booking, &booked_by)
            })
            .await?;

        let Some(TradeEvent::SwapTradeCreated(created)) = result.events.first() else {
            // book() emits exactly one creation event
            return Err(DomainError::Trade(TradeError::AlreadyBooked));
        };
        let row = TradeRow::from_created(created, result.new_version);

        metrics::counter!("trades_booked_total").increment(1);
        self.notify(TradeChangeKind::Created, &result.aggregate).await;

        Ok(row)
    }

    /// Amends a trade's terms.
    ///
    /// Returns `false` (a no-op, not an error) when the trade is absent or
    /// already cancelled. A concurrency conflict propagates as an error and
    /// the caller is expected to re-read and retry.
    #[tracing::instrument(skip(self, cmd), fields(trade_id = %cmd.trade_id))]
    pub async fn update(&self, cmd: AmendTrade) -> Result<bool, DomainError> {
        let amendment = cmd.amendment;
        let actor = cmd.actor;

        match self
            .handler
            .execute(&cmd.trade_id, |trade| trade.amend(&amendment, &actor))
            .await
        {
            Ok(result) => {
                self.notify(TradeChangeKind::Updated, &result.aggregate).await;
                Ok(true)
            }
            Err(e) => Self::absorb_gone(e),
        }
    }

    /// Records a pricing result against a trade.
    #[tracing::instrument(skip(self, cmd), fields(trade_id = %cmd.trade_id))]
    pub async fn price(&self, cmd: PriceTrade) -> Result<bool, DomainError> {
        let npv = cmd.npv;
        match self
            .handler
            .execute(&cmd.trade_id, |trade| trade.reprice(npv, "system"))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => Self::absorb_gone(e),
        }
    }

    /// Prices a trade with the seeded stub and records the result.
    ///
    /// Returns the NPV, or None when the trade is absent or cancelled.
    /// Same seed, same trade, same NPV.
    #[tracing::instrument(skip(self))]
    pub async fn price_with_seed(
        &self,
        trade_id: &StreamId,
        seed: u64,
    ) -> Result<Option<Decimal>, DomainError> {
        let Some(trade) = self.handler.load_existing(trade_id).await? else {
            return Ok(None);
        };
        if trade.is_cancelled() {
            return Ok(None);
        }

        let npv = seeded_npv(trade.notional_amount(), seed);
        match self.price(PriceTrade::new(trade_id.clone(), npv)).await? {
            true => Ok(Some(npv)),
            false => Ok(None),
        }
    }

    /// Cancels a trade. Terminal; the read side treats it as deleted.
    #[tracing::instrument(skip(self, cmd), fields(trade_id = %cmd.trade_id))]
    pub async fn cancel(&self, cmd: CancelTrade) -> Result<bool, DomainError> {
        let reason = cmd.reason;
        match self
            .handler
            .execute(&cmd.trade_id, |trade| {
                let actor = trade.booked_by().to_string();
                trade.cancel(&reason, &actor)
            })
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => Self::absorb_gone(e),
        }
    }

    /// Point lookup from the read model.
    ///
    /// Returns None when the trade does not exist or is cancelled —
    /// cancellation is a soft delete from the read perspective.
    #[tracing::instrument(skip(self))]
    pub async fn get_by_id(&self, trade_id: &StreamId) -> Option<TradeRow> {
        self.lookup
            .trade(trade_id)
            .await
            .filter(|row| !row.is_cancelled)
    }

    /// All live trades for an owner, trade date descending, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn get_by_owner(&self, booked_by: &str) -> Vec<TradeRow> {
        self.lookup.trades_for_owner(booked_by).await
    }

    /// Absent/cancelled targets are reported as `false`, everything else
    /// stays an error.
    fn absorb_gone(error: DomainError) -> Result<bool, DomainError> {
        match error {
            DomainError::Trade(e) if e.is_gone() => Ok(false),
            other => Err(other),
        }
    }

    /// Fire-and-forget fact to the notification relay. Failures are logged
    /// and swallowed; the command has already succeeded at the write side.
    async fn notify(&self, kind: TradeChangeKind, trade: &SwapTrade) {
        let Some(trade_id) = trade.id() else {
            return;
        };
        let change = TradeChanged {
            trade_id: trade_id.clone(),
            kind,
            counterparty: trade.counterparty().to_string(),
            booked_by: trade.booked_by().to_string(),
            notional_amount: trade.notional_amount(),
            notional_currency: trade.notional_currency().to_string(),
            npv: trade.npv(),
        };
        if let Err(e) = self.notifier.publish(change).await {
            tracing::warn!(error = %e, %trade_id, "trade notification dropped");
        }
    }
}
