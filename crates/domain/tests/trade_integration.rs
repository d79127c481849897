//! Integration tests for the swap trade aggregate and store.
//!
//! These tests verify the full trade lifecycle including event persistence,
//! aggregate reconstruction by replay, and optimistic concurrency handling.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::StreamId;
use domain::{
    Aggregate, AmendTrade, BookTrade, CancelTrade, DomainEvent, NoopNotifier, PayerReceiver,
    PriceTrade, SwapLeg, SwapTrade, TradeAmendment, TradeBooking, TradeEvent, TradeLookup,
    TradeRow, TradeStore,
};
use event_store::{
    AppendOptions, EventEnvelope, EventStore, EventStoreError, InMemoryEventStore, Version,
};
use rust_decimal_macros::dec;

struct NullLookup;

#[async_trait]
impl TradeLookup for NullLookup {
    async fn trade(&self, _id: &StreamId) -> Option<TradeRow> {
        None
    }

    async fn trades_for_owner(&self, _booked_by: &str) -> Vec<TradeRow> {
        Vec::new()
    }
}

fn create_store() -> TradeStore<InMemoryEventStore> {
    TradeStore::new(
        InMemoryEventStore::new(),
        Arc::new(NullLookup),
        Arc::new(NoopNotifier),
    )
}

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

mod trade_lifecycle {
    use super::*;

    #[tokio::test]
    async fn full_lifecycle_is_replayable() {
        let store = create_store();

        let cmd = BookTrade::new(booking(), "alice");
        let trade_id = cmd.trade_id.clone();
        store.create(cmd).await.unwrap();

        let amendment = TradeAmendment {
            counterparty: Some("NewCo".to_string()),
            notional_amount: Some(dec!(2_000_000)),
            ..Default::default()
        };
        assert!(store
            .update(AmendTrade::new(trade_id.clone(), amendment, "alice"))
            .await
            .unwrap());

        assert!(store
            .price(PriceTrade::new(trade_id.clone(), dec!(12345.67)))
            .await
            .unwrap());

        let trade = store
            .handler()
            .load_existing(&trade_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trade.counterparty(), "NewCo");
        assert_eq!(trade.notional_amount(), dec!(2_000_000));
        assert_eq!(trade.npv(), Some(dec!(12345.67)));
        assert_eq!(trade.version(), Version::new(3));
        assert!(!trade.is_cancelled());

        assert!(store
            .cancel(CancelTrade::new(trade_id.clone(), "booking error"))
            .await
            .unwrap());

        let trade = store
            .handler()
            .load_existing(&trade_id)
            .await
            .unwrap()
            .unwrap();
        assert!(trade.is_cancelled());
        assert_eq!(trade.cancellation_reason(), Some("booking error"));
        assert_eq!(trade.version(), Version::new(4));
    }

    #[tokio::test]
    async fn each_command_appends_exactly_one_event() {
        let store = create_store();

        let cmd = BookTrade::new(booking(), "alice");
        let trade_id = cmd.trade_id.clone();
        store.create(cmd).await.unwrap();
        store
            .price(PriceTrade::new(trade_id.clone(), dec!(1.23)))
            .await
            .unwrap();
        store
            .cancel(CancelTrade::new(trade_id.clone(), "done"))
            .await
            .unwrap();

        let events = store.handler().store().read_stream(&trade_id).await.unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["SwapTradeCreated", "TradePriced", "TradeCancelled"]);
    }

    #[tokio::test]
    async fn cancellation_is_terminal_for_every_command() {
        let store = create_store();

        let cmd = BookTrade::new(booking(), "alice");
        let trade_id = cmd.trade_id.clone();
        store.create(cmd).await.unwrap();
        store
            .cancel(CancelTrade::new(trade_id.clone(), "booking error"))
            .await
            .unwrap();

        assert!(!store
            .update(AmendTrade::new(
                trade_id.clone(),
                TradeAmendment {
                    counterparty: Some("Other".to_string()),
                    ..Default::default()
                },
                "alice"
            ))
            .await
            .unwrap());
        assert!(!store
            .price(PriceTrade::new(trade_id.clone(), dec!(9.99)))
            .await
            .unwrap());
        assert!(!store
            .cancel(CancelTrade::new(trade_id.clone(), "twice"))
            .await
            .unwrap());

        // The stream holds exactly the creation and the single cancellation.
        let events = store.handler().store().read_stream(&trade_id).await.unwrap();
        assert_eq!(events.len(), 2);
    }
}

mod replay {
    use super::*;

    #[tokio::test]
    async fn reconstruction_from_persisted_payloads_matches_live_state() {
        let store = create_store();

        let cmd = BookTrade::new(booking(), "alice");
        let trade_id = cmd.trade_id.clone();
        store.create(cmd).await.unwrap();
        store
            .update(AmendTrade::new(
                trade_id.clone(),
                TradeAmendment {
                    counterparty: Some("NewCo".to_string()),
                    ..Default::default()
                },
                "alice",
            ))
            .await
            .unwrap();
        store
            .price(PriceTrade::new(trade_id.clone(), dec!(777.77)))
            .await
            .unwrap();

        // Deserialize the raw envelopes and fold them by hand.
        let envelopes = store.handler().store().read_stream(&trade_id).await.unwrap();
        let mut folded = SwapTrade::default();
        for envelope in envelopes {
            let event: TradeEvent = serde_json::from_value(envelope.payload).unwrap();
            folded.apply(event);
            folded.set_version(envelope.version);
        }

        let loaded = store
            .handler()
            .load_existing(&trade_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(folded, loaded);
    }

    #[tokio::test]
    async fn replaying_twice_yields_identical_state() {
        let store = create_store();

        let cmd = BookTrade::new(booking(), "alice");
        let trade_id = cmd.trade_id.clone();
        store.create(cmd).await.unwrap();
        store
            .price(PriceTrade::new(trade_id.clone(), dec!(5.55)))
            .await
            .unwrap();

        let first = store.handler().load(&trade_id).await.unwrap();
        let second = store.handler().load(&trade_id).await.unwrap();
        assert_eq!(first, second);
    }
}

mod concurrency {
    use super::*;

    fn priced_envelope(trade_id: &StreamId, version: i64) -> EventEnvelope {
        let event = TradeEvent::priced(trade_id.clone(), dec!(1.00), "system");
        EventEnvelope::builder()
            .stream_id(trade_id.clone())
            .aggregate_type(SwapTrade::aggregate_type())
            .event_type(event.event_type())
            .version(Version::new(version))
            .payload(&event)
            .unwrap()
            .build()
    }

    #[tokio::test]
    async fn two_writers_from_same_observed_version_one_wins() {
        let store = create_store();

        let cmd = BookTrade::new(booking(), "alice");
        let trade_id = cmd.trade_id.clone();
        store.create(cmd).await.unwrap();

        let events = store.handler().store();
        let observed = events
            .stream_version(&trade_id)
            .await
            .unwrap()
            .expect("stream exists");

        // Both writers saw version 1 and race to write version 2.
        let first = events
            .append(
                vec![priced_envelope(&trade_id, 2)],
                AppendOptions::expect_version(observed),
            )
            .await;
        let second = events
            .append(
                vec![priced_envelope(&trade_id, 2)],
                AppendOptions::expect_version(observed),
            )
            .await;

        assert!(first.is_ok());
        assert!(matches!(
            second,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));

        // The losing writer retries from the new version and succeeds.
        let reread = events.stream_version(&trade_id).await.unwrap().unwrap();
        assert_eq!(reread, Version::new(2));
        let retried = events
            .append(
                vec![priced_envelope(&trade_id, 3)],
                AppendOptions::expect_version(reread),
            )
            .await;
        assert!(retried.is_ok());
    }

    #[tokio::test]
    async fn writers_on_different_trades_do_not_interfere() {
        let store = create_store();

        let first = BookTrade::new(booking(), "alice");
        let second = BookTrade::new(booking(), "bob");
        let (id_a, id_b) = (first.trade_id.clone(), second.trade_id.clone());
        store.create(first).await.unwrap();
        store.create(second).await.unwrap();

        let (a, b) = tokio::join!(
            store.price(PriceTrade::new(id_a, dec!(1.11))),
            store.price(PriceTrade::new(id_b, dec!(2.22))),
        );
        assert!(a.unwrap());
        assert!(b.unwrap());
    }
}
