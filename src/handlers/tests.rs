//! Handler tests
//!
//! Run against the in-memory stores; no database needed.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use uuid::Uuid;

    use crate::aggregate::{Aggregate, OrderStatus, PaymentStatus, RestaurantStatus};
    use crate::domain::{AggregateType, CommandContext, DomainError, MAX_AMOUNT};
    use crate::error::AppError;
    use crate::event_store::{
        AggregateRepository, EventLog, InMemoryEventStore, NewEvent, StoreError, StoredEvent,
    };
    use crate::handlers::{
        AddOrderItemsCommand, CommandResponse, CommandService, CreateDeliveryCommand, CreateOrderCommand,
        CreatePaymentCommand, CreateRestaurantCommand, OrderItemInput, ReasonCommand,
        RefundPaymentCommand, UpdateRestaurantCommand,
    };
    use crate::snapshot::InMemorySnapshotStore;

    fn service_with(events: Arc<dyn EventLog>, max_attempts: u32) -> CommandService {
        let repository = AggregateRepository::new(events, Arc::new(InMemorySnapshotStore::new()));
        CommandService::new(repository, max_attempts)
    }

    fn service() -> (CommandService, Arc<InMemoryEventStore>) {
        let events = Arc::new(InMemoryEventStore::new());
        (service_with(events.clone(), 3), events)
    }

    fn restaurant_command() -> CreateRestaurantCommand {
        CreateRestaurantCommand::new("Curry House", "9 High St", "555-0123", "info@curry.test")
    }

    /// Lets another writer slip in one `RestaurantDetailsUpdated` before each
    /// of the first `races` appends
    struct RacingLog {
        inner: InMemoryEventStore,
        races: usize,
        appends: AtomicUsize,
    }

    #[async_trait]
    impl EventLog for RacingLog {
        async fn append(
            &self,
            aggregate_type: AggregateType,
            aggregate_id: Uuid,
            expected_version: i64,
            events: Vec<NewEvent>,
        ) -> Result<Vec<StoredEvent>, StoreError> {
            let call = self.appends.fetch_add(1, Ordering::SeqCst);
            // The first append creates the restaurant; races start afterwards
            if call >= 1 && call <= self.races {
                self.inner
                    .append(
                        aggregate_type,
                        aggregate_id,
                        expected_version,
                        vec![NewEvent {
                            event_type: "RestaurantDetailsUpdated".to_string(),
                            payload: json!({
                                "changes": {"phone": format!("555-01{call:02}")},
                                "updated_at": chrono::Utc::now(),
                            }),
                            metadata: None,
                            created_by: Some("racer".to_string()),
                        }],
                    )
                    .await?;
            }
            self.inner
                .append(aggregate_type, aggregate_id, expected_version, events)
                .await
        }

        async fn read_stream(
            &self,
            aggregate_type: AggregateType,
            aggregate_id: Uuid,
            from_version: i64,
        ) -> Result<Vec<StoredEvent>, StoreError> {
            self.inner
                .read_stream(aggregate_type, aggregate_id, from_version)
                .await
        }

        async fn read_all(
            &self,
            from_position: i64,
            limit: i64,
        ) -> Result<Vec<StoredEvent>, StoreError> {
            self.inner.read_all(from_position, limit).await
        }

        async fn current_version(
            &self,
            aggregate_type: AggregateType,
            aggregate_id: Uuid,
        ) -> Result<i64, StoreError> {
            self.inner
                .current_version(aggregate_type, aggregate_id)
                .await
        }
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn test_create_order_command_builder() {
        let cmd = CreateOrderCommand::new("u1", "r1")
            .with_item(OrderItemInput::new("Ramen", 2, dec!(12.50)).with_menu_item_id("m-7"));

        let order = cmd.validate().unwrap();
        assert_eq!(order.user_id, "u1");
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].menu_item_id.as_deref(), Some("m-7"));
        assert_eq!(order.items[0].line_total(), Some(dec!(25.00)));
    }

    #[test]
    fn test_create_order_requires_items_field() {
        let cmd = CreateOrderCommand {
            items: None,
            ..CreateOrderCommand::new("u1", "r1")
        };
        assert!(matches!(cmd.validate(), Err(AppError::Validation(msg)) if msg.contains("items")));
    }

    #[test]
    fn test_order_item_rules() {
        let zero_quantity = CreateOrderCommand::new("u1", "r1")
            .with_item(OrderItemInput::new("Tea", 0, dec!(2)));
        assert!(matches!(zero_quantity.validate(), Err(AppError::Validation(_))));

        let negative_price = CreateOrderCommand::new("u1", "r1")
            .with_item(OrderItemInput::new("Tea", 1, dec!(-2)));
        assert!(matches!(negative_price.validate(), Err(AppError::Validation(_))));

        let unnamed = CreateOrderCommand::new("u1", "r1").with_item(OrderItemInput {
            name: Some("   ".to_string()),
            ..OrderItemInput::new("x", 1, dec!(1))
        });
        assert!(matches!(unnamed.validate(), Err(AppError::Validation(_))));

        let unbounded_price = CreateOrderCommand::new("u1", "r1")
            .with_item(OrderItemInput::new("Tea", 1, Decimal::MAX));
        assert!(matches!(
            unbounded_price.validate(),
            Err(AppError::Validation(msg)) if msg.contains("unit_price")
        ));
    }

    #[test]
    fn test_payment_validation() {
        let order_id = Uuid::new_v4();

        let ok = CreatePaymentCommand::new(order_id, "u1", "19.99", "card")
            .validate()
            .unwrap();
        assert_eq!(ok.currency.as_str(), "USD");
        assert_eq!(ok.amount.value(), dec!(19.99));

        let eur = CreatePaymentCommand::new(order_id, "u1", "5", "card")
            .with_currency("eur")
            .validate()
            .unwrap();
        assert_eq!(eur.currency.as_str(), "EUR");

        for amount in ["0", "-3", "abc", "1.123456789"] {
            let result = CreatePaymentCommand::new(order_id, "u1", amount, "card").validate();
            assert!(
                matches!(result, Err(AppError::Validation(_))),
                "amount {amount} should be rejected"
            );
        }

        let bad_order = CreatePaymentCommand {
            order_id: Some("not-a-uuid".to_string()),
            ..CreatePaymentCommand::new(order_id, "u1", "5", "card")
        };
        assert!(matches!(bad_order.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_restaurant_email_must_look_like_email() {
        let cmd = CreateRestaurantCommand {
            email: Some("no-at-sign".to_string()),
            ..restaurant_command()
        };
        assert!(matches!(cmd.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_empty_restaurant_update_rejected() {
        assert!(matches!(
            UpdateRestaurantCommand::default().validate(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_command_response_envelope() {
        let ok = CommandResponse::from_result(Ok(7));
        assert!(ok.success);
        assert_eq!(ok.entity, Some(7));

        let failed: CommandResponse<i32> =
            CommandResponse::from_result(Err(AppError::validation("user_id is required")));
        assert!(!failed.success);
        assert!(failed.entity.is_none());
        assert_eq!(
            failed.message.as_deref(),
            Some("Validation failed: user_id is required")
        );
        assert_eq!(failed.error_code.as_deref(), Some("validation_error"));
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    #[tokio::test]
    async fn test_order_lifecycle() {
        let (service, events) = service();
        let ctx = CommandContext::new().with_actor("staff-1");

        let order = service
            .create_order(CreateOrderCommand::new("u1", "r1"), &ctx)
            .await
            .unwrap();
        let id = order.id();

        service.confirm_order(id, &ctx).await.unwrap();
        service.start_preparing_order(id, &ctx).await.unwrap();
        service.mark_order_ready(id, &ctx).await.unwrap();
        service.dispatch_order(id, &ctx).await.unwrap();
        let order = service.mark_order_delivered(id, &ctx).await.unwrap();

        assert_eq!(order.status(), OrderStatus::Delivered);
        assert_eq!(order.version(), 6);
        assert_eq!(events.count_for(id), 6);
        assert!(events
            .all_events()
            .iter()
            .all(|e| e.created_by.as_deref() == Some("staff-1")));
    }

    #[tokio::test]
    async fn test_invalid_transition_stores_nothing() {
        let (service, events) = service();
        let ctx = CommandContext::new();

        let order = service
            .create_order(CreateOrderCommand::new("u1", "r1"), &ctx)
            .await
            .unwrap();

        let result = service.start_preparing_order(order.id(), &ctx).await;

        assert!(matches!(result, Err(AppError::Domain(_))));
        assert_eq!(events.count_for(order.id()), 1);
    }

    #[tokio::test]
    async fn test_order_total_limit_keeps_stream_usable() {
        let (service, events) = service();
        let ctx = CommandContext::new();

        let result = service
            .create_order(
                CreateOrderCommand::new("u1", "r1")
                    .with_item(OrderItemInput::new("Caviar", 1, Decimal::MAX)),
                &ctx,
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(events.all_events().is_empty());

        let order = service
            .create_order(
                CreateOrderCommand::new("u1", "r1").with_item(OrderItemInput::new(
                    "Banquet",
                    1,
                    Decimal::from(MAX_AMOUNT),
                )),
                &ctx,
            )
            .await
            .unwrap();

        let result = service
            .add_order_items(
                order.id(),
                AddOrderItemsCommand::new(vec![OrderItemInput::new("Mint", 1, dec!(1))]),
                &ctx,
            )
            .await;
        assert!(matches!(
            result,
            Err(AppError::Domain(DomainError::InvalidAmount(_)))
        ));
        assert_eq!(events.count_for(order.id()), 1);

        let confirmed = service.confirm_order(order.id(), &ctx).await.unwrap();
        assert_eq!(confirmed.status(), OrderStatus::Confirmed);
        assert_eq!(confirmed.total(), Decimal::from(MAX_AMOUNT));
    }

    #[tokio::test]
    async fn test_update_unknown_aggregate_is_not_found() {
        let (service, _) = service();
        let result = service
            .cancel_order(Uuid::new_v4(), ReasonCommand::new("typo"), &CommandContext::new())
            .await;
        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delivery_requires_existing_order() {
        let (service, events) = service();

        let result = service
            .create_delivery(
                CreateDeliveryCommand::new(Uuid::new_v4(), "1 Kitchen Rd", "2 Home Ave"),
                &CommandContext::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(AppError::NotFound {
                aggregate_type: AggregateType::Order,
                ..
            })
        ));
        assert!(events.all_events().is_empty());
    }

    #[tokio::test]
    async fn test_payment_refund_flow() {
        let (service, _) = service();
        let ctx = CommandContext::new();

        let order = service
            .create_order(CreateOrderCommand::new("u1", "r1"), &ctx)
            .await
            .unwrap();
        let payment = service
            .create_payment(
                CreatePaymentCommand::new(order.id(), "u1", "40.00", "card"),
                &ctx,
            )
            .await
            .unwrap();
        service
            .complete_payment(payment.id(), Default::default(), &ctx)
            .await
            .unwrap();

        let payment = service
            .refund_payment(payment.id(), RefundPaymentCommand::new("15"), &ctx)
            .await
            .unwrap();
        assert_eq!(payment.status(), PaymentStatus::Refunded);
        assert_eq!(payment.refundable_amount(), dec!(25.00));

        let over = service
            .refund_payment(payment.id(), RefundPaymentCommand::new("30"), &ctx)
            .await;
        assert!(matches!(over, Err(AppError::Domain(_))));
    }

    #[tokio::test]
    async fn test_noop_command_appends_nothing() {
        let (service, events) = service();
        let ctx = CommandContext::new();

        let restaurant = service
            .create_restaurant(restaurant_command(), &ctx)
            .await
            .unwrap();
        let reopened = service.open_restaurant(restaurant.id(), &ctx).await.unwrap();

        assert_eq!(reopened.status(), RestaurantStatus::Open);
        assert_eq!(reopened.version(), 1);
        assert_eq!(events.count_for(restaurant.id()), 1);
    }

    #[tokio::test]
    async fn test_conflict_is_retried_against_fresh_state() {
        let log = Arc::new(RacingLog {
            inner: InMemoryEventStore::new(),
            races: 1,
            appends: AtomicUsize::new(0),
        });
        let service = service_with(log.clone(), 3);
        let ctx = CommandContext::new();

        let restaurant = service
            .create_restaurant(restaurant_command(), &ctx)
            .await
            .unwrap();
        let closed = service.close_restaurant(restaurant.id(), &ctx).await.unwrap();

        // v2 is the racer's update, v3 our close decided on top of it
        assert_eq!(closed.version(), 3);
        assert_eq!(closed.status(), RestaurantStatus::Closed);
        assert_eq!(closed.phone(), "555-0101");
        assert_eq!(log.inner.count_for(restaurant.id()), 3);
    }

    #[tokio::test]
    async fn test_conflict_surfaces_after_max_attempts() {
        let log = Arc::new(RacingLog {
            inner: InMemoryEventStore::new(),
            races: 10,
            appends: AtomicUsize::new(0),
        });
        let service = service_with(log.clone(), 2);
        let ctx = CommandContext::new();

        let restaurant = service
            .create_restaurant(restaurant_command(), &ctx)
            .await
            .unwrap();
        let result = service.close_restaurant(restaurant.id(), &ctx).await;

        assert!(matches!(
            result,
            Err(AppError::ConcurrencyConflict { attempts: 2, .. })
        ));
    }
}
