//! Optimistic concurrency on the event log

use std::sync::Arc;

use chrono::Utc;

use food_delivery_core::aggregate::{Aggregate, Restaurant};
use food_delivery_core::domain::{CommandContext, RestaurantEvent};
use food_delivery_core::event_store::{EventLog, StoreError};
use food_delivery_core::handlers::{CreateRestaurantCommand, UpdateRestaurantCommand};
use food_delivery_core::{AggregateType, AppError};

mod common;

async fn restaurant_at_version_three(harness: &common::Harness) -> Restaurant {
    let context = CommandContext::new();
    let restaurant = harness
        .service
        .create_restaurant(
            CreateRestaurantCommand::new("Noodle Bar", "1 Main St", "555-0100", "hi@noodle.test"),
            &context,
        )
        .await
        .unwrap();
    harness
        .service
        .close_restaurant(restaurant.id(), &context)
        .await
        .unwrap();
    harness
        .service
        .open_restaurant(restaurant.id(), &context)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_two_writers_at_same_version_one_wins() {
    let harness = common::Harness::new();
    let restaurant = restaurant_at_version_three(&harness).await;
    assert_eq!(restaurant.version(), 3);

    let context = CommandContext::new();
    let closed = [RestaurantEvent::RestaurantClosed {
        closed_at: Utc::now(),
    }];

    let (first, second) = tokio::join!(
        harness
            .repository
            .save::<Restaurant>(restaurant.id(), 3, &closed, &context),
        harness
            .repository
            .save::<Restaurant>(restaurant.id(), 3, &closed, &context),
    );

    let outcomes = [first, second];
    let winners: Vec<_> = outcomes.iter().filter_map(|r| r.as_ref().ok()).collect();
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(StoreError::ConcurrencyConflict { actual: 4, .. })))
        .count();

    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0][0].version, 4);
    assert_eq!(conflicts, 1);
    assert_eq!(
        harness
            .events
            .current_version(AggregateType::Restaurant, restaurant.id())
            .await
            .unwrap(),
        4
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_commands_keep_versions_contiguous() {
    let harness = Arc::new(common::Harness::new());
    let restaurant = restaurant_at_version_three(&harness).await;
    let restaurant_id = restaurant.id();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let harness = harness.clone();
        tasks.push(tokio::spawn(async move {
            let command = UpdateRestaurantCommand {
                name: Some(format!("Noodle Bar #{i}")),
                ..Default::default()
            };
            harness
                .service
                .update_restaurant_details(restaurant_id, command, &CommandContext::new())
                .await
        }));
    }

    let mut succeeded = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(AppError::ConcurrencyConflict { attempts, .. }) => assert_eq!(attempts, 3),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert!(succeeded >= 1);

    let stream = harness
        .events
        .read_stream(AggregateType::Restaurant, restaurant_id, 0)
        .await
        .unwrap();
    let versions: Vec<i64> = stream.iter().map(|e| e.version).collect();
    let expected: Vec<i64> = (1..=3 + succeeded).collect();
    assert_eq!(versions, expected);
}

#[tokio::test]
async fn test_stale_expected_version_is_rejected() {
    let harness = common::Harness::new();
    let restaurant = restaurant_at_version_three(&harness).await;

    let result = harness
        .repository
        .save::<Restaurant>(
            restaurant.id(),
            1,
            &[RestaurantEvent::RestaurantClosed {
                closed_at: Utc::now(),
            }],
            &CommandContext::new(),
        )
        .await;

    match result {
        Err(StoreError::ConcurrencyConflict {
            expected, actual, ..
        }) => {
            assert_eq!(expected, 1);
            assert_eq!(actual, 3);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(harness.events.count_for(restaurant.id()), 3);
}
