//! Aggregate module
//!
//! Aggregate Root pattern implementation for Event Sourcing.
//! Each aggregate is a pure reducer (`apply`) plus a decision function
//! (`decide`) that turns a command into the events it should emit.

pub mod delivery;
pub mod order;
pub mod payment;
pub mod restaurant;

pub use delivery::{Delivery, DeliveryCommand, DeliveryStatus};
pub use order::{Order, OrderCommand, OrderStatus};
pub use payment::{Payment, PaymentCommand, PaymentStatus};
pub use restaurant::{Restaurant, RestaurantCommand, RestaurantStatus};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::domain::{AggregateType, DomainError, DomainEvent};

/// Aggregate trait that all aggregates must implement
pub trait Aggregate:
    Default + Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The type of events this aggregate handles
    type Event: DomainEvent;

    /// Commands accepted by `decide`
    type Command: Send;

    /// Aggregate type (for storage)
    const AGGREGATE_TYPE: AggregateType;

    /// Get the aggregate ID (nil until the creation event is applied)
    fn id(&self) -> Uuid;

    /// Number of events folded into this state
    fn version(&self) -> i64;

    /// Status string exposed to read models
    fn status_label(&self) -> &'static str;

    /// Apply an event to update the aggregate state.
    ///
    /// Total: unknown events only advance the version.
    fn apply(self, event: &Self::Event) -> Self;

    /// Decide which events a command produces against the current state
    fn decide(&self, command: Self::Command) -> Result<Vec<Self::Event>, DomainError>;

    fn is_created(&self) -> bool {
        !self.id().is_nil()
    }

    /// Fold a sequence of events onto this state
    fn fold<'a, I>(self, events: I) -> Self
    where
        I: IntoIterator<Item = &'a Self::Event>,
    {
        events.into_iter().fold(self, |state, event| state.apply(event))
    }
}

pub(crate) fn require_created<A: Aggregate>(state: &A) -> Result<(), DomainError> {
    if state.is_created() {
        Ok(())
    } else {
        Err(DomainError::NotCreated {
            aggregate: A::AGGREGATE_TYPE.as_str(),
        })
    }
}

pub(crate) fn require_new<A: Aggregate>(state: &A) -> Result<(), DomainError> {
    if state.version() == 0 {
        Ok(())
    } else {
        Err(DomainError::AlreadyExists {
            aggregate: A::AGGREGATE_TYPE.as_str(),
        })
    }
}
