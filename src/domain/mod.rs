//! Domain module
//!
//! Core domain types: events, money, command context and business errors.

pub mod amount;
pub mod context;
pub mod error;
pub mod events;

pub use amount::{Amount, AmountError, Currency, CurrencyError, DEFAULT_CURRENCY, MAX_AMOUNT};
pub use context::CommandContext;
pub use error::DomainError;
pub use events::{
    AggregateType, DeliveryEvent, DomainEvent, OrderEvent, OrderItem, PaymentEvent,
    RestaurantChanges, RestaurantEvent, UnknownAggregateType,
};
