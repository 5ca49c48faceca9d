//! Domain Events
//!
//! Event definitions for Event Sourcing.
//! Events are immutable facts that have happened to exactly one aggregate.
//! Every enum is a tagged union keyed by `type`; the `Unknown` arm absorbs
//! event kinds this build does not understand so historical logs always replay.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Aggregate types that own an event stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AggregateType {
    Order,
    Delivery,
    Payment,
    Restaurant,
}

impl AggregateType {
    pub const ALL: [AggregateType; 4] = [
        AggregateType::Order,
        AggregateType::Delivery,
        AggregateType::Payment,
        AggregateType::Restaurant,
    ];

    /// Name stored in the `aggregate_type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateType::Order => "Order",
            AggregateType::Delivery => "Delivery",
            AggregateType::Payment => "Payment",
            AggregateType::Restaurant => "Restaurant",
        }
    }
}

impl fmt::Display for AggregateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregateType {
    type Err = UnknownAggregateType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Order" => Ok(AggregateType::Order),
            "Delivery" => Ok(AggregateType::Delivery),
            "Payment" => Ok(AggregateType::Payment),
            "Restaurant" => Ok(AggregateType::Restaurant),
            other => Err(UnknownAggregateType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown aggregate type: {0}")]
pub struct UnknownAggregateType(pub String);

/// Behaviour shared by every event union
pub trait DomainEvent:
    Serialize + DeserializeOwned + Clone + fmt::Debug + PartialEq + Send + Sync + 'static
{
    /// Get the event type as a string (stored in the `type` column)
    fn event_type(&self) -> &'static str;
}

/// A single line of an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_item_id: Option<String>,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl OrderItem {
    /// `None` when the product does not fit in a `Decimal`
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Order-related events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OrderEvent {
    /// Order was placed by a customer
    OrderCreated {
        order_id: Uuid,
        user_id: String,
        restaurant_id: String,
        items: Vec<OrderItem>,
        created_at: DateTime<Utc>,
    },

    /// Items were added to a pending order
    OrderItemsAdded {
        items: Vec<OrderItem>,
        added_at: DateTime<Utc>,
    },

    /// Restaurant accepted the order
    OrderConfirmed { confirmed_at: DateTime<Utc> },

    /// Kitchen started preparing the order
    OrderPreparationStarted { started_at: DateTime<Utc> },

    /// Order is ready for pickup
    OrderReady { ready_at: DateTime<Utc> },

    /// Order left the restaurant with a courier
    OrderDispatched { dispatched_at: DateTime<Utc> },

    /// Order reached the customer
    OrderDelivered { delivered_at: DateTime<Utc> },

    /// Order was cancelled
    OrderCancelled {
        reason: String,
        cancelled_at: DateTime<Utc>,
    },

    #[serde(other)]
    Unknown,
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated { .. } => "OrderCreated",
            OrderEvent::OrderItemsAdded { .. } => "OrderItemsAdded",
            OrderEvent::OrderConfirmed { .. } => "OrderConfirmed",
            OrderEvent::OrderPreparationStarted { .. } => "OrderPreparationStarted",
            OrderEvent::OrderReady { .. } => "OrderReady",
            OrderEvent::OrderDispatched { .. } => "OrderDispatched",
            OrderEvent::OrderDelivered { .. } => "OrderDelivered",
            OrderEvent::OrderCancelled { .. } => "OrderCancelled",
            OrderEvent::Unknown => "Unknown",
        }
    }
}

/// Delivery-related events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DeliveryEvent {
    DeliveryCreated {
        delivery_id: Uuid,
        order_id: Uuid,
        pickup_address: String,
        delivery_address: String,
        estimated_delivery_time: Option<DateTime<Utc>>,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    },

    DriverAssigned {
        driver_id: String,
        assigned_at: DateTime<Utc>,
    },

    DeliveryPickedUp { picked_up_at: DateTime<Utc> },

    DeliveryCompleted { delivered_at: DateTime<Utc> },

    DeliveryFailed {
        reason: String,
        failed_at: DateTime<Utc>,
    },

    DeliveryCancelled {
        reason: String,
        cancelled_at: DateTime<Utc>,
    },

    #[serde(other)]
    Unknown,
}

impl DomainEvent for DeliveryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DeliveryEvent::DeliveryCreated { .. } => "DeliveryCreated",
            DeliveryEvent::DriverAssigned { .. } => "DriverAssigned",
            DeliveryEvent::DeliveryPickedUp { .. } => "DeliveryPickedUp",
            DeliveryEvent::DeliveryCompleted { .. } => "DeliveryCompleted",
            DeliveryEvent::DeliveryFailed { .. } => "DeliveryFailed",
            DeliveryEvent::DeliveryCancelled { .. } => "DeliveryCancelled",
            DeliveryEvent::Unknown => "Unknown",
        }
    }
}

/// Payment-related events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PaymentEvent {
    PaymentCreated {
        payment_id: Uuid,
        order_id: Uuid,
        user_id: String,
        amount: Decimal,
        currency: String,
        payment_method: String,
        metadata: Option<serde_json::Value>,
        created_at: DateTime<Utc>,
    },

    /// Gateway confirmed the charge
    PaymentCompleted {
        transaction_ref: Option<String>,
        completed_at: DateTime<Utc>,
    },

    PaymentFailed {
        reason: String,
        failed_at: DateTime<Utc>,
    },

    /// Part or all of a completed payment was returned
    PaymentRefunded {
        amount: Decimal,
        reason: Option<String>,
        refunded_at: DateTime<Utc>,
    },

    #[serde(other)]
    Unknown,
}

impl DomainEvent for PaymentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentCreated { .. } => "PaymentCreated",
            PaymentEvent::PaymentCompleted { .. } => "PaymentCompleted",
            PaymentEvent::PaymentFailed { .. } => "PaymentFailed",
            PaymentEvent::PaymentRefunded { .. } => "PaymentRefunded",
            PaymentEvent::Unknown => "Unknown",
        }
    }
}

/// Partial update of restaurant details; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestaurantChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RestaurantChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.address.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.logo.is_none()
            && self.description.is_none()
    }
}

/// Restaurant-related events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RestaurantEvent {
    RestaurantCreated {
        restaurant_id: Uuid,
        name: String,
        address: String,
        phone: String,
        email: String,
        logo: Option<String>,
        description: Option<String>,
        created_at: DateTime<Utc>,
    },

    RestaurantDetailsUpdated {
        changes: RestaurantChanges,
        updated_at: DateTime<Utc>,
    },

    /// Restaurant started accepting orders
    RestaurantOpened { opened_at: DateTime<Utc> },

    /// Restaurant stopped accepting orders
    RestaurantClosed { closed_at: DateTime<Utc> },

    RestaurantDeactivated {
        reason: String,
        deactivated_at: DateTime<Utc>,
    },

    #[serde(other)]
    Unknown,
}

impl DomainEvent for RestaurantEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RestaurantEvent::RestaurantCreated { .. } => "RestaurantCreated",
            RestaurantEvent::RestaurantDetailsUpdated { .. } => "RestaurantDetailsUpdated",
            RestaurantEvent::RestaurantOpened { .. } => "RestaurantOpened",
            RestaurantEvent::RestaurantClosed { .. } => "RestaurantClosed",
            RestaurantEvent::RestaurantDeactivated { .. } => "RestaurantDeactivated",
            RestaurantEvent::Unknown => "Unknown",
        }
    }
}
