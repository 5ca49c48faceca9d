//! Order Aggregate
//!
//! An order moves through the kitchen and courier lifecycle:
//! `pending → confirmed → preparing → ready → out_for_delivery → delivered`,
//! with cancellation allowed until the kitchen starts work.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AggregateType, DomainError, OrderEvent, OrderItem, MAX_AMOUNT};

use super::{require_created, require_new, Aggregate};

/// Order status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Ready,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

/// Commands understood by [`Order::decide`]
#[derive(Debug, Clone)]
pub enum OrderCommand {
    Create {
        order_id: Uuid,
        user_id: String,
        restaurant_id: String,
        items: Vec<OrderItem>,
    },
    AddItems {
        items: Vec<OrderItem>,
    },
    Confirm,
    StartPreparing,
    MarkReady,
    Dispatch,
    MarkDelivered,
    Cancel {
        reason: String,
    },
}

/// Order Aggregate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: Uuid,
    user_id: String,
    restaurant_id: String,
    items: Vec<OrderItem>,
    total: Decimal,
    status: OrderStatus,
    cancellation_reason: Option<String>,
    version: i64,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn restaurant_id(&self) -> &str {
        &self.restaurant_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn transition(
        &self,
        allowed: &[OrderStatus],
        action: &'static str,
        event: OrderEvent,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        require_created(self)?;
        if !allowed.contains(&self.status) {
            return Err(DomainError::invalid_transition(
                "Order",
                self.status.as_str(),
                action,
            ));
        }
        Ok(vec![event])
    }

    /// Current total plus `items`, `None` on overflow
    fn total_with(&self, items: &[OrderItem]) -> Option<Decimal> {
        items
            .iter()
            .try_fold(self.total, |total, item| total.checked_add(item.line_total()?))
    }

    fn check_total(&self, items: &[OrderItem]) -> Result<(), DomainError> {
        match self.total_with(items) {
            Some(total) if total <= Decimal::from(MAX_AMOUNT) => Ok(()),
            _ => Err(DomainError::InvalidAmount(format!(
                "Order total would exceed {MAX_AMOUNT}"
            ))),
        }
    }

    fn add_items(&mut self, items: &[OrderItem]) {
        // decide caps totals; streams written before the cap saturate instead of panicking
        self.total = self.total_with(items).unwrap_or(Decimal::MAX);
        self.items.extend_from_slice(items);
    }
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Command = OrderCommand;

    const AGGREGATE_TYPE: AggregateType = AggregateType::Order;

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn status_label(&self) -> &'static str {
        self.status.as_str()
    }

    fn apply(mut self, event: &Self::Event) -> Self {
        match event {
            OrderEvent::OrderCreated {
                order_id,
                user_id,
                restaurant_id,
                items,
                created_at,
            } => {
                self.id = *order_id;
                self.user_id = user_id.clone();
                self.restaurant_id = restaurant_id.clone();
                self.items.clear();
                self.total = Decimal::ZERO;
                self.add_items(items);
                self.status = OrderStatus::Pending;
                self.created_at = Some(*created_at);
                self.updated_at = Some(*created_at);
            }
            OrderEvent::OrderItemsAdded { items, added_at } => {
                self.add_items(items);
                self.updated_at = Some(*added_at);
            }
            OrderEvent::OrderConfirmed { confirmed_at } => {
                self.status = OrderStatus::Confirmed;
                self.updated_at = Some(*confirmed_at);
            }
            OrderEvent::OrderPreparationStarted { started_at } => {
                self.status = OrderStatus::Preparing;
                self.updated_at = Some(*started_at);
            }
            OrderEvent::OrderReady { ready_at } => {
                self.status = OrderStatus::Ready;
                self.updated_at = Some(*ready_at);
            }
            OrderEvent::OrderDispatched { dispatched_at } => {
                self.status = OrderStatus::OutForDelivery;
                self.updated_at = Some(*dispatched_at);
            }
            OrderEvent::OrderDelivered { delivered_at } => {
                self.status = OrderStatus::Delivered;
                self.updated_at = Some(*delivered_at);
            }
            OrderEvent::OrderCancelled {
                reason,
                cancelled_at,
            } => {
                self.status = OrderStatus::Cancelled;
                self.cancellation_reason = Some(reason.clone());
                self.updated_at = Some(*cancelled_at);
            }
            OrderEvent::Unknown => {}
        }

        self.version += 1;
        self
    }

    fn decide(&self, command: Self::Command) -> Result<Vec<Self::Event>, DomainError> {
        let now = Utc::now();

        match command {
            OrderCommand::Create {
                order_id,
                user_id,
                restaurant_id,
                items,
            } => {
                require_new(self)?;
                self.check_total(&items)?;
                Ok(vec![OrderEvent::OrderCreated {
                    order_id,
                    user_id,
                    restaurant_id,
                    items,
                    created_at: now,
                }])
            }
            OrderCommand::AddItems { items } => {
                if items.is_empty() {
                    return Err(DomainError::rule("No items to add"));
                }
                let within_limit = self.check_total(&items);
                let events = self.transition(
                    &[OrderStatus::Pending],
                    "add items to",
                    OrderEvent::OrderItemsAdded {
                        items,
                        added_at: now,
                    },
                )?;
                within_limit?;
                Ok(events)
            }
            OrderCommand::Confirm => self.transition(
                &[OrderStatus::Pending],
                "confirm",
                OrderEvent::OrderConfirmed { confirmed_at: now },
            ),
            OrderCommand::StartPreparing => self.transition(
                &[OrderStatus::Confirmed],
                "start preparing",
                OrderEvent::OrderPreparationStarted { started_at: now },
            ),
            OrderCommand::MarkReady => self.transition(
                &[OrderStatus::Preparing],
                "mark ready",
                OrderEvent::OrderReady { ready_at: now },
            ),
            OrderCommand::Dispatch => self.transition(
                &[OrderStatus::Ready],
                "dispatch",
                OrderEvent::OrderDispatched { dispatched_at: now },
            ),
            OrderCommand::MarkDelivered => self.transition(
                &[OrderStatus::OutForDelivery],
                "mark delivered",
                OrderEvent::OrderDelivered { delivered_at: now },
            ),
            OrderCommand::Cancel { reason } => self.transition(
                &[OrderStatus::Pending, OrderStatus::Confirmed],
                "cancel",
                OrderEvent::OrderCancelled {
                    reason,
                    cancelled_at: now,
                },
            ),
        }
    }
}
