//! Delivery Aggregate
//!
//! Courier leg of an order: `pending → assigned → picked_up → delivered`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AggregateType, DeliveryEvent, DomainError};

use super::{require_created, require_new, Aggregate};

/// Delivery status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Assigned,
    PickedUp,
    Delivered,
    Failed,
    Cancelled,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Assigned => "assigned",
            DeliveryStatus::PickedUp => "picked_up",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone)]
pub enum DeliveryCommand {
    Create {
        delivery_id: Uuid,
        order_id: Uuid,
        pickup_address: String,
        delivery_address: String,
        estimated_delivery_time: Option<DateTime<Utc>>,
        notes: Option<String>,
    },
    AssignDriver {
        driver_id: String,
    },
    PickUp,
    Complete,
    Fail {
        reason: String,
    },
    Cancel {
        reason: String,
    },
}

/// Delivery Aggregate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    id: Uuid,
    order_id: Uuid,
    pickup_address: String,
    delivery_address: String,
    estimated_delivery_time: Option<DateTime<Utc>>,
    notes: Option<String>,
    driver_id: Option<String>,
    status: DeliveryStatus,
    failure_reason: Option<String>,
    picked_up_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    version: i64,
    created_at: Option<DateTime<Utc>>,
}

impl Delivery {
    pub fn order_id(&self) -> Uuid {
        self.order_id
    }

    pub fn pickup_address(&self) -> &str {
        &self.pickup_address
    }

    pub fn delivery_address(&self) -> &str {
        &self.delivery_address
    }

    pub fn estimated_delivery_time(&self) -> Option<DateTime<Utc>> {
        self.estimated_delivery_time
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn driver_id(&self) -> Option<&str> {
        self.driver_id.as_deref()
    }

    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    fn transition(
        &self,
        allowed: &[DeliveryStatus],
        action: &'static str,
        event: DeliveryEvent,
    ) -> Result<Vec<DeliveryEvent>, DomainError> {
        require_created(self)?;
        if !allowed.contains(&self.status) {
            return Err(DomainError::invalid_transition(
                "Delivery",
                self.status.as_str(),
                action,
            ));
        }
        Ok(vec![event])
    }
}

impl Aggregate for Delivery {
    type Event = DeliveryEvent;
    type Command = DeliveryCommand;

    const AGGREGATE_TYPE: AggregateType = AggregateType::Delivery;

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
            DeliveryEvent::DeliveryCreated {
                delivery_id,
                order_id,
                pickup_address,
                delivery_address,
                estimated_delivery_time,
                notes,
                created_at,
            } => {
                self.id = *delivery_id;
                self.order_id = *order_id;
                self.pickup_address = pickup_address.clone();
                self.delivery_address = delivery_address.clone();
                self.estimated_delivery_time = *estimated_delivery_time;
                self.notes = notes.clone();
                self.status = DeliveryStatus::Pending;
                self.created_at = Some(*created_at);
            }
            DeliveryEvent::DriverAssigned { driver_id, .. } => {
                self.driver_id = Some(driver_id.clone());
                self.status = DeliveryStatus::Assigned;
            }
            DeliveryEvent::DeliveryPickedUp { picked_up_at } => {
                self.status = DeliveryStatus::PickedUp;
                self.picked_up_at = Some(*picked_up_at);
            }
            DeliveryEvent::DeliveryCompleted { delivered_at } => {
                self.status = DeliveryStatus::Delivered;
                self.delivered_at = Some(*delivered_at);
            }
            DeliveryEvent::DeliveryFailed { reason, .. } => {
                self.status = DeliveryStatus::Failed;
                self.failure_reason = Some(reason.clone());
            }
            DeliveryEvent::DeliveryCancelled { reason, .. } => {
                self.status = DeliveryStatus::Cancelled;
                self.failure_reason = Some(reason.clone());
            }
            DeliveryEvent::Unknown => {}
        }

        self.version += 1;
        self
    }

    fn decide(&self, command: Self::Command) -> Result<Vec<Self::Event>, DomainError> {
        let now = Utc::now();

        match command {
            DeliveryCommand::Create {
                delivery_id,
                order_id,
                pickup_address,
                delivery_address,
                estimated_delivery_time,
                notes,
            } => {
                require_new(self)?;
                Ok(vec![DeliveryEvent::DeliveryCreated {
                    delivery_id,
                    order_id,
                    pickup_address,
                    delivery_address,
                    estimated_delivery_time,
                    notes,
                    created_at: now,
                }])
            }
            // Reassigning a driver before pickup is allowed
            DeliveryCommand::AssignDriver { driver_id } => self.transition(
                &[DeliveryStatus::Pending, DeliveryStatus::Assigned],
                "assign a driver to",
                DeliveryEvent::DriverAssigned {
                    driver_id,
                    assigned_at: now,
                },
            ),
            DeliveryCommand::PickUp => self.transition(
                &[DeliveryStatus::Assigned],
                "pick up",
                DeliveryEvent::DeliveryPickedUp { picked_up_at: now },
            ),
            DeliveryCommand::Complete => self.transition(
                &[DeliveryStatus::PickedUp],
                "complete",
                DeliveryEvent::DeliveryCompleted { delivered_at: now },
            ),
            DeliveryCommand::Fail { reason } => self.transition(
                &[DeliveryStatus::Assigned, DeliveryStatus::PickedUp],
                "fail",
                DeliveryEvent::DeliveryFailed {
                    reason,
                    failed_at: now,
                },
            ),
            DeliveryCommand::Cancel { reason } => self.transition(
                &[DeliveryStatus::Pending, DeliveryStatus::Assigned],
                "cancel",
                DeliveryEvent::DeliveryCancelled {
                    reason,
                    cancelled_at: now,
                },
            ),
        }
    }
}
