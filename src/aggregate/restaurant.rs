//! Restaurant Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AggregateType, DomainError, RestaurantChanges, RestaurantEvent};

use super::{require_created, require_new, Aggregate};

/// Restaurant status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestaurantStatus {
    /// Accepting orders
    #[default]
    Open,
    /// Temporarily not accepting orders
    Closed,
    /// Removed from the platform; terminal
    Deactivated,
}

impl RestaurantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestaurantStatus::Open => "open",
            RestaurantStatus::Closed => "closed",
            RestaurantStatus::Deactivated => "deactivated",
        }
    }
}

#[derive(Debug, Clone)]
pub enum RestaurantCommand {
    Create {
        restaurant_id: Uuid,
        name: String,
        address: String,
        phone: String,
        email: String,
        logo: Option<String>,
        description: Option<String>,
    },
    UpdateDetails {
        changes: RestaurantChanges,
    },
    Open,
    Close,
    Deactivate {
        reason: String,
    },
}

/// Restaurant Aggregate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    id: Uuid,
    name: String,
    address: String,
    phone: String,
    email: String,
    logo: Option<String>,
    description: Option<String>,
    status: RestaurantStatus,
    version: i64,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Restaurant {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn logo(&self) -> Option<&str> {
        self.logo.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn status(&self) -> RestaurantStatus {
        self.status
    }

    pub fn is_accepting_orders(&self) -> bool {
        self.status == RestaurantStatus::Open
    }

    fn require_active(&self, action: &'static str) -> Result<(), DomainError> {
        require_created(self)?;
        if self.status == RestaurantStatus::Deactivated {
            return Err(DomainError::invalid_transition(
                "Restaurant",
                self.status.as_str(),
                action,
            ));
        }
        Ok(())
    }
}

impl Aggregate for Restaurant {
    type Event = RestaurantEvent;
    type Command = RestaurantCommand;

    const AGGREGATE_TYPE: AggregateType = AggregateType::Restaurant;

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
            RestaurantEvent::RestaurantCreated {
                restaurant_id,
                name,
                address,
                phone,
                email,
                logo,
                description,
                created_at,
            } => {
                self.id = *restaurant_id;
                self.name = name.clone();
                self.address = address.clone();
                self.phone = phone.clone();
                self.email = email.clone();
                self.logo = logo.clone();
                self.description = description.clone();
                self.status = RestaurantStatus::Open;
                self.created_at = Some(*created_at);
                self.updated_at = Some(*created_at);
            }
            RestaurantEvent::RestaurantDetailsUpdated {
                changes,
                updated_at,
            } => {
                if let Some(name) = &changes.name {
                    self.name = name.clone();
                }
                if let Some(address) = &changes.address {
                    self.address = address.clone();
                }
                if let Some(phone) = &changes.phone {
                    self.phone = phone.clone();
                }
                if let Some(email) = &changes.email {
                    self.email = email.clone();
                }
                if changes.logo.is_some() {
                    self.logo = changes.logo.clone();
                }
                if changes.description.is_some() {
                    self.description = changes.description.clone();
                }
                self.updated_at = Some(*updated_at);
            }
            RestaurantEvent::RestaurantOpened { opened_at } => {
                self.status = RestaurantStatus::Open;
                self.updated_at = Some(*opened_at);
            }
            RestaurantEvent::RestaurantClosed { closed_at } => {
                self.status = RestaurantStatus::Closed;
                self.updated_at = Some(*closed_at);
            }
            RestaurantEvent::RestaurantDeactivated { deactivated_at, .. } => {
                self.status = RestaurantStatus::Deactivated;
                self.updated_at = Some(*deactivated_at);
            }
            RestaurantEvent::Unknown => {}
        }

        self.version += 1;
        self
    }

    fn decide(&self, command: Self::Command) -> Result<Vec<Self::Event>, DomainError> {
        let now = Utc::now();

        match command {
            RestaurantCommand::Create {
                restaurant_id,
                name,
                address,
                phone,
                email,
                logo,
                description,
            } => {
                require_new(self)?;
                Ok(vec![RestaurantEvent::RestaurantCreated {
                    restaurant_id,
                    name,
                    address,
                    phone,
                    email,
                    logo,
                    description,
                    created_at: now,
                }])
            }
            RestaurantCommand::UpdateDetails { changes } => {
                self.require_active("update")?;
                if changes.is_empty() {
                    return Err(DomainError::rule("No restaurant details to update"));
                }
                Ok(vec![RestaurantEvent::RestaurantDetailsUpdated {
                    changes,
                    updated_at: now,
                }])
            }
            RestaurantCommand::Open => {
                self.require_active("open")?;
                if self.status == RestaurantStatus::Open {
                    return Ok(vec![]);
                }
                Ok(vec![RestaurantEvent::RestaurantOpened { opened_at: now }])
            }
            RestaurantCommand::Close => {
                self.require_active("close")?;
                if self.status == RestaurantStatus::Closed {
                    return Ok(vec![]);
                }
                Ok(vec![RestaurantEvent::RestaurantClosed { closed_at: now }])
            }
            RestaurantCommand::Deactivate { reason } => {
                self.require_active("deactivate")?;
                Ok(vec![RestaurantEvent::RestaurantDeactivated {
                    reason,
                    deactivated_at: now,
                }])
            }
        }
    }
}
