//! Command definitions
//!
//! Raw command input as it arrives from a caller. Every field is optional
//! at this level so that omissions surface as validation errors instead of
//! deserialization failures. `validate` turns the input into domain values
//! before any store is touched.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Amount, Currency, OrderItem, RestaurantChanges, MAX_AMOUNT};
use crate::error::{AppError, AppResult};

// =========================================================================
// Field validation
// =========================================================================

fn required(field: &'static str, value: Option<String>) -> AppResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::validation(format!("{field} is required"))),
    }
}

/// Blank optional strings count as absent
fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required_id(field: &'static str, value: Option<String>) -> AppResult<Uuid> {
    let raw = required(field, value)?;
    raw.parse()
        .map_err(|_| AppError::validation(format!("{field} must be a valid UUID")))
}

fn required_amount(field: &'static str, value: Option<String>) -> AppResult<Amount> {
    let raw = required(field, value)?;
    raw.parse()
        .map_err(|e| AppError::validation(format!("{field} is invalid: {e}")))
}

fn email(value: Option<String>) -> AppResult<String> {
    let email = required("email", value)?;
    let valid = email
        .split_once('@')
        .map_or(false, |(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid {
        return Err(AppError::validation("email is malformed"));
    }
    Ok(email)
}

// =========================================================================
// Orders
// =========================================================================

/// Line item as submitted with an order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderItemInput {
    pub menu_item_id: Option<String>,
    pub name: Option<String>,
    pub quantity: Option<u32>,
    pub unit_price: Option<Decimal>,
}

impl OrderItemInput {
    pub fn new(name: impl Into<String>, quantity: u32, unit_price: Decimal) -> Self {
        Self {
            menu_item_id: None,
            name: Some(name.into()),
            quantity: Some(quantity),
            unit_price: Some(unit_price),
        }
    }

    pub fn with_menu_item_id(mut self, menu_item_id: impl Into<String>) -> Self {
        self.menu_item_id = Some(menu_item_id.into());
        self
    }

    fn validate(self, index: usize) -> AppResult<OrderItem> {
        let name = optional(self.name)
            .ok_or_else(|| AppError::validation(format!("items[{index}].name is required")))?;

        let quantity = match self.quantity {
            Some(q) if q >= 1 => q,
            Some(_) => {
                return Err(AppError::validation(format!(
                    "items[{index}].quantity must be at least 1"
                )))
            }
            None => {
                return Err(AppError::validation(format!(
                    "items[{index}].quantity is required"
                )))
            }
        };

        let unit_price = match self.unit_price {
            Some(p) if p < Decimal::ZERO => {
                return Err(AppError::validation(format!(
                    "items[{index}].unit_price must not be negative"
                )))
            }
            Some(p) if p > Decimal::from(MAX_AMOUNT) => {
                return Err(AppError::validation(format!(
                    "items[{index}].unit_price must not exceed {MAX_AMOUNT}"
                )))
            }
            Some(p) => p,
            None => {
                return Err(AppError::validation(format!(
                    "items[{index}].unit_price is required"
                )))
            }
        };

        Ok(OrderItem {
            menu_item_id: optional(self.menu_item_id),
            name,
            quantity,
            unit_price,
        })
    }
}

fn validate_items(items: Option<Vec<OrderItemInput>>) -> AppResult<Vec<OrderItem>> {
    items
        .ok_or_else(|| AppError::validation("items is required"))?
        .into_iter()
        .enumerate()
        .map(|(index, item)| item.validate(index))
        .collect()
}

/// Command to create a new order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateOrderCommand {
    pub user_id: Option<String>,
    pub restaurant_id: Option<String>,
    /// Required, may be empty
    pub items: Option<Vec<OrderItemInput>>,
}

impl CreateOrderCommand {
    pub fn new(user_id: impl Into<String>, restaurant_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            restaurant_id: Some(restaurant_id.into()),
            items: Some(Vec::new()),
        }
    }

    pub fn with_item(mut self, item: OrderItemInput) -> Self {
        self.items.get_or_insert_with(Vec::new).push(item);
        self
    }

    pub(crate) fn validate(self) -> AppResult<ValidOrder> {
        Ok(ValidOrder {
            user_id: required("user_id", self.user_id)?,
            restaurant_id: required("restaurant_id", self.restaurant_id)?,
            items: validate_items(self.items)?,
        })
    }
}

pub(crate) struct ValidOrder {
    pub user_id: String,
    pub restaurant_id: String,
    pub items: Vec<OrderItem>,
}

/// Command to add items to a pending order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddOrderItemsCommand {
    pub items: Option<Vec<OrderItemInput>>,
}

impl AddOrderItemsCommand {
    pub fn new(items: Vec<OrderItemInput>) -> Self {
        Self { items: Some(items) }
    }

    pub(crate) fn validate(self) -> AppResult<Vec<OrderItem>> {
        let items = validate_items(self.items)?;
        if items.is_empty() {
            return Err(AppError::validation("items must not be empty"));
        }
        Ok(items)
    }
}

/// Cancellation, failure or deactivation with a mandatory reason
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReasonCommand {
    pub reason: Option<String>,
}

impl ReasonCommand {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }

    pub(crate) fn validate(self) -> AppResult<String> {
        required("reason", self.reason)
    }
}

// =========================================================================
// Deliveries
// =========================================================================

/// Command to create a delivery for an existing order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateDeliveryCommand {
    pub order_id: Option<String>,
    pub pickup_address: Option<String>,
    pub delivery_address: Option<String>,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl CreateDeliveryCommand {
    pub fn new(
        order_id: Uuid,
        pickup_address: impl Into<String>,
        delivery_address: impl Into<String>,
    ) -> Self {
        Self {
            order_id: Some(order_id.to_string()),
            pickup_address: Some(pickup_address.into()),
            delivery_address: Some(delivery_address.into()),
            estimated_delivery_time: None,
            notes: None,
        }
    }

    pub fn with_estimated_delivery_time(mut self, at: DateTime<Utc>) -> Self {
        self.estimated_delivery_time = Some(at);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub(crate) fn validate(self) -> AppResult<ValidDelivery> {
        Ok(ValidDelivery {
            order_id: required_id("order_id", self.order_id)?,
            pickup_address: required("pickup_address", self.pickup_address)?,
            delivery_address: required("delivery_address", self.delivery_address)?,
            estimated_delivery_time: self.estimated_delivery_time,
            notes: optional(self.notes),
        })
    }
}

pub(crate) struct ValidDelivery {
    pub order_id: Uuid,
    pub pickup_address: String,
    pub delivery_address: String,
    pub estimated_delivery_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignDriverCommand {
    pub driver_id: Option<String>,
}

impl AssignDriverCommand {
    pub fn new(driver_id: impl Into<String>) -> Self {
        Self {
            driver_id: Some(driver_id.into()),
        }
    }

    pub(crate) fn validate(self) -> AppResult<String> {
        required("driver_id", self.driver_id)
    }
}

// =========================================================================
// Payments
// =========================================================================

/// Command to create a payment for an existing order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePaymentCommand {
    pub order_id: Option<String>,
    pub user_id: Option<String>,
    /// Amount (as string for precise decimal)
    pub amount: Option<String>,
    pub payment_method: Option<String>,
    /// Defaults to USD
    pub currency: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl CreatePaymentCommand {
    pub fn new(
        order_id: Uuid,
        user_id: impl Into<String>,
        amount: impl Into<String>,
        payment_method: impl Into<String>,
    ) -> Self {
        Self {
            order_id: Some(order_id.to_string()),
            user_id: Some(user_id.into()),
            amount: Some(amount.into()),
            payment_method: Some(payment_method.into()),
            currency: None,
            metadata: None,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub(crate) fn validate(self) -> AppResult<ValidPayment> {
        let order_id = required_id("order_id", self.order_id)?;
        let user_id = required("user_id", self.user_id)?;
        let amount = required_amount("amount", self.amount)?;
        let payment_method = required("payment_method", self.payment_method)?;
        let currency = match optional(self.currency) {
            Some(code) => code
                .parse::<Currency>()
                .map_err(|e| AppError::validation(e.to_string()))?,
            None => Currency::default(),
        };

        Ok(ValidPayment {
            order_id,
            user_id,
            amount,
            currency,
            payment_method,
            metadata: self.metadata.filter(|m| !m.is_null()),
        })
    }
}

pub(crate) struct ValidPayment {
    pub order_id: Uuid,
    pub user_id: String,
    pub amount: Amount,
    pub currency: Currency,
    pub payment_method: String,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletePaymentCommand {
    pub transaction_ref: Option<String>,
}

impl CompletePaymentCommand {
    pub(crate) fn validate(self) -> Option<String> {
        optional(self.transaction_ref)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefundPaymentCommand {
    pub amount: Option<String>,
    pub reason: Option<String>,
}

impl RefundPaymentCommand {
    pub fn new(amount: impl Into<String>) -> Self {
        Self {
            amount: Some(amount.into()),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub(crate) fn validate(self) -> AppResult<(Amount, Option<String>)> {
        Ok((
            required_amount("amount", self.amount)?,
            optional(self.reason),
        ))
    }
}

// =========================================================================
// Restaurants
// =========================================================================

/// Command to register a restaurant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRestaurantCommand {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub logo: Option<String>,
    pub description: Option<String>,
}

impl CreateRestaurantCommand {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        phone: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            address: Some(address.into()),
            phone: Some(phone.into()),
            email: Some(email.into()),
            logo: None,
            description: None,
        }
    }

    pub fn with_logo(mut self, logo: impl Into<String>) -> Self {
        self.logo = Some(logo.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub(crate) fn validate(self) -> AppResult<ValidRestaurant> {
        Ok(ValidRestaurant {
            name: required("name", self.name)?,
            address: required("address", self.address)?,
            phone: required("phone", self.phone)?,
            email: email(self.email)?,
            logo: optional(self.logo),
            description: optional(self.description),
        })
    }
}

pub(crate) struct ValidRestaurant {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub logo: Option<String>,
    pub description: Option<String>,
}

/// Partial update of restaurant details; absent fields stay unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRestaurantCommand {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub logo: Option<String>,
    pub description: Option<String>,
}

impl UpdateRestaurantCommand {
    pub(crate) fn validate(self) -> AppResult<RestaurantChanges> {
        let email = match self.email {
            Some(value) => Some(email(Some(value))?),
            None => None,
        };

        let changes = RestaurantChanges {
            name: optional(self.name),
            address: optional(self.address),
            phone: optional(self.phone),
            email,
            logo: optional(self.logo),
            description: optional(self.description),
        };

        if changes.is_empty() {
            return Err(AppError::validation("at least one field must be provided"));
        }
        Ok(changes)
    }
}

// =========================================================================
// Command response envelope
// =========================================================================

/// Result envelope returned to command callers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl<T> CommandResponse<T> {
    pub fn ok(entity: T) -> Self {
        Self {
            success: true,
            entity: Some(entity),
            message: None,
            error_code: None,
        }
    }

    pub fn failure(error: &AppError) -> Self {
        Self {
            success: false,
            entity: None,
            message: Some(error.to_string()),
            error_code: Some(error.error_code().to_string()),
        }
    }

    pub fn from_result(result: AppResult<T>) -> Self {
        match result {
            Ok(entity) => Self::ok(entity),
            Err(e) => Self::failure(&e),
        }
    }
}
