//! Payment Aggregate
//!
//! Tracks a single charge against an order. The gateway call itself lives
//! outside this crate; only its outcome is recorded here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Amount, AggregateType, Currency, DomainError, PaymentEvent};

use super::{require_created, require_new, Aggregate};

/// Payment status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    /// Partially or fully refunded
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone)]
pub enum PaymentCommand {
    Create {
        payment_id: Uuid,
        order_id: Uuid,
        user_id: String,
        amount: Amount,
        currency: Currency,
        payment_method: String,
        metadata: Option<serde_json::Value>,
    },
    Complete {
        transaction_ref: Option<String>,
    },
    Fail {
        reason: String,
    },
    Refund {
        amount: Amount,
        reason: Option<String>,
    },
}

/// Payment Aggregate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    id: Uuid,
    order_id: Uuid,
    user_id: String,
    amount: Decimal,
    currency: String,
    payment_method: String,
    metadata: Option<serde_json::Value>,
    status: PaymentStatus,
    transaction_ref: Option<String>,
    failure_reason: Option<String>,
    refunded_amount: Decimal,
    version: i64,
    created_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn order_id(&self) -> Uuid {
        self.order_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn payment_method(&self) -> &str {
        &self.payment_method
    }

    pub fn metadata(&self) -> Option<&serde_json::Value> {
        self.metadata.as_ref()
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn refunded_amount(&self) -> Decimal {
        self.refunded_amount
    }

    pub fn refundable_amount(&self) -> Decimal {
        self.amount - self.refunded_amount
    }

    pub fn transaction_ref(&self) -> Option<&str> {
        self.transaction_ref.as_deref()
    }

    fn require_status(
        &self,
        allowed: &[PaymentStatus],
        action: &'static str,
    ) -> Result<(), DomainError> {
        require_created(self)?;
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(DomainError::invalid_transition(
                "Payment",
                self.status.as_str(),
                action,
            ))
        }
    }
}

impl Aggregate for Payment {
    type Event = PaymentEvent;
    type Command = PaymentCommand;

    const AGGREGATE_TYPE: AggregateType = AggregateType::Payment;

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
            PaymentEvent::PaymentCreated {
                payment_id,
                order_id,
                user_id,
                amount,
                currency,
                payment_method,
                metadata,
                created_at,
            } => {
                self.id = *payment_id;
                self.order_id = *order_id;
                self.user_id = user_id.clone();
                self.amount = *amount;
                self.currency = currency.clone();
                self.payment_method = payment_method.clone();
                self.metadata = metadata.clone();
                self.status = PaymentStatus::Pending;
                self.created_at = Some(*created_at);
            }
            PaymentEvent::PaymentCompleted {
                transaction_ref,
                completed_at,
            } => {
                self.status = PaymentStatus::Completed;
                self.transaction_ref = transaction_ref.clone();
                self.completed_at = Some(*completed_at);
            }
            PaymentEvent::PaymentFailed { reason, .. } => {
                self.status = PaymentStatus::Failed;
                self.failure_reason = Some(reason.clone());
            }
            PaymentEvent::PaymentRefunded { amount, .. } => {
                self.refunded_amount = self.refunded_amount.saturating_add(*amount);
                self.status = PaymentStatus::Refunded;
            }
            PaymentEvent::Unknown => {}
        }

        self.version += 1;
        self
    }

    fn decide(&self, command: Self::Command) -> Result<Vec<Self::Event>, DomainError> {
        let now = Utc::now();

        match command {
            PaymentCommand::Create {
                payment_id,
                order_id,
                user_id,
                amount,
                currency,
                payment_method,
                metadata,
            } => {
                require_new(self)?;
                Ok(vec![PaymentEvent::PaymentCreated {
                    payment_id,
                    order_id,
                    user_id,
                    amount: amount.value(),
                    currency: currency.to_string(),
                    payment_method,
                    metadata,
                    created_at: now,
                }])
            }
            PaymentCommand::Complete { transaction_ref } => {
                self.require_status(&[PaymentStatus::Pending], "complete")?;
                Ok(vec![PaymentEvent::PaymentCompleted {
                    transaction_ref,
                    completed_at: now,
                }])
            }
            PaymentCommand::Fail { reason } => {
                self.require_status(&[PaymentStatus::Pending], "fail")?;
                Ok(vec![PaymentEvent::PaymentFailed {
                    reason,
                    failed_at: now,
                }])
            }
            PaymentCommand::Refund { amount, reason } => {
                self.require_status(
                    &[PaymentStatus::Completed, PaymentStatus::Refunded],
                    "refund",
                )?;
                if amount.value() > self.refundable_amount() {
                    return Err(DomainError::InvalidAmount(format!(
                        "refund of {} exceeds refundable {}",
                        amount,
                        self.refundable_amount()
                    )));
                }
                Ok(vec![PaymentEvent::PaymentRefunded {
                    amount: amount.value(),
                    reason,
                    refunded_at: now,
                }])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn created_payment(amount: Decimal) -> Payment {
        let events = Payment::default()
            .decide(PaymentCommand::Create {
                payment_id: Uuid::new_v4(),
                order_id: Uuid::new_v4(),
                user_id: "u1".to_string(),
                amount: Amount::new(amount).unwrap(),
                currency: Currency::default(),
                payment_method: "card".to_string(),
                metadata: None,
            })
            .unwrap();
        Payment::default().fold(&events)
    }

    fn run(payment: Payment, command: PaymentCommand) -> Result<Payment, DomainError> {
        let events = payment.decide(command)?;
        Ok(payment.fold(&events))
    }

    #[test]
    fn test_create_payment_defaults() {
        let payment = created_payment(dec!(25.40));
        assert_eq!(payment.status(), PaymentStatus::Pending);
        assert_eq!(payment.amount(), dec!(25.40));
        assert_eq!(payment.currency(), "USD");
        assert_eq!(payment.payment_method(), "card");
    }

    #[test]
    fn test_refund_requires_completion() {
        let payment = created_payment(dec!(10));
        let refund = PaymentCommand::Refund {
            amount: Amount::new(dec!(5)).unwrap(),
            reason: None,
        };
        assert!(matches!(
            payment.decide(refund),
            Err(DomainError::InvalidTransition { status: "pending", .. })
        ));
    }

    #[test]
    fn test_partial_refunds_accumulate() {
        let payment = run(
            created_payment(dec!(30)),
            PaymentCommand::Complete {
                transaction_ref: Some("txn_123".to_string()),
            },
        )
        .unwrap();
        assert_eq!(payment.transaction_ref(), Some("txn_123"));

        let payment = run(
            payment,
            PaymentCommand::Refund {
                amount: Amount::new(dec!(10)).unwrap(),
                reason: Some("missing side".to_string()),
            },
        )
        .unwrap();
        let payment = run(
            payment,
            PaymentCommand::Refund {
                amount: Amount::new(dec!(20)).unwrap(),
                reason: None,
            },
        )
        .unwrap();

        assert_eq!(payment.status(), PaymentStatus::Refunded);
        assert_eq!(payment.refunded_amount(), dec!(30));
        assert_eq!(payment.refundable_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_refund_over_paid_amount_rejected() {
        let payment = run(
            created_payment(dec!(12)),
            PaymentCommand::Complete {
                transaction_ref: None,
            },
        )
        .unwrap();
        let result = payment.decide(PaymentCommand::Refund {
            amount: Amount::new(dec!(12.01)).unwrap(),
            reason: None,
        });
        assert!(matches!(result, Err(DomainError::InvalidAmount(_))));
    }

    #[test]
    fn test_failed_payment_cannot_complete() {
        let payment = run(
            created_payment(dec!(8)),
            PaymentCommand::Fail {
                reason: "card declined".to_string(),
            },
        )
        .unwrap();
        assert!(payment
            .decide(PaymentCommand::Complete {
                transaction_ref: None
            })
            .is_err());
    }
}
