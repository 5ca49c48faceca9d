//! Payment Handler
//!
//! Records payment outcomes reported by the gateway integration. No
//! gateway calls happen here.

use uuid::Uuid;

use crate::aggregate::{Aggregate, Order, Payment, PaymentCommand};
use crate::domain::CommandContext;
use crate::error::AppResult;

use super::{
    CommandExecutor, CompletePaymentCommand, CreatePaymentCommand, ReasonCommand,
    RefundPaymentCommand,
};

/// Handler for payment commands
#[derive(Clone)]
pub struct PaymentHandler {
    executor: CommandExecutor,
}

impl PaymentHandler {
    pub fn new(executor: CommandExecutor) -> Self {
        Self { executor }
    }

    /// Create a pending payment for an existing order
    pub async fn create(
        &self,
        command: CreatePaymentCommand,
        context: &CommandContext,
    ) -> AppResult<Payment> {
        let payment = command.validate()?;

        self.executor
            .require_exists::<Order>(payment.order_id)
            .await?;

        let payment_id = Uuid::new_v4();
        let created = self
            .executor
            .create::<Payment>(
                payment_id,
                PaymentCommand::Create {
                    payment_id,
                    order_id: payment.order_id,
                    user_id: payment.user_id,
                    amount: payment.amount,
                    currency: payment.currency,
                    payment_method: payment.payment_method,
                    metadata: payment.metadata,
                },
                context,
            )
            .await?;

        tracing::info!(
            payment_id = %payment_id,
            order_id = %created.order_id(),
            amount = %created.amount(),
            currency = created.currency(),
            "Payment created"
        );
        Ok(created)
    }

    pub async fn complete(
        &self,
        payment_id: Uuid,
        command: CompletePaymentCommand,
        context: &CommandContext,
    ) -> AppResult<Payment> {
        let transaction_ref = command.validate();
        self.transition(payment_id, PaymentCommand::Complete { transaction_ref }, context)
            .await
    }

    pub async fn fail(
        &self,
        payment_id: Uuid,
        command: ReasonCommand,
        context: &CommandContext,
    ) -> AppResult<Payment> {
        let reason = command.validate()?;
        self.transition(payment_id, PaymentCommand::Fail { reason }, context)
            .await
    }

    pub async fn refund(
        &self,
        payment_id: Uuid,
        command: RefundPaymentCommand,
        context: &CommandContext,
    ) -> AppResult<Payment> {
        let (amount, reason) = command.validate()?;
        self.transition(payment_id, PaymentCommand::Refund { amount, reason }, context)
            .await
    }

    async fn transition(
        &self,
        payment_id: Uuid,
        command: PaymentCommand,
        context: &CommandContext,
    ) -> AppResult<Payment> {
        let payment = self
            .executor
            .update::<Payment>(payment_id, command, context)
            .await?;

        tracing::info!(
            payment_id = %payment_id,
            status = payment.status().as_str(),
            version = payment.version(),
            "Payment updated"
        );
        Ok(payment)
    }
}
