//! Delivery Handler

use uuid::Uuid;

use crate::aggregate::{Aggregate, Delivery, DeliveryCommand, Order};
use crate::domain::CommandContext;
use crate::error::AppResult;

use super::{AssignDriverCommand, CommandExecutor, CreateDeliveryCommand, ReasonCommand};

/// Handler for delivery commands
#[derive(Clone)]
pub struct DeliveryHandler {
    executor: CommandExecutor,
}

impl DeliveryHandler {
    pub fn new(executor: CommandExecutor) -> Self {
        Self { executor }
    }

    /// Create a delivery for an existing order
    pub async fn create(
        &self,
        command: CreateDeliveryCommand,
        context: &CommandContext,
    ) -> AppResult<Delivery> {
        let delivery = command.validate()?;

        // The order stream must exist; its state is not otherwise consulted
        self.executor
            .require_exists::<Order>(delivery.order_id)
            .await?;

        let delivery_id = Uuid::new_v4();
        let created = self
            .executor
            .create::<Delivery>(
                delivery_id,
                DeliveryCommand::Create {
                    delivery_id,
                    order_id: delivery.order_id,
                    pickup_address: delivery.pickup_address,
                    delivery_address: delivery.delivery_address,
                    estimated_delivery_time: delivery.estimated_delivery_time,
                    notes: delivery.notes,
                },
                context,
            )
            .await?;

        tracing::info!(
            delivery_id = %delivery_id,
            order_id = %created.order_id(),
            "Delivery created"
        );
        Ok(created)
    }

    pub async fn assign_driver(
        &self,
        delivery_id: Uuid,
        command: AssignDriverCommand,
        context: &CommandContext,
    ) -> AppResult<Delivery> {
        let driver_id = command.validate()?;
        self.transition(delivery_id, DeliveryCommand::AssignDriver { driver_id }, context)
            .await
    }

    pub async fn mark_picked_up(
        &self,
        delivery_id: Uuid,
        context: &CommandContext,
    ) -> AppResult<Delivery> {
        self.transition(delivery_id, DeliveryCommand::PickUp, context)
            .await
    }

    pub async fn complete(
        &self,
        delivery_id: Uuid,
        context: &CommandContext,
    ) -> AppResult<Delivery> {
        self.transition(delivery_id, DeliveryCommand::Complete, context)
            .await
    }

    pub async fn fail(
        &self,
        delivery_id: Uuid,
        command: ReasonCommand,
        context: &CommandContext,
    ) -> AppResult<Delivery> {
        let reason = command.validate()?;
        self.transition(delivery_id, DeliveryCommand::Fail { reason }, context)
            .await
    }

    pub async fn cancel(
        &self,
        delivery_id: Uuid,
        command: ReasonCommand,
        context: &CommandContext,
    ) -> AppResult<Delivery> {
        let reason = command.validate()?;
        self.transition(delivery_id, DeliveryCommand::Cancel { reason }, context)
            .await
    }

    async fn transition(
        &self,
        delivery_id: Uuid,
        command: DeliveryCommand,
        context: &CommandContext,
    ) -> AppResult<Delivery> {
        let delivery = self
            .executor
            .update::<Delivery>(delivery_id, command, context)
            .await?;

        tracing::info!(
            delivery_id = %delivery_id,
            status = delivery.status().as_str(),
            version = delivery.version(),
            "Delivery updated"
        );
        Ok(delivery)
    }
}
