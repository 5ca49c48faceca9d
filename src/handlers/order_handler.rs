//! Order Handler
//!
//! Order placement and the kitchen/dispatch lifecycle.

use uuid::Uuid;

use crate::aggregate::{Aggregate, Order, OrderCommand};
use crate::domain::CommandContext;
use crate::error::AppResult;

use super::{AddOrderItemsCommand, CommandExecutor, CreateOrderCommand, ReasonCommand};

/// Handler for order commands
#[derive(Clone)]
pub struct OrderHandler {
    executor: CommandExecutor,
}

impl OrderHandler {
    pub fn new(executor: CommandExecutor) -> Self {
        Self { executor }
    }

    /// Place a new order; yields `OrderCreated` at version 1
    pub async fn create(
        &self,
        command: CreateOrderCommand,
        context: &CommandContext,
    ) -> AppResult<Order> {
        let order = command.validate()?;
        let order_id = Uuid::new_v4();

        let created = self
            .executor
            .create::<Order>(
                order_id,
                OrderCommand::Create {
                    order_id,
                    user_id: order.user_id,
                    restaurant_id: order.restaurant_id,
                    items: order.items,
                },
                context,
            )
            .await?;

        tracing::info!(
            order_id = %order_id,
            user_id = %created.user_id(),
            restaurant_id = %created.restaurant_id(),
            "Order created"
        );
        Ok(created)
    }

    pub async fn add_items(
        &self,
        order_id: Uuid,
        command: AddOrderItemsCommand,
        context: &CommandContext,
    ) -> AppResult<Order> {
        let items = command.validate()?;
        self.executor
            .update::<Order>(order_id, OrderCommand::AddItems { items }, context)
            .await
    }

    pub async fn confirm(&self, order_id: Uuid, context: &CommandContext) -> AppResult<Order> {
        self.transition(order_id, OrderCommand::Confirm, context).await
    }

    pub async fn start_preparing(
        &self,
        order_id: Uuid,
        context: &CommandContext,
    ) -> AppResult<Order> {
        self.transition(order_id, OrderCommand::StartPreparing, context)
            .await
    }

    pub async fn mark_ready(&self, order_id: Uuid, context: &CommandContext) -> AppResult<Order> {
        self.transition(order_id, OrderCommand::MarkReady, context).await
    }

    pub async fn dispatch(&self, order_id: Uuid, context: &CommandContext) -> AppResult<Order> {
        self.transition(order_id, OrderCommand::Dispatch, context).await
    }

    pub async fn mark_delivered(
        &self,
        order_id: Uuid,
        context: &CommandContext,
    ) -> AppResult<Order> {
        self.transition(order_id, OrderCommand::MarkDelivered, context)
            .await
    }

    pub async fn cancel(
        &self,
        order_id: Uuid,
        command: ReasonCommand,
        context: &CommandContext,
    ) -> AppResult<Order> {
        let reason = command.validate()?;
        self.transition(order_id, OrderCommand::Cancel { reason }, context)
            .await
    }

    async fn transition(
        &self,
        order_id: Uuid,
        command: OrderCommand,
        context: &CommandContext,
    ) -> AppResult<Order> {
        let order = self
            .executor
            .update::<Order>(order_id, command, context)
            .await?;

        tracing::info!(
            order_id = %order_id,
            status = order.status().as_str(),
            version = order.version(),
            "Order updated"
        );
        Ok(order)
    }
}
