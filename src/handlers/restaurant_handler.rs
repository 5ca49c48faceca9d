//! Restaurant Handler

use uuid::Uuid;

use crate::aggregate::{Aggregate, Restaurant, RestaurantCommand};
use crate::domain::CommandContext;
use crate::error::AppResult;

use super::{CommandExecutor, CreateRestaurantCommand, ReasonCommand, UpdateRestaurantCommand};

/// Handler for restaurant commands
#[derive(Clone)]
pub struct RestaurantHandler {
    executor: CommandExecutor,
}

impl RestaurantHandler {
    pub fn new(executor: CommandExecutor) -> Self {
        Self { executor }
    }

    /// Register a restaurant; it starts open
    pub async fn create(
        &self,
        command: CreateRestaurantCommand,
        context: &CommandContext,
    ) -> AppResult<Restaurant> {
        let restaurant = command.validate()?;
        let restaurant_id = Uuid::new_v4();

        let created = self
            .executor
            .create::<Restaurant>(
                restaurant_id,
                RestaurantCommand::Create {
                    restaurant_id,
                    name: restaurant.name,
                    address: restaurant.address,
                    phone: restaurant.phone,
                    email: restaurant.email,
                    logo: restaurant.logo,
                    description: restaurant.description,
                },
                context,
            )
            .await?;

        tracing::info!(
            restaurant_id = %restaurant_id,
            name = created.name(),
            "Restaurant created"
        );
        Ok(created)
    }

    pub async fn update_details(
        &self,
        restaurant_id: Uuid,
        command: UpdateRestaurantCommand,
        context: &CommandContext,
    ) -> AppResult<Restaurant> {
        let changes = command.validate()?;
        self.transition(
            restaurant_id,
            RestaurantCommand::UpdateDetails { changes },
            context,
        )
        .await
    }

    pub async fn open(
        &self,
        restaurant_id: Uuid,
        context: &CommandContext,
    ) -> AppResult<Restaurant> {
        self.transition(restaurant_id, RestaurantCommand::Open, context)
            .await
    }

    pub async fn close(
        &self,
        restaurant_id: Uuid,
        context: &CommandContext,
    ) -> AppResult<Restaurant> {
        self.transition(restaurant_id, RestaurantCommand::Close, context)
            .await
    }

    pub async fn deactivate(
        &self,
        restaurant_id: Uuid,
        command: ReasonCommand,
        context: &CommandContext,
    ) -> AppResult<Restaurant> {
        let reason = command.validate()?;
        self.transition(
            restaurant_id,
            RestaurantCommand::Deactivate { reason },
            context,
        )
        .await
    }

    async fn transition(
        &self,
        restaurant_id: Uuid,
        command: RestaurantCommand,
        context: &CommandContext,
    ) -> AppResult<Restaurant> {
        let restaurant = self
            .executor
            .update::<Restaurant>(restaurant_id, command, context)
            .await?;

        tracing::info!(
            restaurant_id = %restaurant_id,
            status = restaurant.status().as_str(),
            version = restaurant.version(),
            "Restaurant updated"
        );
        Ok(restaurant)
    }
}
