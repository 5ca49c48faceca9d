//! Command Service
//!
//! The single entry point command callers use. Each method validates,
//! runs the matching handler and returns the post-append entity.

use uuid::Uuid;

use crate::aggregate::{Delivery, Order, Payment, Restaurant};
use crate::domain::CommandContext;
use crate::error::AppResult;
use crate::event_store::AggregateRepository;

use super::{
    AddOrderItemsCommand, AssignDriverCommand, CommandExecutor, CompletePaymentCommand,
    CreateDeliveryCommand, CreateOrderCommand, CreatePaymentCommand, CreateRestaurantCommand,
    DeliveryHandler, OrderHandler, PaymentHandler, ReasonCommand, RefundPaymentCommand,
    RestaurantHandler, UpdateRestaurantCommand,
};

#[derive(Clone)]
pub struct CommandService {
    orders: OrderHandler,
    deliveries: DeliveryHandler,
    payments: PaymentHandler,
    restaurants: RestaurantHandler,
}

impl CommandService {
    pub fn new(repository: AggregateRepository, max_attempts: u32) -> Self {
        let executor = CommandExecutor::new(repository).with_max_attempts(max_attempts);
        Self {
            orders: OrderHandler::new(executor.clone()),
            deliveries: DeliveryHandler::new(executor.clone()),
            payments: PaymentHandler::new(executor.clone()),
            restaurants: RestaurantHandler::new(executor),
        }
    }

    // Orders

    pub async fn create_order(
        &self,
        command: CreateOrderCommand,
        context: &CommandContext,
    ) -> AppResult<Order> {
        self.orders.create(command, context).await
    }

    pub async fn add_order_items(
        &self,
        order_id: Uuid,
        command: AddOrderItemsCommand,
        context: &CommandContext,
    ) -> AppResult<Order> {
        self.orders.add_items(order_id, command, context).await
    }

    pub async fn confirm_order(&self, order_id: Uuid, context: &CommandContext) -> AppResult<Order> {
        self.orders.confirm(order_id, context).await
    }

    pub async fn start_preparing_order(
        &self,
        order_id: Uuid,
        context: &CommandContext,
    ) -> AppResult<Order> {
        self.orders.start_preparing(order_id, context).await
    }

    pub async fn mark_order_ready(
        &self,
        order_id: Uuid,
        context: &CommandContext,
    ) -> AppResult<Order> {
        self.orders.mark_ready(order_id, context).await
    }

    pub async fn dispatch_order(
        &self,
        order_id: Uuid,
        context: &CommandContext,
    ) -> AppResult<Order> {
        self.orders.dispatch(order_id, context).await
    }

    pub async fn mark_order_delivered(
        &self,
        order_id: Uuid,
        context: &CommandContext,
    ) -> AppResult<Order> {
        self.orders.mark_delivered(order_id, context).await
    }

    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        command: ReasonCommand,
        context: &CommandContext,
    ) -> AppResult<Order> {
        self.orders.cancel(order_id, command, context).await
    }

    // Deliveries

    pub async fn create_delivery(
        &self,
        command: CreateDeliveryCommand,
        context: &CommandContext,
    ) -> AppResult<Delivery> {
        self.deliveries.create(command, context).await
    }

    pub async fn assign_driver(
        &self,
        delivery_id: Uuid,
        command: AssignDriverCommand,
        context: &CommandContext,
    ) -> AppResult<Delivery> {
        self.deliveries
            .assign_driver(delivery_id, command, context)
            .await
    }

    pub async fn mark_delivery_picked_up(
        &self,
        delivery_id: Uuid,
        context: &CommandContext,
    ) -> AppResult<Delivery> {
        self.deliveries.mark_picked_up(delivery_id, context).await
    }

    pub async fn complete_delivery(
        &self,
        delivery_id: Uuid,
        context: &CommandContext,
    ) -> AppResult<Delivery> {
        self.deliveries.complete(delivery_id, context).await
    }

    pub async fn fail_delivery(
        &self,
        delivery_id: Uuid,
        command: ReasonCommand,
        context: &CommandContext,
    ) -> AppResult<Delivery> {
        self.deliveries.fail(delivery_id, command, context).await
    }

    pub async fn cancel_delivery(
        &self,
        delivery_id: Uuid,
        command: ReasonCommand,
        context: &CommandContext,
    ) -> AppResult<Delivery> {
        self.deliveries.cancel(delivery_id, command, context).await
    }

    // Payments

    pub async fn create_payment(
        &self,
        command: CreatePaymentCommand,
        context: &CommandContext,
    ) -> AppResult<Payment> {
        self.payments.create(command, context).await
    }

    pub async fn complete_payment(
        &self,
        payment_id: Uuid,
        command: CompletePaymentCommand,
        context: &CommandContext,
    ) -> AppResult<Payment> {
        self.payments.complete(payment_id, command, context).await
    }

    pub async fn fail_payment(
        &self,
        payment_id: Uuid,
        command: ReasonCommand,
        context: &CommandContext,
    ) -> AppResult<Payment> {
        self.payments.fail(payment_id, command, context).await
    }

    pub async fn refund_payment(
        &self,
        payment_id: Uuid,
        command: RefundPaymentCommand,
        context: &CommandContext,
    ) -> AppResult<Payment> {
        self.payments.refund(payment_id, command, context).await
    }

    // Restaurants

    pub async fn create_restaurant(
        &self,
        command: CreateRestaurantCommand,
        context: &CommandContext,
    ) -> AppResult<Restaurant> {
        self.restaurants.create(command, context).await
    }

    pub async fn update_restaurant_details(
        &self,
        restaurant_id: Uuid,
        command: UpdateRestaurantCommand,
        context: &CommandContext,
    ) -> AppResult<Restaurant> {
        self.restaurants
            .update_details(restaurant_id, command, context)
            .await
    }

    pub async fn open_restaurant(
        &self,
        restaurant_id: Uuid,
        context: &CommandContext,
    ) -> AppResult<Restaurant> {
        self.restaurants.open(restaurant_id, context).await
    }

    pub async fn close_restaurant(
        &self,
        restaurant_id: Uuid,
        context: &CommandContext,
    ) -> AppResult<Restaurant> {
        self.restaurants.close(restaurant_id, context).await
    }

    pub async fn deactivate_restaurant(
        &self,
        restaurant_id: Uuid,
        command: ReasonCommand,
        context: &CommandContext,
    ) -> AppResult<Restaurant> {
        self.restaurants
            .deactivate(restaurant_id, command, context)
            .await
    }
}
