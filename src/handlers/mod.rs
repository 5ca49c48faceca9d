//! Command Handlers module
//!
//! One handler per aggregate. Each validates input, runs the aggregate's
//! `decide` through the shared retrying executor and returns the folded
//! entity.

mod commands;
mod delivery_handler;
mod executor;
mod order_handler;
mod payment_handler;
mod restaurant_handler;
mod service;

#[cfg(test)]
mod tests;

pub use commands::*;
pub use delivery_handler::DeliveryHandler;
pub use executor::{CommandExecutor, DEFAULT_MAX_ATTEMPTS};
pub use order_handler::OrderHandler;
pub use payment_handler::PaymentHandler;
pub use restaurant_handler::RestaurantHandler;
pub use service::CommandService;
