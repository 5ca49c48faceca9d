//! API Routes
//!
//! HTTP endpoint definitions. Commands answer with the `CommandResponse`
//! envelope; queries read the projected views.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AggregateType, CommandContext};
use crate::error::{AppError, AppResult};
use crate::handlers::{
    AddOrderItemsCommand, AssignDriverCommand, CommandResponse, CompletePaymentCommand,
    CreateDeliveryCommand, CreateOrderCommand, CreatePaymentCommand, CreateRestaurantCommand,
    ReasonCommand, RefundPaymentCommand, UpdateRestaurantCommand,
};
use crate::projection::ViewRow;

use super::AppState;

type Created<T> = AppResult<(StatusCode, Json<CommandResponse<T>>)>;
type Updated<T> = AppResult<Json<CommandResponse<T>>>;

fn created<T>(entity: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(CommandResponse::ok(entity))))
}

fn updated<T>(entity: T) -> Updated<T> {
    Ok(Json(CommandResponse::ok(entity)))
}

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        // Orders
        .route("/orders", post(create_order))
        .route("/orders/:id/items", post(add_order_items))
        .route("/orders/:id/confirm", post(confirm_order))
        .route("/orders/:id/start-preparing", post(start_preparing_order))
        .route("/orders/:id/ready", post(mark_order_ready))
        .route("/orders/:id/dispatch", post(dispatch_order))
        .route("/orders/:id/deliver", post(mark_order_delivered))
        .route("/orders/:id/cancel", post(cancel_order))
        // Deliveries
        .route("/deliveries", post(create_delivery))
        .route("/deliveries/:id/assign", post(assign_driver))
        .route("/deliveries/:id/pickup", post(mark_delivery_picked_up))
        .route("/deliveries/:id/complete", post(complete_delivery))
        .route("/deliveries/:id/fail", post(fail_delivery))
        .route("/deliveries/:id/cancel", post(cancel_delivery))
        // Payments
        .route("/payments", post(create_payment))
        .route("/payments/:id/complete", post(complete_payment))
        .route("/payments/:id/fail", post(fail_payment))
        .route("/payments/:id/refund", post(refund_payment))
        // Restaurants
        .route("/restaurants", post(create_restaurant))
        .route("/restaurants/:id", patch(update_restaurant))
        .route("/restaurants/:id/open", post(open_restaurant))
        .route("/restaurants/:id/close", post(close_restaurant))
        .route("/restaurants/:id/deactivate", post(deactivate_restaurant))
        // Read models
        .route("/views/:collection", get(list_views))
        .route("/views/:collection/:id", get(get_view))
}

// =========================================================================
// Orders
// =========================================================================

async fn create_order(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Json(command): Json<CreateOrderCommand>,
) -> Created<crate::aggregate::Order> {
    created(state.commands.create_order(command, &context).await?)
}

async fn add_order_items(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
    Json(command): Json<AddOrderItemsCommand>,
) -> Updated<crate::aggregate::Order> {
    updated(state.commands.add_order_items(id, command, &context).await?)
}

async fn confirm_order(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
) -> Updated<crate::aggregate::Order> {
    updated(state.commands.confirm_order(id, &context).await?)
}

async fn start_preparing_order(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
) -> Updated<crate::aggregate::Order> {
    updated(state.commands.start_preparing_order(id, &context).await?)
}

async fn mark_order_ready(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
) -> Updated<crate::aggregate::Order> {
    updated(state.commands.mark_order_ready(id, &context).await?)
}

async fn dispatch_order(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
) -> Updated<crate::aggregate::Order> {
    updated(state.commands.dispatch_order(id, &context).await?)
}

async fn mark_order_delivered(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
) -> Updated<crate::aggregate::Order> {
    updated(state.commands.mark_order_delivered(id, &context).await?)
}

async fn cancel_order(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
    Json(command): Json<ReasonCommand>,
) -> Updated<crate::aggregate::Order> {
    updated(state.commands.cancel_order(id, command, &context).await?)
}

// =========================================================================
// Deliveries
// =========================================================================

async fn create_delivery(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Json(command): Json<CreateDeliveryCommand>,
) -> Created<crate::aggregate::Delivery> {
    created(state.commands.create_delivery(command, &context).await?)
}

async fn assign_driver(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
    Json(command): Json<AssignDriverCommand>,
) -> Updated<crate::aggregate::Delivery> {
    updated(state.commands.assign_driver(id, command, &context).await?)
}

async fn mark_delivery_picked_up(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
) -> Updated<crate::aggregate::Delivery> {
    updated(state.commands.mark_delivery_picked_up(id, &context).await?)
}

async fn complete_delivery(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
) -> Updated<crate::aggregate::Delivery> {
    updated(state.commands.complete_delivery(id, &context).await?)
}

async fn fail_delivery(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
    Json(command): Json<ReasonCommand>,
) -> Updated<crate::aggregate::Delivery> {
    updated(state.commands.fail_delivery(id, command, &context).await?)
}

async fn cancel_delivery(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
    Json(command): Json<ReasonCommand>,
) -> Updated<crate::aggregate::Delivery> {
    updated(state.commands.cancel_delivery(id, command, &context).await?)
}

// =========================================================================
// Payments
// =========================================================================

async fn create_payment(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Json(command): Json<CreatePaymentCommand>,
) -> Created<crate::aggregate::Payment> {
    created(state.commands.create_payment(command, &context).await?)
}

async fn complete_payment(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
    Json(command): Json<CompletePaymentCommand>,
) -> Updated<crate::aggregate::Payment> {
    updated(state.commands.complete_payment(id, command, &context).await?)
}

async fn fail_payment(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
    Json(command): Json<ReasonCommand>,
) -> Updated<crate::aggregate::Payment> {
    updated(state.commands.fail_payment(id, command, &context).await?)
}

async fn refund_payment(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
    Json(command): Json<RefundPaymentCommand>,
) -> Updated<crate::aggregate::Payment> {
    updated(state.commands.refund_payment(id, command, &context).await?)
}

// =========================================================================
// Restaurants
// =========================================================================

async fn create_restaurant(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Json(command): Json<CreateRestaurantCommand>,
) -> Created<crate::aggregate::Restaurant> {
    created(state.commands.create_restaurant(command, &context).await?)
}

async fn update_restaurant(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
    Json(command): Json<UpdateRestaurantCommand>,
) -> Updated<crate::aggregate::Restaurant> {
    updated(
        state
            .commands
            .update_restaurant_details(id, command, &context)
            .await?,
    )
}

async fn open_restaurant(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
) -> Updated<crate::aggregate::Restaurant> {
    updated(state.commands.open_restaurant(id, &context).await?)
}

async fn close_restaurant(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
) -> Updated<crate::aggregate::Restaurant> {
    updated(state.commands.close_restaurant(id, &context).await?)
}

async fn deactivate_restaurant(
    State(state): State<AppState>,
    Extension(context): Extension<CommandContext>,
    Path(id): Path<Uuid>,
    Json(command): Json<ReasonCommand>,
) -> Updated<crate::aggregate::Restaurant> {
    updated(
        state
            .commands
            .deactivate_restaurant(id, command, &context)
            .await?,
    )
}

// =========================================================================
// Read models
// =========================================================================

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListViewsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListViewsResponse {
    pub items: Vec<ViewRow>,
    pub count: usize,
}

fn collection(name: &str) -> AppResult<AggregateType> {
    match name {
        "orders" => Ok(AggregateType::Order),
        "deliveries" => Ok(AggregateType::Delivery),
        "payments" => Ok(AggregateType::Payment),
        "restaurants" => Ok(AggregateType::Restaurant),
        other => Err(AppError::validation(format!("unknown collection '{other}'"))),
    }
}

async fn get_view(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, Uuid)>,
) -> AppResult<Json<ViewRow>> {
    let aggregate_type = collection(&name)?;

    state
        .read_models
        .load_row(aggregate_type, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound {
            aggregate_type,
            aggregate_id: id,
        })
}

async fn list_views(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ListViewsQuery>,
) -> AppResult<Json<ListViewsResponse>> {
    let aggregate_type = collection(&name)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let items = state
        .read_models
        .list_by_status(aggregate_type, query.status.as_deref(), limit)
        .await?;

    Ok(Json(ListViewsResponse {
        count: items.len(),
        items,
    }))
}
