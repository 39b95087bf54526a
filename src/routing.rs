//! Application router configuration wiring each endpoint to its handler.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::{
    AppState, endpoints,
    category::{
        create_category_endpoint, delete_category_endpoint, get_categories_endpoint,
        update_category_endpoint,
    },
    logging::logging_middleware,
    plan::{
        create_plan_endpoint, delete_plan_endpoint, get_plan_endpoint, get_plans_endpoint,
        update_plan_endpoint,
    },
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        get_transactions_by_date_range_endpoint, get_transactions_endpoint,
        update_transaction_endpoint,
    },
    user::{
        delete_account_endpoint, get_photo_endpoint, get_profile_endpoint, login_endpoint,
        logout_endpoint, register_endpoint, update_photo_endpoint, update_profile_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::ROOT, get(get_health))
        .route(endpoints::REGISTER, post(register_endpoint))
        .route(endpoints::LOGIN, post(login_endpoint))
        .route(endpoints::PROFILE, get(get_profile_endpoint))
        .route(endpoints::UPDATE_PROFILE, put(update_profile_endpoint))
        .route(
            endpoints::PROFILE_PHOTO,
            get(get_photo_endpoint).put(update_photo_endpoint),
        )
        .route(endpoints::LOGOUT, post(logout_endpoint))
        .route(endpoints::DELETE_ACCOUNT, delete(delete_account_endpoint))
        .route(
            endpoints::CATEGORIES,
            get(get_categories_endpoint).post(create_category_endpoint),
        )
        .route(
            endpoints::CATEGORY,
            put(update_category_endpoint).delete(delete_category_endpoint),
        )
        .route(
            endpoints::PLANS,
            get(get_plans_endpoint).post(create_plan_endpoint),
        )
        .route(
            endpoints::PLAN,
            get(get_plan_endpoint)
                .put(update_plan_endpoint)
                .delete(delete_plan_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS,
            get(get_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS_DATE_RANGE,
            get(get_transactions_by_date_range_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .put(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        )
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

/// The health check, confirming the server is up and serving requests.
async fn get_health() -> Response {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();

    Json(json!({
        "status": "ok",
        "message": "Service is running",
        "timestamp": timestamp,
    }))
    .into_response()
}

async fn get_404_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "status": "error",
            "message": "Endpoint not found",
        })),
    )
        .into_response()
}
