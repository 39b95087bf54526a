//! Dompet is a personal-finance bookkeeping backend.
//!
//! Users register, log income and expense transactions against their own
//! categories, and define per-category spending plans. A plan carries a
//! cached remaining amount that is kept in sync with the sum of expense
//! transactions in its category; see the [budget] module for the
//! recalculation rules.
//!
//! This library provides a JSON REST API over a SQLite database.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod app_state;
pub mod budget;
pub mod category;
mod db;
mod endpoints;
mod logging;
mod owner;
pub mod plan;
mod response;
mod routing;
pub mod transaction;
pub mod user;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use logging::logging_middleware;
pub use routing::build_router;

/// The integer primary key type used by every table.
pub type DatabaseId = i64;

/// The ID of a registered user. Every category, plan and transaction is
/// scoped to exactly one owner.
pub type UserId = i64;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The `user_id` query parameter is missing from the request.
    ///
    /// Every owner-scoped route requires the authenticated owner's ID to
    /// be supplied out-of-band as a query parameter.
    #[error("User ID is required")]
    MissingUserId,

    /// A required field was missing from the request body.
    ///
    /// The string lists the fields the client must supply.
    #[error("{0} must be provided")]
    MissingFields(&'static str),

    /// An empty string was used as a category name.
    #[error("Category name cannot be empty")]
    EmptyCategoryName,

    /// The user already has a category with the given name.
    #[error("Category already exists")]
    DuplicateCategoryName,

    /// The user already has a plan for the given category.
    #[error("A plan already exists for this category")]
    DuplicatePlan,

    /// The given email address is already registered.
    #[error("Email is already registered")]
    EmailTaken,

    /// The user provided an incorrect password.
    #[error("Incorrect password")]
    InvalidCredentials,

    /// A string other than "income" or "expense" was used as a
    /// transaction type.
    #[error("\"{0}\" is not a valid transaction type")]
    InvalidTransactionType(String),

    /// No user matches the given ID or email.
    #[error("User not found")]
    UserNotFound,

    /// No category owned by the caller matches the given ID.
    ///
    /// Also returned when the category exists but belongs to another
    /// user, so that other users' resources are never revealed.
    #[error("Category not found")]
    CategoryNotFound,

    /// No plan owned by the caller matches the given ID.
    #[error("Plan not found")]
    PlanNotFound,

    /// No transaction owned by the caller matches the given ID.
    #[error("Transaction not found")]
    TransactionNotFound,

    /// The user has not uploaded a profile photo.
    #[error("Profile photo not found")]
    PhotoNotFound,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    /// Route handlers should convert it to a resource-specific variant.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the
    /// server, never sent to the client.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The multipart form for the profile photo could not be parsed.
    #[error("Could not parse multipart form: {0}")]
    MultipartError(String),

    /// The multipart form did not contain a photo file field.
    #[error("A photo file is required")]
    MissingPhoto,

    /// The cascading account deletion failed and was rolled back.
    ///
    /// This is the one failure whose underlying message is echoed to the
    /// client.
    #[error("Failed to delete account: {0}")]
    DeleteAccountFailed(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.email") =>
            {
                Error::EmailTaken
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Error::MissingUserId
            | Error::MissingFields(_)
            | Error::EmptyCategoryName
            | Error::DuplicateCategoryName
            | Error::DuplicatePlan
            | Error::EmailTaken
            | Error::InvalidCredentials
            | Error::InvalidTransactionType(_)
            | Error::MultipartError(_)
            | Error::MissingPhoto => StatusCode::BAD_REQUEST,
            Error::UserNotFound
            | Error::CategoryNotFound
            | Error::PlanNotFound
            | Error::TransactionNotFound
            | Error::PhotoNotFound
            | Error::NotFound => StatusCode::NOT_FOUND,
            Error::DeleteAccountFailed(_)
            | Error::HashingError(_)
            | Error::SqlError(_)
            | Error::DatabaseLockError => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            // Internal detail must not leak to the client, except for a
            // failed account deletion which echoes the underlying message.
            Error::HashingError(_) | Error::SqlError(_) | Error::DatabaseLockError => {
                tracing::error!("An unexpected error occurred: {}", self);
                "An unexpected error occurred".to_string()
            }
            error => error.to_string(),
        };

        (
            status,
            Json(json!({
                "status": "error",
                "message": message,
            })),
        )
            .into_response()
    }
}
