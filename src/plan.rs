//! This file defines the `Plan` type and the API routes for creating,
//! listing, updating and deleting spending plans.
//!
//! A plan sets a spending target for one category and a user may have at
//! most one plan per category. The stored `remaining_amount` column is a
//! cache maintained by the [budget](crate::budget) module; reads compute
//! the remaining amount directly from the transaction table so a stale
//! cache is never served.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::Response,
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, DatabaseId, Error, UserId, budget,
    category::get_category,
    owner::{OwnerQuery, require_owner},
    response,
    transaction::deserialize_optional_amount,
};

/// A spending target for one of a user's categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// The ID of the plan.
    pub id: DatabaseId,

    /// The ID of the category this plan budgets for.
    pub category_id: DatabaseId,

    /// The ID of the owning user.
    pub user_id: UserId,

    /// The target amount to spend at most.
    pub amount: f64,

    /// How much of `amount` is left after the category's expenses.
    /// Never negative.
    pub remaining_amount: f64,

    /// A free-form note about the plan.
    pub description: String,

    /// When the plan was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// The name of the plan's category, or `None` if the category has
    /// been deleted.
    pub category_name: Option<String>,
}

/// The request body for creating a plan.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanData {
    /// The target amount. Required.
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    pub amount: Option<f64>,
    /// The category to budget for. Required.
    pub category_id: Option<DatabaseId>,
    /// An optional free-form note.
    pub description: Option<String>,
}

/// The request body for updating a plan. All fields optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlanData {
    /// A new target amount.
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    pub amount: Option<f64>,
    /// A new note.
    pub description: Option<String>,
}

/// A route handler for creating a new plan.
///
/// The plan's category must exist and belong to the caller, and must not
/// already have a plan.
pub async fn create_plan_endpoint(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
    Json(body): Json<CreatePlanData>,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;
    let (Some(amount), Some(category_id)) = (body.amount, body.category_id) else {
        return Err(Error::MissingFields("Amount and category"));
    };
    let description = body.description.unwrap_or_default();

    let connection = state.connection()?;
    get_category(category_id, user_id, &connection)?;
    let plan = create_plan(category_id, user_id, amount, &description, &connection)?;

    Ok(response::created("Plan added", plan))
}

/// A route handler for listing the caller's plans, newest first.
pub async fn get_plans_endpoint(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;

    let connection = state.connection()?;
    let plans = get_plans(user_id, &connection)?;

    Ok(response::success(plans))
}

/// A route handler for fetching a single plan.
pub async fn get_plan_endpoint(
    Path(plan_id): Path<DatabaseId>,
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;

    let connection = state.connection()?;
    let plan = get_plan(plan_id, user_id, &connection)?;

    Ok(response::success(plan))
}

/// A route handler for updating a plan's amount and/or description.
pub async fn update_plan_endpoint(
    Path(plan_id): Path<DatabaseId>,
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
    Json(body): Json<UpdatePlanData>,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;

    let connection = state.connection()?;
    update_plan(
        plan_id,
        user_id,
        body.amount,
        body.description.as_deref(),
        &connection,
    )?;
    let plan = get_plan(plan_id, user_id, &connection)?;

    Ok(response::success_with_message("Plan updated", plan))
}

/// A route handler for deleting a plan.
pub async fn delete_plan_endpoint(
    Path(plan_id): Path<DatabaseId>,
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;

    let connection = state.connection()?;
    delete_plan(plan_id, user_id, &connection)?;

    Ok(response::success_message("Plan deleted"))
}

/// Create a plan for `(user_id, category_id)`.
///
/// The initial remaining amount accounts for expense transactions that
/// already exist in the category.
///
/// # Errors
/// This function will return an [Error::DuplicatePlan] if the user
/// already has a plan for this category, or an error if there is an SQL
/// error.
pub fn create_plan(
    category_id: DatabaseId,
    user_id: UserId,
    amount: f64,
    description: &str,
    connection: &Connection,
) -> Result<Plan, Error> {
    let exists: bool = connection
        .prepare("SELECT EXISTS (SELECT 1 FROM plan WHERE category_id = ?1 AND user_id = ?2);")?
        .query_row((category_id, user_id), |row| row.get(0))?;

    if exists {
        return Err(Error::DuplicatePlan);
    }

    let expense_total = budget::expense_total(user_id, category_id, connection)?;
    let remaining = budget::remaining_amount(amount, expense_total);

    insert_plan(category_id, user_id, amount, remaining, description, connection)
}

/// Insert a plan row with an explicit remaining amount.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn insert_plan(
    category_id: DatabaseId,
    user_id: UserId,
    amount: f64,
    remaining_amount: f64,
    description: &str,
    connection: &Connection,
) -> Result<Plan, Error> {
    let created_at = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO plan (category_id, user_id, amount, remaining_amount, description, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        (
            category_id,
            user_id,
            amount,
            remaining_amount,
            description,
            created_at,
        ),
    )?;

    let id = connection.last_insert_rowid();

    get_plan(id, user_id, connection)
}

/// `MAX(a - b, 0.0)` over a correlated expense sum. Keep this in sync
/// with [budget::remaining_amount].
const PLAN_COLUMNS: &str = "p.id, p.category_id, p.user_id, p.amount,
    MAX(
        p.amount - COALESCE(
            (SELECT SUM(t.amount) FROM \"transaction\" t
                WHERE t.user_id = p.user_id
                    AND t.category_id = p.category_id
                    AND t.type = 'expense'),
            0.0),
        0.0),
    p.description, p.created_at, c.name";

/// Retrieve the plan with `plan_id` owned by `user_id`.
///
/// The remaining amount is computed from the transaction table, not read
/// from the cached column.
///
/// # Errors
/// This function will return an [Error::PlanNotFound] if no such plan
/// exists for this owner, or an error if there is an SQL error.
pub fn get_plan(
    plan_id: DatabaseId,
    user_id: UserId,
    connection: &Connection,
) -> Result<Plan, Error> {
    connection
        .prepare(&format!(
            "SELECT {PLAN_COLUMNS} FROM plan p
            LEFT JOIN category c ON c.id = p.category_id AND c.user_id = p.user_id
            WHERE p.id = :id AND p.user_id = :user_id;"
        ))?
        .query_row(&[(":id", &plan_id), (":user_id", &user_id)], map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::PlanNotFound,
            error => error.into(),
        })
}

/// Retrieve the plans owned by `user_id`, newest first.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_plans(user_id: UserId, connection: &Connection) -> Result<Vec<Plan>, Error> {
    connection
        .prepare(&format!(
            "SELECT {PLAN_COLUMNS} FROM plan p
            LEFT JOIN category c ON c.id = p.category_id AND c.user_id = p.user_id
            WHERE p.user_id = :user_id
            ORDER BY p.created_at DESC, p.id DESC;"
        ))?
        .query_map(&[(":user_id", &user_id)], map_row)?
        .map(|maybe_plan| maybe_plan.map_err(|error| error.into()))
        .collect()
}

/// Update the plan's amount and/or description; absent fields keep their
/// current value. The cached remaining amount is refreshed afterwards on
/// a best-effort basis.
///
/// # Errors
/// This function will return an [Error::PlanNotFound] if no such plan
/// exists for this owner, or an error if there is an SQL error.
pub fn update_plan(
    plan_id: DatabaseId,
    user_id: UserId,
    amount: Option<f64>,
    description: Option<&str>,
    connection: &Connection,
) -> Result<(), Error> {
    let plan = get_plan(plan_id, user_id, connection)?;

    connection.execute(
        "UPDATE plan SET
            amount = COALESCE(?1, amount),
            description = COALESCE(?2, description)
        WHERE id = ?3 AND user_id = ?4",
        (amount, description, plan_id, user_id),
    )?;

    budget::recalculate_best_effort(user_id, plan.category_id, connection);

    Ok(())
}

/// Delete the plan with `plan_id` owned by `user_id`.
///
/// # Errors
/// This function will return an [Error::PlanNotFound] if no such plan
/// exists for this owner, or an error if there is an SQL error.
pub fn delete_plan(
    plan_id: DatabaseId,
    user_id: UserId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM plan WHERE id = ?1 AND user_id = ?2",
        (plan_id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::PlanNotFound);
    }

    Ok(())
}

pub(crate) fn create_plan_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS plan (
            id INTEGER PRIMARY KEY,
            category_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            amount REAL NOT NULL,
            remaining_amount REAL NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_plan_user ON plan(user_id);
        CREATE INDEX IF NOT EXISTS idx_plan_user_category ON plan(user_id, category_id);",
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Plan, rusqlite::Error> {
    Ok(Plan {
        id: row.get(0)?,
        category_id: row.get(1)?,
        user_id: row.get(2)?,
        amount: row.get(3)?,
        remaining_amount: row.get(4)?,
        description: row.get(5)?,
        created_at: row.get(6)?,
        category_name: row.get(7)?,
    })
}
