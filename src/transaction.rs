//! This file defines the `Transaction` type and the API routes for
//! creating, listing, filtering, updating and deleting transactions.
//!
//! Transactions are the source of truth for budgets: every mutation that
//! can change a category's expense total triggers a best-effort
//! recalculation of that category's plan through the
//! [budget](crate::budget) module.

use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::Response,
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Deserializer, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    AppState, DatabaseId, Error, UserId, budget,
    category::get_category,
    owner::{OwnerQuery, require_owner},
    response,
};

/// Whether a transaction adds to or draws from the user's money.
///
/// Only expense transactions count against a plan's remaining amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money received.
    Income,
    /// Money spent.
    Expense,
}

impl TransactionType {
    /// The string stored in the database and used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(Error::InvalidTransactionType(other.to_string())),
        }
    }
}

/// A single income or expense entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: DatabaseId,

    /// The amount of money received or spent.
    pub amount: f64,

    /// A free-form note about the transaction.
    pub description: String,

    /// The date the transaction happened on.
    pub date: Date,

    /// Whether this is income or an expense.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,

    /// The ID of the category this transaction belongs to.
    pub category_id: DatabaseId,

    /// The ID of the owning user.
    pub user_id: UserId,

    /// When the transaction was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// The name of the transaction's category, or `None` if the category
    /// has been deleted.
    pub category_name: Option<String>,
}

/// The request body for creating a transaction.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionData {
    /// The amount of money. Required.
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    pub amount: Option<f64>,
    /// Income or expense. Required.
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    /// The category to record against. Required.
    pub category_id: Option<DatabaseId>,
    /// The date the transaction happened on. Required.
    pub date: Option<Date>,
    /// An optional free-form note.
    pub description: Option<String>,
}

/// The request body for updating a transaction. All fields optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransactionData {
    /// A new amount.
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    pub amount: Option<f64>,
    /// A new type.
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    /// A new category, which must also belong to the caller.
    pub category_id: Option<DatabaseId>,
    /// A new date.
    pub date: Option<Date>,
    /// A new note.
    pub description: Option<String>,
}

/// The query parameters for filtering transactions by date.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeQuery {
    /// The authenticated owner's user ID.
    pub user_id: Option<UserId>,
    /// The first date of the range, inclusive. Required.
    pub start_date: Option<Date>,
    /// The last date of the range, inclusive. Required.
    pub end_date: Option<Date>,
}

/// Deserialize an amount that may arrive as a JSON number or as a
/// string-encoded decimal such as `"100000"` or `"99.5"`.
pub(crate) fn deserialize_optional_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MaybeAmount {
        Number(f64),
        Text(String),
    }

    match Option::<MaybeAmount>::deserialize(deserializer)? {
        None => Ok(None),
        Some(MaybeAmount::Number(number)) => Ok(Some(number)),
        Some(MaybeAmount::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid amount: {text:?}"))),
    }
}

/// A route handler for recording a new transaction.
///
/// The transaction's category must exist and belong to the caller.
/// Recording an expense refreshes the category's plan.
pub async fn create_transaction_endpoint(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
    Json(body): Json<CreateTransactionData>,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;
    let (Some(amount), Some(transaction_type), Some(category_id), Some(date)) = (
        body.amount,
        body.transaction_type,
        body.category_id,
        body.date,
    ) else {
        return Err(Error::MissingFields("Amount, type, category and date"));
    };
    let description = body.description.unwrap_or_default();

    let connection = state.connection()?;
    get_category(category_id, user_id, &connection)?;
    let transaction = insert_transaction(
        amount,
        &description,
        date,
        transaction_type,
        category_id,
        user_id,
        &connection,
    )?;

    if transaction_type == TransactionType::Expense {
        budget::recalculate_best_effort(user_id, category_id, &connection);
    }

    Ok(response::created("Transaction added", transaction))
}

/// A route handler for listing the caller's transactions, newest first.
pub async fn get_transactions_endpoint(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;

    let connection = state.connection()?;
    let transactions = get_transactions(user_id, &connection)?;

    Ok(response::success(transactions))
}

/// A route handler for listing transactions within an inclusive date
/// range.
pub async fn get_transactions_by_date_range_endpoint(
    State(state): State<AppState>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Response, Error> {
    let user_id = query.user_id.ok_or(Error::MissingUserId)?;
    let (Some(start_date), Some(end_date)) = (query.start_date, query.end_date) else {
        return Err(Error::MissingFields("Start date and end date"));
    };

    let connection = state.connection()?;
    let transactions = get_transactions_by_date_range(user_id, start_date, end_date, &connection)?;

    Ok(response::success(transactions))
}

/// A route handler for fetching a single transaction.
pub async fn get_transaction_endpoint(
    Path(transaction_id): Path<DatabaseId>,
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;

    let connection = state.connection()?;
    let transaction = get_transaction(transaction_id, user_id, &connection)?;

    Ok(response::success(transaction))
}

/// A route handler for updating a transaction.
///
/// Moving an expense between categories refreshes the plans of both the
/// old and the new category.
pub async fn update_transaction_endpoint(
    Path(transaction_id): Path<DatabaseId>,
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
    Json(body): Json<UpdateTransactionData>,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;

    let connection = state.connection()?;
    let transaction = update_transaction(transaction_id, user_id, &body, &connection)?;

    Ok(response::success_with_message(
        "Transaction updated",
        transaction,
    ))
}

/// A route handler for deleting a transaction.
///
/// Deleting an expense refreshes the category's plan.
pub async fn delete_transaction_endpoint(
    Path(transaction_id): Path<DatabaseId>,
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;

    let connection = state.connection()?;
    delete_transaction(transaction_id, user_id, &connection)?;

    Ok(response::success_message("Transaction deleted"))
}

/// Insert a transaction row.
///
/// This does not trigger recalculation; callers that record expenses are
/// expected to refresh the category's plan afterwards.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn insert_transaction(
    amount: f64,
    description: &str,
    date: Date,
    transaction_type: TransactionType,
    category_id: DatabaseId,
    user_id: UserId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let created_at = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO \"transaction\" (amount, description, date, type, category_id, user_id, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        (
            amount,
            description,
            date,
            transaction_type.as_str(),
            category_id,
            user_id,
            created_at,
        ),
    )?;

    let id = connection.last_insert_rowid();

    get_transaction(id, user_id, connection)
}

const TRANSACTION_COLUMNS: &str =
    "t.id, t.amount, t.description, t.date, t.type, t.category_id, t.user_id, t.created_at, c.name";

/// Retrieve the transaction with `transaction_id` owned by `user_id`.
///
/// # Errors
/// This function will return an [Error::TransactionNotFound] if no such
/// transaction exists for this owner, or an error if there is an SQL
/// error.
pub fn get_transaction(
    transaction_id: DatabaseId,
    user_id: UserId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" t
            LEFT JOIN category c ON c.id = t.category_id AND c.user_id = t.user_id
            WHERE t.id = :id AND t.user_id = :user_id;"
        ))?
        .query_row(&[(":id", &transaction_id), (":user_id", &user_id)], map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::TransactionNotFound,
            error => error.into(),
        })
}

/// Retrieve the transactions owned by `user_id`, newest date first.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_transactions(
    user_id: UserId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" t
            LEFT JOIN category c ON c.id = t.category_id AND c.user_id = t.user_id
            WHERE t.user_id = :user_id
            ORDER BY t.date DESC, t.id DESC;"
        ))?
        .query_map(&[(":user_id", &user_id)], map_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Retrieve the transactions owned by `user_id` dated within
/// `[start_date, end_date]`, newest date first. Both bounds are
/// inclusive.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_transactions_by_date_range(
    user_id: UserId,
    start_date: Date,
    end_date: Date,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" t
            LEFT JOIN category c ON c.id = t.category_id AND c.user_id = t.user_id
            WHERE t.user_id = ?1 AND t.date BETWEEN ?2 AND ?3
            ORDER BY t.date DESC, t.id DESC;"
        ))?
        .query_map((user_id, start_date, end_date), map_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

/// Update a transaction; absent fields keep their current value.
///
/// A new category must also belong to the caller. Afterwards, the plans
/// of every category whose expense total may have changed are refreshed
/// on a best-effort basis: the old category if an expense moved out of
/// it, and the current category if it holds an expense now or lost one
/// through a type change.
///
/// # Errors
/// This function will return an [Error::TransactionNotFound] if no such
/// transaction exists for this owner, an [Error::CategoryNotFound] if
/// the new category does not exist for this owner, or an error if there
/// is an SQL error.
pub fn update_transaction(
    transaction_id: DatabaseId,
    user_id: UserId,
    changes: &UpdateTransactionData,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let before = get_transaction(transaction_id, user_id, connection)?;

    if let Some(new_category_id) = changes.category_id {
        if new_category_id != before.category_id {
            get_category(new_category_id, user_id, connection)?;
        }
    }

    connection.execute(
        "UPDATE \"transaction\" SET
            amount = COALESCE(?1, amount),
            description = COALESCE(?2, description),
            date = COALESCE(?3, date),
            type = COALESCE(?4, type),
            category_id = COALESCE(?5, category_id)
        WHERE id = ?6 AND user_id = ?7",
        (
            changes.amount,
            changes.description.as_deref(),
            changes.date,
            changes.transaction_type.map(|kind| kind.as_str()),
            changes.category_id,
            transaction_id,
            user_id,
        ),
    )?;

    let after = get_transaction(transaction_id, user_id, connection)?;

    let was_expense = before.transaction_type == TransactionType::Expense;
    let is_expense = after.transaction_type == TransactionType::Expense;

    if was_expense && before.category_id != after.category_id {
        budget::recalculate_best_effort(user_id, before.category_id, connection);
    }
    if is_expense || was_expense {
        budget::recalculate_best_effort(user_id, after.category_id, connection);
    }

    Ok(after)
}

/// Delete the transaction with `transaction_id` owned by `user_id`,
/// refreshing the category's plan if it was an expense.
///
/// # Errors
/// This function will return an [Error::TransactionNotFound] if no such
/// transaction exists for this owner, or an error if there is an SQL
/// error.
pub fn delete_transaction(
    transaction_id: DatabaseId,
    user_id: UserId,
    connection: &Connection,
) -> Result<(), Error> {
    let transaction = get_transaction(transaction_id, user_id, connection)?;

    connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (transaction_id, user_id),
    )?;

    if transaction.transaction_type == TransactionType::Expense {
        budget::recalculate_best_effort(user_id, transaction.category_id, connection);
    }

    Ok(())
}

pub(crate) fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY,
            amount REAL NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            date TEXT NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
            category_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_transaction_user ON \"transaction\"(user_id);
        CREATE INDEX IF NOT EXISTS idx_transaction_user_category
            ON \"transaction\"(user_id, category_id);",
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let raw_type: String = row.get(4)?;
    let transaction_type = raw_type.parse().map_err(|error: Error| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(error))
    })?;

    Ok(Transaction {
        id: row.get(0)?,
        amount: row.get(1)?,
        description: row.get(2)?,
        date: row.get(3)?,
        transaction_type,
        category_id: row.get(5)?,
        user_id: row.get(6)?,
        created_at: row.get(7)?,
        category_name: row.get(8)?,
    })
}
