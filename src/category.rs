//! This file defines the `Category` type and the API routes for
//! creating, listing, renaming and deleting categories.
//!
//! A category groups transactions and may carry at most one spending
//! plan. Category names are unique within one owner's scope.

use std::fmt::Display;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::Response,
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, DatabaseId, Error, UserId,
    owner::{OwnerQuery, require_owner},
    response,
};

/// The name of a category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyCategoryName] if `name`
    /// is an empty string.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyCategoryName)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A category for expenses and income, e.g., 'Food', 'Transport'.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// The ID of the category.
    pub id: DatabaseId,

    /// The name of the category.
    pub name: CategoryName,

    /// The ID of the owning user.
    pub user_id: UserId,
}

/// The request body for creating or renaming a category.
#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryData {
    /// The category name. Required.
    pub name: Option<String>,
}

/// A route handler for creating a new category.
pub async fn create_category_endpoint(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
    Json(body): Json<CategoryData>,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;
    let name = CategoryName::new(body.name.as_deref().unwrap_or_default())
        .map_err(|_| Error::MissingFields("Category name"))?;

    let connection = state.connection()?;
    let category = create_category(name, user_id, &connection)?;

    Ok(response::created("Category added", category))
}

/// A route handler for listing the caller's categories, sorted by name.
pub async fn get_categories_endpoint(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;

    let connection = state.connection()?;
    let categories = get_categories(user_id, &connection)?;

    Ok(response::success(categories))
}

/// A route handler for renaming a category.
pub async fn update_category_endpoint(
    Path(category_id): Path<DatabaseId>,
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
    Json(body): Json<CategoryData>,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;
    let name = CategoryName::new(body.name.as_deref().unwrap_or_default())
        .map_err(|_| Error::MissingFields("Category name"))?;

    let connection = state.connection()?;
    update_category(category_id, user_id, &name, &connection)?;
    let category = get_category(category_id, user_id, &connection)?;

    Ok(response::success_with_message("Category updated", category))
}

/// A route handler for deleting a category.
///
/// Deleting a category does not cascade to its plan or transactions;
/// recalculation handles the orphaned plan gracefully.
pub async fn delete_category_endpoint(
    Path(category_id): Path<DatabaseId>,
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;

    let connection = state.connection()?;
    delete_category(category_id, user_id, &connection)?;

    Ok(response::success_message("Category deleted"))
}

/// Create a category in the database.
///
/// # Errors
/// This function will return an [Error::DuplicateCategoryName] if the
/// user already has a category with `name`, or an error if there is an
/// SQL error.
pub fn create_category(
    name: CategoryName,
    user_id: UserId,
    connection: &Connection,
) -> Result<Category, Error> {
    let exists: bool = connection
        .prepare("SELECT EXISTS (SELECT 1 FROM category WHERE name = ?1 AND user_id = ?2);")?
        .query_row((name.as_ref(), user_id), |row| row.get(0))?;

    if exists {
        return Err(Error::DuplicateCategoryName);
    }

    connection.execute(
        "INSERT INTO category (name, user_id) VALUES (?1, ?2);",
        (name.as_ref(), user_id),
    )?;

    let id = connection.last_insert_rowid();

    Ok(Category { id, name, user_id })
}

/// Retrieve the category with `category_id` owned by `user_id`.
///
/// # Errors
/// This function will return an [Error::CategoryNotFound] if no such
/// category exists for this owner, or an error if there is an SQL error.
pub fn get_category(
    category_id: DatabaseId,
    user_id: UserId,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare("SELECT id, name, user_id FROM category WHERE id = :id AND user_id = :user_id;")?
        .query_row(&[(":id", &category_id), (":user_id", &user_id)], map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::CategoryNotFound,
            error => error.into(),
        })
}

/// Retrieve the categories owned by `user_id`, sorted by name.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_categories(user_id: UserId, connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare("SELECT id, name, user_id FROM category WHERE user_id = :user_id ORDER BY name ASC;")?
        .query_map(&[(":user_id", &user_id)], map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Rename the category with `category_id` owned by `user_id`.
///
/// # Errors
/// This function will return an [Error::CategoryNotFound] if no such
/// category exists for this owner, or an error if there is an SQL error.
pub fn update_category(
    category_id: DatabaseId,
    user_id: UserId,
    new_name: &CategoryName,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE category SET name = ?1 WHERE id = ?2 AND user_id = ?3",
        (new_name.as_ref(), category_id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::CategoryNotFound);
    }

    Ok(())
}

/// Delete the category with `category_id` owned by `user_id`.
///
/// # Errors
/// This function will return an [Error::CategoryNotFound] if no such
/// category exists for this owner, or an error if there is an SQL error.
pub fn delete_category(
    category_id: DatabaseId,
    user_id: UserId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM category WHERE id = ?1 AND user_id = ?2",
        (category_id, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::CategoryNotFound);
    }

    Ok(())
}

pub(crate) fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            user_id INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_category_user ON category(user_id);",
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_name: String = row.get(1)?;
    let name = CategoryName::new_unchecked(&raw_name);
    let user_id = row.get(2)?;

    Ok(Category { id, name, user_id })
}
