//! This file defines the `User` type and the API routes for
//! registration, login, profile management and account deletion.
//!
//! Registration seeds the new user's categories from a system-wide
//! template table. Account deletion cascades over every owned
//! transaction, plan and category inside one SQLite transaction so that
//! either all rows are removed or none are.

use axum::{
    Json,
    extract::{Multipart, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, Row, Transaction as SqlTransaction};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error, UserId,
    category::{CategoryName, create_category},
    owner::{OwnerQuery, require_owner},
    response,
};

/// The category names cloned into every newly registered account.
pub const DEFAULT_CATEGORY_TEMPLATES: [&str; 5] = [
    "Makanan",
    "Transportasi",
    "Hiburan",
    "Kesehatan",
    "Pendidikan",
];

/// A registered user. Owns categories, plans and transactions.
///
/// The password hash and profile photo are stored on the same row but
/// never serialized into profile responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The ID of the user.
    pub id: UserId,

    /// The user's display name.
    pub name: String,

    /// The user's email address, unique across all users.
    pub email: String,

    /// The user's gender.
    pub gender: String,
}

/// The request body for registering a new user.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterData {
    /// The display name. Required.
    pub name: Option<String>,
    /// The email address. Required, must not already be registered.
    pub email: Option<String>,
    /// The gender. Required.
    pub gender: Option<String>,
    /// The plaintext password. Required; only its bcrypt hash is stored.
    pub password: Option<String>,
}

/// The request body for logging in.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginData {
    /// The email address. Required.
    pub email: Option<String>,
    /// The plaintext password. Required.
    pub password: Option<String>,
}

/// The request body for updating a profile. All fields optional.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileData {
    /// A new display name.
    pub name: Option<String>,
    /// A new gender.
    pub gender: Option<String>,
}

/// A route handler for registering a new user.
///
/// On success the new account is seeded with a copy of every default
/// category template.
pub async fn register_endpoint(
    State(state): State<AppState>,
    Json(body): Json<RegisterData>,
) -> Result<Response, Error> {
    let (Some(name), Some(email), Some(gender), Some(password)) =
        (body.name, body.email, body.gender, body.password)
    else {
        return Err(Error::MissingFields("Name, email, gender and password"));
    };

    let password_hash = hash_password(&password)?;

    let connection = state.connection()?;
    let user = register_user(&name, &email, &gender, &password_hash, &connection)?;

    Ok(response::created("Registration successful", user))
}

/// A route handler for logging in with email and password.
pub async fn login_endpoint(
    State(state): State<AppState>,
    Json(body): Json<LoginData>,
) -> Result<Response, Error> {
    let (Some(email), Some(password)) = (body.email, body.password) else {
        return Err(Error::MissingFields("Email and password"));
    };

    let connection = state.connection()?;
    let (user, password_hash) = get_user_by_email(&email, &connection)?;

    let matches = bcrypt::verify(&password, &password_hash)
        .map_err(|error| Error::HashingError(error.to_string()))?;

    if !matches {
        return Err(Error::InvalidCredentials);
    }

    Ok(response::success_with_message("Login successful", user))
}

/// A route handler for fetching the caller's profile.
pub async fn get_profile_endpoint(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;

    let connection = state.connection()?;
    let user = get_user(user_id, &connection)?;

    Ok(response::success(user))
}

/// A route handler for updating the caller's name and/or gender.
pub async fn update_profile_endpoint(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
    Json(body): Json<ProfileData>,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;

    let connection = state.connection()?;
    update_profile(user_id, body.name.as_deref(), body.gender.as_deref(), &connection)?;
    let user = get_user(user_id, &connection)?;

    Ok(response::success_with_message("Profile updated", user))
}

/// A route handler for uploading the caller's profile photo.
///
/// The photo is supplied as the `photo` file field of a multipart form
/// and stored as a raw blob on the user row.
pub async fn update_photo_endpoint(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
    mut multipart: Multipart,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;

    let mut photo = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| Error::MultipartError(error.to_string()))?
    {
        if field.name() == Some("photo") {
            let bytes = field
                .bytes()
                .await
                .map_err(|error| Error::MultipartError(error.to_string()))?;
            photo = Some(bytes.to_vec());
        }
    }

    let Some(photo) = photo else {
        return Err(Error::MissingPhoto);
    };

    let connection = state.connection()?;
    set_photo(user_id, &photo, &connection)?;

    Ok(response::success_message("Profile photo updated"))
}

/// A route handler for fetching the caller's profile photo.
///
/// Returns the raw image bytes, not a JSON envelope.
pub async fn get_photo_endpoint(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;

    let connection = state.connection()?;
    let photo = get_photo(user_id, &connection)?;

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], photo).into_response())
}

/// A route handler for logging out.
///
/// Identity is propagated out-of-band, so there is no server-side
/// session to tear down; the response is a plain acknowledgement.
pub async fn logout_endpoint() -> Response {
    response::success_message("Logout successful")
}

/// A route handler for deleting the caller's account and all owned data.
pub async fn delete_account_endpoint(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Response, Error> {
    let user_id = require_owner(&query)?;

    let connection = state.connection()?;
    delete_account(user_id, &connection)?;

    Ok(response::success_message(
        "Account and all related data deleted",
    ))
}

/// Hash a plaintext password with bcrypt.
///
/// # Errors
/// This function will return an [Error::HashingError] if the hashing
/// library fails.
pub fn hash_password(password: &str) -> Result<String, Error> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|error| Error::HashingError(error.to_string()))
}

/// Create a user and clone the default category templates into their
/// category set, atomically.
///
/// # Errors
/// This function will return an [Error::EmailTaken] if the email is
/// already registered, or an error if there is an SQL error.
pub fn register_user(
    name: &str,
    email: &str,
    gender: &str,
    password_hash: &str,
    connection: &Connection,
) -> Result<User, Error> {
    let email_taken: bool = connection
        .prepare("SELECT EXISTS (SELECT 1 FROM user WHERE email = ?1);")?
        .query_row([email], |row| row.get(0))?;

    if email_taken {
        return Err(Error::EmailTaken);
    }

    let sql_transaction = SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Deferred)?;

    let user = insert_user(name, email, gender, password_hash, &sql_transaction)?;

    let templates: Vec<String> = sql_transaction
        .prepare("SELECT name FROM default_category ORDER BY id;")?
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    for template in templates {
        create_category(CategoryName::new_unchecked(&template), user.id, &sql_transaction)?;
    }

    sql_transaction.commit()?;

    Ok(user)
}

/// Insert a user row.
///
/// # Errors
/// This function will return an [Error::EmailTaken] if the email is
/// already registered, or an error if there is an SQL error.
pub fn insert_user(
    name: &str,
    email: &str,
    gender: &str,
    password_hash: &str,
    connection: &Connection,
) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (name, email, gender, password_hash) VALUES (?1, ?2, ?3, ?4);",
        (name, email, gender, password_hash),
    )?;

    let id = connection.last_insert_rowid();

    Ok(User {
        id,
        name: name.to_string(),
        email: email.to_string(),
        gender: gender.to_string(),
    })
}

/// Retrieve the user with `user_id`.
///
/// # Errors
/// This function will return an [Error::UserNotFound] if no such user
/// exists, or an error if there is an SQL error.
pub fn get_user(user_id: UserId, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, name, email, gender FROM user WHERE id = :id;")?
        .query_row(&[(":id", &user_id)], map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UserNotFound,
            error => error.into(),
        })
}

/// Retrieve a user and their password hash by email.
///
/// # Errors
/// This function will return an [Error::UserNotFound] if no user has
/// this email, or an error if there is an SQL error.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<(User, String), Error> {
    connection
        .prepare("SELECT id, name, email, gender, password_hash FROM user WHERE email = :email;")?
        .query_row(&[(":email", &email)], |row| {
            let user = map_row(row)?;
            let password_hash: String = row.get(4)?;
            Ok((user, password_hash))
        })
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UserNotFound,
            error => error.into(),
        })
}

/// Update the user's name and/or gender; absent fields keep their
/// current value.
///
/// # Errors
/// This function will return an [Error::UserNotFound] if no such user
/// exists, or an error if there is an SQL error.
pub fn update_profile(
    user_id: UserId,
    name: Option<&str>,
    gender: Option<&str>,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET
            name = COALESCE(?1, name),
            gender = COALESCE(?2, gender)
        WHERE id = ?3",
        (name, gender, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::UserNotFound);
    }

    Ok(())
}

/// Store `photo` as the user's profile photo.
///
/// # Errors
/// This function will return an [Error::UserNotFound] if no such user
/// exists, or an error if there is an SQL error.
pub fn set_photo(user_id: UserId, photo: &[u8], connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET photo = ?1 WHERE id = ?2",
        (photo, user_id),
    )?;

    if rows_affected == 0 {
        return Err(Error::UserNotFound);
    }

    Ok(())
}

/// Retrieve the user's profile photo bytes.
///
/// # Errors
/// This function will return an [Error::UserNotFound] if no such user
/// exists, an [Error::PhotoNotFound] if the user has not uploaded a
/// photo, or an error if there is an SQL error.
pub fn get_photo(user_id: UserId, connection: &Connection) -> Result<Vec<u8>, Error> {
    let photo: Option<Vec<u8>> = connection
        .prepare("SELECT photo FROM user WHERE id = :id;")?
        .query_row(&[(":id", &user_id)], |row| row.get(0))
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UserNotFound,
            error => Error::from(error),
        })?;

    photo.ok_or(Error::PhotoNotFound)
}

/// Delete the user and every transaction, plan and category they own.
///
/// The four deletions run inside one SQLite transaction in
/// child-before-parent order; if any step fails none of the rows are
/// removed.
///
/// # Errors
/// This function will return an [Error::UserNotFound] if no such user
/// exists, or an [Error::DeleteAccountFailed] carrying the underlying
/// message if the cascade fails.
pub fn delete_account(user_id: UserId, connection: &Connection) -> Result<(), Error> {
    let sql_transaction = SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Immediate)
        .map_err(|error| Error::DeleteAccountFailed(error.to_string()))?;

    let cascade = (|| {
        sql_transaction.execute("DELETE FROM \"transaction\" WHERE user_id = ?1", [user_id])?;
        sql_transaction.execute("DELETE FROM plan WHERE user_id = ?1", [user_id])?;
        sql_transaction.execute("DELETE FROM category WHERE user_id = ?1", [user_id])?;
        sql_transaction.execute("DELETE FROM user WHERE id = ?1", [user_id])
    })();

    match cascade {
        // Dropping the uncommitted transaction rolls back the cascade.
        Ok(0) => Err(Error::UserNotFound),
        Ok(_) => sql_transaction
            .commit()
            .map_err(|error| Error::DeleteAccountFailed(error.to_string())),
        Err(error) => Err(Error::DeleteAccountFailed(error.to_string())),
    }
}

pub(crate) fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            gender TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            photo BLOB
        );",
        (),
    )?;

    Ok(())
}

pub(crate) fn create_default_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS default_category (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );",
        (),
    )?;

    Ok(())
}

pub(crate) fn seed_default_categories(connection: &Connection) -> Result<(), rusqlite::Error> {
    for name in DEFAULT_CATEGORY_TEMPLATES {
        connection.execute(
            "INSERT OR IGNORE INTO default_category (name) VALUES (?1);",
            [name],
        )?;
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        gender: row.get(3)?,
    })
}


#[cfg(test)]
mod profile_tests {
    use rusqlite::Connection;

    use crate::{Error, db::initialize};

    use super::{get_photo, get_user, insert_user, set_photo, update_profile};

    fn get_test_db_and_user() -> (Connection, i64) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();

        let user = insert_user(
            "Siti",
            "siti@example.com",
            "female",
            "not-a-real-hash",
            &connection,
        )
        .unwrap();

        (connection, user.id)
    }

    #[test]
    fn update_profile_keeps_absent_fields() {
        let (connection, user_id) = get_test_db_and_user();

        update_profile(user_id, Some("Siti Rahma"), None, &connection).unwrap();

        let user = get_user(user_id, &connection).unwrap();
        assert_eq!(user.name, "Siti Rahma");
        assert_eq!(user.gender, "female");
    }

    #[test]
    fn update_profile_fails_on_unknown_user() {
        let (connection, user_id) = get_test_db_and_user();

        let result = update_profile(user_id + 999, Some("Nobody"), None, &connection);

        assert_eq!(result, Err(Error::UserNotFound));
    }

    #[test]
    fn get_photo_before_upload_returns_not_found() {
        let (connection, user_id) = get_test_db_and_user();

        let result = get_photo(user_id, &connection);

        assert_eq!(result, Err(Error::PhotoNotFound));
    }

    #[test]
    fn set_and_get_photo_round_trips() {
        let (connection, user_id) = get_test_db_and_user();
        let photo = vec![0xFF, 0xD8, 0xFF, 0xE0];

        set_photo(user_id, &photo, &connection).unwrap();

        assert_eq!(get_photo(user_id, &connection), Ok(photo));
    }
}

#[cfg(test)]
mod delete_account_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        category::{CategoryName, create_category},
        db::initialize,
        plan::insert_plan,
        transaction::{TransactionType, insert_transaction},
    };

    use super::{delete_account, insert_user};

    fn count(connection: &Connection, table: &str, user_id: i64) -> i64 {
        let column = if table == "user" { "id" } else { "user_id" };
        connection
            .query_row(
                &format!("SELECT COUNT(*) FROM \"{table}\" WHERE {column} = ?1"),
                [user_id],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn delete_account_removes_all_owned_rows() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = insert_user(
            "Budi",
            "budi@example.com",
            "male",
            "not-a-real-hash",
            &connection,
        )
        .unwrap();

        let mut category_ids = Vec::new();
        for name in ["Food", "Transport", "Fun"] {
            let category =
                create_category(CategoryName::new_unchecked(name), user.id, &connection).unwrap();
            category_ids.push(category.id);
        }
        insert_plan(category_ids[0], user.id, 100_000.0, 100_000.0, "", &connection).unwrap();
        let date = time::macros::date!(2025 - 01 - 15);
        for amount in [10_000.0, 20_000.0] {
            insert_transaction(
                amount,
                "",
                date,
                TransactionType::Expense,
                category_ids[0],
                user.id,
                &connection,
            )
            .unwrap();
        }

        delete_account(user.id, &connection).unwrap();

        assert_eq!(count(&connection, "transaction", user.id), 0);
        assert_eq!(count(&connection, "plan", user.id), 0);
        assert_eq!(count(&connection, "category", user.id), 0);
        assert_eq!(count(&connection, "user", user.id), 0);
    }

    #[test]
    fn delete_account_fails_on_unknown_user() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = insert_user(
            "Budi",
            "budi@example.com",
            "male",
            "not-a-real-hash",
            &connection,
        )
        .unwrap();
        create_category(CategoryName::new_unchecked("Food"), user.id, &connection).unwrap();

        let result = delete_account(user.id + 999, &connection);

        // The unknown user's cascade must not remove another user's rows.
        assert_eq!(result, Err(Error::UserNotFound));
        assert_eq!(count(&connection, "category", user.id), 1);
        assert_eq!(count(&connection, "user", user.id), 1);
    }
}
