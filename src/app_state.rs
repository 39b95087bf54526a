//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::{Error, db::initialize};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables
    /// for the domain models and seeding the default category templates.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_connection: Connection) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
        })
    }

    /// Acquire the database lock.
    ///
    /// # Errors
    /// Returns [Error::DatabaseLockError] if the lock is poisoned.
    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)
    }
}
