//! Database initialization for the domain models.

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{Error, category, plan, transaction, user};

/// Create the application's tables and seed the default category
/// templates.
///
/// All DDL runs inside a single exclusive transaction so a partially
/// initialized database is never left behind.
///
/// # Errors
/// Returns an error if a table cannot be created or the templates cannot
/// be seeded.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let sql_transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    user::create_user_table(&sql_transaction)?;
    user::create_default_category_table(&sql_transaction)?;
    user::seed_default_categories(&sql_transaction)?;
    category::create_category_table(&sql_transaction)?;
    plan::create_plan_table(&sql_transaction)?;
    transaction::create_transaction_table(&sql_transaction)?;

    sql_transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod initialize_tests {
    use rusqlite::Connection;

    use super::initialize;

    #[test]
    fn initialize_succeeds_on_empty_database() {
        let connection = Connection::open_in_memory().unwrap();

        assert!(initialize(&connection).is_ok());
    }

    #[test]
    fn initialize_is_idempotent() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();

        assert!(initialize(&connection).is_ok());
    }

    #[test]
    fn initialize_seeds_default_categories_once() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();
        initialize(&connection).unwrap();

        let count: i64 = connection
            .query_row("SELECT COUNT(*) FROM default_category", [], |row| {
                row.get(0)
            })
            .unwrap();

        assert_eq!(count, 5);
    }
}
