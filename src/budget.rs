//! The budget recalculator.
//!
//! A plan's `remaining_amount` is a denormalized cache of
//! `max(0, plan.amount - sum(expense transaction amounts))` for the
//! plan's category. The transactions are the source of truth: the cache
//! is recomputed from scratch on every write event that can affect it
//! (transaction create/update/delete, plan create/update). Recomputation
//! is idempotent, so concurrent writers converge on the correct value
//! with the last recalculation winning.
//!
//! Persisted recalculation is best effort: a failure is logged and
//! swallowed so the triggering mutation still succeeds. The cache may
//! transiently drift until the next successful recalculation.

use rusqlite::Connection;

use crate::{DatabaseId, Error, UserId};

/// Compute a plan's remaining budget from its target amount and the
/// total of expense transactions in its category.
///
/// Overspending is clamped to zero, never reported as negative.
pub fn remaining_amount(plan_amount: f64, expense_total: f64) -> f64 {
    (plan_amount - expense_total).max(0.0)
}

/// Sum the amounts of all expense transactions for `(user_id, category_id)`.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn expense_total(
    user_id: UserId,
    category_id: DatabaseId,
    connection: &Connection,
) -> Result<f64, Error> {
    connection
        .prepare(
            "SELECT COALESCE(SUM(amount), 0.0) FROM \"transaction\"
            WHERE user_id = :user_id AND category_id = :category_id AND type = 'expense';",
        )?
        .query_row(
            &[(":user_id", &user_id), (":category_id", &category_id)],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Recompute and persist the remaining amount of the plan for
/// `(user_id, category_id)`.
///
/// Plans are optional per category: if no plan exists this is a no-op,
/// not an error. A plan whose category has been deleted is recomputed
/// against whatever expense transactions still reference the category
/// ID, usually none.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn recalculate(
    user_id: UserId,
    category_id: DatabaseId,
    connection: &Connection,
) -> Result<(), Error> {
    let plan: Option<(DatabaseId, f64)> = connection
        .prepare(
            "SELECT id, amount FROM plan
            WHERE user_id = :user_id AND category_id = :category_id;",
        )?
        .query_row(
            &[(":user_id", &user_id), (":category_id", &category_id)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map(Some)
        .or_else(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            error => Err(Error::from(error)),
        })?;

    let Some((plan_id, plan_amount)) = plan else {
        return Ok(());
    };

    let total = expense_total(user_id, category_id, connection)?;
    let remaining = remaining_amount(plan_amount, total);

    connection.execute(
        "UPDATE plan SET remaining_amount = ?1 WHERE id = ?2",
        (remaining, plan_id),
    )?;

    tracing::debug!(
        "recalculated remaining amount for plan {plan_id} (category {category_id}): {remaining}"
    );

    Ok(())
}

/// Recalculate the plan for `(user_id, category_id)`, logging and
/// swallowing any failure.
///
/// The triggering create/update/delete must succeed even if the cache
/// cannot be refreshed; the transactions remain the source of truth and
/// the next successful recalculation converges. The log line is the
/// observability hook for cache staleness.
pub fn recalculate_best_effort(user_id: UserId, category_id: DatabaseId, connection: &Connection) {
    if let Err(error) = recalculate(user_id, category_id, connection) {
        tracing::error!(
            "failed to recalculate remaining amount for category {category_id}, \
            user {user_id}: {error}"
        );
    }
}

#[cfg(test)]
mod remaining_amount_tests {
    use super::remaining_amount;

    #[test]
    fn subtracts_expenses_from_amount() {
        assert_eq!(remaining_amount(100_000.0, 30_000.0), 70_000.0);
    }

    #[test]
    fn clamps_overspend_to_zero() {
        assert_eq!(remaining_amount(100_000.0, 110_000.0), 0.0);
    }

    #[test]
    fn full_amount_remains_without_expenses() {
        assert_eq!(remaining_amount(100_000.0, 0.0), 100_000.0);
    }
}
