//! Owner propagation for owner-scoped routes.
//!
//! The authenticated owner's ID is supplied out-of-band as the `userId`
//! query parameter. Every category, plan and transaction query filters
//! by this ID; there is no cross-user visibility.

use serde::Deserialize;

use crate::{Error, UserId};

/// The query parameters shared by all owner-scoped routes.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
    /// The authenticated owner's user ID.
    pub user_id: Option<UserId>,
}

/// Extract the owner's ID from the query parameters.
///
/// # Errors
/// Returns [Error::MissingUserId] if the parameter was not supplied.
pub fn require_owner(query: &OwnerQuery) -> Result<UserId, Error> {
    query.user_id.ok_or(Error::MissingUserId)
}

#[cfg(test)]
mod owner_tests {
    use crate::Error;

    use super::{OwnerQuery, require_owner};

    #[test]
    fn require_owner_succeeds_with_user_id() {
        let query = OwnerQuery { user_id: Some(7) };

        assert_eq!(require_owner(&query), Ok(7));
    }

    #[test]
    fn require_owner_fails_without_user_id() {
        let query = OwnerQuery { user_id: None };

        assert_eq!(require_owner(&query), Err(Error::MissingUserId));
    }
}
