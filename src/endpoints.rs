//! The endpoints for the REST API.

/// The health check route.
pub const ROOT: &str = "/";

/// Register a new user account.
pub const REGISTER: &str = "/api/user/register";
/// Log in with email and password.
pub const LOGIN: &str = "/api/user/login";
/// Fetch the caller's profile.
pub const PROFILE: &str = "/api/user/me";
/// Update the caller's name and/or gender.
pub const UPDATE_PROFILE: &str = "/api/user/profile";
/// Upload or fetch the caller's profile photo.
pub const PROFILE_PHOTO: &str = "/api/user/profile/photo";
/// Log out (stateless acknowledgement).
pub const LOGOUT: &str = "/api/user/logout";
/// Delete the caller's account and all owned data.
pub const DELETE_ACCOUNT: &str = "/api/user/delete";

/// Create or list categories.
pub const CATEGORIES: &str = "/api/category";
/// Update or delete a single category.
pub const CATEGORY: &str = "/api/category/{id}";

/// Create or list plans.
pub const PLANS: &str = "/api/plan";
/// Fetch, update or delete a single plan.
pub const PLAN: &str = "/api/plan/{id}";

/// Create or list transactions.
pub const TRANSACTIONS: &str = "/api/transaction";
/// List transactions within an inclusive date range.
///
/// The literal "date-range" segment takes precedence over the `{id}`
/// matcher of [TRANSACTION].
pub const TRANSACTIONS_DATE_RANGE: &str = "/api/transaction/date-range";
/// Fetch, update or delete a single transaction.
pub const TRANSACTION: &str = "/api/transaction/{id}";
