//! End-to-end tests exercising the REST API through the full router,
//! from registration through budgeting.

use axum::http::StatusCode;
use axum_test::TestServer;
use rusqlite::Connection;
use serde_json::{Value, json};

use dompet::{AppState, build_router};

fn get_test_server() -> TestServer {
    let state =
        AppState::new(Connection::open_in_memory().expect("Could not open in-memory database."))
            .expect("Could not initialize database.");

    TestServer::new(build_router(state))
}

/// Register a user and return their ID.
async fn register_user(server: &TestServer, email: &str) -> i64 {
    let response = server
        .post("/api/user/register")
        .json(&json!({
            "name": "Budi",
            "email": email,
            "gender": "male",
            "password": "hunter2",
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["data"]["id"].as_i64().expect("user ID missing")
}

/// Create a category for `user_id` and return its ID.
async fn create_category(server: &TestServer, user_id: i64, name: &str) -> i64 {
    let response = server
        .post("/api/category")
        .add_query_param("userId", user_id)
        .json(&json!({ "name": name }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["data"]["id"].as_i64().expect("category ID missing")
}

/// Record a transaction for `user_id` and return its ID.
async fn create_transaction(
    server: &TestServer,
    user_id: i64,
    category_id: i64,
    amount: f64,
    transaction_type: &str,
) -> i64 {
    let response = server
        .post("/api/transaction")
        .add_query_param("userId", user_id)
        .json(&json!({
            "amount": amount,
            "type": transaction_type,
            "categoryId": category_id,
            "date": "2025-01-15",
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    body["data"]["id"].as_i64().expect("transaction ID missing")
}

async fn get_plan(server: &TestServer, user_id: i64, plan_id: i64) -> Value {
    let response = server
        .get(&format!("/api/plan/{plan_id}"))
        .add_query_param("userId", user_id)
        .await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    body["data"].clone()
}

#[tokio::test]
async fn registration_seeds_default_categories() {
    let server = get_test_server();

    let user_id = register_user(&server, "budi@example.com").await;

    let response = server
        .get("/api/category")
        .add_query_param("userId", user_id)
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "success");

    let names: Vec<&str> = body["data"]
        .as_array()
        .expect("data should be an array")
        .iter()
        .map(|category| category["name"].as_str().expect("name missing"))
        .collect();
    assert_eq!(
        names,
        vec![
            "Hiburan",
            "Kesehatan",
            "Makanan",
            "Pendidikan",
            "Transportasi"
        ]
    );
}

#[tokio::test]
async fn registration_rejects_duplicate_email() {
    let server = get_test_server();
    register_user(&server, "budi@example.com").await;

    let response = server
        .post("/api/user/register")
        .json(&json!({
            "name": "Other Budi",
            "email": "budi@example.com",
            "gender": "male",
            "password": "hunter2",
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Email is already registered");
}

#[tokio::test]
async fn login_round_trip() {
    let server = get_test_server();
    let user_id = register_user(&server, "budi@example.com").await;

    let response = server
        .post("/api/user/login")
        .json(&json!({ "email": "budi@example.com", "password": "hunter2" }))
        .await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["id"].as_i64(), Some(user_id));
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let server = get_test_server();
    register_user(&server, "budi@example.com").await;

    let response = server
        .post("/api/user/login")
        .json(&json!({ "email": "budi@example.com", "password": "wrong" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "Incorrect password");
}

#[tokio::test]
async fn login_rejects_unknown_email() {
    let server = get_test_server();

    let response = server
        .post("/api/user/login")
        .json(&json!({ "email": "nobody@example.com", "password": "hunter2" }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn budget_tracks_expenses_through_their_lifecycle() {
    let server = get_test_server();
    let user_id = register_user(&server, "budi@example.com").await;
    let category_id = create_category(&server, user_id, "Groceries").await;

    let response = server
        .post("/api/plan")
        .add_query_param("userId", user_id)
        .json(&json!({ "amount": 100000, "categoryId": category_id }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    let plan_id = body["data"]["id"].as_i64().expect("plan ID missing");
    assert_eq!(body["data"]["remainingAmount"].as_f64(), Some(100_000.0));

    let first_expense =
        create_transaction(&server, user_id, category_id, 30_000.0, "expense").await;
    let plan = get_plan(&server, user_id, plan_id).await;
    assert_eq!(plan["remainingAmount"].as_f64(), Some(70_000.0));

    // Overspending is clamped to zero.
    create_transaction(&server, user_id, category_id, 80_000.0, "expense").await;
    let plan = get_plan(&server, user_id, plan_id).await;
    assert_eq!(plan["remainingAmount"].as_f64(), Some(0.0));

    // Income never affects the budget.
    create_transaction(&server, user_id, category_id, 500_000.0, "income").await;
    let plan = get_plan(&server, user_id, plan_id).await;
    assert_eq!(plan["remainingAmount"].as_f64(), Some(0.0));

    // Deleting an expense restores its amount.
    let response = server
        .delete(&format!("/api/transaction/{first_expense}"))
        .add_query_param("userId", user_id)
        .await;
    response.assert_status(StatusCode::OK);
    let plan = get_plan(&server, user_id, plan_id).await;
    assert_eq!(plan["remainingAmount"].as_f64(), Some(20_000.0));
}

#[tokio::test]
async fn second_plan_for_category_is_rejected() {
    let server = get_test_server();
    let user_id = register_user(&server, "budi@example.com").await;
    let category_id = create_category(&server, user_id, "Groceries").await;

    let response = server
        .post("/api/plan")
        .add_query_param("userId", user_id)
        .json(&json!({ "amount": 100000, "categoryId": category_id }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let response = server
        .post("/api/plan")
        .add_query_param("userId", user_id)
        .json(&json!({ "amount": 50000, "categoryId": category_id }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "A plan already exists for this category");
}

#[tokio::test]
async fn other_users_resources_are_invisible() {
    let server = get_test_server();
    let owner = register_user(&server, "budi@example.com").await;
    let stranger = register_user(&server, "andi@example.com").await;
    let category_id = create_category(&server, owner, "Secret").await;

    let response = server
        .put(&format!("/api/category/{category_id}"))
        .add_query_param("userId", stranger)
        .json(&json!({ "name": "Stolen" }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["message"], "Category not found");
}

#[tokio::test]
async fn transaction_requires_owned_category() {
    let server = get_test_server();
    let owner = register_user(&server, "budi@example.com").await;
    let stranger = register_user(&server, "andi@example.com").await;
    let category_id = create_category(&server, owner, "Groceries").await;

    let response = server
        .post("/api/transaction")
        .add_query_param("userId", stranger)
        .json(&json!({
            "amount": 10000,
            "type": "expense",
            "categoryId": category_id,
            "date": "2025-01-15",
        }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn transaction_amount_accepts_string_encoding() {
    let server = get_test_server();
    let user_id = register_user(&server, "budi@example.com").await;
    let category_id = create_category(&server, user_id, "Groceries").await;

    let response = server
        .post("/api/transaction")
        .add_query_param("userId", user_id)
        .json(&json!({
            "amount": "15000.5",
            "type": "expense",
            "categoryId": category_id,
            "date": "2025-01-15",
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["data"]["amount"].as_f64(), Some(15_000.5));
}

#[tokio::test]
async fn date_range_filters_inclusively() {
    let server = get_test_server();
    let user_id = register_user(&server, "budi@example.com").await;
    let category_id = create_category(&server, user_id, "Groceries").await;

    for (date, amount) in [
        ("2025-01-09", 1_000.0),
        ("2025-01-10", 2_000.0),
        ("2025-01-20", 3_000.0),
        ("2025-01-21", 4_000.0),
    ] {
        let response = server
            .post("/api/transaction")
            .add_query_param("userId", user_id)
            .json(&json!({
                "amount": amount,
                "type": "expense",
                "categoryId": category_id,
                "date": date,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
    }

    let response = server
        .get("/api/transaction/date-range")
        .add_query_param("userId", user_id)
        .add_query_param("startDate", "2025-01-10")
        .add_query_param("endDate", "2025-01-20")
        .await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    let amounts: Vec<f64> = body["data"]
        .as_array()
        .expect("data should be an array")
        .iter()
        .map(|transaction| transaction["amount"].as_f64().expect("amount missing"))
        .collect();
    assert_eq!(amounts, vec![3_000.0, 2_000.0]);
}

#[tokio::test]
async fn missing_user_id_is_a_bad_request() {
    let server = get_test_server();

    let response = server.get("/api/plan").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "User ID is required");
}

#[tokio::test]
async fn delete_account_removes_profile_and_data() {
    let server = get_test_server();
    let user_id = register_user(&server, "budi@example.com").await;
    let category_id = create_category(&server, user_id, "Groceries").await;
    create_transaction(&server, user_id, category_id, 10_000.0, "expense").await;

    let response = server
        .delete("/api/user/delete")
        .add_query_param("userId", user_id)
        .await;
    response.assert_status(StatusCode::OK);

    let response = server
        .get("/api/user/me")
        .add_query_param("userId", user_id)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server
        .get("/api/category")
        .add_query_param("userId", user_id)
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn profile_photo_round_trip() {
    let server = get_test_server();
    let user_id = register_user(&server, "budi@example.com").await;
    let photo = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    let response = server
        .put("/api/user/profile/photo")
        .add_query_param("userId", user_id)
        .multipart(
            axum_test::multipart::MultipartForm::new().add_part(
                "photo",
                axum_test::multipart::Part::bytes(photo.clone())
                    .file_name("me.jpg")
                    .mime_type("image/jpeg"),
            ),
        )
        .await;
    response.assert_status(StatusCode::OK);

    let response = server
        .get("/api/user/profile/photo")
        .add_query_param("userId", user_id)
        .await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.header("content-type"), "image/jpeg");
    assert_eq!(response.as_bytes().as_ref(), photo.as_slice());
}
