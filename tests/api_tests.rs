use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use maintarr::config::Config;
use tower::ServiceExt;

/// Bootstrap credential seeded by the initial migration
const ADMIN_USERNAME: &str = "admin";
const ADMIN_PASSWORD: &str = "admin";

async fn spawn_app() -> Router {
    let (app, _state) = spawn_app_with_state().await;
    app
}

async fn spawn_app_with_state() -> (Router, std::sync::Arc<maintarr::api::AppState>) {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.auth.jwt_secret = "integration-test-secret".to_string();
    config.server.secure_cookies = false;

    let state = maintarr::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    let app = maintarr::api::router(state.clone()).await;
    (app, state)
}

async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

/// Logs in and returns the access token plus the refresh cookie pair
/// (`refreshToken=<value>`), ready for a `Cookie` request header.
async fn login(app: &Router, username: &str, password: &str) -> (String, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({"username": username, "password": password}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login must set the refresh cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let body = body_json(response).await;
    let token = body["token"].as_str().unwrap().to_string();

    (token, cookie)
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn send_json(method: &str, uri: &str, token: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_login_and_bearer_gate() {
    let app = spawn_app().await;

    // No token at all
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/devices")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "NO_TOKEN");

    // Garbage token
    let response = app
        .clone()
        .oneshot(get("/api/devices", "not-a-jwt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "INVALID_TOKEN");

    // Missing credentials
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(r#"{"username": "admin"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "MISSING_CREDENTIALS");

    // Wrong password
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    r#"{"username": "admin", "password": "wrong"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "INVALID_CREDENTIALS");

    // Bootstrap admin logs in and is flagged for rotation
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({"username": ADMIN_USERNAME, "password": ADMIN_PASSWORD})
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("refreshToken="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(!cookie.contains("Secure"), "secure_cookies is off in tests");

    let body = body_json(response).await;
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["user"]["username"], "admin");
    assert_eq!(body["user"]["role"], "admin");
    assert_eq!(body["user"]["mustChangePassword"], true);

    // The token it returned opens the gate
    let token = body["token"].as_str().unwrap();
    let response = app.clone().oneshot(get("/api/auth/verify", token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["user"]["username"], "admin");
}

#[tokio::test]
async fn test_refresh_is_not_rotated() {
    let app = spawn_app().await;
    let (_token, cookie) = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    // Refresh works immediately after login
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .header("Cookie", &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Token refreshed successfully");
    let fresh_token = body["token"].as_str().unwrap().to_string();

    // The minted access token is live
    let response = app
        .clone()
        .oneshot(get("/api/auth/verify", &fresh_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Same cookie again: the refresh token is not rotated on use
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .header("Cookie", &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // No cookie
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "NO_REFRESH_TOKEN");

    // A cookie the server never issued
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .header("Cookie", "refreshToken=deadbeef")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "INVALID_REFRESH_TOKEN");
}

#[tokio::test]
async fn test_expired_refresh_token_reported_once_then_invalid() {
    let (app, state) = spawn_app_with_state().await;

    let admin = state
        .store()
        .get_user_by_username("admin")
        .await
        .unwrap()
        .unwrap();

    // Plant a refresh token that expired an hour ago
    let expired_at = (chrono::Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
    state
        .store()
        .store_refresh_token(admin.id, "expired-refresh-token", &expired_at)
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .header("Cookie", "refreshToken=expired-refresh-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "REFRESH_TOKEN_EXPIRED");

    // The expired row was deleted on first sight
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .header("Cookie", "refreshToken=expired-refresh-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "INVALID_REFRESH_TOKEN");
}

#[tokio::test]
async fn test_logout_revokes_only_the_presented_session() {
    let app = spawn_app().await;

    let (token, cookie_one) = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let (_token_two, cookie_two) = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header("Authorization", format!("Bearer {token}"))
                .header("Cookie", &cookie_one)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let clearing = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(clearing.starts_with("refreshToken=;"));
    assert!(clearing.contains("Max-Age=0"));

    // The revoked session is gone
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .header("Cookie", &cookie_one)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The other session survives
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .header("Cookie", &cookie_two)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Logging out again without a cookie is a no-op, not an error
    let (token, _) = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_change_password_policy_and_history() {
    let app = spawn_app().await;
    let (token, _) = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    // Too weak
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/auth/change-password",
            &token,
            &serde_json::json!({"currentPassword": ADMIN_PASSWORD, "newPassword": "Sh0rt!"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "WEAK_PASSWORD");
    assert!(body["error"].as_str().unwrap().contains("at least 8 characters"));

    // Wrong current password
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/auth/change-password",
            &token,
            &serde_json::json!({"currentPassword": "WrongPass1!", "newPassword": "Str0ng!Pass1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "INVALID_PASSWORD");

    // Successful rotation clears the must-change flag and mints a token
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/auth/change-password",
            &token,
            &serde_json::json!({"currentPassword": ADMIN_PASSWORD, "newPassword": "Str0ng!Pass1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Password changed successfully");
    assert_eq!(body["user"]["mustChangePassword"], false);
    let token = body["token"].as_str().unwrap().to_string();

    // Second rotation, pushing the first strong password into history
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/auth/change-password",
            &token,
            &serde_json::json!({"currentPassword": "Str0ng!Pass1", "newPassword": "An0ther!Pass2"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = body_json(response).await["token"].as_str().unwrap().to_string();

    // Going back to a remembered password is refused
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/auth/change-password",
            &token,
            &serde_json::json!({"currentPassword": "An0ther!Pass2", "newPassword": "Str0ng!Pass1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "PASSWORD_REUSED");

    // Old credential is dead, the new one works
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({"username": "admin", "password": "admin"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    login(&app, "admin", "An0ther!Pass2").await;
}

#[tokio::test]
async fn test_profile_read_and_update() {
    let app = spawn_app().await;
    let (token, _) = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let response = app.clone().oneshot(get("/api/auth/profile", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["username"], "admin");

    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            "/api/auth/profile",
            &token,
            &serde_json::json!({"position": "Chief Engineer", "firstName": "Sysadmin"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Profile updated successfully");
    assert_eq!(body["user"]["position"], "Chief Engineer");
    assert_eq!(body["user"]["firstName"], "Sysadmin");

    // Empty update is rejected
    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            "/api/auth/profile",
            &token,
            &serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "NO_UPDATES");
}

#[tokio::test]
async fn test_admin_gate_and_user_lifecycle() {
    let app = spawn_app().await;
    let (admin_token, _) = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    // Create a regular user
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/users",
            &admin_token,
            &serde_json::json!({
                "username": "jdoe",
                "password": "Initial!Pass1",
                "firstName": "Jane",
                "middleName": "Q",
                "lastName": "Doe",
                "position": "Technician",
                "role": "user"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "User created successfully");
    assert_eq!(body["user"]["mustChangePassword"], true);
    let user_id = body["user"]["id"].as_i64().unwrap();

    // Duplicate username
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/users",
            &admin_token,
            &serde_json::json!({
                "username": "jdoe",
                "password": "Initial!Pass1",
                "firstName": "Jane",
                "middleName": "Q",
                "lastName": "Doe",
                "position": "Technician",
                "role": "user"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "USERNAME_EXISTS");

    // Role outside the closed set
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/users",
            &admin_token,
            &serde_json::json!({
                "username": "mallory",
                "password": "Initial!Pass1",
                "firstName": "Mal",
                "middleName": "O",
                "lastName": "Ry",
                "position": "Technician",
                "role": "superuser"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_ROLE");

    // The regular user can log in, cannot reach admin routes
    let (user_token, _) = login(&app, "jdoe", "Initial!Pass1").await;
    let response = app.clone().oneshot(get("/api/users", &user_token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "FORBIDDEN");

    // But the admin can
    let response = app.clone().oneshot(get("/api/users?search=doe", &admin_token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["users"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["total"], 1);

    // Admin edits the account
    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            &format!("/api/users/{user_id}"),
            &admin_token,
            &serde_json::json!({"position": "Senior Technician"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["user"]["position"],
        "Senior Technician"
    );

    // Self-deletion is refused before anything else
    let response = app
        .clone()
        .oneshot(get("/api/auth/verify", &admin_token))
        .await
        .unwrap();
    let admin_id = body_json(response).await["user"]["id"].as_i64().unwrap();
    let response = app
        .clone()
        .oneshot(delete(&format!("/api/users/{admin_id}"), &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "SELF_DELETE");

    // Deleting the user kills their live session at the gate
    let response = app
        .clone()
        .oneshot(delete(&format!("/api/users/{user_id}"), &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get("/api/auth/verify", &user_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "USER_NOT_FOUND");

    // And a second delete finds nobody
    let response = app
        .clone()
        .oneshot(delete(&format!("/api/users/{user_id}"), &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_stats_overview() {
    let app = spawn_app().await;
    let (admin_token, _) = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/users",
            &admin_token,
            &serde_json::json!({
                "username": "tech1",
                "password": "Initial!Pass1",
                "firstName": "Terry",
                "middleName": "E",
                "lastName": "Chnician",
                "position": "Technician",
                "role": "user"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(get("/api/users/stats/overview", &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["statistics"]["total_users"], 2);
    assert_eq!(body["statistics"]["admin_count"], 1);
    assert_eq!(body["statistics"]["user_count"], 1);
}

#[tokio::test]
async fn test_device_crud_and_uniqueness() {
    let app = spawn_app().await;
    let (admin_token, _) = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let payload = serde_json::json!({
        "deviceName": "Dialysis Pump 3",
        "serialNumber": "SN-1001",
        "manufacturer": "Fresenius",
        "assetTag": "AT-0001",
        "datePurchased": "2024-06-01",
        "responsiblePerson": "Jane Doe",
        "location": "Ward 2"
    });

    // Field validation happens before anything touches storage
    let mut incomplete = payload.clone();
    incomplete["location"] = serde_json::json!("");
    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/devices", &admin_token, &incomplete))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "MISSING_FIELDS");

    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/devices", &admin_token, &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Device created successfully");
    let device_id = body["device"]["id"].as_i64().unwrap();

    // Serial and asset tag are unique columns
    let mut dup_serial = payload.clone();
    dup_serial["assetTag"] = serde_json::json!("AT-0002");
    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/devices", &admin_token, &dup_serial))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "DUPLICATE_SERIAL_NUMBER");

    let mut dup_tag = payload.clone();
    dup_tag["serialNumber"] = serde_json::json!("SN-1002");
    let response = app
        .clone()
        .oneshot(send_json("POST", "/api/devices", &admin_token, &dup_tag))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "DUPLICATE_ASSET_TAG");

    // Reads are open to any authenticated role; writes are admin-only
    let response = app
        .clone()
        .oneshot(get(&format!("/api/devices/{device_id}"), &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["device"]["serialNumber"], "SN-1001");

    let response = app
        .clone()
        .oneshot(get("/api/devices/search/pump", &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["query"], "pump");

    // Update keeps its own identity out of the conflict check
    let mut update = payload.clone();
    update["location"] = serde_json::json!("Ward 5");
    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            &format!("/api/devices/{device_id}"),
            &admin_token,
            &update,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["device"]["location"], "Ward 5");

    let response = app
        .clone()
        .oneshot(delete(&format!("/api/devices/{device_id}"), &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Device deleted successfully");
    assert_eq!(body["device"]["id"], device_id);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/devices/{device_id}"), &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "DEVICE_NOT_FOUND");
}

#[tokio::test]
async fn test_non_admin_cannot_write_devices() {
    let app = spawn_app().await;
    let (admin_token, _) = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/users",
            &admin_token,
            &serde_json::json!({
                "username": "viewer",
                "password": "Initial!Pass1",
                "firstName": "Vi",
                "middleName": "E",
                "lastName": "Wer",
                "position": "Nurse",
                "role": "user"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let (user_token, _) = login(&app, "viewer", "Initial!Pass1").await;

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/devices",
            &user_token,
            &serde_json::json!({
                "deviceName": "X",
                "serialNumber": "SN-X",
                "manufacturer": "Y",
                "assetTag": "AT-X",
                "datePurchased": "2024-01-01",
                "responsiblePerson": "Z",
                "location": "L"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Reading the registry is fine
    let response = app.clone().oneshot(get("/api/devices", &user_token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_checklist_lifecycle() {
    let app = spawn_app().await;
    let (admin_token, _) = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/devices",
            &admin_token,
            &serde_json::json!({
                "deviceName": "Ventilator 7",
                "serialNumber": "SN-2001",
                "manufacturer": "Draeger",
                "assetTag": "AT-0101",
                "datePurchased": "2023-11-15",
                "responsiblePerson": "John Smith",
                "location": "ICU"
            }),
        ))
        .await
        .unwrap();
    let device_id = body_json(response).await["device"]["id"].as_i64().unwrap();

    // Tasks array must be present
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/pm-checklists",
            &admin_token,
            &serde_json::json!({
                "deviceId": device_id,
                "maintenanceTypes": ["Hardware Maintenance"],
                "taskFrequency": "Monthly"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "MISSING_FIELDS");

    // ...and non-empty
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/pm-checklists",
            &admin_token,
            &serde_json::json!({
                "deviceId": device_id,
                "maintenanceTypes": ["Hardware Maintenance"],
                "taskFrequency": "Monthly",
                "tasks": []
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "NO_TASKS");

    // ...and every task needs a description
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/pm-checklists",
            &admin_token,
            &serde_json::json!({
                "deviceId": device_id,
                "maintenanceTypes": ["Hardware Maintenance"],
                "taskFrequency": "Monthly",
                "tasks": [{"taskDescription": "   "}]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "MISSING_FIELDS");

    // Unknown device
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/pm-checklists",
            &admin_token,
            &serde_json::json!({
                "deviceId": 9999,
                "maintenanceTypes": ["Hardware Maintenance"],
                "taskFrequency": "Monthly",
                "tasks": [{"taskDescription": "Check fans"}]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "DEVICE_NOT_FOUND");

    // The good path snapshots the device columns onto the checklist
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/pm-checklists",
            &admin_token,
            &serde_json::json!({
                "deviceId": device_id,
                "maintenanceTypes": ["Hardware Maintenance", "Power Source"],
                "taskFrequency": "Monthly",
                "tasks": [
                    {"taskDescription": "Check fans"},
                    {"taskDescription": "Inspect power cable"}
                ]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Checklist created successfully");
    assert_eq!(body["checklist"]["deviceName"], "Ventilator 7");
    assert_eq!(
        body["checklist"]["maintenanceTypes"],
        serde_json::json!(["Hardware Maintenance", "Power Source"])
    );
    assert_eq!(body["tasks"].as_array().unwrap().len(), 2);
    let checklist_id = body["checklist"]["id"].as_i64().unwrap();
    let task_id = body["tasks"][0]["id"].as_i64().unwrap();

    let response = app.clone().oneshot(get("/api/pm-checklists", &admin_token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["checklists"].as_array().unwrap().len(),
        1
    );

    // Shape check on update: provided-but-empty types are refused
    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            &format!("/api/pm-checklists/{checklist_id}"),
            &admin_token,
            &serde_json::json!({"maintenanceTypes": []}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_MAINTENANCE_TYPES");

    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            &format!("/api/pm-checklists/{checklist_id}"),
            &admin_token,
            &serde_json::json!({"taskFrequency": "Quarterly"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["checklist"]["taskFrequency"],
        "Quarterly"
    );

    // Completing a task stamps who and when
    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            &format!("/api/pm-checklists/tasks/{task_id}"),
            &admin_token,
            &serde_json::json!({"isCompleted": true, "notes": "Dust buildup cleared"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["task"]["isCompleted"], true);
    assert_eq!(body["task"]["completedBy"], "admin");
    assert!(body["task"]["completedAt"].is_string());
    assert_eq!(body["task"]["notes"], "Dust buildup cleared");

    // Unchecking clears the stamps
    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            &format!("/api/pm-checklists/tasks/{task_id}"),
            &admin_token,
            &serde_json::json!({"isCompleted": false}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["task"]["isCompleted"], false);
    assert!(body["task"]["completedBy"].is_null());

    // Rewording a task
    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            &format!("/api/pm-checklists/tasks/{task_id}/description"),
            &admin_token,
            &serde_json::json!({"taskDescription": "Check and clean fans"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["task"]["taskDescription"],
        "Check and clean fans"
    );

    // Adding one later
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            &format!("/api/pm-checklists/{checklist_id}/tasks"),
            &admin_token,
            &serde_json::json!({"taskDescription": "Verify alarms"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let added_task_id = body_json(response).await["task"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(delete(
            &format!("/api/pm-checklists/tasks/{added_task_id}"),
            &admin_token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(delete(&format!("/api/pm-checklists/{checklist_id}"), &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/pm-checklists/{checklist_id}"), &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "CHECKLIST_NOT_FOUND");
}

#[tokio::test]
async fn test_pm_log_lifecycle() {
    let app = spawn_app().await;
    let (admin_token, _) = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/devices",
            &admin_token,
            &serde_json::json!({
                "deviceName": "Infusion Pump 12",
                "serialNumber": "SN-3001",
                "manufacturer": "Baxter",
                "assetTag": "AT-0301",
                "datePurchased": "2022-03-20",
                "responsiblePerson": "Ana Cruz",
                "location": "Ward 1"
            }),
        ))
        .await
        .unwrap();
    let device_id = body_json(response).await["device"]["id"].as_i64().unwrap();

    // A checklist whose tasks will seed the log snapshot
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/pm-checklists",
            &admin_token,
            &serde_json::json!({
                "deviceId": device_id,
                "maintenanceTypes": ["Hardware Maintenance"],
                "taskFrequency": "Monthly",
                "tasks": [
                    {"taskDescription": "Check battery"},
                    {"taskDescription": "Calibrate flow rate"}
                ]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Required fields
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/pm-logs",
            &admin_token,
            &serde_json::json!({"deviceId": device_id, "date": "2026-02-10"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "MISSING_FIELDS");

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/pm-logs",
            &admin_token,
            &serde_json::json!({
                "deviceId": device_id,
                "date": "2026-02-10",
                "fullyFunctional": "yes",
                "performedBy": "Ana Cruz",
                "recommendation": "Replace battery next quarter"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "PM log created successfully");
    assert_eq!(body["log"]["deviceName"], "Infusion Pump 12");
    // Snapshot of the checklist tasks, all unchecked
    assert_eq!(body["tasks"].as_array().unwrap().len(), 2);
    assert!(body["tasks"].as_array().unwrap().iter().all(|t| t["isChecked"] == false));
    let log_id = body["log"]["id"].as_i64().unwrap();
    let log_task_id = body["tasks"][0]["id"].as_i64().unwrap();

    // Filterable listing
    let response = app
        .clone()
        .oneshot(get(
            &format!("/api/pm-logs?deviceId={device_id}&fullyFunctional=yes"),
            &admin_token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["total"], 1);

    let response = app
        .clone()
        .oneshot(get("/api/pm-logs?fullyFunctional=no", &admin_token))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["total"], 0);

    // Detail view groups tasks by maintenance type and counts them
    let response = app
        .clone()
        .oneshot(get(&format!("/api/pm-logs/{log_id}"), &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["accessMode"], "authenticated");
    assert_eq!(body["statistics"]["totalTasks"], 2);
    assert_eq!(body["statistics"]["uncheckedTasks"], 2);
    assert!(body["tasksByType"]["Hardware Maintenance"].is_array());

    // Ticking a snapshot task
    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            &format!("/api/pm-logs/tasks/{log_task_id}"),
            &admin_token,
            &serde_json::json!({"isChecked": true}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["task"]["isChecked"], true);

    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            &format!("/api/pm-logs/tasks/{log_task_id}"),
            &admin_token,
            &serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "MISSING_FIELDS");

    // Extra finding recorded during the visit
    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            &format!("/api/pm-logs/{log_id}/tasks"),
            &admin_token,
            &serde_json::json!({
                "taskDescription": "Tighten mounting bracket",
                "maintenanceType": "Hardware Maintenance"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let added_id = body_json(response).await["task"]["id"].as_i64().unwrap();

    // Log amendment
    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            &format!("/api/pm-logs/{log_id}"),
            &admin_token,
            &serde_json::json!({"validatedBy": "Victor Reyes"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["log"]["validatedBy"], "Victor Reyes");

    // Rollups
    let response = app
        .clone()
        .oneshot(get("/api/pm-logs/statistics/overview", &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["statistics"]["total_logs"], 1);
    assert_eq!(body["logsByDevice"].as_array().unwrap().len(), 1);

    // Admin-only removals
    let response = app
        .clone()
        .oneshot(delete(&format!("/api/pm-logs/tasks/{added_id}"), &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(delete(&format!("/api/pm-logs/{log_id}"), &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "PM log deleted successfully");
    assert_eq!(body["log"]["id"], log_id);

    let response = app
        .clone()
        .oneshot(delete(&format!("/api/pm-logs/{log_id}"), &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "PM_LOG_NOT_FOUND");
}

#[tokio::test]
async fn test_health_and_system_status() {
    let app = spawn_app().await;

    // Health is the one identity-free route besides login/refresh/QR validate
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["service"], "maintarr");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/system/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (admin_token, _) = login(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let response = app
        .clone()
        .oneshot(get("/api/system/status", &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "running");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert!(headers.contains_key("content-security-policy"));
}
