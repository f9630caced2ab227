//! HTTP routes for authentication
//!
//! - POST /signup - Create an account and its tree, return a token
//! - POST /login  - Verify credentials, return a token
//! - GET  /me     - Current user from the token

use bytes::Bytes;
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{caller_of, hash_password, verify_dummy, verify_password, MIN_PASSWORD_LEN};
use crate::db::{users, User};
use crate::routes::{json_response, parse_json_body, BoxBody};
use crate::server::AppState;
use crate::types::ChainhubError;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Login accepts the identifier under `email` or `identifier`; either may
/// hold an email or a username.
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default, alias = "identifier")]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub username: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email.unwrap_or_default(),
            username: user.username.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_id: Option<i64>,
}

// =============================================================================
// Route Handlers
// =============================================================================

/// POST /signup
///
/// The user and their tree are created in one transaction. A taken email
/// or username is reported by the database constraint, not pre-checked.
pub async fn handle_signup<B>(
    state: &AppState,
    req: Request<B>,
) -> Result<Response<BoxBody>, ChainhubError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let body: SignupRequest = parse_json_body(req.into_body()).await?;

    let email = body.email.trim().to_string();
    let username = body.username.trim().to_string();
    if email.is_empty() || username.is_empty() || body.password.is_empty() {
        return Err(ChainhubError::InvalidInput(
            "email, password, and username are required".into(),
        ));
    }

    if body.password.len() < MIN_PASSWORD_LEN {
        return Err(ChainhubError::InvalidInput(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let password = body.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

    let tree_title = format!("{}'s Link Tree", username);
    let (user, tree) = state
        .run_store(move |store| {
            store.with_conn_mut(|conn| {
                users::register_user(conn, &email, &username, &password_hash, &tree_title)
            })
        })
        .await?;

    let token = state.jwt.generate_token(user.id)?;
    info!(user_id = user.id, tree_id = tree.id, "Signup successful");

    Ok(json_response(
        StatusCode::CREATED,
        &AuthResponse {
            token,
            user: user.into(),
            tree_id: Some(tree.id),
        },
    ))
}

/// POST /login
///
/// Unknown identifiers still pay for one hash verification so response
/// time does not reveal whether an account exists.
pub async fn handle_login<B>(
    state: &AppState,
    req: Request<B>,
) -> Result<Response<BoxBody>, ChainhubError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let body: LoginRequest = parse_json_body(req.into_body()).await?;

    let identifier = body.email.trim().to_string();
    if identifier.is_empty() || body.password.is_empty() {
        return Err(ChainhubError::InvalidInput(
            "email or username and password are required".into(),
        ));
    }

    let lookup = identifier.clone();
    let found = match state
        .run_store(move |store| {
            store.with_conn(|conn| users::get_user_by_email_or_username(conn, &lookup))
        })
        .await
    {
        Ok(user) => Some(user),
        Err(ChainhubError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };

    let password = body.password;
    let verified = tokio::task::spawn_blocking(move || {
        let stored_hash = found.as_ref().and_then(|user| user.password_hash.clone());
        match (found, stored_hash) {
            (Some(user), Some(hash)) => verify_password(&password, &hash).then_some(user),
            _ => {
                verify_dummy(&password);
                None
            }
        }
    })
    .await?;

    let Some(user) = verified else {
        warn!("Login failed for identifier: {}", identifier);
        return Err(ChainhubError::Unauthorized("invalid credentials".into()));
    };

    let token = state.jwt.generate_token(user.id)?;
    info!(user_id = user.id, "Login successful");

    Ok(json_response(
        StatusCode::OK,
        &AuthResponse {
            token,
            user: user.into(),
            tree_id: None,
        },
    ))
}

/// GET /me
pub async fn handle_me<B>(
    state: &AppState,
    req: Request<B>,
) -> Result<Response<BoxBody>, ChainhubError> {
    let caller = caller_of(&req)
        .ok_or_else(|| ChainhubError::Unauthorized("missing or invalid token".into()))?;

    let user = state
        .run_store(move |store| store.with_conn(|conn| users::get_user_by_id(conn, caller.0)))
        .await?;

    Ok(json_response(StatusCode::OK, &UserResponse::from(user)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::authenticate;
    use crate::routes::test_support::{body_json, test_state};
    use http_body_util::Full;

    fn post(json: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method("POST")
            .body(Full::new(Bytes::from(json.to_string())))
            .unwrap()
    }

    async fn signup(state: &AppState, email: &str, username: &str) -> serde_json::Value {
        let json = format!(
            r#"{{"email":"{}","username":"{}","password":"password1"}}"#,
            email, username
        );
        let response = handle_signup(state, post(&json)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await
    }

    #[tokio::test]
    async fn test_signup_returns_token_user_and_tree() {
        let state = test_state();
        let json = signup(&state, " a@x.com ", "alice").await;

        assert_eq!(json["user"]["email"], "a@x.com");
        assert_eq!(json["user"]["username"], "alice");
        assert!(json["tree_id"].as_i64().unwrap() > 0);

        let token = json["token"].as_str().unwrap();
        let subject = state.jwt.verify_token(token).unwrap();
        assert_eq!(subject, json["user"]["id"].as_i64().unwrap());

        let tree = state
            .store
            .with_conn(|conn| crate::db::trees::get_tree_by_username(conn, "alice"))
            .unwrap();
        assert_eq!(tree.title, "alice's Link Tree");
    }

    #[tokio::test]
    async fn test_signup_validation() {
        let state = test_state();

        let err = handle_signup(&state, post(r#"{"email":"a@x.com","password":"password1"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, ChainhubError::InvalidInput(_)));

        let err = handle_signup(
            &state,
            post(r#"{"email":"a@x.com","username":"alice","password":"short"}"#),
        )
        .await
        .unwrap_err();
        assert_eq!(err.public_message(), "password must be at least 8 characters");
    }

    #[tokio::test]
    async fn test_duplicate_signup_conflicts() {
        let state = test_state();
        signup(&state, "a@x.com", "alice").await;

        let err = handle_signup(
            &state,
            post(r#"{"email":"a@x.com","username":"other","password":"password1"}"#),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.public_message(), "email or username already in use");
    }

    #[tokio::test]
    async fn test_login_by_email_or_username() {
        let state = test_state();
        let created = signup(&state, "a@x.com", "alice").await;

        for body in [
            r#"{"email":"a@x.com","password":"password1"}"#,
            r#"{"identifier":"alice","password":"password1"}"#,
        ] {
            let response = handle_login(&state, post(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            assert_eq!(json["user"]["id"], created["user"]["id"]);
            assert!(json.get("tree_id").is_none());
        }
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let state = test_state();
        signup(&state, "a@x.com", "alice").await;

        let wrong_password = handle_login(&state, post(r#"{"email":"a@x.com","password":"password2"}"#))
            .await
            .unwrap_err();
        let unknown_user = handle_login(&state, post(r#"{"email":"b@x.com","password":"password1"}"#))
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, ChainhubError::Unauthorized(_)));
        assert_eq!(wrong_password.public_message(), unknown_user.public_message());
    }

    #[tokio::test]
    async fn test_me_returns_caller() {
        let state = test_state();
        let created = signup(&state, "a@x.com", "alice").await;
        let token = created["token"].as_str().unwrap();

        let mut req = Request::builder()
            .uri("/me")
            .header("Authorization", format!("Bearer {}", token))
            .body(Full::new(Bytes::new()))
            .unwrap();
        authenticate(&state.jwt, &mut req).unwrap();

        let json = body_json(handle_me(&state, req).await.unwrap()).await;
        assert_eq!(json["username"], "alice");
        assert_eq!(json["id"], created["user"]["id"]);
    }
}
