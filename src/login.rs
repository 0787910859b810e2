use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Form,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::app::AppState;
use crate::store::{ReportStore, StoredUser, StoreError};

const SESSION_COOKIE: &str = "session";
const SESSION_HOURS: i64 = 24;

/// Login form fields.
#[derive(Debug, Deserialize)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
}

/// The authenticated username, inserted into request extensions by [`require_auth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("username and password cannot be empty")]
    MissingCredentials,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// User session data
#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Active sessions keyed by cookie value.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore::default()
    }

    /// Start a session for `username`, returning the cookie value.
    pub fn create(&self, username: &str, now: DateTime<Utc>) -> String {
        let session_id = Uuid::new_v4().to_string();
        let session = Session {
            username: username.to_string(),
            expires_at: now + Duration::hours(SESSION_HOURS),
        };

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(session_id.clone(), session);
        session_id
    }

    /// Username for a live session.
    pub fn validate(&self, session_id: &str, now: DateTime<Utc>) -> Option<String> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions
            .get(session_id)
            .filter(|s| s.expires_at > now)
            .map(|s| s.username.clone())
    }

    pub fn remove(&self, session_id: &str) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(session_id);
    }
}

/// Register a new dashboard user with an argon2-hashed password.
///
/// # Errors
/// * `MissingCredentials` if either field is empty
/// * `Store(UserExists)` if the username is taken
pub fn register_user(store: &ReportStore, username: &str, password: &str) -> Result<StoredUser, AuthError> {
    if username.is_empty() || password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    let password_hash = hash_password(password)?;
    Ok(store.insert_user(username, password_hash)?)
}

/// Check a username/password pair against the users collection.
///
/// Unknown users and wrong passwords both come back as `false`.
pub fn verify_user(store: &ReportStore, username: &str, password: &str) -> bool {
    match store.find_user(username) {
        Some(user) => verify_password(password, &user.password_hash),
        None => false,
    }
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub async fn serve_login_page() -> Html<&'static str> {
    Html(include_str!("./static/login.html"))
}

/// Handle login form submission
///
/// On success sets the session cookie and redirects to the dashboard.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(credentials): Form<UserCredentials>,
) -> Response {
    if verify_user(&state.store, &credentials.username, &credentials.password) {
        let session_id = state.sessions.create(&credentials.username, state.clock.now());
        let cookie = Cookie::build((SESSION_COOKIE, session_id))
            .path("/")
            .http_only(true);
        log::info!("user {} logged in", credentials.username);
        (jar.add(cookie), Redirect::to("/dashboard")).into_response()
    } else {
        log::warn!("failed login for {}", credentials.username);
        (StatusCode::UNAUTHORIZED, "Invalid username or password").into_response()
    }
}

/// Handle user logout
pub async fn handle_logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value());
    }
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Redirect::to("/"),
    )
}

/// Authentication middleware
///
/// API calls without a live session get 401; page requests are sent back
/// to the login page.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Some(username) = state.sessions.validate(cookie.value(), state.clock.now()) {
            request.extensions_mut().insert(CurrentUser(username));
            return next.run(request).await;
        }
    }

    if request.uri().path().starts_with("/api/") {
        (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({ "error": "Not logged in" })),
        )
            .into_response()
    } else {
        Redirect::to("/").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn registered_user_verifies_only_with_right_password() {
        let dir = tempdir().unwrap();
        let store = ReportStore::open(dir.path()).unwrap();

        let user = register_user(&store, "supervisor", "hunter2").unwrap();
        assert_ne!(user.password_hash, "hunter2");

        assert!(verify_user(&store, "supervisor", "hunter2"));
        assert!(!verify_user(&store, "supervisor", "hunter3"));
        assert!(!verify_user(&store, "nobody", "hunter2"));

        assert!(matches!(
            register_user(&store, "supervisor", "again"),
            Err(AuthError::Store(StoreError::UserExists(_)))
        ));
        assert!(matches!(
            register_user(&store, "", "pw"),
            Err(AuthError::MissingCredentials)
        ));
    }

    #[test]
    fn sessions_expire() {
        let sessions = SessionStore::new();
        let now = Utc::now();
        let id = sessions.create("supervisor", now);

        assert_eq!(sessions.validate(&id, now).as_deref(), Some("supervisor"));
        assert_eq!(sessions.validate(&id, now + Duration::hours(25)), None);
        assert_eq!(sessions.validate("bogus", now), None);

        sessions.remove(&id);
        assert_eq!(sessions.validate(&id, now), None);
    }
}
