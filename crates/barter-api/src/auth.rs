use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use barter_db::Database;
use barter_types::api::{AuthResponse, Claims, LoginRequest, SignupRequest, ValidationErrors};

use crate::error::ApiError;
use crate::extract::Json;
use crate::forms;
use crate::with_db;

const USERNAME_TAKEN: &str = "A user with that username already exists.";

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: impl Into<String>, token_ttl_days: i64) -> AppState {
        Arc::new(Self {
            db,
            jwt_secret: jwt_secret.into(),
            token_ttl: chrono::Duration::days(token_ttl_days),
        })
    }
}

/// POST /signup/ — create an account and log it in.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = forms::clean_signup(&req);
    let username = req.username.trim().to_string();

    let user_id = Uuid::new_v4();
    let (uid, name) = (user_id, username.clone());
    with_db(&state, move |db| {
        if !errors.has_field("username") && db.get_user_by_username(&name)?.is_some() {
            errors.add_field("username", USERNAME_TAKEN);
        }
        if !errors.is_empty() {
            return Err(errors.into());
        }

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password1.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
            .to_string();

        insert_user(db, uid, &name, &password_hash)
    })
    .await?;

    info!("Registered user {} ({})", username, user_id);

    let token = create_token(&state, user_id, &username)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user_id,
            username,
            token,
        }),
    ))
}

/// POST /login/ — exchange credentials for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = with_db(&state, move |db| {
        let user = db
            .get_user_by_username(req.username.trim())?
            .ok_or(ApiError::Unauthorized)?;

        // Verify password
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| anyhow::anyhow!("stored hash for {} is unreadable: {}", user.username, e))?;

        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(user)
    })
    .await?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id '{}': {}", user.id, e))?;

    let token = create_token(&state, user_id, &user.username)?;

    Ok(Json(AuthResponse {
        user_id,
        username: user.username,
        token,
    }))
}

/// The lookup in `signup` can race with another signup for the same name.
/// The UNIQUE index decides the winner and the loser gets the field error.
fn insert_user(db: &Database, user_id: Uuid, username: &str, password_hash: &str) -> Result<(), ApiError> {
    match db.create_user(&user_id.to_string(), username, password_hash, chrono::Utc::now()) {
        Ok(()) => Ok(()),
        Err(e) if barter_db::is_unique_violation(&e) => {
            let mut errors = ValidationErrors::default();
            errors.add_field("username", USERNAME_TAKEN);
            Err(errors.into())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn create_token(state: &AppStateInner, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + state.token_ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}
