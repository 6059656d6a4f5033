use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::{DatabaseError, PostgrestClient};
use shared_models::auth::{AccessTokenResponse, User, UserRecord, UserRole, USER_COLUMNS};
use shared_utils::jwt::issue_token;

use crate::models::{
    AuthError, LoginRequest, RegisterRequest, UpdateMeRequest, PASSWORD_MAX, PASSWORD_MIN,
    USERNAME_MAX, USERNAME_MIN,
};
use crate::services::password::PasswordService;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Identity store: account creation, credential checks and self-service edits.
pub struct AccountService {
    db: PostgrestClient,
    jwt_secret: String,
    token_ttl_minutes: i64,
}

impl AccountService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: PostgrestClient::new(config),
            jwt_secret: config.jwt_secret.clone(),
            token_ttl_minutes: config.access_token_expire_minutes,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<User, AuthError> {
        let username = request.username.trim().to_string();
        validate_username(&username)?;
        validate_password(&request.password)?;
        let email = normalize_email(request.email)?;
        let role = signup_role(request.role.as_deref());

        debug!("Registering user {} as {}", username, role);

        if self.find_by_username(&username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }
        if let Some(email) = &email {
            if self.find_by_email(email).await?.is_some() {
                return Err(AuthError::EmailTaken);
            }
        }

        let password_hash = PasswordService::hash_password(&request.password)
            .map_err(|e| AuthError::Hashing(e.to_string()))?;

        let row = json!({
            "username": username,
            "email": email,
            "password_hash": password_hash,
            "role": role,
            "subscription_active": false,
        });

        let record: UserRecord = self
            .db
            .insert("users", row)
            .await
            .map_err(unique_to_conflict)?;

        info!("Registered user {} ({})", record.user.username, record.user.id);
        Ok(record.user)
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AccessTokenResponse, AuthError> {
        let identifier = request.identifier.trim();

        let mut record = self.find_by_username(identifier).await?;
        if record.is_none() && identifier.contains('@') {
            record = self.find_by_email(&identifier.to_lowercase()).await?;
        }

        let record = record.ok_or_else(|| {
            warn!("Login attempt for unknown identifier");
            AuthError::InvalidCredentials
        })?;

        if !PasswordService::verify_password(&request.password, &record.password_hash) {
            warn!("Wrong password for user {}", record.user.id);
            return Err(AuthError::InvalidCredentials);
        }

        let access_token = issue_token(&record.user, &self.jwt_secret, self.token_ttl_minutes)
            .map_err(AuthError::Token)?;

        info!("User {} logged in", record.user.id);
        Ok(AccessTokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.token_ttl_minutes * 60,
            user: record.user,
        })
    }

    pub async fn update_me(&self, current: &User, request: UpdateMeRequest) -> Result<User, AuthError> {
        let mut changes = Map::new();

        if let Some(username) = request.username.map(|u| u.trim().to_string()) {
            if username != current.username {
                validate_username(&username)?;
                if self.find_by_username(&username).await?.is_some() {
                    return Err(AuthError::UsernameTaken);
                }
                changes.insert("username".into(), json!(username));
            }
        }

        if let Some(email) = normalize_email(request.email)? {
            if current.email.as_deref() != Some(email.as_str()) {
                if self.find_by_email(&email).await?.is_some() {
                    return Err(AuthError::EmailTaken);
                }
                changes.insert("email".into(), json!(email));
            }
        }

        if let Some(password) = request.password {
            validate_password(&password)?;
            let hash = PasswordService::hash_password(&password)
                .map_err(|e| AuthError::Hashing(e.to_string()))?;
            changes.insert("password_hash".into(), json!(hash));
        }

        if let Some(avatar_url) = request.avatar_url {
            let avatar_url = avatar_url.trim();
            let value = if avatar_url.is_empty() { Value::Null } else { json!(avatar_url) };
            changes.insert("avatar_url".into(), value);
        }

        if changes.is_empty() {
            return Ok(current.clone());
        }

        let path = format!("/rest/v1/users?id=eq.{}&select={}", current.id, USER_COLUMNS);
        let updated: User = self
            .db
            .update(&path, Value::Object(changes))
            .await
            .map_err(unique_to_conflict)?
            .ok_or(AuthError::Database(DatabaseError::EmptyResult))?;

        info!("Updated account {}", updated.id);
        Ok(updated)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, AuthError> {
        let path = format!("/rest/v1/users?username=eq.{}", urlencoding::encode(username));
        Ok(self.db.select_one(&path).await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        let path = format!("/rest/v1/users?email=eq.{}", urlencoding::encode(email));
        Ok(self.db.select_one(&path).await?)
    }
}

fn unique_to_conflict(err: DatabaseError) -> AuthError {
    match err {
        DatabaseError::UniqueViolation(msg) if msg.contains("email") => AuthError::EmailTaken,
        DatabaseError::UniqueViolation(_) => AuthError::UsernameTaken,
        other => AuthError::Database(other),
    }
}

fn validate_username(username: &str) -> Result<(), AuthError> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(AuthError::Validation(format!(
            "Username must be between {} and {} characters",
            USERNAME_MIN, USERNAME_MAX
        )));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(AuthError::Validation(format!(
            "Password must be between {} and {} characters",
            PASSWORD_MIN, PASSWORD_MAX
        )));
    }
    Ok(())
}

/// Blank emails count as absent; stored lowercase.
fn normalize_email(email: Option<String>) -> Result<Option<String>, AuthError> {
    let Some(email) = email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty()) else {
        return Ok(None);
    };

    let valid = Regex::new(EMAIL_PATTERN)
        .map(|re| re.is_match(&email))
        .unwrap_or(false);

    if !valid || email.len() > 254 {
        return Err(AuthError::Validation(format!("Invalid email address: {}", email)));
    }
    Ok(Some(email))
}

fn signup_role(requested: Option<&str>) -> UserRole {
    match requested.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
        Some("provider") => UserRole::Provider,
        _ => UserRole::Client,
    }
}
