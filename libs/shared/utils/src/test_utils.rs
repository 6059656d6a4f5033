use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Claims, User, UserRole};

pub struct TestConfig {
    pub jwt_secret: String,
    pub database_rest_url: String,
    pub database_service_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            database_rest_url: "http://localhost:54321".to_string(),
            database_service_key: "test-service-key".to_string(),
        }
    }
}

impl TestConfig {
    /// Config pointing the store client at a mock server.
    pub fn with_rest_url(url: &str) -> Self {
        Self {
            database_rest_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            database_rest_url: self.database_rest_url.clone(),
            database_service_key: self.database_service_key.clone(),
            jwt_secret: self.jwt_secret.clone(),
            access_token_expire_minutes: 60,
            cors_origins: Vec::new(),
            server_port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
}

impl TestUser {
    pub fn new(username: &str, role: UserRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{}@example.com", username),
            role,
        }
    }

    pub fn client(username: &str) -> Self {
        Self::new(username, UserRole::Client)
    }

    pub fn provider(username: &str) -> Self {
        Self::new(username, UserRole::Provider)
    }

    pub fn admin(username: &str) -> Self {
        Self::new(username, UserRole::Admin)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            email: Some(self.email.clone()),
            role: self.role,
            avatar_url: None,
            subscription_active: self.role == UserRole::Provider,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            role: Some(user.role.to_string()),
            iat: now.timestamp(),
            exp: (now + Duration::hours(exp_hours.unwrap_or(24))).timestamp(),
        };

        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
            .expect("test token should encode")
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// PostgREST row payloads as the store returns them.
pub struct MockRestResponses;

impl MockRestResponses {
    pub fn user_row(user: &TestUser) -> Value {
        json!({
            "id": user.id,
            "username": user.username,
            "email": user.email,
            "role": user.role.to_string(),
            "avatar_url": null,
            "subscription_active": user.role == UserRole::Provider,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn user_record_row(user: &TestUser, password_hash: &str) -> Value {
        let mut row = Self::user_row(user);
        row["password_hash"] = json!(password_hash);
        row
    }

    pub fn provider_row(provider_id: Uuid, user_id: Uuid, code: &str) -> Value {
        json!({
            "id": provider_id,
            "user_id": user_id,
            "name": "",
            "description": "",
            "code": code,
            "active": true,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn service_row(service_id: Uuid, provider_id: Uuid, name: &str, duration_minutes: i32, price: i64) -> Value {
        json!({
            "id": service_id,
            "provider_id": provider_id,
            "name": name,
            "duration_minutes": duration_minutes,
            "price": price,
            "active": true,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn availability_row(block_id: Uuid, provider_id: Uuid, day_of_week: i16, start_time: &str, end_time: &str) -> Value {
        json!({
            "id": block_id,
            "provider_id": provider_id,
            "day_of_week": day_of_week,
            "start_time": start_time,
            "end_time": end_time,
            "active": true,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_row(
        appointment_id: Uuid,
        provider_id: Uuid,
        service_id: Option<Uuid>,
        client_id: Option<Uuid>,
        start_at: &str,
        end_at: &str,
    ) -> Value {
        json!({
            "id": appointment_id,
            "provider_id": provider_id,
            "service_id": service_id,
            "client_id": client_id,
            "start_at": start_at,
            "end_at": end_at,
            "status": "confirmed",
            "cancellation_reason": null,
            "applied_price": null,
            "client_name": null,
            "client_contact": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }
}
