//! Login against `app_users` and the demo account seeder.

use helpline_core::auth::{hash_password, verify_password, Role, TokenIssuer};
use helpline_core::models::AppUser;
use helpline_core::HelplineError;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

pub const MISSING_CREDENTIALS: &str = "Email and password are required";
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: AppUser,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Pull non-empty credentials out of a login body.
pub fn credentials(req: &LoginRequest) -> Result<(String, &str), HelplineError> {
    match (req.email.as_deref(), req.password.as_deref()) {
        (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
            Ok((normalize_email(email), password))
        }
        _ => Err(HelplineError::Validation(MISSING_CREDENTIALS.to_string())),
    }
}

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<AppUser>, HelplineError> {
    let user = sqlx::query_as::<_, AppUser>("SELECT * FROM app_users WHERE email = $1")
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn login(
    pool: &PgPool,
    issuer: &TokenIssuer,
    req: &LoginRequest,
) -> Result<LoginResponse, HelplineError> {
    let (email, password) = credentials(req)?;

    let user = find_user_by_email(pool, &email)
        .await?
        .ok_or_else(|| HelplineError::Auth(INVALID_CREDENTIALS.to_string()))?;

    if !verify_password(password, &user.password_hash)? {
        tracing::warn!(email = %email, "Rejected login: wrong password");
        return Err(HelplineError::Auth(INVALID_CREDENTIALS.to_string()));
    }

    let token = issuer.issue(&user)?;
    tracing::info!(email = %email, role = %user.role, "User logged in");
    Ok(LoginResponse { token, user })
}

// ============================================================================
// Demo accounts
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct DemoUser {
    pub email: &'static str,
    pub password: &'static str,
    pub first_name: &'static str,
    pub last_name: &'static str,
    pub role: Role,
    pub client: Option<&'static str>,
    pub client_id: Option<&'static str>,
}

pub const DEMO_USERS: &[DemoUser] = &[
    DemoUser {
        email: "admin@omnisahayak.com",
        password: "admin123",
        first_name: "Admin",
        last_name: "User",
        role: Role::Admin,
        client: None,
        client_id: None,
    },
    DemoUser {
        email: "support@omnisahayak.com",
        password: "support123",
        first_name: "Support",
        last_name: "Agent",
        role: Role::SupportAgent,
        client: None,
        client_id: None,
    },
    DemoUser {
        email: "customer@example.com",
        password: "customer123",
        first_name: "Demo",
        last_name: "Customer",
        role: Role::Customer,
        client: Some("Example Corp"),
        client_id: Some("EXAMPLE001"),
    },
];

/// Insert or refresh one account; the password is re-hashed every time.
pub async fn upsert_user(pool: &PgPool, user: &DemoUser) -> Result<AppUser, HelplineError> {
    let password_hash = hash_password(user.password)?;
    let row = sqlx::query_as::<_, AppUser>(
        r#"
        INSERT INTO app_users (email, password_hash, first_name, last_name, role, client, client_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (email) DO UPDATE SET
            password_hash = EXCLUDED.password_hash,
            first_name = EXCLUDED.first_name,
            last_name = EXCLUDED.last_name,
            role = EXCLUDED.role,
            client = EXCLUDED.client,
            client_id = EXCLUDED.client_id,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(normalize_email(user.email))
    .bind(password_hash)
    .bind(user.first_name)
    .bind(user.last_name)
    .bind(user.role.as_str())
    .bind(user.client)
    .bind(user.client_id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn seed_demo_users(pool: &PgPool) -> Result<usize, HelplineError> {
    for user in DEMO_USERS {
        upsert_user(pool, user).await?;
        tracing::info!(email = user.email, role = %user.role, "Seeded demo user");
    }
    Ok(DEMO_USERS.len())
}
