//! Bearer tokens for dashboard and chat logins (HS256).

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::Role;
use crate::config::AuthConfig;
use crate::error::HelplineError;
use crate::models::AppUser;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub email: String,
    pub role: Role,
    pub client: Option<String>,
    pub client_id: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, Duration::hours(config.token_ttl_hours))
    }

    pub fn issue(&self, user: &AppUser) -> Result<String, HelplineError> {
        let role: Role = user.role.parse()?;
        let now = Utc::now();
        let claims = Claims {
            email: user.email.clone(),
            role,
            client: user.client.clone(),
            client_id: user.client_id.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| HelplineError::Other(format!("Failed to sign token: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, HelplineError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| HelplineError::Auth(format!("Invalid token: {e}")))
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn extract_bearer(header_value: &str) -> Option<&str> {
    let token = header_value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(role: &str) -> AppUser {
        AppUser {
            id: Uuid::new_v4(),
            email: "customer@example.com".to_string(),
            password_hash: String::new(),
            first_name: "Demo".to_string(),
            last_name: "Customer".to_string(),
            role: role.to_string(),
            client: Some("Example Corp".to_string()),
            client_id: Some("EXAMPLE001".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_then_verify_carries_claims() {
        let issuer = TokenIssuer::new("test-secret", Duration::days(1));
        let token = issuer.issue(&user("CUSTOMER")).unwrap();
        let claims = issuer.verify(&token).unwrap();

        assert_eq!(claims.email, "customer@example.com");
        assert_eq!(claims.role, Role::Customer);
        assert_eq!(claims.client_id.as_deref(), Some("EXAMPLE001"));
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = TokenIssuer::new("secret-a", Duration::days(1))
            .issue(&user("ADMIN"))
            .unwrap();
        let err = TokenIssuer::new("secret-b", Duration::days(1))
            .verify(&token)
            .unwrap_err();
        assert!(matches!(err, HelplineError::Auth(_)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let issuer = TokenIssuer::new("test-secret", Duration::hours(-2));
        let token = issuer.issue(&user("SUPPORT_AGENT")).unwrap();
        assert!(issuer.verify(&token).is_err());
    }

    #[test]
    fn test_unknown_role_cannot_be_issued() {
        let issuer = TokenIssuer::new("test-secret", Duration::days(1));
        assert!(issuer.issue(&user("SUPERUSER")).is_err());
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(extract_bearer("Bearer   "), None);
        assert_eq!(extract_bearer("Basic dXNlcjpwYXNz"), None);
    }
}
