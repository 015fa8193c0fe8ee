//! Authentication and authorization
//!
//! - HS256 bearer tokens carrying email, role and client claims
//! - Argon2id password hashing for `app_users`
//! - Route policy mapping roles to the API prefixes they may call

pub mod jwt;
pub mod password;
pub mod policy;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HelplineError;

pub use jwt::{extract_bearer, Claims, TokenIssuer};
pub use password::{hash_password, verify_password};
pub use policy::{is_route_allowed, required_access, RouteAccess};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    SupportAgent,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::SupportAgent => "SUPPORT_AGENT",
            Role::Customer => "CUSTOMER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = HelplineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "SUPPORT_AGENT" => Ok(Role::SupportAgent),
            "CUSTOMER" => Ok(Role::Customer),
            other => Err(HelplineError::Auth(format!("Unknown role: {other}"))),
        }
    }
}
