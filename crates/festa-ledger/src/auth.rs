//! # Operator Identity
//!
//! JWT tokens identify the operator behind every ledger call.
//!
//! ## Token Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Issuer (login desk / tooling)          festa-api                      │
//! │       │                                    │                            │
//! │       │  HS256 JWT { sub, name, role }     │                            │
//! │       │───────────────────────────────────►│                            │
//! │       │                                    │  JwtManager::verify        │
//! │       │                                    │        │                   │
//! │       │                                    │        ▼                   │
//! │       │                                    │  Caller { operator_id,     │
//! │       │                                    │           name, role }     │
//! │       │                                    │        │                   │
//! │       │                                    │        ▼                   │
//! │       │                                    │  LedgerService::*          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use festa_core::{CoreError, Role};

use crate::error::{LedgerError, LedgerResult};

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (operator id).
    pub sub: String,

    /// Display name, recorded on ledger entries.
    pub name: String,

    pub role: Role,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// The authenticated identity behind a ledger call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub operator_id: String,
    pub name: String,
    pub role: Role,
}

impl Caller {
    pub fn new(operator_id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Caller {
            operator_id: operator_id.into(),
            name: name.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Fails with `PermissionDenied` unless the caller is an admin.
    pub fn require_admin(&self, action: &'static str) -> LedgerResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(CoreError::PermissionDenied { action }.into())
        }
    }
}

impl From<Claims> for Caller {
    fn from(claims: Claims) -> Self {
        Caller {
            operator_id: claims.sub,
            name: claims.name,
            role: claims.role,
        }
    }
}

/// JWT token manager.
#[derive(Clone)]
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime_secs: i64,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("lifetime_secs", &self.lifetime_secs)
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    pub fn new(secret: &str, lifetime_secs: i64) -> Self {
        JwtManager {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_secs,
        }
    }

    /// Mints a token for an operator.
    pub fn issue(&self, operator_id: &str, name: &str, role: Role) -> LedgerResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: operator_id.to_string(),
            name: name.to_string(),
            role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| LedgerError::Serialization(format!("Failed to generate token: {}", e)))
    }

    /// Validates a token and returns the caller it names.
    pub fn verify(&self, token: &str) -> LedgerResult<Caller> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| LedgerError::Unauthenticated(format!("Invalid token: {}", e)))?;

        if data.claims.sub.is_empty() {
            return Err(LedgerError::Unauthenticated("token has no subject".into()));
        }

        Ok(data.claims.into())
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use festa_core::ErrorKind;

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret", 3600);
        let token = manager.issue("op-7", "Ada", Role::Operator).unwrap();

        let caller = manager.verify(&token).unwrap();
        assert_eq!(caller, Caller::new("op-7", "Ada", Role::Operator));
        assert!(!caller.is_admin());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtManager::new("secret-a", 3600)
            .issue("op-7", "Ada", Role::Admin)
            .unwrap();

        let err = JwtManager::new("secret-b", 3600).verify(&token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    }

    #[test]
    fn test_expired_token_rejected() {
        // Well past the default 60s leeway.
        let manager = JwtManager::new("test-secret", -3600);
        let token = manager.issue("op-7", "Ada", Role::Operator).unwrap();
        assert!(manager.verify(&token).is_err());
    }

    #[test]
    fn test_require_admin() {
        let admin = Caller::new("admin-1", "Root", Role::Admin);
        assert!(admin.require_admin("generate QR batch").is_ok());

        let operator = Caller::new("op-1", "Ada", Role::Operator);
        let err = operator.require_admin("generate QR batch").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }
}
