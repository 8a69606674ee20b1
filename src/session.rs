//! Admin sessions: password check and signed JWT issuance/verification.

use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::SessionSection;
use crate::errors::SessionError;

pub const ADMIN_ROLE: &str = "admin";

/// What's inside a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject, the admin username.
    pub sub: String,
    pub role: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: i64,
}

/// Issues and verifies HS256 session tokens.
#[derive(Clone)]
pub struct SessionService {
    encoding_key: jsonwebtoken::EncodingKey,
    decoding_key: jsonwebtoken::DecodingKey,
    validation: jsonwebtoken::Validation,
    ttl_secs: i64,
    admin_username: String,
    /// PHC string, e.g. `$argon2id$v=19$...`
    admin_password_hash: String,
}

impl SessionService {
    pub fn new(
        secret: &str,
        ttl_secs: i64,
        admin_username: &str,
        admin_password_hash: &str,
    ) -> Self {
        Self {
            encoding_key: jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: jsonwebtoken::DecodingKey::from_secret(secret.as_bytes()),
            validation: jsonwebtoken::Validation::default(),
            ttl_secs,
            admin_username: admin_username.to_string(),
            admin_password_hash: admin_password_hash.to_string(),
        }
    }

    /// `None` when the secret or admin password hash is not configured.
    pub fn from_config(config: &SessionSection) -> Option<Self> {
        let secret = config.secret.as_deref()?;
        let hash = config.admin_password_hash.as_deref()?;
        Some(Self::new(
            secret,
            config.ttl_secs,
            &config.admin_username,
            hash,
        ))
    }

    /// Check admin credentials and issue a token on success.
    pub fn login(&self, username: &str, password: &str) -> Result<IssuedSession, SessionError> {
        // Unknown users still pay for a full verification.
        let pass_ok = verify_password(password, &self.admin_password_hash);
        if username != self.admin_username || !pass_ok {
            return Err(SessionError::InvalidCredentials);
        }
        self.issue(username, ADMIN_ROLE)
    }

    pub fn issue(&self, subject: &str, role: &str) -> Result<IssuedSession, SessionError> {
        self.issue_at(subject, role, chrono::Utc::now().timestamp())
    }

    pub fn issue_at(
        &self,
        subject: &str,
        role: &str,
        now: i64,
    ) -> Result<IssuedSession, SessionError> {
        let claims = Claims {
            sub: subject.to_string(),
            role: role.to_string(),
            iat: now,
            exp: now + self.ttl_secs,
        };
        let token =
            jsonwebtoken::encode(&jsonwebtoken::Header::default(), &claims, &self.encoding_key)
                .map_err(|e| SessionError::Signing(e.to_string()))?;
        Ok(IssuedSession {
            token,
            expires_at: claims.exp,
        })
    }

    /// Verify a token and extract its claims. Expired, tampered or
    /// foreign-key tokens are rejected.
    pub fn verify(&self, token: &str) -> Result<Claims, SessionError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| SessionError::InvalidToken(e.to_string()))
    }

    pub fn verify_admin(&self, token: &str) -> Result<Claims, SessionError> {
        let claims = self.verify(token)?;
        if claims.role != ADMIN_ROLE {
            return Err(SessionError::InvalidToken(format!(
                "role '{}' is not allowed",
                claims.role
            )));
        }
        Ok(claims)
    }
}

/// Hash a password with argon2id into a PHC string for the config file.
pub fn hash_password(password: &str) -> Result<String, SessionError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| SessionError::Signing(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a PHC hash. A hash that does not parse
/// never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            error!(error = %e, "Configured admin password hash is not a PHC string");
            false
        }
    }
}

/// Whether `hash` parses as a PHC string.
pub fn is_password_hash(hash: &str) -> bool {
    PasswordHash::new(hash).is_ok()
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, SessionError> {
    let value = header.ok_or(SessionError::MissingToken)?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .ok_or(SessionError::MissingToken)?;
    if token.is_empty() {
        return Err(SessionError::MissingToken);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-session-secret";

    fn service(ttl: i64) -> SessionService {
        SessionService::new(SECRET, ttl, "admin", &hash_password("hunter2").unwrap())
    }

    #[test]
    fn test_hash_password_is_salted_argon2() {
        let first = hash_password("hunter2").unwrap();
        let second = hash_password("hunter2").unwrap();
        assert!(first.starts_with("$argon2id$"), "{}", first);
        assert_ne!(first, second);
        assert!(verify_password("hunter2", &first));
        assert!(verify_password("hunter2", &second));
        assert!(!verify_password("hunter3", &first));
        assert!(is_password_hash(&first));
    }

    #[test]
    fn test_unparseable_hash_never_matches() {
        // Unsalted hex digests from older configs are not PHC strings.
        let hex = "f52fbd32b2b3b86ff88ef6c490628285f482af15ddcb29541f94bcf526a3f6c7";
        assert!(!is_password_hash(hex));
        assert!(!verify_password("hunter2", hex));
        let svc = SessionService::new(SECRET, 3600, "admin", hex);
        assert_eq!(
            svc.login("admin", "hunter2").unwrap_err(),
            SessionError::InvalidCredentials
        );
    }

    #[test]
    fn test_login_and_verify() {
        let svc = service(3600);
        let session = svc.login("admin", "hunter2").unwrap();
        let claims = svc.verify_admin(&session.token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.role, ADMIN_ROLE);
        assert_eq!(claims.exp, session.expires_at);
    }

    #[test]
    fn test_login_rejects_wrong_password_and_user() {
        let svc = service(3600);
        assert_eq!(
            svc.login("admin", "wrong").unwrap_err(),
            SessionError::InvalidCredentials
        );
        assert_eq!(
            svc.login("root", "hunter2").unwrap_err(),
            SessionError::InvalidCredentials
        );
    }

    #[test]
    fn test_verify_invalid_token_rejected() {
        let svc = service(3600);
        assert!(matches!(
            svc.verify("invalid.token.here"),
            Err(SessionError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_verify_wrong_secret_rejected() {
        let issuer = SessionService::new("secret-a", 3600, "admin", "x");
        let verifier = SessionService::new("secret-b", 3600, "admin", "x");
        let session = issuer.issue("admin", ADMIN_ROLE).unwrap();
        assert!(verifier.verify(&session.token).is_err());
    }

    #[test]
    fn test_verify_expired_token_rejected() {
        // Expired two minutes ago, past the default leeway.
        let svc = service(-120);
        let session = svc.issue("admin", ADMIN_ROLE).unwrap();
        assert!(svc.verify(&session.token).is_err());
    }

    #[test]
    fn test_verify_admin_rejects_other_roles() {
        let svc = service(3600);
        let session = svc.issue("customer-1", "customer").unwrap();
        assert!(svc.verify(&session.token).is_ok());
        assert!(svc.verify_admin(&session.token).is_err());
    }

    #[test]
    fn test_from_config_requires_secret_and_hash() {
        let mut section = SessionSection::default();
        assert!(SessionService::from_config(&section).is_none());
        section.secret = Some(SECRET.to_string());
        assert!(SessionService::from_config(&section).is_none());
        section.admin_password_hash = Some(hash_password("pw").unwrap());
        assert!(SessionService::from_config(&section).is_some());
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(bearer_token(None).unwrap_err(), SessionError::MissingToken);
        assert_eq!(
            bearer_token(Some("Basic dXNlcg==")).unwrap_err(),
            SessionError::MissingToken
        );
        assert_eq!(
            bearer_token(Some("Bearer   ")).unwrap_err(),
            SessionError::MissingToken
        );
    }
}
