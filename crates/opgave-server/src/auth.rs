use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use opgave_common::models::auth::Claims;
use opgave_db::UserRow;

use crate::config::AuthConfig;

/// Hash a password using argon2id
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("Invalid password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Well-formed argon2 hash that matches no password. Signin runs a compare
/// against it when the email is unknown, so the response time does not reveal
/// whether an account exists.
pub const DUMMY_PASSWORD_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$MDEyMzQ1Njc4OWFiY2RlZg$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Sign a JWT for the given identity. The secret decides the token kind:
/// access and refresh tokens share a claims shape but never a secret.
pub fn create_token(
    user_id: &str,
    email: &str,
    name: Option<&str>,
    secret: &str,
    ttl_secs: i64,
) -> Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        name: name.map(|n| n.to_string()),
        iat: now,
        exp: now + ttl_secs,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("Failed to sign token")
}

/// Validate a token's signature and expiry and return its claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims> {
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .context("Invalid token")?;
    Ok(token_data.claims)
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issue a fresh access+refresh pair for a verified user
pub fn issue_token_pair(user: &UserRow, auth: &AuthConfig) -> Result<TokenPair> {
    let user_id = user.user_id.to_string();
    let access_token = create_token(
        &user_id,
        &user.email,
        user.name.as_deref(),
        &auth.access_secret,
        auth.access_ttl_secs,
    )?;
    let refresh_token = create_token(
        &user_id,
        &user.email,
        user.name.as_deref(),
        &auth.refresh_secret,
        auth.refresh_ttl_secs,
    )?;
    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn test_auth_config() -> AuthConfig {
        AuthConfig {
            access_secret: "test-access-secret".to_string(),
            refresh_secret: "test-refresh-secret".to_string(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 604_800,
            cookie_secure: false,
        }
    }

    fn test_user() -> UserRow {
        UserRow {
            user_id: Uuid::new_v4(),
            name: Some("tester".to_string()),
            email: "test@example.com".to_string(),
            password_hash: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_password_hash_and_verify_correct() {
        let password = "my-secure-password";
        let hash = hash_password(password).unwrap();
        assert!(verify_password(password, &hash).unwrap());
    }

    #[test]
    fn test_password_verify_wrong() {
        let hash = hash_password("correct-password").unwrap();
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn test_password_different_salts() {
        let password = "same-password";
        let hash1 = hash_password(password).unwrap();
        let hash2 = hash_password(password).unwrap();
        assert_ne!(hash1, hash2);
        // Both still verify
        assert!(verify_password(password, &hash1).unwrap());
        assert!(verify_password(password, &hash2).unwrap());
    }

    #[test]
    fn test_dummy_hash_is_well_formed_and_matches_nothing() {
        assert!(!verify_password("any-password", DUMMY_PASSWORD_HASH).unwrap());
        assert!(!verify_password("", DUMMY_PASSWORD_HASH).unwrap());
    }

    #[test]
    fn test_token_create_and_validate() {
        let secret = "test-secret";
        let token = create_token("user-123", "test@example.com", Some("tester"), secret, 900).unwrap();
        let claims = validate_token(&token, secret).unwrap();
        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.name.as_deref(), Some("tester"));
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_token_wrong_secret_fails() {
        let token = create_token("user-123", "test@example.com", None, "secret-1", 900).unwrap();
        assert!(validate_token(&token, "secret-2").is_err());
    }

    #[test]
    fn test_token_pair_secrets_are_isolated() {
        let auth = test_auth_config();
        let pair = issue_token_pair(&test_user(), &auth).unwrap();

        // each token verifies under its own secret only
        assert!(validate_token(&pair.access_token, &auth.access_secret).is_ok());
        assert!(validate_token(&pair.access_token, &auth.refresh_secret).is_err());
        assert!(validate_token(&pair.refresh_token, &auth.refresh_secret).is_ok());
        assert!(validate_token(&pair.refresh_token, &auth.access_secret).is_err());
    }

    #[test]
    fn test_expired_token_fails() {
        let secret = "test-secret";
        // far enough in the past to clear the default validation leeway
        let token = create_token("user-123", "test@example.com", None, secret, -3600).unwrap();
        assert!(validate_token(&token, secret).is_err());
    }

    #[test]
    fn test_tampered_token_fails() {
        let secret = "test-secret";
        let token = create_token("user-123", "test@example.com", None, secret, 900).unwrap();
        let tampered = format!("{}x", token);
        assert!(validate_token(&tampered, secret).is_err());
    }

    #[test]
    fn test_pair_claims_carry_identity() {
        let auth = test_auth_config();
        let user = test_user();
        let pair = issue_token_pair(&user, &auth).unwrap();

        let claims = validate_token(&pair.refresh_token, &auth.refresh_secret).unwrap();
        assert_eq!(claims.sub, user.user_id.to_string());
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.exp - claims.iat, auth.refresh_ttl_secs);
    }
}
