use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

/// Token claims issued by the login flow
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub exp: i64,
    pub iat: i64,
}

/// Verify a bearer token and return `(user_id, device_id)`
pub fn verify_jwt(token: &str, secret: &str) -> Result<(Uuid, String), AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    let user_id =
        Uuid::parse_str(&token_data.claims.sub).map_err(|_| AuthError::InvalidCredentials)?;

    if token_data.claims.device_id.trim().is_empty() {
        return Err(AuthError::InvalidCredentials);
    }

    Ok((user_id, token_data.claims.device_id))
}

#[cfg(test)]
pub fn create_jwt(
    user_id: &Uuid,
    device_id: &str,
    secret: &str,
    expiration_hours: i64,
) -> Result<String, AuthError> {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = Utc::now();
    let exp = now + Duration::hours(expiration_hours);

    let claims = Claims {
        sub: user_id.to_string(),
        device_id: device_id.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_verify_jwt() {
        let user_id = Uuid::new_v4();
        let secret = "test-secret";

        let token = create_jwt(&user_id, "device-1", secret, 24).unwrap();
        let (verified_id, device_id) = verify_jwt(&token, secret).unwrap();

        assert_eq!(user_id, verified_id);
        assert_eq!(device_id, "device-1");
    }

    #[test]
    fn test_verify_jwt_invalid_secret() {
        let user_id = Uuid::new_v4();
        let token = create_jwt(&user_id, "device-1", "secret1", 24).unwrap();

        let result = verify_jwt(&token, "secret2");
        assert!(result.is_err());
    }

    #[test]
    fn test_verify_jwt_expired() {
        let user_id = Uuid::new_v4();
        let token = create_jwt(&user_id, "device-1", "secret", -2).unwrap();

        assert!(verify_jwt(&token, "secret").is_err());
    }

    #[test]
    fn test_verify_jwt_rejects_non_uuid_subject() {
        use chrono::Utc;
        use jsonwebtoken::{encode, EncodingKey, Header};

        let claims = Claims {
            sub: "not-a-uuid".to_string(),
            device_id: "device-1".to_string(),
            exp: Utc::now().timestamp() + 3600,
            iat: Utc::now().timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert!(matches!(
            verify_jwt(&token, "secret"),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
