use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorMessage, HttpError};

/// Claims issued by the external session provider. `sub` carries the
/// principal id; email and name are used to create a profile lazily on
/// first sign-in. Tokens are only ever verified here, never minted.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub iat: usize,
    pub exp: usize,
}

pub fn decode_token(token: impl Into<String>, secret: &[u8]) -> Result<TokenClaims, HttpError> {
    let decoded = decode::<TokenClaims>(
        &token.into(),
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    );

    match decoded {
        Ok(token) => Ok(token.claims),
        Err(_) => Err(HttpError::unauthorized(ErrorMessage::InvalidToken.to_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &[u8] = b"test-secret";

    // Stands in for the external session provider.
    fn create_token(
        principal_id: &str,
        email: &str,
        name: &str,
        secret: &[u8],
        expires_in_seconds: i64,
    ) -> String {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: principal_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + Duration::seconds(expires_in_seconds)).timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    #[test]
    fn round_trips_claims() {
        let token = create_token("principal-1", "ada@example.com", "Ada", SECRET, 60);
        let claims = decode_token(token, SECRET).unwrap();

        assert_eq!(claims.sub, "principal-1");
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.name, "Ada");
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = create_token("principal-1", "ada@example.com", "Ada", SECRET, 60);
        assert!(decode_token(token, b"other-secret").is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let token = create_token("principal-1", "ada@example.com", "Ada", SECRET, -60);
        assert!(decode_token(token, SECRET).is_err());
    }
}
