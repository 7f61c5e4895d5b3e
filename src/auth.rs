use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{errors::ServiceError, AppState};

/// Claims minted by the identity service. Token issuance, registration and
/// the agency approval workflow live there; this crate only verifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated user id
    pub sub: Uuid,
    /// Agency profile owned by this user, when one exists and is approved
    #[serde(default)]
    pub agency_id: Option<Uuid>,
    pub exp: usize,
}

/// Authenticated actor extracted from the bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub agency_id: Option<Uuid>,
}

impl AuthUser {
    /// The agency this actor may act for, or a permission error.
    pub fn require_agency(&self) -> Result<Uuid, ServiceError> {
        self.agency_id
            .ok_or_else(|| ServiceError::Forbidden("Agency profile required".to_string()))
    }
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ServiceError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| ServiceError::Unauthorized(format!("Invalid token: {}", e)))?;
    Ok(data.claims)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("Missing authorization header".into()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServiceError::Unauthorized("Expected bearer token".into()))?
            .trim();

        let claims = decode_token(token, &state.config.jwt_secret)?;
        Ok(AuthUser {
            user_id: claims.sub,
            agency_id: claims.agency_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn mint(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn decodes_valid_token() {
        let user_id = Uuid::new_v4();
        let token = mint(
            &Claims {
                sub: user_id,
                agency_id: None,
                exp: (chrono::Utc::now().timestamp() + 3600) as usize,
            },
            "secret",
        );
        let claims = decode_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, user_id);
        assert!(claims.agency_id.is_none());
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = mint(
            &Claims {
                sub: Uuid::new_v4(),
                agency_id: None,
                exp: (chrono::Utc::now().timestamp() + 3600) as usize,
            },
            "secret-a",
        );
        assert!(decode_token(&token, "secret-b").is_err());
    }

    #[test]
    fn require_agency_enforced() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            agency_id: None,
        };
        assert!(user.require_agency().is_err());

        let agency_id = Uuid::new_v4();
        let agent = AuthUser {
            user_id: Uuid::new_v4(),
            agency_id: Some(agency_id),
        };
        assert_eq!(agent.require_agency().unwrap(), agency_id);
    }
}
