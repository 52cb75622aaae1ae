//! Signed bearer tokens.
//!
//! Tokens are self-contained HS256 JWTs; verifying one needs only the shared
//! secret, never a session table.

use crate::error::{Error, Result};
use crate::model::Identity;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Claims {
    /// Username of the token holder.
    pub sub: String,
    /// Storage id of the holder's account. Ids are never reused.
    pub uid: u64,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        TokenIssuer {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, identity: &Identity) -> Result<IssuedToken> {
        self.issue_at(identity, Utc::now())
    }

    /// Issues a token as if the current time were `now`.
    pub fn issue_at(&self, identity: &Identity, now: DateTime<Utc>) -> Result<IssuedToken> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| Error::Internal("token expiry out of range".to_owned()))?;
        let claims = Claims {
            sub: identity.user.username.clone(),
            uid: identity.id,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("token generation: {}", e)))?;
        Ok(IssuedToken {
            token,
            expires_at: Utc
                .timestamp_opt(claims.exp, 0)
                .single()
                .unwrap_or(expires_at),
        })
    }

    /// Checks signature and expiry; a token is rejected from its `exp` second on.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;
        let claims = decode::<Claims>(token, &self.decoding_key, &validation)?.claims;
        // jsonwebtoken accepts a token during its expiry second.
        if claims.exp <= Utc::now().timestamp() {
            return Err(Error::Authentication("token expired".to_owned()));
        }
        Ok(claims)
    }
}
