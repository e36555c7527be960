//! Bearer-JWT authentication for the PVP API.
//!
//! Tokens are minted by the account service; this side only verifies them
//! and exposes the player id they carry.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub pid: i64,    // player_id
    pub exp: usize,
}

fn secret() -> Option<String> {
    env::var("JWT_SECRET").ok()
}

/// Validates `token` and returns the player id it was issued for.
pub fn player_from_token(token: &str) -> Result<i64, &'static str> {
    let secret = secret().ok_or("server mis-config")?;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| "invalid / expired token")?;
    Ok(data.claims.pid)
}

/// Signs a token for `player_id`; used by tooling and tests.
pub fn issue_token(
    user_id: &str,
    player_id: i64,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let secret = secret().unwrap_or_default();
    let claims = Claims {
        sub: user_id.to_owned(),
        pid: player_id,
        exp: (Utc::now() + ttl).timestamp().max(0) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

//////////////////////////////////////////////////
// ─────────────  JwtAuth extractor  ─────────────
//////////////////////////////////////////////////

pub mod extractor {
    use actix_web::{
        dev::Payload, error::ErrorUnauthorized, FromRequest, HttpRequest, Result as ActixResult,
    };
    use futures_util::future::{ready, Ready};

    /// Extracts and validates a Bearer-JWT, exposing the player id.
    #[derive(Debug, Clone, Copy)]
    pub struct JwtAuth {
        pub player_id: i64,
    }

    impl FromRequest for JwtAuth {
        type Error = actix_web::Error;
        type Future = Ready<ActixResult<Self, Self::Error>>;

        fn from_request(req: &HttpRequest, _pl: &mut Payload) -> Self::Future {
            let res = (|| {
                // Expect:  Authorization: Bearer <JWT>
                let hdr = req
                    .headers()
                    .get("Authorization")
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| ErrorUnauthorized("missing Authorization header"))?;

                let token = hdr
                    .strip_prefix("Bearer ")
                    .ok_or_else(|| ErrorUnauthorized("malformed Authorization header"))?;

                let player_id = super::player_from_token(token).map_err(ErrorUnauthorized)?;
                Ok(JwtAuth { player_id })
            })();

            ready(res)
        }
    }
}
pub use extractor::JwtAuth;
