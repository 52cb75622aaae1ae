use crate::credentials::CredentialStore;
use crate::database::UserDb;
use crate::error::{Error, Result};
use crate::model::Identity;
use crate::token::TokenIssuer;
use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use log::debug;
use serde::Deserialize;
use std::fmt;
use std::future::{ready, Ready};

/// Resolves the identity behind some credentials, or fails.
pub trait Strategy {
    type Credentials: ?Sized;
    fn resolve(&self, credentials: &Self::Credentials) -> Result<Identity>;
}

#[derive(Deserialize)]
pub struct LoginParams {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginParams")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Username and password, checked against the credential store.
pub struct LocalStrategy {
    store: CredentialStore,
}

impl LocalStrategy {
    pub fn new(store: CredentialStore) -> Self {
        LocalStrategy { store }
    }
}

impl Strategy for LocalStrategy {
    type Credentials = LoginParams;

    fn resolve(&self, params: &LoginParams) -> Result<Identity> {
        self.store
            .verify(&params.username, &params.password)
            .map_err(|err| match err {
                Error::NotFound(_) | Error::Authentication(_) => {
                    debug!("login failed for {}: {}", params.username, err);
                    Error::Authentication("incorrect username or password".to_owned())
                }
                other => other,
            })
    }
}

/// Signed token, re-resolved to the stored identity it names.
pub struct BearerStrategy {
    db: sled::Db,
    issuer: TokenIssuer,
}

impl BearerStrategy {
    pub fn new(db: sled::Db, issuer: TokenIssuer) -> Self {
        BearerStrategy { db, issuer }
    }
}

impl Strategy for BearerStrategy {
    type Credentials = str;

    fn resolve(&self, token: &str) -> Result<Identity> {
        let claims = self.issuer.verify(token)?;
        match self.db.get_user(claims.uid)? {
            Some(user) if user.username == claims.sub => Ok(Identity {
                id: claims.uid,
                user,
            }),
            _ => Err(Error::Authentication(format!(
                "{} no longer exists",
                claims.sub
            ))),
        }
    }
}

/// The caller's identity, taken from an `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

fn authenticate(req: &HttpRequest) -> Result<Authenticated> {
    let bearer = req
        .app_data::<web::Data<BearerStrategy>>()
        .ok_or_else(|| Error::Internal("bearer strategy not configured".to_owned()))?;
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::Authentication("missing Authorization header".to_owned()))?;
    let token = bearer_token(value)
        .ok_or_else(|| Error::Authentication("expected a Bearer token".to_owned()))?;
    bearer.resolve(token).map(Authenticated)
}

/// Token part of an `Authorization` value; the scheme name is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

impl FromRequest for Authenticated {
    type Error = Error;
    type Future = Ready<Result<Self>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}
