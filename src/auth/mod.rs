//! Bearer-token authentication: token issuing, password hashing and the
//! request extractors that turn an `Authorization` header into an [`Actor`].

mod jwt;
mod password;

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};

use crate::error::DirectoryError;
use crate::models::Role;

pub use jwt::{Claims, JwtService};
pub use password::{hash_password, verify_password};

/// Identity making a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

impl Actor {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<Claims> for Actor {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.user_id,
            role: claims.role,
        }
    }
}

/// Extractor for routes that require a valid bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedActor(pub Actor);

/// Extractor for public routes. No header means anonymous; a header carrying
/// a bad token is still rejected.
#[derive(Debug, Clone, Copy)]
pub struct MaybeActor(pub Option<Actor>);

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn resolve_actor(req: &HttpRequest) -> Result<Option<Actor>, DirectoryError> {
    if !req.headers().contains_key(header::AUTHORIZATION) {
        return Ok(None);
    }

    let jwt = req
        .app_data::<web::Data<JwtService>>()
        .ok_or_else(|| DirectoryError::Internal("JWT service is not registered".into()))?;

    let token =
        bearer_token(req).ok_or_else(|| DirectoryError::unauthorized("Invalid token."))?;

    match jwt.verify_token(token) {
        Ok(claims) => Ok(Some(Actor::from(claims))),
        Err(err) => {
            log::debug!("Rejected bearer token: {err}");
            Err(DirectoryError::unauthorized("Invalid token."))
        }
    }
}

impl FromRequest for AuthenticatedActor {
    type Error = DirectoryError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(match resolve_actor(req) {
            Ok(Some(actor)) => Ok(Self(actor)),
            Ok(None) => Err(DirectoryError::unauthorized(
                "Access denied. No token provided.",
            )),
            Err(err) => Err(err),
        })
    }
}

impl FromRequest for MaybeActor {
    type Error = DirectoryError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(resolve_actor(req).map(Self))
    }
}
