use anyhow::{anyhow, Error};
use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use headers::authorization::{Bearer, Credentials};
use http::{header, request::Parts, StatusCode};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tower_http::validate_request::ValidateRequest;
use uuid::Uuid;

pub mod claims;

pub use claims::{Claims, CurrentUser};

/// Cookie fallback for browser clients that cannot set the header.
pub const AUTH_COOKIE: &str = "auth_token";

pub struct Keys {
    encoding: EncodingKey,
}

impl Keys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
        }
    }

    pub fn token(&self, claims: &Claims) -> Result<String, Error> {
        encode(&Header::default(), claims, &self.encoding).map_err(|e| anyhow!(e))
    }
}

#[derive(Clone)]
pub struct AuthState {
    decoding: DecodingKey,
}

impl AuthState {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    fn decode(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .ok()
    }
}

/// Resolves the caller's identity and stores it as a [`CurrentUser`] request
/// extension. Never rejects: routes decide via the extractors below whether
/// anonymous access is allowed.
///
/// Identity sources, in order: the gateway's `X-User-ID` header, a bearer
/// token in `Authorization`, the `auth_token` cookie.
pub async fn identify(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(user) = resolve_user(&state, &request) {
        request.extensions_mut().insert(user);
    }
    next.run(request).await
}

fn resolve_user(state: &AuthState, request: &Request) -> Option<CurrentUser> {
    if let Some(value) = request.headers().get(api::HEADER_USER_ID) {
        if let Ok(id) = value.to_str().unwrap_or_default().parse::<Uuid>() {
            return Some(CurrentUser {
                id,
                username: String::new(),
            });
        }
    }

    if let Some(auth_header) = request.headers().get(header::AUTHORIZATION) {
        if let Some(bearer) = Bearer::decode(auth_header) {
            if let Some(claims) = state.decode(bearer.token()) {
                return Some(claims.into());
            }
        }
    }

    let jar = CookieJar::from_headers(request.headers());
    if let Some(cookie) = jar.get(AUTH_COOKIE) {
        if let Some(claims) = state.decode(cookie.value()) {
            return Some(claims.into());
        }
    }

    None
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(api::response::Error::new("Unauthorized")),
    )
        .into_response()
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(unauthorized)
    }
}

/// Optional identity for endpoints that serve both anonymous and
/// authenticated callers (e.g. private-visibility checks).
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<CurrentUser>().cloned()))
    }
}

/// `ValidateRequestHeaderLayer::custom` guard for internal endpoints,
/// comparing the shared `X-Internal-API-Key` header.
#[derive(Clone)]
pub struct InternalKeyValidate {
    key: String,
}

impl InternalKeyValidate {
    pub fn new(key: String) -> Self {
        Self { key }
    }
}

impl<B> ValidateRequest<B> for InternalKeyValidate {
    type ResponseBody = Body;

    fn validate(&mut self, request: &mut http::Request<B>) -> Result<(), Response> {
        let presented = request
            .headers()
            .get(api::HEADER_INTERNAL_API_KEY)
            .and_then(|v| v.to_str().ok());
        match presented {
            Some(key) if !self.key.is_empty() && key == self.key => Ok(()),
            _ => Err(unauthorized()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_for(id: Uuid) -> Claims {
        Claims {
            sub: id,
            username: "broadcaster".to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        }
    }

    #[test]
    fn round_trips_issued_tokens() {
        let state = AuthState::new("secret");
        let id = Uuid::new_v4();
        let token = Keys::new(b"secret").token(&claims_for(id)).unwrap();

        let claims = state.decode(&token).expect("token should validate");
        assert_eq!(claims.sub, id);
        assert_eq!(claims.username, "broadcaster");
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let state = AuthState::new("secret");
        let token = Keys::new(b"not-the-secret")
            .token(&claims_for(Uuid::new_v4()))
            .unwrap();
        assert!(state.decode(&token).is_none());
    }

    #[test]
    fn internal_key_guard_matches_exact_header() {
        let mut guard = InternalKeyValidate::new("internal".to_string());

        let mut ok = http::Request::builder()
            .header(api::HEADER_INTERNAL_API_KEY, "internal")
            .body(())
            .unwrap();
        assert!(guard.validate(&mut ok).is_ok());

        let mut bad = http::Request::builder()
            .header(api::HEADER_INTERNAL_API_KEY, "wrong")
            .body(())
            .unwrap();
        assert!(guard.validate(&mut bad).is_err());

        let mut missing = http::Request::builder().body(()).unwrap();
        assert!(guard.validate(&mut missing).is_err());

        // An empty configured key must not turn the guard into allow-all.
        let mut empty = InternalKeyValidate::new(String::new());
        let mut any = http::Request::builder()
            .header(api::HEADER_INTERNAL_API_KEY, "")
            .body(())
            .unwrap();
        assert!(empty.validate(&mut any).is_err());
    }
}
