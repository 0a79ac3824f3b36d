use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims issued by the auth service. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

/// Identity resolved by the [`identify`](crate::identify) middleware.
///
/// `username` is empty when the caller was identified through the gateway's
/// `X-User-ID` header rather than a token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            username: claims.username,
        }
    }
}
