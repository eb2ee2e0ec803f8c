use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload used for authentication.
///
/// `token_version` pins the token to the generation it was issued under; the
/// request authenticator cross-checks it against the stored counter on every
/// call, so advancing the counter retires all earlier tokens at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,          // user ID
    pub email: String,      // login identifier
    pub token_version: i32, // generation counter at issuance
    pub iat: usize,         // issued at (unix timestamp)
    pub exp: usize,         // expires at (unix timestamp)
    pub iss: String,        // issuer
    pub aud: String,        // audience
}
