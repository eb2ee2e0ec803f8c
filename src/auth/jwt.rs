use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::claims::Claims;
use super::dto::TokenPair;
use crate::config::JwtConfig;
use crate::state::AppState;

/// Token type: selects the signing secret and TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Signing and verification keys for the two token families.
///
/// Access and refresh tokens are signed with distinct secrets, so neither can
/// stand in for the other even though they carry identical claims.
#[derive(Clone)]
pub struct JwtKeys {
    pub access_encoding: EncodingKey,
    pub access_decoding: DecodingKey,
    pub refresh_encoding: EncodingKey,
    pub refresh_decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            access_secret,
            refresh_secret,
            issuer,
            audience,
            access_ttl_minutes,
            refresh_ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            issuer,
            audience,
            access_ttl: Duration::from_secs((access_ttl_minutes as u64) * 60),
            refresh_ttl: Duration::from_secs((refresh_ttl_minutes as u64) * 60),
        }
    }
}

impl JwtKeys {
    fn sign_with_kind(
        &self,
        user_id: Uuid,
        email: &str,
        token_version: i32,
        kind: TokenKind,
    ) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let (key, ttl) = match kind {
            TokenKind::Access => (&self.access_encoding, self.access_ttl),
            TokenKind::Refresh => (&self.refresh_encoding, self.refresh_ttl),
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            token_version,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, key)?;
        debug!(user_id = %user_id, kind = ?kind, token_version, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(
        &self,
        user_id: Uuid,
        email: &str,
        token_version: i32,
    ) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, email, token_version, TokenKind::Access)
    }

    pub fn sign_refresh(
        &self,
        user_id: Uuid,
        email: &str,
        token_version: i32,
    ) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, email, token_version, TokenKind::Refresh)
    }

    /// Both tokens of a pair carry the same claims, so version-based
    /// invalidation applies to them uniformly.
    pub fn issue_pair(
        &self,
        user_id: Uuid,
        email: &str,
        token_version: i32,
    ) -> anyhow::Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.sign_access(user_id, email, token_version)?,
            refresh_token: self.sign_refresh(user_id, email, token_version)?,
        })
    }

    fn verify_with_kind(&self, token: &str, kind: TokenKind) -> anyhow::Result<Claims> {
        let key = match kind {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        };
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, key, &validation)?;
        debug!(user_id = %data.claims.sub, kind = ?kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify_with_kind(token, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify_with_kind(token, TokenKind::Refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys() -> JwtKeys {
        let state = AppState::fake();
        JwtKeys::from_ref(&state)
    }

    #[tokio::test]
    async fn sign_and_verify_access_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys
            .sign_access(user_id, "alice@example.com", 4)
            .expect("sign access");
        let claims = keys.verify_access(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.token_version, 4);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
    }

    #[tokio::test]
    async fn sign_and_verify_refresh_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys
            .sign_refresh(user_id, "alice@example.com", 1)
            .expect("sign refresh");
        let claims = keys.verify_refresh(&token).expect("verify refresh");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.token_version, 1);
    }

    #[tokio::test]
    async fn token_families_do_not_cross_verify() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();

        let access = keys
            .sign_access(user_id, "alice@example.com", 1)
            .expect("sign access");
        assert!(keys.verify_refresh(&access).is_err());

        let refresh = keys
            .sign_refresh(user_id, "alice@example.com", 1)
            .expect("sign refresh");
        assert!(keys.verify_access(&refresh).is_err());
    }

    #[tokio::test]
    async fn issue_pair_stamps_both_tokens_with_the_same_generation() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let pair = keys
            .issue_pair(user_id, "alice@example.com", 7)
            .expect("issue pair");

        let access = keys.verify_access(&pair.access_token).expect("verify access");
        let refresh = keys
            .verify_refresh(&pair.refresh_token)
            .expect("verify refresh");
        assert_eq!(access.token_version, 7);
        assert_eq!(refresh.token_version, 7);
        assert_eq!(access.sub, refresh.sub);
    }

    #[tokio::test]
    async fn verify_rejects_expired_token() {
        let keys = make_keys();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        // Well past the default 60s validation leeway.
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "alice@example.com".into(),
            token_version: 1,
            iat: (now - 600) as usize,
            exp: (now - 300) as usize,
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &keys.access_encoding).expect("encode");
        assert!(keys.verify_access(&token).is_err());
    }

    #[tokio::test]
    async fn verify_rejects_foreign_issuer_and_audience() {
        let keys = make_keys();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "alice@example.com".into(),
            token_version: 1,
            iat: now as usize,
            exp: (now + 300) as usize,
            iss: "someone-else".into(),
            aud: "another-app".into(),
        };
        let token = encode(&Header::default(), &claims, &keys.access_encoding).expect("encode");
        assert!(keys.verify_access(&token).is_err());
    }
}
