use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,                              // unique user ID
    pub email: String,                         // login identifier, unique
    pub username: String,                      // local part of the email, not unique
    #[serde(skip_serializing)]
    pub password_hash: String,                 // Argon2 hash, not exposed in JSON
    #[serde(skip_serializing)]
    pub refresh_token_hash: Option<String>,    // Argon2 hash of the live refresh token
    pub token_version: i32,                    // generation counter, bumped on login/refresh/logout
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,            // creation timestamp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_omits_secret_fields() {
        let user = User {
            id: Uuid::new_v4(),
            email: "carol@example.com".into(),
            username: "carol".into(),
            password_hash: "$argon2id$v=19$fake".into(),
            refresh_token_hash: Some("$argon2id$v=19$other".into()),
            token_version: 3,
            created_at: OffsetDateTime::now_utc(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("carol@example.com"));
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("refresh_token_hash"));
        assert!(!json.contains("argon2id"));
    }
}
