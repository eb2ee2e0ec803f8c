use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Expense record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Expense {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Expense {
    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        amount: f64,
        category: &str,
        description: Option<&str>,
        date: OffsetDateTime,
    ) -> anyhow::Result<Expense> {
        let expense = sqlx::query_as::<_, Expense>(
            r#"
            INSERT INTO expenses (user_id, amount, category, description, date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, amount, category, description, date, created_at
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(category)
        .bind(description)
        .bind(date)
        .fetch_one(db)
        .await?;
        Ok(expense)
    }

    pub async fn list_by_user(
        db: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Expense>> {
        let rows = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, user_id, amount, category, description, date, created_at
            FROM expenses
            WHERE user_id = $1
            ORDER BY date DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Partial update; absent fields keep their stored values. Scoped by
    /// owner, so a foreign id reads as not found.
    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        amount: Option<f64>,
        category: Option<&str>,
        description: Option<&str>,
        date: Option<OffsetDateTime>,
    ) -> anyhow::Result<Option<Expense>> {
        let expense = sqlx::query_as::<_, Expense>(
            r#"
            UPDATE expenses
            SET amount = COALESCE($3, amount),
                category = COALESCE($4, category),
                description = COALESCE($5, description),
                date = COALESCE($6, date)
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, amount, category, description, date, created_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(amount)
        .bind(category)
        .bind(description)
        .bind(date)
        .fetch_optional(db)
        .await?;
        Ok(expense)
    }

    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM expenses
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_dates_as_rfc3339() {
        let expense = Expense {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            amount: 42.5,
            category: "groceries".into(),
            description: Some("weekly shop".into()),
            date: time::macros::datetime!(2024-03-14 12:00 UTC),
            created_at: time::macros::datetime!(2024-03-14 12:01 UTC),
        };

        let json = serde_json::to_string(&expense).unwrap();
        assert!(json.contains("2024-03-14T12:00:00Z"));
        assert!(json.contains("\"amount\":42.5"));
    }
}
