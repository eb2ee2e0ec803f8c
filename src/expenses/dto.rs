use serde::Deserialize;
use time::OffsetDateTime;

/// Request body for creating an expense.
#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

/// Partial update; absent fields keep their stored values.
#[derive(Debug, Deserialize)]
pub struct UpdateExpenseRequest {
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults() {
        let p: Pagination = serde_json::from_str("{}").unwrap();
        assert_eq!(p.limit, 20);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn update_accepts_sparse_bodies() {
        let body: UpdateExpenseRequest =
            serde_json::from_str(r#"{"amount": 12.0}"#).unwrap();
        assert_eq!(body.amount, Some(12.0));
        assert!(body.category.is_none());
        assert!(body.date.is_none());
    }

    #[test]
    fn create_parses_rfc3339_date() {
        let body: CreateExpenseRequest = serde_json::from_str(
            r#"{"amount": 100.0, "category": "food", "date": "2024-03-14T12:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(body.date.year(), 2024);
        assert!(body.description.is_none());
    }
}
