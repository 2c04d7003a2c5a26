//! SQLite-backed repository for feedback submissions.

use super::helpers::{decode_metadata, decode_rating, encode_metadata};
use crate::feedback::{FeedbackRecord, NewFeedback};
use crate::now_millis;
use crate::persistence::traits::FeedbackRepository;
use crate::persistence::{
    generate_record_id, parse_record_id, FeedbackPage, Page, PersistenceError,
};
use crate::storage::SqliteStorage;

/// Row type for feedback queries, mapped via `sqlx::FromRow`.
#[derive(sqlx::FromRow)]
struct FeedbackRow {
    id: String,
    name: Option<String>,
    email: Option<String>,
    company: Option<String>,
    message: String,
    rating: Option<i64>,
    metadata: Option<String>,
    created_at: i64,
}

impl From<FeedbackRow> for FeedbackRecord {
    fn from(r: FeedbackRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            company: r.company,
            message: r.message,
            rating: decode_rating(r.rating),
            metadata: r.metadata.map(decode_metadata),
            created_at: r.created_at.max(0) as u64,
        }
    }
}

/// SQLite implementation of [`FeedbackRepository`].
#[derive(Clone)]
pub struct SqliteFeedbackRepository {
    storage: SqliteStorage,
}

impl SqliteFeedbackRepository {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }
}

impl FeedbackRepository for SqliteFeedbackRepository {
    async fn create_feedback(
        &self,
        data: &NewFeedback,
    ) -> Result<FeedbackRecord, PersistenceError> {
        let db = self.storage.acquire().await?;
        let id = generate_record_id();
        let metadata = data.metadata.as_ref().map(encode_metadata).transpose()?;
        let rating = data.rating.map(i64::from);
        let now = now_millis() as i64;

        // created_at never goes below the newest stored value, so a clock
        // step backwards cannot reorder listings.
        let created_at: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO feedback
                (id, name, email, company, message, rating, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?,
                    MAX(?, COALESCE((SELECT MAX(created_at) FROM feedback), 0)))
            RETURNING created_at
            "#,
        )
        .bind(&id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.company)
        .bind(&data.message)
        .bind(rating)
        .bind(metadata)
        .bind(now)
        .fetch_one(db.pool())
        .await?;

        tracing::debug!(id = %id, created_at, "Stored feedback");
        Ok(FeedbackRecord::from_new(id, created_at as u64, data))
    }

    async fn list_feedback(&self, page: Page) -> Result<FeedbackPage, PersistenceError> {
        let db = self.storage.acquire().await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feedback")
            .fetch_one(db.pool())
            .await?;

        // LIMIT -1 means "no limit" in SQLite
        let limit = page.limit.map(i64::from).unwrap_or(-1);
        let rows: Vec<FeedbackRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, company, message, rating, metadata, created_at
            FROM feedback
            ORDER BY created_at DESC, seq DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(i64::from(page.offset))
        .fetch_all(db.pool())
        .await?;

        Ok(FeedbackPage {
            count: count.max(0) as u64,
            feedback: rows.into_iter().map(FeedbackRecord::from).collect(),
        })
    }

    async fn get_feedback(&self, id: &str) -> Result<Option<FeedbackRecord>, PersistenceError> {
        let id = parse_record_id(id)?;
        let db = self.storage.acquire().await?;

        let row: Option<FeedbackRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, company, message, rating, metadata, created_at
            FROM feedback
            WHERE id = ?
            "#,
        )
        .bind(&id)
        .fetch_optional(db.pool())
        .await?;

        Ok(row.map(FeedbackRecord::from))
    }

    async fn delete_feedback(&self, id: &str) -> Result<bool, PersistenceError> {
        let id = parse_record_id(id)?;
        let db = self.storage.acquire().await?;

        let result = sqlx::query("DELETE FROM feedback WHERE id = ?")
            .bind(&id)
            .execute(db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SqliteConnector, StorageManager, StorageOptions};
    use serde_json::json;

    fn test_repo() -> SqliteFeedbackRepository {
        let storage = StorageManager::new(SqliteConnector::new(StorageOptions::in_memory()));
        SqliteFeedbackRepository::new(storage)
    }

    fn sample(message: &str) -> NewFeedback {
        NewFeedback {
            name: Some("Ada".to_string()),
            email: Some("ada@example.com".to_string()),
            company: None,
            message: message.to_string(),
            rating: Some(5),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_roundtrip() {
        let repo = test_repo();
        let created = repo.create_feedback(&sample("Great service!")).await.unwrap();
        let loaded = repo.get_feedback(&created.id).await.unwrap();
        assert_eq!(loaded, Some(created.clone()));
        assert_eq!(created.content(), sample("Great service!"));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let repo = test_repo();
        let loaded = repo.get_feedback(&generate_record_id()).await.unwrap();
        assert_eq!(loaded, None);
    }

    #[tokio::test]
    async fn test_malformed_id_rejected_before_connecting() {
        let storage = StorageManager::new(SqliteConnector::new(StorageOptions::in_memory()));
        let repo = SqliteFeedbackRepository::new(storage.clone());

        assert!(matches!(
            repo.get_feedback("nope").await,
            Err(PersistenceError::InvalidId(_))
        ));
        assert!(matches!(
            repo.delete_feedback("nope").await,
            Err(PersistenceError::InvalidId(_))
        ));
        assert!(!storage.is_connected());
    }

    #[tokio::test]
    async fn test_list_ordering() {
        let repo = test_repo();
        let old = repo.create_feedback(&sample("old one")).await.unwrap();
        let mid = repo.create_feedback(&sample("mid one")).await.unwrap();
        let new = repo.create_feedback(&sample("new one")).await.unwrap();

        let page = repo.list_feedback(Page::default()).await.unwrap();
        assert_eq!(page.count, 3);
        let ids: Vec<&str> = page.feedback.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec![new.id.as_str(), mid.id.as_str(), old.id.as_str()]);
    }

    #[tokio::test]
    async fn test_created_at_is_monotonic() {
        let repo = test_repo();
        let mut last = 0;
        for i in 0..20 {
            let record = repo.create_feedback(&sample(&format!("message {i}"))).await.unwrap();
            assert!(record.created_at >= last);
            last = record.created_at;
        }
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let repo = test_repo();
        for i in 0..5 {
            repo.create_feedback(&sample(&format!("message {i}"))).await.unwrap();
        }

        let page = repo
            .list_feedback(Page {
                limit: Some(2),
                offset: 1,
            })
            .await
            .unwrap();
        assert_eq!(page.count, 5);
        assert_eq!(page.feedback.len(), 2);
        assert_eq!(page.feedback[0].message, "message 3");
        assert_eq!(page.feedback[1].message, "message 2");
    }

    #[tokio::test]
    async fn test_list_empty() {
        let repo = test_repo();
        let page = repo.list_feedback(Page::default()).await.unwrap();
        assert_eq!(page.count, 0);
        assert!(page.feedback.is_empty());
    }

    #[tokio::test]
    async fn test_delete_twice_reports_absent() {
        let repo = test_repo();
        let created = repo.create_feedback(&sample("to delete")).await.unwrap();
        assert!(repo.delete_feedback(&created.id).await.unwrap());
        assert!(!repo.delete_feedback(&created.id).await.unwrap());
        assert_eq!(repo.get_feedback(&created.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_metadata_roundtrip() {
        let repo = test_repo();
        let mut data = sample("with metadata");
        data.metadata = Some(json!({"x": 1, "y": [1, 2]}));
        let created = repo.create_feedback(&data).await.unwrap();

        let loaded = repo.get_feedback(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded.metadata, Some(json!({"x": 1, "y": [1, 2]})));

        let page = repo.list_feedback(Page::default()).await.unwrap();
        assert_eq!(page.feedback[0].metadata, Some(json!({"x": 1, "y": [1, 2]})));
    }

    #[tokio::test]
    async fn test_get_accepts_uppercase_id() {
        let repo = test_repo();
        let created = repo.create_feedback(&sample("case test")).await.unwrap();
        let loaded = repo.get_feedback(&created.id.to_uppercase()).await.unwrap();
        assert_eq!(loaded.map(|f| f.id), Some(created.id));
    }
}
