use crate::database::entities::{QueryRecord, query_history};
use crate::database::{DatabaseError, DatabaseResult};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

/// Query history DAO: append-only exchange log, owner-scoped reads and deletes
#[derive(Clone)]
pub struct HistoryDao {
    db: DatabaseConnection,
}

impl HistoryDao {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Append a record and return its id
    pub async fn insert(&self, record: &QueryRecord) -> DatabaseResult<i32> {
        let active_model = query_history::ActiveModel {
            id: ActiveValue::NotSet,
            user_id: Set(record.user_id.clone()),
            question: Set(record.question.clone()),
            answer: Set(record.answer.clone()),
            page_title: Set(record.page_title.clone()),
            page_url: Set(record.page_url.clone()),
            page_domain: Set(record.page_domain.clone()),
            context_text: Set(record.context_text.clone()),
            selected_text: Set(record.selected_text.clone()),
            model_used: Set(record.model_used.clone()),
            response_time_ms: Set(record.response_time_ms),
            created_at: Set(record.created_at),
        };

        let inserted = active_model
            .insert(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(inserted.id)
    }

    /// Newest-first page of a user's records
    pub async fn list(
        &self,
        user_id: &str,
        limit: u64,
        offset: u64,
    ) -> DatabaseResult<Vec<QueryRecord>> {
        query_history::Entity::find()
            .filter(query_history::Column::UserId.eq(user_id))
            .order_by_desc(query_history::Column::CreatedAt)
            .order_by_desc(query_history::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    pub async fn count(&self, user_id: &str) -> DatabaseResult<u64> {
        query_history::Entity::find()
            .filter(query_history::Column::UserId.eq(user_id))
            .count(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    /// All of a user's records, optionally restricted to `ids`, newest first
    pub async fn find_for_export(
        &self,
        user_id: &str,
        ids: Option<&[i32]>,
    ) -> DatabaseResult<Vec<QueryRecord>> {
        let mut select =
            query_history::Entity::find().filter(query_history::Column::UserId.eq(user_id));

        if let Some(ids) = ids {
            select = select.filter(query_history::Column::Id.is_in(ids.iter().copied()));
        }

        select
            .order_by_desc(query_history::Column::CreatedAt)
            .order_by_desc(query_history::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))
    }

    /// Delete one record owned by `user_id`; returns false when no such record is owned
    pub async fn delete(&self, user_id: &str, id: i32) -> DatabaseResult<bool> {
        let result = query_history::Entity::delete_many()
            .filter(query_history::Column::Id.eq(id))
            .filter(query_history::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    pub async fn clear(&self, user_id: &str) -> DatabaseResult<u64> {
        let result = query_history::Entity::delete_many()
            .filter(query_history::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;
    use crate::database::tests::memory_database;
    use chrono::{Duration, Utc};

    fn record(user_id: &str, question: &str, minutes_ago: i64) -> QueryRecord {
        QueryRecord {
            id: 0,
            user_id: user_id.to_string(),
            question: question.to_string(),
            answer: format!("answer to {}", question),
            page_title: None,
            page_url: None,
            page_domain: None,
            context_text: None,
            selected_text: None,
            model_used: "openai/gpt-3.5-turbo".to_string(),
            response_time_ms: 100,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_owner_scoped() {
        let db = memory_database().await;
        let dao = db.history();

        dao.insert(&record("alice", "old", 10)).await.unwrap();
        dao.insert(&record("alice", "new", 1)).await.unwrap();
        dao.insert(&record("bob", "other", 5)).await.unwrap();

        let page = dao.list("alice", 10, 0).await.unwrap();
        let questions: Vec<_> = page.iter().map(|r| r.question.as_str()).collect();
        assert_eq!(questions, vec!["new", "old"]);
        assert_eq!(dao.count("alice").await.unwrap(), 2);

        let second = dao.list("alice", 1, 1).await.unwrap();
        assert_eq!(second[0].question, "old");
    }

    #[tokio::test]
    async fn test_delete_requires_ownership() {
        let db = memory_database().await;
        let dao = db.history();
        let id = dao.insert(&record("alice", "mine", 1)).await.unwrap();

        assert!(!dao.delete("bob", id).await.unwrap());
        assert_eq!(dao.count("alice").await.unwrap(), 1);

        assert!(dao.delete("alice", id).await.unwrap());
        assert_eq!(dao.count("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_export_selection_and_clear() {
        let db = memory_database().await;
        let dao = db.history();
        let first = dao.insert(&record("alice", "one", 3)).await.unwrap();
        dao.insert(&record("alice", "two", 2)).await.unwrap();
        let foreign = dao.insert(&record("bob", "three", 1)).await.unwrap();

        let picked = dao
            .find_for_export("alice", Some(&[first, foreign]))
            .await
            .unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].question, "one");

        assert_eq!(dao.find_for_export("alice", None).await.unwrap().len(), 2);

        assert_eq!(dao.clear("alice").await.unwrap(), 2);
        assert_eq!(dao.count("bob").await.unwrap(), 1);
    }
}
