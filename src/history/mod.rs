//! Per-user query history: paging, deletion and export

pub mod export;

use crate::database::DatabaseManager;
use crate::database::entities::QueryRecord;
use crate::error::AppError;
use chrono::Utc;
use export::ExportFormat;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;
pub const RECENT_COUNT: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub queries: Vec<QueryRecord>,
    pub total: u64,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentQueries {
    pub queries: Vec<QueryRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub format: String,
    #[serde(default)]
    pub query_ids: Option<Vec<i32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub download_url: String,
    pub filename: String,
}

#[derive(Clone)]
pub struct HistoryService {
    database: Arc<dyn DatabaseManager>,
}

impl HistoryService {
    pub fn new(database: Arc<dyn DatabaseManager>) -> Self {
        Self { database }
    }

    /// Newest-first page; `limit` defaults to 10 and is capped at 100
    pub async fn page(
        &self,
        user_id: &str,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<HistoryPage, AppError> {
        let limit = limit
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0);

        let dao = self.database.history();
        // One extra row tells whether another page exists
        let mut queries = dao.list(user_id, limit + 1, offset).await?;
        let has_more = queries.len() as u64 > limit;
        queries.truncate(limit as usize);

        let total = dao.count(user_id).await?;

        Ok(HistoryPage {
            queries,
            total,
            has_more,
        })
    }

    pub async fn recent(&self, user_id: &str) -> Result<RecentQueries, AppError> {
        let queries = self.database.history().list(user_id, RECENT_COUNT, 0).await?;
        Ok(RecentQueries { queries })
    }

    /// Delete one of the caller's records; someone else's record is reported as missing
    pub async fn delete(&self, user_id: &str, id: i32) -> Result<(), AppError> {
        if !self.database.history().delete(user_id, id).await? {
            return Err(AppError::NotFound("query not found".to_string()));
        }
        info!(user_id = %user_id, query_id = id, "Deleted history record");
        Ok(())
    }

    pub async fn clear(&self, user_id: &str) -> Result<u64, AppError> {
        let removed = self.database.history().clear(user_id).await?;
        info!(user_id = %user_id, removed, "Cleared history");
        Ok(removed)
    }

    pub async fn export(
        &self,
        user_id: &str,
        request: &ExportRequest,
    ) -> Result<ExportResponse, AppError> {
        let format: ExportFormat = request.format.parse()?;
        let ids = request
            .query_ids
            .as_deref()
            .filter(|ids| !ids.is_empty());

        let records = self.database.history().find_for_export(user_id, ids).await?;
        let now = Utc::now();

        info!(
            user_id = %user_id,
            format = format.extension(),
            count = records.len(),
            "Exporting history"
        );

        Ok(ExportResponse {
            download_url: export::render(format, &records, now)?,
            filename: export::filename(format, now),
        })
    }
}
