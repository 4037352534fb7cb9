use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::error::Result;

const QUERY_LOG_FILE: &str = "query_log.json";
const MAX_LOG_ENTRIES: usize = 50;

/// One completed query, kept in a rolling JSON log inside the upload folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub timestamp: u64,
    pub query: String,
    pub images: Vec<String>,
    pub reply: String,
}

impl QueryRecord {
    pub fn new(query: impl Into<String>, images: Vec<String>, reply: impl Into<String>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self {
            timestamp,
            query: query.into(),
            images,
            reply: reply.into(),
        }
    }
}

fn query_log_path(upload_dir: &Path) -> PathBuf {
    upload_dir.join(QUERY_LOG_FILE)
}

/// Load the query log, treating a missing or unreadable file as empty.
pub async fn load_query_log(upload_dir: &Path) -> Vec<QueryRecord> {
    let path = query_log_path(upload_dir);
    match fs::read_to_string(&path).await {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            warn!("Ignoring unreadable query log '{}': {}", path.display(), err);
            Vec::new()
        }),
        Err(_) => Vec::new(),
    }
}

/// Append a record, dropping the oldest entries beyond the cap.
pub async fn append_query_record(upload_dir: &Path, record: QueryRecord) -> Result<()> {
    let mut records = load_query_log(upload_dir).await;
    records.push(record);
    if records.len() > MAX_LOG_ENTRIES {
        records = records.split_off(records.len() - MAX_LOG_ENTRIES);
    }

    let payload = serde_json::to_string_pretty(&records)?;
    fs::write(query_log_path(upload_dir), payload).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_round_trip_in_order() {
        let dir = tempfile::tempdir().unwrap();

        for i in 0..3 {
            let record = QueryRecord::new(
                format!("query {i}"),
                vec![format!("image-{i}.png")],
                format!("reply {i}"),
            );
            append_query_record(dir.path(), record).await.unwrap();
        }

        let records = load_query_log(dir.path()).await;
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].query, "query 0");
        assert_eq!(records[2].reply, "reply 2");
        assert_eq!(records[2].images, vec!["image-2.png"]);
    }

    #[tokio::test]
    async fn log_is_capped_at_fifty_entries() {
        let dir = tempfile::tempdir().unwrap();

        for i in 0..55 {
            let record = QueryRecord::new(format!("query {i}"), Vec::new(), "reply");
            append_query_record(dir.path(), record).await.unwrap();
        }

        let records = load_query_log(dir.path()).await;
        assert_eq!(records.len(), MAX_LOG_ENTRIES);
        assert_eq!(records[0].query, "query 5");
        assert_eq!(records[49].query, "query 54");
    }

    #[tokio::test]
    async fn missing_log_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_query_log(dir.path()).await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_log_is_ignored_and_replaced() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(query_log_path(dir.path()), "{ definitely broken").unwrap();

        assert!(load_query_log(dir.path()).await.is_empty());

        let record = QueryRecord::new("fresh start", Vec::new(), "ok");
        append_query_record(dir.path(), record).await.unwrap();

        let records = load_query_log(dir.path()).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].query, "fresh start");
    }
}
