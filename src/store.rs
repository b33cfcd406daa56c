use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::engine::scheduler::ScheduleUpdate;
use crate::model::Status;

/// A partial row update handed to the persistence layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wbs_id: Option<String>,
}

impl From<ScheduleUpdate> for ItemPatch {
    fn from(update: ScheduleUpdate) -> Self {
        Self {
            start_date: Some(update.start_date),
            end_date: Some(update.end_date),
            ..Default::default()
        }
    }
}

/// Durable write boundary for engine output.
///
/// The engine never stores anything itself; the hosting application supplies
/// a sink backed by its database. Writes must be idempotent and return an
/// error on failure.
#[async_trait]
pub trait PersistSink: Send + Sync {
    async fn persist(&self, id: &str, patch: &ItemPatch) -> Result<()>;
}

/// Sink that records every write in memory, in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    writes: Mutex<Vec<(String, ItemPatch)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn writes(&self) -> Vec<(String, ItemPatch)> {
        self.writes.lock().await.clone()
    }
}

#[async_trait]
impl PersistSink for MemorySink {
    async fn persist(&self, id: &str, patch: &ItemPatch) -> Result<()> {
        self.writes.lock().await.push((id.to_string(), patch.clone()));
        Ok(())
    }
}
