use crate::models::enums::{SyncStatus, TriggerSource};
use crate::schema::sync_logs;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit record of one sync attempt.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = sync_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SyncLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SyncStatus,
    pub records_processed: i32,
    pub error_message: Option<String>,
    pub trigger_source: TriggerSource,
}

impl SyncLog {
    pub fn start(user_id: Uuid, trigger_source: TriggerSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            start_time: Utc::now(),
            end_time: None,
            status: SyncStatus::InProgress,
            records_processed: 0,
            error_message: None,
            trigger_source,
        }
    }
}

/// Terminal state written when a run ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Success { records_processed: i32 },
    Failed { error: String },
}

impl SyncOutcome {
    pub fn status(&self) -> SyncStatus {
        match self {
            SyncOutcome::Success { .. } => SyncStatus::Success,
            SyncOutcome::Failed { .. } => SyncStatus::Failed,
        }
    }

    pub fn records_processed(&self) -> i32 {
        match self {
            SyncOutcome::Success { records_processed } => *records_processed,
            SyncOutcome::Failed { .. } => 0,
        }
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            SyncOutcome::Success { .. } => None,
            SyncOutcome::Failed { error } => Some(error.clone()),
        }
    }
}
