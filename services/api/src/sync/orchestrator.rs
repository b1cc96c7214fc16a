use futures::FutureExt;
use postgres_models::models::{is_storable_amount, SyncOutcome, TriggerSource};
use postgres_models::{DbError, Store};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::extraction::{Extraction, Extractor};
use super::guard::RunGuard;
use super::mail::{MailMessage, MailSource};
use super::sanitizer::Sanitizer;
use crate::ledger;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Db(#[from] DbError),
}

/// What happened to one sync request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    /// The run executed and its log was closed with `outcome`.
    Completed { sync_log_id: Uuid, outcome: SyncOutcome },
    /// Another run for the same user held the guard; nothing was written.
    /// That run goes again once it finishes.
    Skipped,
}

/// Runs the fetch → sanitize → extract → persist pipeline for one user.
pub struct SyncService {
    store: Arc<dyn Store>,
    mail: Arc<dyn MailSource>,
    extractor: Arc<dyn Extractor>,
    sanitizer: Arc<Sanitizer>,
    guard: Arc<dyn RunGuard>,
}

impl SyncService {
    pub fn new(
        store: Arc<dyn Store>,
        mail: Arc<dyn MailSource>,
        extractor: Arc<dyn Extractor>,
        sanitizer: Arc<Sanitizer>,
        guard: Arc<dyn RunGuard>,
    ) -> Self {
        Self {
            store,
            mail,
            extractor,
            sanitizer,
            guard,
        }
    }

    /// Runs a sync in the background; the caller does not wait for it.
    pub fn spawn(self: &Arc<Self>, user_id: Uuid, source: TriggerSource) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = service.execute_sync(user_id, source).await {
                tracing::error!(%user_id, "Sync run could not be recorded: {}", e);
            }
        })
    }

    /// Runs one sync for the user. If the guard is held the call is skipped,
    /// and the holder runs again after it finishes so the trigger is served.
    pub async fn execute_sync(&self, user_id: Uuid, source: TriggerSource) -> Result<RunReport, SyncError> {
        let token = match self.guard.try_acquire(user_id, source).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::info!(%user_id, %source, "Sync already running, rerun requested");
                return Ok(RunReport::Skipped);
            }
            Err(e) => {
                tracing::warn!(%user_id, "Sync guard unavailable, running unguarded: {}", e);
                return self.run_logged(user_id, source).await;
            }
        };

        let report = self.run_logged(user_id, source).await;
        let mut rerun = self.guard.release(&token).await;

        while let Some(next) = rerun.take() {
            tracing::info!(%user_id, source = %next, "Trigger arrived during sync, running again");
            // Busy means a newer run took the guard and will serve the request.
            let Ok(Some(token)) = self.guard.try_acquire(user_id, next).await else {
                break;
            };
            if let Err(e) = self.run_logged(user_id, next).await {
                tracing::error!(%user_id, "Follow-up sync could not be recorded: {}", e);
            }
            rerun = self.guard.release(&token).await;
        }

        report
    }

    async fn run_logged(&self, user_id: Uuid, source: TriggerSource) -> Result<RunReport, SyncError> {
        let log = self.store.start_sync_log(user_id, source).await?;
        tracing::info!(%user_id, %source, sync_log_id = %log.id, "Sync started");

        let outcome = match AssertUnwindSafe(self.process(user_id, source)).catch_unwind().await {
            Ok(Ok(records_processed)) => SyncOutcome::Success { records_processed },
            Ok(Err(e)) => SyncOutcome::Failed { error: e.to_string() },
            Err(panic) => SyncOutcome::Failed {
                error: panic_message(&*panic),
            },
        };

        match &outcome {
            SyncOutcome::Success { records_processed } => {
                tracing::info!(%user_id, sync_log_id = %log.id, records_processed, "Sync finished")
            }
            SyncOutcome::Failed { error } => {
                tracing::error!(%user_id, sync_log_id = %log.id, "Sync failed: {}", error)
            }
        }

        self.store.finish_sync_log(log.id, &outcome).await?;
        Ok(RunReport::Completed {
            sync_log_id: log.id,
            outcome,
        })
    }

    async fn process(&self, user_id: Uuid, source: TriggerSource) -> Result<i32, SyncError> {
        let since = self.store.last_successful_sync(user_id).await?;
        let Some(user) = self.store.find_user(user_id).await? else {
            tracing::warn!(%user_id, "Sync requested for unknown user");
            return Ok(0);
        };

        let messages = self.mail.fetch_new(&user, since).await;
        let mut processed = 0;
        for message in &messages {
            if self.ingest(user_id, source, message).await? {
                processed += 1;
            }
        }
        Ok(processed)
    }

    /// Persists one message as a pending transaction. Returns `false` when
    /// the message was already ingested.
    async fn ingest(&self, user_id: Uuid, source: TriggerSource, message: &MailMessage) -> Result<bool, SyncError> {
        let hash = ledger::content_hash(&message.id, &message.internal_date);
        if self.store.find_by_hash(&hash).await?.is_some() {
            tracing::debug!(message_id = %message.id, "Message already ingested");
            return Ok(false);
        }

        let clean = self.sanitizer.sanitize(message.text());
        let mut extraction = self.extractor.extract(&clean).await;
        if !is_storable_amount(extraction.amount) {
            tracing::warn!(message_id = %message.id, amount = %extraction.amount, "Extracted amount out of range, using fallback");
            extraction = Extraction::fallback();
        }
        let extraction = self.apply_merchant_memory(extraction).await?;

        let new = ledger::synced_transaction(user_id, message, &extraction, source);
        match self.store.insert_transaction(new).await? {
            Some(txn) => {
                tracing::debug!(transaction_id = %txn.id, merchant = %txn.merchant_name, "Pending transaction created");
                Ok(true)
            }
            None => {
                tracing::debug!(message_id = %message.id, "Message ingested concurrently");
                Ok(false)
            }
        }
    }

    /// A remembered merchant overrides the model's category pair only; amount,
    /// merchant name and account type stay as extracted.
    async fn apply_merchant_memory(&self, mut extraction: Extraction) -> Result<Extraction, SyncError> {
        if extraction.used_fallback {
            return Ok(extraction);
        }
        if let Some(mapping) = self.store.find_mapping(&extraction.merchant_name).await? {
            tracing::debug!(raw = %mapping.raw_merchant, "Merchant memory hit");
            extraction.category = mapping.default_category;
            extraction.sub_category = mapping.default_sub_category;
        }
        Ok(extraction)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("sync run panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("sync run panicked: {}", message)
    } else {
        "sync run panicked".to_string()
    }
}
