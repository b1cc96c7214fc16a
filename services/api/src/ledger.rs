//! Content hashing and construction of new ledger entries.

use chrono::Utc;
use postgres_models::models::{
    is_storable_amount, AccountType, Category, NewTransaction, SubCategory, TransactionStatus, TriggerSource, DEFAULT_CURRENCY,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::sync::{Extraction, MailMessage};

/// Dedup key of a mailbox message: hex SHA-256 of `"{id}:{internal_date}"`.
pub fn content_hash(message_id: &str, internal_date: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(message_id.as_bytes());
    hasher.update(b":");
    hasher.update(internal_date.as_bytes());
    hex::encode(hasher.finalize())
}

/// Dedup key of a manual entry, unique per call.
pub fn manual_content_hash(user_id: Uuid) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(format!("MANUAL-{}-{}-{}", user_id, nanos, Uuid::new_v4()).as_bytes());
    hex::encode(hasher.finalize())
}

/// Pending entry for a synced message.
pub fn synced_transaction(
    user_id: Uuid,
    message: &MailMessage,
    extraction: &Extraction,
    source: TriggerSource,
) -> NewTransaction {
    let mut new = NewTransaction::new(
        user_id,
        content_hash(&message.id, &message.internal_date),
        extraction.amount,
        TransactionStatus::Pending,
    )
    .tag(source.as_str());
    new.currency = extraction.currency.clone();
    new.merchant_name = extraction.merchant_name.clone();
    new.category = extraction.category;
    new.sub_category = extraction.sub_category;
    new.account_type = extraction.account_type;
    new.remarks = Some(format!("Synced via {}", source));
    new
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_account_type() -> AccountType {
    AccountType::Savings
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManualTransaction {
    pub amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub merchant_name: String,
    pub category: Category,
    pub sub_category: SubCategory,
    #[serde(default = "default_account_type")]
    pub account_type: AccountType,
    pub remarks: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Sub-category '{sub_category}' does not belong to category '{category}'")]
    CategoryMismatch { category: Category, sub_category: SubCategory },

    #[error("Merchant name must not be empty")]
    EmptyMerchant,

    #[error("Currency must be a 3-letter code")]
    InvalidCurrency,

    #[error("Amount must be between 0 and 9999999999.99")]
    AmountOutOfRange,
}

impl ManualTransaction {
    /// Validates the entry and turns it into an already-verified transaction.
    pub fn into_new_transaction(self, user_id: Uuid) -> Result<NewTransaction, LedgerError> {
        if !is_storable_amount(self.amount) {
            return Err(LedgerError::AmountOutOfRange);
        }
        if !self.category.allows(self.sub_category) {
            return Err(LedgerError::CategoryMismatch {
                category: self.category,
                sub_category: self.sub_category,
            });
        }
        let merchant_name = self.merchant_name.trim().to_string();
        if merchant_name.is_empty() {
            return Err(LedgerError::EmptyMerchant);
        }
        let currency = self.currency.trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(LedgerError::InvalidCurrency);
        }

        let mut new = NewTransaction::new(
            user_id,
            manual_content_hash(user_id),
            self.amount,
            TransactionStatus::Verified,
        );
        new.currency = currency;
        new.merchant_name = merchant_name;
        new.category = self.category;
        new.sub_category = self.sub_category;
        new.account_type = self.account_type;
        new.remarks = self.remarks;
        Ok(self.tags.into_iter().fold(new, |txn, tag| txn.tag(tag)))
    }
}
