use crate::models::enums::{AccountType, Category, SubCategory, TransactionStatus};
use crate::models::merchant_mappings::MerchantMapping;
use crate::schema::transactions;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CURRENCY: &str = "INR";

/// Merchant-memory key used when a transaction carries no merchant name.
pub const UNKNOWN_MERCHANT: &str = "UNKNOWN";

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub raw_content_hash: String,
    pub amount: Decimal,
    pub currency: String,
    pub merchant_name: String,
    pub category: Category,
    pub sub_category: SubCategory,
    pub status: TransactionStatus,
    pub account_type: AccountType,
    pub remarks: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Insertable)]
#[diesel(table_name = transactions)]
pub struct NewTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub raw_content_hash: String,
    pub amount: Decimal,
    pub currency: String,
    pub merchant_name: String,
    pub category: Category,
    pub sub_category: SubCategory,
    pub status: TransactionStatus,
    pub account_type: AccountType,
    pub remarks: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl NewTransaction {
    pub fn new(user_id: Uuid, raw_content_hash: String, amount: Decimal, status: TransactionStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            raw_content_hash,
            amount: to_money(amount),
            currency: DEFAULT_CURRENCY.to_string(),
            merchant_name: UNKNOWN_MERCHANT.to_string(),
            category: Category::Uncategorized,
            sub_category: SubCategory::Uncategorized,
            status,
            account_type: AccountType::Savings,
            remarks: None,
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Adds a tag, keeping the tag list a sorted set.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if let Err(pos) = self.tags.binary_search(&tag) {
            self.tags.insert(pos, tag);
        }
        self
    }
}

/// A caller's decision on a pending transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub category: Category,
    pub sub_category: SubCategory,
    pub merchant_name: String,
    pub approved: bool,
}

#[derive(Debug, Clone)]
pub enum VerifyOutcome {
    Verified(Transaction),
    NotFound,
    AlreadyFinal(TransactionStatus),
}

impl Transaction {
    /// Applies a verification decision in place.
    ///
    /// Rejection only flips the status. Approval overwrites the category pair
    /// and merchant name, and returns the merchant-memory entry keyed by the
    /// merchant name the transaction carried before confirmation.
    pub fn apply_verification(&mut self, verification: &Verification) -> Option<MerchantMapping> {
        if !verification.approved {
            self.status = TransactionStatus::Rejected;
            return None;
        }

        let raw_merchant = if self.merchant_name.trim().is_empty() {
            UNKNOWN_MERCHANT.to_string()
        } else {
            std::mem::take(&mut self.merchant_name)
        };

        self.status = TransactionStatus::Verified;
        self.category = verification.category;
        self.sub_category = verification.sub_category;
        self.merchant_name = verification.merchant_name.clone();

        Some(MerchantMapping::new(
            raw_merchant,
            verification.merchant_name.clone(),
            verification.category,
            verification.sub_category,
        ))
    }
}

/// Per-(category, sub-category, account type) sum of non-rejected amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: Category,
    pub sub_category: SubCategory,
    pub account_type: AccountType,
    pub total: Decimal,
}

/// A single dated outflow feeding the daily expense series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseEntry {
    pub created_at: DateTime<Utc>,
    pub amount: Decimal,
}

/// Normalises an amount to two fractional digits.
pub fn to_money(amount: Decimal) -> Decimal {
    let mut amount = amount.round_dp(2);
    amount.rescale(2);
    amount
}

/// Whether an amount fits the `NUMERIC(12,2)` amount column and is not
/// negative, after rounding to money.
pub fn is_storable_amount(amount: Decimal) -> bool {
    let amount = to_money(amount);
    amount >= Decimal::ZERO && amount <= max_amount()
}

fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}
