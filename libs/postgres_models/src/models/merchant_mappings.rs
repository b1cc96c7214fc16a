use crate::models::enums::{Category, SubCategory};
use crate::schema::merchant_mappings;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Remembered categorisation for a raw merchant string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = merchant_mappings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MerchantMapping {
    pub raw_merchant: String,
    pub display_name: String,
    pub default_category: Category,
    pub default_sub_category: SubCategory,
    pub updated_at: DateTime<Utc>,
}

impl MerchantMapping {
    pub fn new(
        raw_merchant: String,
        display_name: String,
        default_category: Category,
        default_sub_category: SubCategory,
    ) -> Self {
        Self {
            raw_merchant,
            display_name,
            default_category,
            default_sub_category,
            updated_at: Utc::now(),
        }
    }
}
