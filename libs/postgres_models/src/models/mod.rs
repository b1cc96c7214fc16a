pub mod enums;
pub mod merchant_mappings;
pub mod sync_logs;
pub mod transactions;
pub mod users;

pub use enums::{
    coerce_category_pair, AccountType, Category, SubCategory, SyncStatus, TransactionStatus, TriggerSource,
    UnknownVariant,
};
pub use merchant_mappings::MerchantMapping;
pub use sync_logs::{SyncLog, SyncOutcome};
pub use transactions::{
    is_storable_amount, to_money, CategoryTotal, ExpenseEntry, NewTransaction, Transaction, Verification, VerifyOutcome,
    DEFAULT_CURRENCY, UNKNOWN_MERCHANT,
};
pub use users::{MailCredentials, NewUser, User};
