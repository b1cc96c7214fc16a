//! Mailbox synchronisation pipeline.

pub mod extraction;
pub mod guard;
pub mod mail;
pub mod oauth;
pub mod orchestrator;
pub mod sanitizer;

pub use extraction::{Extraction, Extractor, GroqExtractor};
pub use guard::{LocalRunGuard, RunGuard};
pub use mail::{GmailSource, MailMessage, MailSource};
pub use oauth::GoogleOAuth;
pub use orchestrator::{RunReport, SyncError, SyncService};
pub use sanitizer::Sanitizer;
