//! # Domain Module
//!
//! Business rules on top of the repositories. Services validate before they
//! write and leave persistence, ordering and balance bookkeeping to storage.
//!
//! ## Module Organization
//!
//! - **account_service**: active-account views and soft deletion
//! - **category_service**: the two-level catalog and its nesting rules
//! - **transaction_service**: validation and reporting queries
//! - **budget_service**: limits and their progress windows
//! - **chat_service**: assistant history and the completion round trip
//! - **settings_service**: stored preferences merged over defaults
//! - **action_service**: the assistant's structured action vocabulary

pub mod account_service;
pub mod action_service;
pub mod budget_service;
pub mod category_service;
pub mod category_tree;
pub mod chat_service;
pub mod clock;
pub mod settings_service;
pub mod transaction_service;

pub use account_service::AccountService;
pub use action_service::{parse_action, ActionKind, ActionResult, ActionService, AiAction};
pub use budget_service::BudgetService;
pub use category_service::CategoryService;
pub use category_tree::CategoryTree;
pub use chat_service::{ChatService, CompletionClient};
pub use clock::{Clock, FixedClock, SystemClock};
pub use settings_service::SettingsService;
pub use transaction_service::TransactionService;
