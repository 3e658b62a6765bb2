//! SQLite persistence for the entitlement server.
//!
//! One [`Store`] handle is shared process-wide. It owns a small pool of
//! connections in WAL mode; SQLite serializes writers and each connection
//! waits out the busy timeout rather than failing on contention.
//!
//! # Layout
//!
//! - **Inventory**: licenses, their bindings to emails, and the matcher that
//!   picks an unbound license for a claim
//! - **Catalog**: trust groups, provider groups and credentials, products
//! - **Policy**: settings, email filter lists, per-origin request counters
//! - **Accounting**: the append-only usage log
//! - **Notifications**: persisted send tasks and their recipient items
//!
//! All timestamps are UTC text in `YYYY-MM-DD HH:MM:SS` form (see [`time`]).

mod bindings;
mod catalog;
mod error;
mod licenses;
mod matcher;
mod notify;
mod policy;
mod pool;
mod schema;
pub mod time;
mod usage;

pub use bindings::{Binding, ClaimOutcome, Claimant, FREE_VALID_DAYS, IssueOutcome};
pub use catalog::{ExtraValue, LicenseGroup, NewProviderConfig, Product, ProviderConfig};
pub use error::{StoreError, StoreResult};
pub use licenses::{DEFAULT_DAILY_ANALYSIS, DEFAULT_VALID_DAYS, License, NewLicense};
pub use matcher::SnCriteria;
pub use notify::{ItemCounts, ItemStatus, NotifyItem, NotifyTask, TaskStatus};
pub use policy::{EmailFilter, FilterList};
pub use pool::{DEFAULT_BUSY_TIMEOUT, DEFAULT_POOL_SIZE, Store, StoreConfig};
pub use schema::{DEFAULT_PRODUCT_ID, DEFAULT_PRODUCT_NAME};
pub use usage::UsageReport;
