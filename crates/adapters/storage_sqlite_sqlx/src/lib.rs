//! # areaflow-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository and dedup-store ports defined in `areaflow-app::ports`
//! - Manage the `SQLite` connection pool lifecycle
//! - Run the embedded migrations under `migrations/`
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `areaflow-app` (for port traits) and `areaflow-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod codec;

pub mod action_instance_repo;
pub mod action_link_repo;
pub mod activation_mode_repo;
pub mod area_repo;
pub mod dedup_store;
pub mod error;
pub mod execution_repo;
pub mod pool;

pub use action_instance_repo::SqliteActionInstanceRepository;
pub use action_link_repo::SqliteActionLinkRepository;
pub use activation_mode_repo::SqliteActivationModeRepository;
pub use area_repo::SqliteAreaRepository;
pub use dedup_store::SqliteDedupStore;
pub use error::StorageError;
pub use execution_repo::SqliteExecutionRepository;
pub use pool::{Config, Database};
