pub mod config;
pub mod db;
pub mod error;
pub mod ipc;
pub mod migrate;
pub mod normalize;
pub mod plan;
pub mod problem_solving;
pub mod projector;
pub mod schema;
pub mod store;

pub use error::MigrateError;
pub use migrate::{migrate_plan, MigrationRequest, MigrationResult};
pub use store::{Filter, SqliteStore, Store, StoreError, Table};
