//! Use-case services.
//!
//! Services receive their ports as generic parameters at construction, so
//! the same code runs against SQLite in the daemon and in-memory fakes in tests.

pub mod dedup_guard;
pub mod dispatcher;
pub mod execution_service;
pub mod execution_sweeper;
pub mod reaction_chain;
pub mod trigger_intake;
