//! # areaflow-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `ExecutionRepository`: persist executions and answer lifecycle queries
//!   - `AreaRepository`, `ActionInstanceRepository`, `ActivationModeRepository`,
//!     `ActionLinkRepository`: read the configured automations
//!   - `EventPublisher`: hand dispatched executions to the worker pool
//!   - `DedupStore`: set-if-absent keys with expiry
//! - Define **driving/inbound ports** as use-case structs/traits:
//!   - `ExecutionService`: execution state machine and queries
//!   - `ExecutionSweeper`: timeout resolution and retry requeueing
//!   - `Dispatcher` / `TriggerDispatcher`: create and publish executions
//!   - `DedupGuard`: suppress redelivered provider events
//!   - `ReactionChainEngine`: walk the reactions of an area
//!   - `TriggerIntake`: webhook and manual entry points
//!   - `ActivationScheduler`: timers for scheduled and polling activations
//! - Provide **in-process infrastructure** (event bus, dedup store) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `areaflow-domain` only (plus `tokio` for channels, timers and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod activation_scheduler;
pub mod dedup_store;
pub mod event_bus;
pub mod ports;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;
