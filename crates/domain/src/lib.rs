//! # areaflow-domain
//!
//! Pure domain model for the areaflow automation core.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define the **Payload** value tree carried between steps
//! - Define **Areas**, **ActionInstances** and **ActionLinks**
//! - Define **ActivationModes** and their cron / poll schedules
//! - Define **Executions**, their state machine and the retry policy
//! - Define the **AreaEvent** published for every dispatch
//! - Evaluate mapping and condition **expressions** over payloads
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod payload;
pub mod time;

pub mod action;
pub mod action_link;
pub mod activation;
pub mod area;
pub mod event;
pub mod execution;
pub mod expression;
pub mod retry;
