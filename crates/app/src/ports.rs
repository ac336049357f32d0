//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod dedup_store;
pub mod event_bus;
pub mod execution_repo;
pub mod storage;

pub use dedup_store::DedupStore;
pub use event_bus::EventPublisher;
pub use execution_repo::{ExecutionRepository, StatusCounts};
pub use storage::{
    ActionInstanceRepository, ActionLinkRepository, ActivationModeRepository, AreaRepository,
};
