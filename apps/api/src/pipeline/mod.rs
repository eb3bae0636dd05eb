//! The pipeline orchestrator and the per-run state it owns.

pub mod events;
pub mod orchestrator;
pub mod phase;
pub mod progress;
pub mod registry;
pub mod request;
pub mod run;

pub use orchestrator::{Collaborators, Orchestrator};
pub use registry::RunRegistry;
