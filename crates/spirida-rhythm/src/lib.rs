//! Rhythmic scheduling and background reclamation for spirida fields.
//!
//! An [`Orchestrator`] owns named [`ReclamationField`](spirida_core::ReclamationField)s
//! and a three-phase [`Scheduler`]. `start_maintenance` spawns one tokio
//! task that reclaims every field once per cycle until `stop_maintenance`
//! cancels it.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod scheduler;
pub mod sink;

pub use config::{CONFIG_ENV, FieldConfig, MAX_SEED, RhythmConfig, SystemConfig};
pub use error::{Result, RhythmError};
pub use orchestrator::{
    Orchestrator, OrchestratorBuilder, Reclaimed, SharedField, StopOutcome, SystemStatus,
};
pub use scheduler::{Rhythm, Scheduler};
pub use sink::{StdoutSink, TracingSink};
