//! Spirida core: time-decaying pulses grouped into reclamation fields.
//!
//! A pulse's attention falls exponentially from its amplitude. Pulses in the
//! same field resonate pairwise on emission, and strong resonance lifts the
//! amplitude of both partners. Each field periodically reclaims faded
//! pulses under one of four policies (natural, seasonal, resonant, lunar).
//!
//! No async and no logging: time is passed in as `now`, randomness through a
//! seeded rng, and output through an injected [`Sink`].

pub mod constants;
pub mod error;
pub mod field;
pub mod policy;
pub mod pulse;
pub mod resonance;
pub mod sink;
pub mod time;

pub use constants::{DEFAULT_AFFECT, DEFAULT_AMPLITUDE, DEFAULT_DECAY_RATE, RECLAIM_THRESHOLD};
pub use error::{CoreError, Result};
pub use field::{Emission, FieldStatus, ReclamationField, ResonancePair};
pub use policy::{MoonPhase, PhaseStatus, ReclamationPolicy, Season};
pub use pulse::{Pulse, PulseSpec, ResonanceEvent};
pub use resonance::{Resonance, ResonanceComponents};
pub use sink::{MemorySink, NullSink, Sink};
pub use time::{Clock, ManualClock, SystemClock, now_secs, unix_to_iso8601};
