/// Default amplitude ceiling for a fresh pulse.
pub const DEFAULT_AMPLITUDE: f64 = 1.0;

/// Default per-second exponential decay constant.
pub const DEFAULT_DECAY_RATE: f64 = 0.01;

/// Affect assigned when a caller does not name one.
pub const DEFAULT_AFFECT: &str = "neutral";

/// Attention below this is reclaimable.
pub const RECLAIM_THRESHOLD: f64 = 0.01;

/// Resonance strength that triggers reinforcement (strictly greater).
pub const REINFORCE_THRESHOLD: f64 = 0.6;

/// Amplitude gain per unit of reinforcing strength.
pub const REINFORCE_GAIN: f64 = 0.1;

/// Resonant policy: a faded pulse survives if it still resonates above this.
pub const RESONANT_RETENTION: f64 = 0.5;

/// Default seasonal cycle length in hours (one day).
pub const SEASONAL_CYCLE_HOURS: f64 = 24.0;

/// Lunar cycle length in hours (28 days).
pub const LUNAR_CYCLE_HOURS: f64 = 28.0 * 24.0;

/// Chance that a strong resonance on emission is voiced to the sink.
pub const VOICE_PROBABILITY: f64 = 0.3;

/// Attention above this counts as "strong" for the attentional component.
pub const STRONG_ATTENTION: f64 = 0.7;
