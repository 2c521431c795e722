use std::fmt;

use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::constants::{
    DEFAULT_AFFECT, DEFAULT_AMPLITUDE, DEFAULT_DECAY_RATE, REINFORCE_GAIN, REINFORCE_THRESHOLD,
};
use crate::error::{CoreError, Result};
use crate::resonance::{self, Resonance};
use crate::sink::Sink;

/// Creation parameters for a pulse. Defaults: amplitude 1.0, decay rate 0.01.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PulseSpec {
    pub tag: String,
    pub affect: String,
    pub amplitude: f64,
    pub decay_rate: f64,
}

impl PulseSpec {
    pub fn new(tag: impl Into<String>, affect: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            affect: affect.into(),
            amplitude: DEFAULT_AMPLITUDE,
            decay_rate: DEFAULT_DECAY_RATE,
        }
    }

    /// A pulse with the neutral affect.
    pub fn tagged(tag: impl Into<String>) -> Self {
        Self::new(tag, DEFAULT_AFFECT)
    }

    pub fn amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    pub fn decay_rate(mut self, decay_rate: f64) -> Self {
        self.decay_rate = decay_rate;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.amplitude.is_finite() || !(0.0..=1.0).contains(&self.amplitude) {
            return Err(CoreError::InvalidParameter(format!(
                "amplitude must be within [0, 1], got {}",
                self.amplitude
            )));
        }
        if !self.decay_rate.is_finite() || self.decay_rate <= 0.0 {
            return Err(CoreError::InvalidParameter(format!(
                "decay rate must be positive, got {}",
                self.decay_rate
            )));
        }
        Ok(())
    }
}

/// One entry in a pulse's resonance log.
#[derive(Clone, Debug, Serialize)]
pub struct ResonanceEvent {
    pub timestamp: f64,
    pub other_id: Uuid,
    pub other_tag: String,
    pub other_affect: String,
    pub strength: f64,
    pub narrative: String,
}

/// A time-decaying object carrying a symbolic tag and an affect.
///
/// Attention falls from `amplitude` along `amplitude · e^(−decay_rate · age)`.
/// Reinforcement can lift `amplitude` back toward 1.0 but never touches
/// `decay_rate` or `birth`, so the curve keeps falling from the new ceiling.
#[derive(Clone, Debug, Serialize)]
pub struct Pulse {
    pub id: Uuid,
    pub tag: String,
    pub affect: String,
    pub birth: f64,
    last_emit: f64,
    amplitude: f64,
    decay_rate: f64,
    emit_count: u64,
    resonance_history: Vec<ResonanceEvent>,
}

impl Pulse {
    pub fn new(spec: PulseSpec, birth: f64) -> Result<Self> {
        spec.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            tag: spec.tag,
            affect: spec.affect,
            birth,
            last_emit: birth,
            amplitude: spec.amplitude,
            decay_rate: spec.decay_rate,
            emit_count: 0,
            resonance_history: Vec::new(),
        })
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    pub fn decay_rate(&self) -> f64 {
        self.decay_rate
    }

    pub fn last_emit(&self) -> f64 {
        self.last_emit
    }

    pub fn emit_count(&self) -> u64 {
        self.emit_count
    }

    pub fn resonance_history(&self) -> &[ResonanceEvent] {
        &self.resonance_history
    }

    /// Attention remaining at `now`. Samples before birth count as age zero.
    pub fn attention_at(&self, now: f64) -> f64 {
        let age = (now - self.birth).max(0.0);
        self.amplitude * (-self.decay_rate * age).exp()
    }

    /// Express the pulse: write a line to `sink` and return its attention.
    pub fn emit(&mut self, now: f64, sink: &dyn Sink) -> f64 {
        let attention = self.attention_at(now);
        self.emit_count += 1;
        self.last_emit = now;
        sink.emit(&format!(
            "{} [{}] • attention: {attention:.3}",
            self.tag, self.affect
        ));
        attention
    }

    /// Resonate with `other` at `now`, logging the event on `self`.
    pub fn compute_resonance(&mut self, now: f64, other: &Pulse, rng: &mut impl Rng) -> Resonance {
        let result = resonance::resonate(self, other, now, rng);
        self.resonance_history.push(ResonanceEvent {
            timestamp: now,
            other_id: other.id,
            other_tag: other.tag.clone(),
            other_affect: other.affect.clone(),
            strength: result.strength,
            narrative: result.narrative.clone(),
        });
        result
    }

    /// Raise the amplitude ceiling when `strength` exceeds the reinforcement
    /// threshold. Returns whether anything changed.
    pub fn reinforce(&mut self, strength: f64) -> bool {
        if strength <= REINFORCE_THRESHOLD {
            return false;
        }
        let before = self.amplitude;
        self.amplitude = (self.amplitude + REINFORCE_GAIN * strength).min(1.0);
        self.amplitude > before
    }

    pub fn is_reclaimable(&self, now: f64, threshold: f64) -> bool {
        self.attention_at(now) < threshold
    }
}

impl fmt::Display for Pulse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pulse({}, {}, amplitude={:.3})",
            self.tag, self.affect, self.amplitude
        )
    }
}
