use std::fmt;
use std::sync::Arc;

use rand::Rng;
use rand::rngs::SmallRng;
use serde::Serialize;
use uuid::Uuid;

use crate::constants::{
    LUNAR_CYCLE_HOURS, REINFORCE_THRESHOLD, RESONANT_RETENTION, SEASONAL_CYCLE_HOURS,
    VOICE_PROBABILITY,
};
use crate::error::{CoreError, Result};
use crate::policy::{PhaseStatus, ReclamationPolicy, lunar_threshold, seasonal_threshold};
use crate::pulse::{Pulse, PulseSpec};
use crate::resonance::{Resonance, strength_between};
use crate::sink::Sink;
use crate::time::cycle_phase;

/// Outcome of emitting a pulse into a field.
#[derive(Clone, Debug, Serialize)]
pub struct Emission {
    /// Snapshot of the new pulse after any reinforcement.
    pub pulse: Pulse,
    /// Number of resident pulses it was resonated against.
    pub resonances: usize,
    /// How many of those pairs were strong enough to reinforce.
    pub reinforced: usize,
}

/// One unordered pair found by [`ReclamationField::find_resonances`].
#[derive(Clone, Debug, Serialize)]
pub struct ResonancePair {
    pub a: Uuid,
    pub a_tag: String,
    pub b: Uuid,
    pub b_tag: String,
    pub resonance: Resonance,
}

/// Point-in-time view of a field, for reporting layers.
#[derive(Clone, Debug, Serialize)]
pub struct FieldStatus {
    pub name: String,
    pub policy: ReclamationPolicy,
    pub live_count: usize,
    pub total_emitted: u64,
    pub total_reclaimed: u64,
    pub total_resonance_energy: f64,
    pub age_secs: f64,
    pub last_reclamation: f64,
    pub phase: PhaseStatus,
}

/// A named, ordered collection of live pulses with a reclamation policy.
///
/// Emission resonates the newcomer against every resident pulse, so a
/// field's lifetime cost is quadratic in its population. Callers that
/// expect unbounded emission should reclaim often or cap the field.
pub struct ReclamationField {
    name: String,
    members: Vec<Pulse>,
    birth: f64,
    total_emitted: u64,
    total_reclaimed: u64,
    policy: ReclamationPolicy,
    seasonal_cycle_hours: f64,
    last_reclamation: f64,
    voice_probability: f64,
    sink: Arc<dyn Sink>,
    rng: SmallRng,
}

impl ReclamationField {
    pub fn new(
        name: impl Into<String>,
        policy: ReclamationPolicy,
        birth: f64,
        sink: Arc<dyn Sink>,
        rng: SmallRng,
    ) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            birth,
            total_emitted: 0,
            total_reclaimed: 0,
            policy,
            seasonal_cycle_hours: SEASONAL_CYCLE_HOURS,
            last_reclamation: birth,
            voice_probability: VOICE_PROBABILITY,
            sink,
            rng,
        }
    }

    /// Override the seasonal cycle length. Only the seasonal policy reads it.
    pub fn with_seasonal_cycle(mut self, hours: f64) -> Result<Self> {
        if !hours.is_finite() || hours <= 0.0 {
            return Err(CoreError::InvalidParameter(format!(
                "seasonal cycle must be a positive number of hours, got {hours}"
            )));
        }
        self.seasonal_cycle_hours = hours;
        Ok(self)
    }

    /// Chance in `[0, 1]` that a reinforcing resonance is voiced to the sink.
    pub fn with_voice_probability(mut self, p: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&p) {
            return Err(CoreError::InvalidParameter(format!(
                "voice probability must be within [0, 1], got {p}"
            )));
        }
        self.voice_probability = p;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> ReclamationPolicy {
        self.policy
    }

    pub fn birth(&self) -> f64 {
        self.birth
    }

    pub fn members(&self) -> &[Pulse] {
        &self.members
    }

    pub fn get(&self, id: Uuid) -> Option<&Pulse> {
        self.members.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn total_emitted(&self) -> u64 {
        self.total_emitted
    }

    pub fn total_reclaimed(&self) -> u64 {
        self.total_reclaimed
    }

    pub fn last_reclamation(&self) -> f64 {
        self.last_reclamation
    }

    pub fn seasonal_cycle_hours(&self) -> f64 {
        self.seasonal_cycle_hours
    }

    /// Create a pulse at `now`, resonate it against every resident pulse and
    /// reinforce both sides of each strong pair.
    pub fn emit(&mut self, spec: PulseSpec, now: f64) -> Result<Emission> {
        let mut pulse = Pulse::new(spec, now)?;
        let resonances = self.members.len();
        let mut reinforced = 0;

        for existing in &mut self.members {
            let resonance = pulse.compute_resonance(now, existing, &mut self.rng);
            if resonance.strength > REINFORCE_THRESHOLD {
                pulse.reinforce(resonance.strength);
                existing.reinforce(resonance.strength);
                reinforced += 1;
                if self.rng.random_bool(self.voice_probability) {
                    self.sink.emit(&format!("~ {}", resonance.narrative));
                }
            }
        }

        let snapshot = pulse.clone();
        self.members.push(pulse);
        self.total_emitted += 1;

        Ok(Emission {
            pulse: snapshot,
            resonances,
            reinforced,
        })
    }

    /// The threshold the current policy applies at `now`.
    pub fn effective_threshold(&self, now: f64, threshold: f64) -> f64 {
        match self.policy {
            ReclamationPolicy::Natural | ReclamationPolicy::Resonant => threshold,
            ReclamationPolicy::Seasonal => seasonal_threshold(
                cycle_phase(self.birth, now, self.seasonal_cycle_hours),
                threshold,
            ),
            ReclamationPolicy::Lunar => {
                lunar_threshold(cycle_phase(self.birth, now, LUNAR_CYCLE_HOURS), threshold)
            }
        }
    }

    /// Release faded pulses according to the field's policy. Returns how
    /// many were removed.
    pub fn reclaim(&mut self, now: f64, threshold: f64) -> usize {
        let before = self.members.len();

        match self.policy {
            ReclamationPolicy::Resonant => self.reclaim_resonant(now, threshold),
            _ => {
                let t = self.effective_threshold(now, threshold);
                self.members.retain(|p| !p.is_reclaimable(now, t));
            }
        }

        let removed = before - self.members.len();
        self.total_reclaimed += removed as u64;
        self.last_reclamation = now;
        removed
    }

    fn reclaim_resonant(&mut self, now: f64, threshold: f64) {
        let faded: Vec<bool> = self
            .members
            .iter()
            .map(|p| p.is_reclaimable(now, threshold))
            .collect();

        let keep: Vec<bool> = self
            .members
            .iter()
            .zip(&faded)
            .map(|(pulse, &is_faded)| {
                !is_faded
                    || self
                        .members
                        .iter()
                        .zip(&faded)
                        .any(|(other, &other_faded)| {
                            !other_faded && strength_between(pulse, other, now) > RESONANT_RETENTION
                        })
            })
            .collect();

        let mut flags = keep.into_iter();
        self.members.retain(|_| flags.next().unwrap_or(true));
    }

    /// Sum of remaining attention across all members.
    pub fn total_resonance_energy(&self, now: f64) -> f64 {
        self.members.iter().map(|p| p.attention_at(now)).sum()
    }

    /// Every unordered pair whose strength is at least `min_strength`.
    /// Recomputed on each call; each pair is logged on its first pulse.
    pub fn find_resonances(&mut self, now: f64, min_strength: f64) -> Vec<ResonancePair> {
        let mut pairs = Vec::new();
        for i in 0..self.members.len() {
            let (head, tail) = self.members.split_at_mut(i + 1);
            let a = &mut head[i];
            for b in tail.iter() {
                let resonance = a.compute_resonance(now, b, &mut self.rng);
                if resonance.strength >= min_strength {
                    pairs.push(ResonancePair {
                        a: a.id,
                        a_tag: a.tag.clone(),
                        b: b.id,
                        b_tag: b.tag.clone(),
                        resonance,
                    });
                }
            }
        }
        pairs
    }

    /// Let every pulse express itself to the sink. Returns attention levels
    /// in member order.
    pub fn pulse_all(&mut self, now: f64) -> Vec<f64> {
        let sink = self.sink.as_ref();
        self.members.iter_mut().map(|p| p.emit(now, sink)).collect()
    }

    pub fn phase_status(&self, now: f64) -> PhaseStatus {
        PhaseStatus::compute(self.policy, self.birth, now, self.seasonal_cycle_hours)
    }

    pub fn status(&self, now: f64) -> FieldStatus {
        FieldStatus {
            name: self.name.clone(),
            policy: self.policy,
            live_count: self.members.len(),
            total_emitted: self.total_emitted,
            total_reclaimed: self.total_reclaimed,
            total_resonance_energy: self.total_resonance_energy(now),
            age_secs: (now - self.birth).max(0.0),
            last_reclamation: self.last_reclamation,
            phase: self.phase_status(now),
        }
    }
}

impl fmt::Debug for ReclamationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReclamationField")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("members", &self.members.len())
            .field("total_emitted", &self.total_emitted)
            .field("total_reclaimed", &self.total_reclaimed)
            .finish()
    }
}
