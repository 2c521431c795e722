//! Pairwise resonance between pulses.
//!
//! Four components are scored independently and then synthesized:
//!
//! - **symbolic**: affinity between tags from a symmetric harmony table
//! - **emotional**: affinity between affects from a symmetric table
//! - **temporal**: step function of the distance between birth times
//! - **attentional**: how the two current attention levels interact
//!
//! The composite is their mean, amplified when symbol and emotion agree
//! strongly (×1.3) and when the pulses were born close together (×1.2),
//! capped at 1.0. All components are read at a single `now`, which makes
//! `components(a, b, now) == components(b, a, now)`.
//!
//! The narrative is cosmetic: it is drawn from the caller's rng and never
//! feeds back into numeric state.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Serialize;

use crate::constants::STRONG_ATTENTION;
use crate::pulse::Pulse;

/// `(a, b, affinity)`; looked up in both orders.
const SYMBOL_HARMONIES: &[(&str, &str, f64)] = &[
    ("🌿", "🌱", 0.9),
    ("🌿", "🌊", 0.7),
    ("🌿", "🍄", 0.8),
    ("🌿", "🌲", 0.9),
    ("💧", "🌊", 0.9),
    ("💧", "🌿", 0.7),
    ("💧", "🌙", 0.6),
    ("💧", "💎", 0.5),
    ("✨", "🌙", 0.8),
    ("✨", "🪐", 0.7),
    ("✨", "💫", 0.9),
    ("✨", "🔮", 0.6),
    ("🍄", "🌲", 0.7),
    ("🍄", "🏔️", 0.6),
    ("🍄", "🌍", 0.8),
    ("🌙", "🌊", 0.6),
    ("🌙", "🕯️", 0.7),
    ("🪐", "🌌", 0.9),
    ("🪐", "🔭", 0.6),
    ("🪐", "💫", 0.8),
];

const AFFECT_HARMONIES: &[(&str, &str, f64)] = &[
    ("calm", "peaceful", 0.9),
    ("calm", "centered", 0.8),
    ("calm", "grateful", 0.7),
    ("calm", "grief", 0.6),
    ("grief", "tender", 0.8),
    ("grief", "melancholy", 0.9),
    ("grief", "healing", 0.7),
    ("joy", "grateful", 0.8),
    ("joy", "hopeful", 0.9),
    ("joy", "celebration", 0.9),
    ("joy", "peaceful", 0.6),
    ("curious", "wondering", 0.9),
    ("curious", "exploring", 0.8),
    ("curious", "hopeful", 0.7),
    ("curious", "excited", 0.6),
    ("peaceful", "centered", 0.8),
    ("peaceful", "still", 0.9),
    ("peaceful", "present", 0.8),
    ("grateful", "appreciation", 0.9),
    ("grateful", "humble", 0.7),
    ("grateful", "loving", 0.8),
];

const SAME_SYMBOL: f64 = 0.8;
const DEFAULT_SYMBOL: f64 = 0.2;
const SAME_AFFECT: f64 = 0.8;
const DEFAULT_AFFECT_AFFINITY: f64 = 0.3;

const HARMONY_BOOST: f64 = 1.3;
const PROXIMITY_BOOST: f64 = 1.2;

/// Per-component scores, each in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ResonanceComponents {
    pub symbolic: f64,
    pub emotional: f64,
    pub temporal: f64,
    pub attentional: f64,
}

/// Outcome of resonating two pulses.
#[derive(Clone, Debug, Serialize)]
pub struct Resonance {
    pub strength: f64,
    pub components: ResonanceComponents,
    pub narrative: String,
}

fn lookup(table: &[(&str, &str, f64)], a: &str, b: &str) -> Option<f64> {
    table
        .iter()
        .find(|(x, y, _)| (*x == a && *y == b) || (*x == b && *y == a))
        .map(|&(_, _, v)| v)
}

pub fn symbolic(a: &str, b: &str) -> f64 {
    if let Some(v) = lookup(SYMBOL_HARMONIES, a, b) {
        return v;
    }
    if a == b { SAME_SYMBOL } else { DEFAULT_SYMBOL }
}

pub fn emotional(a: &str, b: &str) -> f64 {
    if let Some(v) = lookup(AFFECT_HARMONIES, a, b) {
        return v;
    }
    if a == b {
        SAME_AFFECT
    } else {
        DEFAULT_AFFECT_AFFINITY
    }
}

/// Step function over `|Δbirth|` in seconds.
pub fn temporal(birth_a: f64, birth_b: f64) -> f64 {
    let diff = (birth_a - birth_b).abs();
    if diff < 5.0 {
        0.9
    } else if diff < 30.0 {
        0.7
    } else if diff < 300.0 {
        0.4
    } else {
        0.1
    }
}

pub fn attentional(attention_a: f64, attention_b: f64) -> f64 {
    let strong_a = attention_a > STRONG_ATTENTION;
    let strong_b = attention_b > STRONG_ATTENTION;
    if strong_a && strong_b {
        0.8
    } else if (strong_a && attention_b > 0.2) || (strong_b && attention_a > 0.2) {
        0.6
    } else if attention_a < 0.3 && attention_b < 0.3 {
        0.4
    } else {
        0.3
    }
}

/// Score the four components for a pair at a shared `now`.
pub fn components(a: &Pulse, b: &Pulse, now: f64) -> ResonanceComponents {
    ResonanceComponents {
        symbolic: symbolic(&a.tag, &b.tag),
        emotional: emotional(&a.affect, &b.affect),
        temporal: temporal(a.birth, b.birth),
        attentional: attentional(a.attention_at(now), b.attention_at(now)),
    }
}

/// Combine components into a strength in `[0, 1]`.
pub fn synthesize(c: &ResonanceComponents) -> f64 {
    let mut strength = (c.symbolic + c.emotional + c.temporal + c.attentional) / 4.0;
    if c.emotional > 0.7 && c.symbolic > 0.7 {
        strength *= HARMONY_BOOST;
    }
    if c.temporal > 0.8 {
        strength *= PROXIMITY_BOOST;
    }
    strength.min(1.0)
}

/// Strength only, with no narrative and no history. Used by reclamation
/// probes and pair scans.
pub fn strength_between(a: &Pulse, b: &Pulse, now: f64) -> f64 {
    synthesize(&components(a, b, now))
}

pub(crate) fn resonate(a: &Pulse, b: &Pulse, now: f64, rng: &mut impl Rng) -> Resonance {
    let components = components(a, b, now);
    let strength = synthesize(&components);
    Resonance {
        strength,
        components,
        narrative: narrate(a, b, strength, rng),
    }
}

/// Pick a templated sentence from the bucket matching `strength`.
pub fn narrate(a: &Pulse, b: &Pulse, strength: f64, rng: &mut impl Rng) -> String {
    let bucket = if strength > 0.8 {
        [
            format!("{} and {} sing in harmony...", a.tag, b.tag),
            format!("Deep resonance flows between {} and {}...", a.affect, b.affect),
            "Two pulses become one rhythm...".to_string(),
            "The field trembles with recognition...".to_string(),
        ]
    } else if strength > 0.6 {
        [
            format!("{} recognizes {} across time...", a.tag, b.tag),
            format!("Echoes of {} stir {}...", a.affect, b.affect),
            "A gentle connection forms...".to_string(),
            "Frequencies align in subtle dance...".to_string(),
        ]
    } else if strength > 0.4 {
        [
            format!("{} notices {} in passing...", a.tag, b.tag),
            format!("Faint harmonies between {} and {}...", a.affect, b.affect),
            "A whisper of connection...".to_string(),
            "Distant resonance, like memory...".to_string(),
        ]
    } else {
        [
            format!("{} and {} share the same field...", a.tag, b.tag),
            "All pulses are connected, even in silence...".to_string(),
            "The subtlest resonance, barely perceptible...".to_string(),
            "Unity in the underlying stillness...".to_string(),
        ]
    };
    bucket[..].choose(rng).cloned().unwrap_or_default()
}
