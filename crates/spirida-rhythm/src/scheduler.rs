use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use spirida_core::Sink;

use crate::error::{Result, RhythmError};

/// Default phase lengths: inhale 1.0 s, hold 0.5 s, exhale 1.0 s.
const DEFAULT_INHALE: f64 = 1.0;
const DEFAULT_HOLD: f64 = 0.5;
const DEFAULT_EXHALE: f64 = 1.0;

/// The three phase durations of one scheduler cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rhythm {
    pub inhale: Duration,
    pub hold: Duration,
    pub exhale: Duration,
}

impl Rhythm {
    pub fn new(inhale: Duration, hold: Duration, exhale: Duration) -> Self {
        Self {
            inhale,
            hold,
            exhale,
        }
    }

    /// Build from seconds; each must be finite and non-negative.
    pub fn from_secs(inhale: f64, hold: f64, exhale: f64) -> Result<Self> {
        Ok(Self {
            inhale: secs("inhale", inhale)?,
            hold: secs("hold", hold)?,
            exhale: secs("exhale", exhale)?,
        })
    }

    /// Default proportions (2 : 1 : 2) stretched to a total cycle of `total`
    /// seconds.
    pub fn with_cycle(total: f64) -> Result<Self> {
        let default_total = DEFAULT_INHALE + DEFAULT_HOLD + DEFAULT_EXHALE;
        let factor = total / default_total;
        Self::default().scaled(factor)
    }

    /// 1.5 s cycle.
    pub fn slow() -> Self {
        Self::new(
            Duration::from_millis(600),
            Duration::from_millis(300),
            Duration::from_millis(600),
        )
    }

    /// 0.5 s cycle.
    pub fn fast() -> Self {
        Self::new(
            Duration::from_millis(200),
            Duration::from_millis(100),
            Duration::from_millis(200),
        )
    }

    pub fn cycle_duration(&self) -> Duration {
        self.inhale + self.hold + self.exhale
    }

    /// All three phases multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Result<Self> {
        if !factor.is_finite() || factor < 0.0 {
            return Err(RhythmError::InvalidParameter(format!(
                "rhythm factor must be finite and non-negative, got {factor}"
            )));
        }
        Self::from_secs(
            self.inhale.as_secs_f64() * factor,
            self.hold.as_secs_f64() * factor,
            self.exhale.as_secs_f64() * factor,
        )
    }
}

impl Default for Rhythm {
    fn default() -> Self {
        Self::new(
            Duration::from_secs_f64(DEFAULT_INHALE),
            Duration::from_secs_f64(DEFAULT_HOLD),
            Duration::from_secs_f64(DEFAULT_EXHALE),
        )
    }
}

/// `slow`, `fast`, or a total cycle length in seconds.
impl FromStr for Rhythm {
    type Err = RhythmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "slow" => Ok(Rhythm::slow()),
            "fast" => Ok(Rhythm::fast()),
            other => {
                let total: f64 = other.parse().map_err(|_| {
                    RhythmError::InvalidParameter(format!(
                        "rhythm must be 'slow', 'fast' or a number of seconds, got '{other}'"
                    ))
                })?;
                Rhythm::with_cycle(total)
            }
        }
    }
}

fn secs(phase: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        RhythmError::InvalidParameter(format!(
            "{phase} must be a finite, non-negative number of seconds, got {value}"
        ))
    })
}

/// Three-phase rhythmic timer.
///
/// `tick` suspends the caller through inhale, hold and exhale in turn. The
/// rhythm is snapshotted at the start of each tick, so `adjust_rhythm`
/// takes effect from the next cycle and never waits on one in progress.
pub struct Scheduler {
    rhythm: RwLock<Rhythm>,
    cycles: AtomicU64,
    sink: Arc<dyn Sink>,
}

impl Scheduler {
    pub fn new(rhythm: Rhythm, sink: Arc<dyn Sink>) -> Self {
        Self {
            rhythm: RwLock::new(rhythm),
            cycles: AtomicU64::new(0),
            sink,
        }
    }

    pub fn rhythm(&self) -> Rhythm {
        *self.rhythm.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Ticks completed by every caller of [`Scheduler::tick`].
    pub fn cycle_count(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    pub fn cycle_duration(&self) -> Duration {
        self.rhythm().cycle_duration()
    }

    /// Multiply every phase by `factor` (> 1 slows down, < 1 speeds up).
    /// A negative or non-finite factor leaves the rhythm unchanged.
    pub fn adjust_rhythm(&self, factor: f64) -> Result<Rhythm> {
        let mut rhythm = self.rhythm.write().unwrap_or_else(|e| e.into_inner());
        *rhythm = rhythm.scaled(factor)?;
        Ok(*rhythm)
    }

    /// Run one full cycle. When not `silent`, a phase marker is written to
    /// the sink before each wait.
    pub async fn tick(&self, silent: bool) {
        let rhythm = self.rhythm();
        let phases = [
            ("inhale...", rhythm.inhale),
            ("hold...", rhythm.hold),
            ("exhale...", rhythm.exhale),
        ];
        for (marker, duration) in phases {
            if !silent {
                self.sink.emit(marker);
            }
            tokio::time::sleep(duration).await;
        }
        if rhythm.cycle_duration().is_zero() {
            tokio::task::yield_now().await;
        }
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!("cycle {cycle} complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spirida_core::MemorySink;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_default_rhythm() {
        let r = Rhythm::default();
        assert_eq!(r.cycle_duration(), Duration::from_millis(2500));
    }

    #[test]
    fn test_from_secs_rejects_negative() {
        assert!(Rhythm::from_secs(1.0, -0.1, 1.0).is_err());
        assert!(Rhythm::from_secs(f64::NAN, 0.0, 0.0).is_err());
        assert!(Rhythm::from_secs(0.0, 0.0, 0.0).is_ok());
    }

    #[test]
    fn test_parse_tempo() {
        assert_eq!("slow".parse::<Rhythm>().unwrap().cycle_duration(), ms(1500));
        assert_eq!("fast".parse::<Rhythm>().unwrap().cycle_duration(), ms(500));
        let custom: Rhythm = "0.25".parse().unwrap();
        assert_eq!(custom.inhale, ms(100));
        assert_eq!(custom.hold, ms(50));
        assert_eq!(custom.exhale, ms(100));
        assert!("brisk".parse::<Rhythm>().is_err());
        assert!("-1".parse::<Rhythm>().is_err());
    }

    #[test]
    fn test_adjust_rhythm_scales_all_phases() {
        let scheduler = Scheduler::new(Rhythm::new(ms(100), ms(50), ms(100)), Arc::new(MemorySink::new()));
        let r = scheduler.adjust_rhythm(2.0).unwrap();
        assert_eq!(r, Rhythm::new(ms(200), ms(100), ms(200)));
        assert_eq!(scheduler.cycle_duration(), ms(500));
    }

    #[test]
    fn test_adjust_rhythm_to_zero_is_allowed() {
        let scheduler = Scheduler::new(Rhythm::default(), Arc::new(MemorySink::new()));
        scheduler.adjust_rhythm(0.0).unwrap();
        assert!(scheduler.cycle_duration().is_zero());
    }

    #[test]
    fn test_adjust_rhythm_rejects_negative() {
        let scheduler = Scheduler::new(Rhythm::default(), Arc::new(MemorySink::new()));
        let err = scheduler.adjust_rhythm(-1.0).unwrap_err();
        assert!(matches!(err, RhythmError::InvalidParameter(_)));
        assert_eq!(scheduler.rhythm(), Rhythm::default());
        assert!(scheduler.adjust_rhythm(f64::INFINITY).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_waits_full_cycle_and_counts() {
        let sink = Arc::new(MemorySink::new());
        let scheduler = Scheduler::new(Rhythm::new(ms(100), ms(50), ms(100)), sink.clone());
        let start = tokio::time::Instant::now();
        scheduler.tick(false).await;
        assert!(start.elapsed() >= ms(250));
        assert_eq!(scheduler.cycle_count(), 1);
        assert_eq!(sink.lines(), vec!["inhale...", "hold...", "exhale..."]);

        scheduler.tick(true).await;
        assert_eq!(scheduler.cycle_count(), 2);
        assert_eq!(sink.len(), 3, "silent tick writes nothing");
    }

    #[tokio::test]
    async fn test_zero_rhythm_tick_completes() {
        let scheduler = Scheduler::new(Rhythm::new(ms(0), ms(0), ms(0)), Arc::new(MemorySink::new()));
        for _ in 0..3 {
            scheduler.tick(true).await;
        }
        assert_eq!(scheduler.cycle_count(), 3);
    }
}
