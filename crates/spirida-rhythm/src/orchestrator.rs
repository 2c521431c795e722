use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Serialize;
use spirida_core::{
    Clock, Emission, FieldStatus, PulseSpec, RECLAIM_THRESHOLD, ReclamationField,
    ReclamationPolicy, Sink, SystemClock, unix_to_iso8601,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{FieldConfig, SystemConfig};
use crate::error::{Result, RhythmError};
use crate::scheduler::{Rhythm, Scheduler};
use crate::sink::StdoutSink;

/// A field shared between callers and the maintenance task.
pub type SharedField = Arc<RwLock<ReclamationField>>;

/// Added to one cycle when no explicit stop timeout is configured.
const STOP_GRACE: Duration = Duration::from_secs(1);

/// How a call to [`Orchestrator::stop_maintenance`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    /// The task observed cancellation and exited.
    Stopped,
    /// Nothing was running.
    AlreadyIdle,
    /// The task did not exit within the timeout. It still exits after its
    /// current tick, and the next start waits for it.
    TimedOut,
}

/// Pulses removed from one field in a maintenance pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reclaimed {
    pub field: String,
    pub removed: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct SystemStatus {
    pub name: String,
    pub birth: String,
    pub age_secs: f64,
    pub running: bool,
    pub cycle_count: u64,
    pub cycle_duration_secs: f64,
    pub threshold: f64,
    pub total_resonance_energy: f64,
    pub fields: Vec<FieldStatus>,
}

#[derive(Default)]
struct FieldRegistry {
    fields: Vec<(String, SharedField)>,
    index: HashMap<String, usize>,
}

impl FieldRegistry {
    fn get(&self, name: &str) -> Option<SharedField> {
        self.index.get(name).map(|&i| Arc::clone(&self.fields[i].1))
    }

    fn snapshot(&self) -> Vec<(String, SharedField)> {
        self.fields
            .iter()
            .map(|(name, field)| (name.clone(), Arc::clone(field)))
            .collect()
    }
}

struct ActiveMaintenance {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct MaintenanceSlot {
    active: Option<ActiveMaintenance>,
    /// Cancelled when the most recently spawned task exits, on any path.
    last_exit: Option<CancellationToken>,
}

pub struct OrchestratorBuilder {
    name: String,
    rhythm: Rhythm,
    sink: Option<Arc<dyn Sink>>,
    clock: Option<Arc<dyn Clock>>,
    threshold: f64,
    stop_timeout: Option<Duration>,
    seed: Option<u64>,
}

impl OrchestratorBuilder {
    pub fn rhythm(mut self, rhythm: Rhythm) -> Self {
        self.rhythm = rhythm;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = Some(timeout);
        self
    }

    /// Seed the narrative rng of every field created afterwards.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(RhythmError::InvalidParameter(format!(
                "threshold must be finite and non-negative, got {}",
                self.threshold
            )));
        }
        let sink: Arc<dyn Sink> = match self.sink {
            Some(sink) => sink,
            None => Arc::new(StdoutSink),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        Ok(Orchestrator {
            birth: clock.now(),
            scheduler: Arc::new(Scheduler::new(self.rhythm, Arc::clone(&sink))),
            name: self.name,
            fields: Arc::new(RwLock::new(FieldRegistry::default())),
            sink,
            clock,
            threshold: self.threshold,
            stop_timeout: self.stop_timeout,
            seed: self.seed,
            running: Arc::new(AtomicBool::new(false)),
            maintenance: Mutex::new(MaintenanceSlot::default()),
        })
    }
}

/// Owns a scheduler and a set of named fields, and runs a background
/// maintenance loop that reclaims faded pulses once per cycle.
///
/// All methods take `&self`; share it behind an `Arc` to drive it from
/// several tasks. At most one maintenance task is live at a time.
pub struct Orchestrator {
    name: String,
    birth: f64,
    scheduler: Arc<Scheduler>,
    fields: Arc<RwLock<FieldRegistry>>,
    sink: Arc<dyn Sink>,
    clock: Arc<dyn Clock>,
    threshold: f64,
    stop_timeout: Option<Duration>,
    seed: Option<u64>,
    running: Arc<AtomicBool>,
    maintenance: Mutex<MaintenanceSlot>,
}

impl Orchestrator {
    pub fn builder(name: impl Into<String>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            name: name.into(),
            rhythm: Rhythm::default(),
            sink: None,
            clock: None,
            threshold: RECLAIM_THRESHOLD,
            stop_timeout: None,
            seed: None,
        }
    }

    /// Build an orchestrator and create every configured field.
    pub fn from_config(
        config: &SystemConfig,
        sink: Arc<dyn Sink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let mut builder = Self::builder(config.name.clone())
            .rhythm(config.rhythm()?)
            .sink(sink)
            .clock(clock)
            .threshold(config.threshold);
        if let Some(timeout) = config.stop_timeout() {
            builder = builder.stop_timeout(timeout);
        }
        if let Some(seed) = config.seed {
            builder = builder.seed(seed);
        }
        let orchestrator = builder.build()?;
        for field in &config.fields {
            orchestrator.create_field_with(field)?;
        }
        Ok(orchestrator)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn birth(&self) -> f64 {
        self.birth
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn create_field(&self, name: &str, policy: ReclamationPolicy) -> Result<SharedField> {
        self.create_field_with(&FieldConfig::new(name, policy))
    }

    /// Register a new field. Names are unique.
    pub fn create_field_with(&self, config: &FieldConfig) -> Result<SharedField> {
        let mut registry = write_lock(&self.fields);
        if registry.index.contains_key(&config.name) {
            return Err(RhythmError::InvalidParameter(format!(
                "field '{}' already exists",
                config.name
            )));
        }

        let index = registry.fields.len();
        let rng = match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => SmallRng::from_os_rng(),
        };
        let mut field = ReclamationField::new(
            config.name.clone(),
            config.policy,
            self.clock.now(),
            Arc::clone(&self.sink),
            rng,
        );
        if let Some(hours) = config.seasonal_cycle_hours {
            field = field.with_seasonal_cycle(hours)?;
        }

        let shared = Arc::new(RwLock::new(field));
        registry.fields.push((config.name.clone(), Arc::clone(&shared)));
        registry.index.insert(config.name.clone(), index);
        tracing::info!("created field '{}' ({})", config.name, config.policy);
        Ok(shared)
    }

    pub fn field(&self, name: &str) -> Option<SharedField> {
        read_lock(&self.fields).get(name)
    }

    /// Field names in registration order.
    pub fn field_names(&self) -> Vec<String> {
        read_lock(&self.fields)
            .fields
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Run `f` on a field under its write lock.
    pub fn with_field<R>(&self, name: &str, f: impl FnOnce(&mut ReclamationField) -> R) -> Option<R> {
        let field = self.field(name)?;
        let mut guard = write_lock(&field);
        Some(f(&mut guard))
    }

    pub fn emit_to_field(&self, name: &str, tag: &str, affect: &str) -> Result<Emission> {
        self.emit_to_field_with(name, PulseSpec::new(tag, affect))
    }

    pub fn emit_to_field_with(&self, name: &str, spec: PulseSpec) -> Result<Emission> {
        let Some(field) = self.field(name) else {
            tracing::warn!("emit to unknown field '{name}' ignored");
            return Err(RhythmError::FieldNotFound(name.to_string()));
        };
        let now = self.clock.now();
        let emission = write_lock(&field).emit(spec, now)?;
        Ok(emission)
    }

    /// One maintenance pass over every field, in registration order.
    pub fn reclaim_all(&self, now: f64) -> Vec<Reclaimed> {
        maintenance_pass(&self.fields, now, self.threshold, self.sink.as_ref())
    }

    pub fn total_resonance(&self, now: f64) -> f64 {
        read_lock(&self.fields)
            .snapshot()
            .iter()
            .map(|(_, field)| read_lock(field).total_resonance_energy(now))
            .sum()
    }

    pub fn adjust_rhythm(&self, factor: f64) -> Result<Rhythm> {
        let rhythm = self.scheduler.adjust_rhythm(factor)?;
        tracing::info!(
            "rhythm adjusted by {factor}: cycle now {:.3}s",
            rhythm.cycle_duration().as_secs_f64()
        );
        Ok(rhythm)
    }

    /// Sit out `cycles` audible ticks. These count toward the shared
    /// `cycle_count` alongside maintenance ticks.
    pub async fn pause(&self, cycles: u32) {
        self.sink.emit(&format!("pausing for {cycles} cycle(s)..."));
        for _ in 0..cycles {
            self.scheduler.tick(false).await;
        }
        self.sink.emit("pause complete");
    }

    /// Spawn the background maintenance task on the current tokio runtime.
    ///
    /// Returns `Ok(false)` when a task is already active. A task left behind
    /// by a timed-out stop is awaited before the new loop begins, and a task
    /// that ended without being stopped is replaced.
    pub fn start_maintenance(&self) -> Result<bool> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| RhythmError::NoRuntime)?;
        let mut slot = lock(&self.maintenance);
        if let Some(active) = &slot.active {
            if !active.handle.is_finished() {
                return Ok(false);
            }
            tracing::warn!("maintenance task for '{}' had ended; restarting", self.name);
            slot.active = None;
        }

        let token = CancellationToken::new();
        let exit = CancellationToken::new();
        let previous = slot.last_exit.replace(exit.clone());
        let task = MaintenanceTask {
            name: self.name.clone(),
            scheduler: Arc::clone(&self.scheduler),
            fields: Arc::clone(&self.fields),
            sink: Arc::clone(&self.sink),
            clock: Arc::clone(&self.clock),
            threshold: self.threshold,
            token: token.clone(),
            running: Arc::clone(&self.running),
        };

        self.running.store(true, Ordering::SeqCst);
        let handle = runtime.spawn(task.run(previous, exit));
        slot.active = Some(ActiveMaintenance { token, handle });
        tracing::info!(
            "maintenance started for '{}' (cycle {:.3}s)",
            self.name,
            self.scheduler.cycle_duration().as_secs_f64()
        );
        Ok(true)
    }

    /// Cancel the maintenance task and wait for it to exit.
    ///
    /// The wait is bounded by the configured stop timeout, or one cycle plus
    /// a second. A phase wait in progress is never interrupted.
    pub async fn stop_maintenance(&self) -> StopOutcome {
        let active = {
            let mut slot = lock(&self.maintenance);
            self.running.store(false, Ordering::SeqCst);
            slot.active.take()
        };
        let Some(ActiveMaintenance { token, mut handle }) = active else {
            return StopOutcome::AlreadyIdle;
        };

        token.cancel();
        let timeout = self
            .stop_timeout
            .unwrap_or_else(|| self.scheduler.cycle_duration() + STOP_GRACE);
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => {
                tracing::info!("maintenance stopped for '{}'", self.name);
                StopOutcome::Stopped
            }
            Ok(Err(e)) => {
                tracing::error!("maintenance task for '{}' failed: {e}", self.name);
                StopOutcome::Stopped
            }
            Err(_) => {
                tracing::warn!(
                    "maintenance for '{}' did not stop within {:.3}s; it will exit after its current tick",
                    self.name,
                    timeout.as_secs_f64()
                );
                StopOutcome::TimedOut
            }
        }
    }

    pub fn status_snapshot(&self, now: f64) -> SystemStatus {
        let fields: Vec<FieldStatus> = read_lock(&self.fields)
            .snapshot()
            .iter()
            .map(|(_, field)| read_lock(field).status(now))
            .collect();
        SystemStatus {
            name: self.name.clone(),
            birth: unix_to_iso8601(self.birth),
            age_secs: (now - self.birth).max(0.0),
            running: self.is_running(),
            cycle_count: self.scheduler.cycle_count(),
            cycle_duration_secs: self.scheduler.cycle_duration().as_secs_f64(),
            threshold: self.threshold,
            total_resonance_energy: fields.iter().map(|f| f.total_resonance_energy).sum(),
            fields,
        }
    }

    pub fn status(&self) -> SystemStatus {
        self.status_snapshot(self.clock.now())
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Some(active) = lock(&self.maintenance).active.take() {
            active.token.cancel();
        }
    }
}

struct MaintenanceTask {
    name: String,
    scheduler: Arc<Scheduler>,
    fields: Arc<RwLock<FieldRegistry>>,
    sink: Arc<dyn Sink>,
    clock: Arc<dyn Clock>,
    threshold: f64,
    token: CancellationToken,
    running: Arc<AtomicBool>,
}

impl MaintenanceTask {
    async fn run(self, previous: Option<CancellationToken>, exit: CancellationToken) {
        let _exit = exit.drop_guard();
        let _running = RunningGuard {
            running: Arc::clone(&self.running),
            token: self.token.clone(),
        };
        if let Some(previous) = previous {
            previous.cancelled().await;
        }

        while !self.token.is_cancelled() {
            self.scheduler.tick(true).await;
            if self.token.is_cancelled() {
                break;
            }
            let pass = catch_unwind(AssertUnwindSafe(|| {
                maintenance_pass(
                    &self.fields,
                    self.clock.now(),
                    self.threshold,
                    self.sink.as_ref(),
                )
            }));
            if pass.is_err() {
                tracing::error!("maintenance pass for '{}' panicked; continuing", self.name);
            }
        }
        tracing::debug!("maintenance loop for '{}' exited", self.name);
    }
}

/// Clears `running` when a loop ends without having been cancelled.
struct RunningGuard {
    running: Arc<AtomicBool>,
    token: CancellationToken,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if !self.token.is_cancelled() {
            self.running.store(false, Ordering::SeqCst);
        }
    }
}

fn maintenance_pass(
    fields: &RwLock<FieldRegistry>,
    now: f64,
    threshold: f64,
    sink: &dyn Sink,
) -> Vec<Reclaimed> {
    let fields = read_lock(fields).snapshot();
    let mut reclaimed = Vec::with_capacity(fields.len());
    for (name, field) in fields {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let removed = write_lock(&field).reclaim(now, threshold);
            if removed > 0 {
                tracing::info!("field '{name}' reclaimed {removed} pulse(s)");
                sink.emit(&format!("{name} reclaimed {removed} faded pulse(s)"));
            }
            removed
        }));
        match outcome {
            Ok(removed) => {
                reclaimed.push(Reclaimed {
                    field: name,
                    removed,
                });
            }
            Err(_) => tracing::error!("reclamation panicked in field '{name}'; continuing"),
        }
    }
    reclaimed
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
