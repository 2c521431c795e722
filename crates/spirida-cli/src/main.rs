use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use serde::Serialize;
use spirida_core::{
    DEFAULT_AFFECT, NullSink, PulseSpec, ReclamationField, ReclamationPolicy, ResonanceComponents,
    Sink, SystemClock, now_secs,
};
use spirida_rhythm::{
    MAX_SEED, Orchestrator, Rhythm, RhythmConfig, StdoutSink, StopOutcome, SystemConfig,
    TracingSink,
};

const TAGS: &[&str] = &["🌿", "🌱", "🍄", "🌊", "💧", "🌙", "✨", "💫", "🪐", "🌲"];
const AFFECTS: &[&str] = &["calm", "joy", "curious", "peaceful", "grateful", "hopeful", "tender", "melancholy"];

#[derive(Parser)]
#[command(name = "spirida", about = "Decaying pulses, resonance and rhythmic reclamation")]
struct Cli {
    /// TOML config file (falls back to $SPIRIDA_CONFIG, then defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seed narrative and pulse selection for reproducible runs
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(..=MAX_SEED))]
    seed: Option<u64>,

    /// Discard pulse and narrative output
    #[arg(long, global = true)]
    quiet: bool,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit pulses on a rhythm while maintenance reclaims in the background
    Run {
        /// Number of cycles to emit for
        #[arg(long, default_value_t = 5)]
        presence: u32,

        /// slow, fast, or a cycle length in seconds
        #[arg(long)]
        rhythm: Option<Rhythm>,
    },

    /// Emit pulses into one field and report the resonances between them
    Resonate {
        /// Reclamation policy of the scratch field
        #[arg(long, default_value = "natural")]
        policy: ReclamationPolicy,

        /// Only report pairs at least this strong
        #[arg(long, default_value_t = 0.5)]
        min_strength: f64,

        /// Pulses as TAG or TAG:AFFECT
        #[arg(required = true)]
        pulses: Vec<String>,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Run { presence, rhythm } => cmd_run(&cli, *presence, *rhythm).await,
        Commands::Resonate {
            policy,
            min_strength,
            pulses,
        } => cmd_resonate(&cli, *policy, *min_strength, pulses),
        Commands::Config => cmd_config(&cli),
    }
}

fn load_config(cli: &Cli) -> Result<SystemConfig> {
    let mut config =
        SystemConfig::resolve(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    Ok(config)
}

fn make_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    }
}

fn output_sink(cli: &Cli) -> Arc<dyn Sink> {
    if cli.quiet {
        Arc::new(NullSink)
    } else {
        Arc::new(StdoutSink)
    }
}

async fn cmd_run(cli: &Cli, presence: u32, rhythm: Option<Rhythm>) -> Result<()> {
    let mut config = load_config(cli)?;
    if let Some(rhythm) = rhythm {
        config.rhythm = RhythmConfig::from(rhythm);
    }
    if config.fields.is_empty() {
        bail!("configuration defines no fields");
    }

    let orch = Orchestrator::from_config(&config, output_sink(cli), Arc::new(SystemClock))
        .context("failed to build orchestrator")?;
    let names = orch.field_names();
    let mut rng = make_rng(config.seed);

    orch.start_maintenance()?;
    tracing::info!("running '{}' for {presence} cycle(s)", orch.name());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    for cycle in 0..presence {
        let name = &names[cycle as usize % names.len()];
        let tag = TAGS.choose(&mut rng).copied().unwrap_or("🌿");
        let affect = AFFECTS.choose(&mut rng).copied().unwrap_or(DEFAULT_AFFECT);
        orch.emit_to_field(name, tag, affect)?;
        let now = orch.now();
        orch.with_field(name, |field| field.pulse_all(now));

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("interrupted after {cycle} cycle(s)");
                break;
            }
            _ = orch.scheduler().tick(false) => {}
        }
    }

    match orch.stop_maintenance().await {
        StopOutcome::TimedOut => tracing::warn!("maintenance did not stop in time"),
        StopOutcome::Stopped | StopOutcome::AlreadyIdle => {}
    }

    let status = orch.status();
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

#[derive(Serialize)]
struct ResonanceReport {
    a: String,
    b: String,
    strength: f64,
    narrative: String,
    components: ResonanceComponents,
}

fn parse_pulse(raw: &str) -> Result<PulseSpec> {
    let (tag, affect) = match raw.split_once(':') {
        Some((tag, affect)) if !affect.trim().is_empty() => (tag.trim(), affect.trim()),
        Some((tag, _)) => (tag.trim(), DEFAULT_AFFECT),
        None => (raw.trim(), DEFAULT_AFFECT),
    };
    if tag.is_empty() {
        bail!("pulse '{raw}' has an empty tag");
    }
    Ok(PulseSpec::new(tag, affect))
}

fn cmd_resonate(
    cli: &Cli,
    policy: ReclamationPolicy,
    min_strength: f64,
    pulses: &[String],
) -> Result<()> {
    if !min_strength.is_finite() {
        bail!("--min-strength must be a finite number");
    }
    let specs = pulses
        .iter()
        .map(|raw| parse_pulse(raw))
        .collect::<Result<Vec<_>>>()?;

    let sink: Arc<dyn Sink> = if cli.quiet {
        Arc::new(NullSink)
    } else {
        Arc::new(TracingSink)
    };
    let now = now_secs();
    let mut field = ReclamationField::new("resonate", policy, now, sink, make_rng(cli.seed));
    for spec in specs {
        field.emit(spec, now)?;
    }

    let reports: Vec<ResonanceReport> = field
        .find_resonances(now, min_strength)
        .into_iter()
        .map(|pair| ResonanceReport {
            a: pair.a_tag,
            b: pair.b_tag,
            strength: pair.resonance.strength,
            narrative: pair.resonance.narrative,
            components: pair.resonance.components,
        })
        .collect();
    tracing::debug!("{} pair(s) at or above {min_strength}", reports.len());
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

fn cmd_config(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}
