//! OR-BIT
//!
//! Command-line driver for the clinical inference engine.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use orbit::config::{self, EngineConfig};
use orbit::core::{SyntheticFeed, VitalsFeed};
use orbit::models::{Gender, LabValues, LiverFunction, PatientProfile, VitalsSample};
use orbit::ClinicalEngine;

/// Samples fed into the window before a one-shot command runs.
const WARM_UP_SAMPLES: i64 = 20;

#[derive(Parser)]
#[command(name = "orbit", about = "Operating-Room Bio-Intelligence Twin")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream synthetic vitals into the engine and print detected events.
    Simulate {
        #[arg(long, default_value_t = 20)]
        ticks: u64,
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Forecast a vitals trajectory with hypotension risk.
    Forecast {
        #[arg(default_value = "MAP")]
        vitals_type: String,
        #[arg(long)]
        minutes: Option<i64>,
    },
    /// Sepsis screen against the latest vitals.
    Sepsis {
        #[command(flatten)]
        patient: PatientArgs,
        #[arg(long)]
        wbc: Option<f64>,
        #[arg(long)]
        lactate: Option<f64>,
    },
    /// Patient-adjusted dose for one drug.
    Dosage {
        drug: String,
        #[command(flatten)]
        patient: PatientArgs,
        #[arg(long, default_value = "procedural")]
        indication: String,
    },
    /// Train both models and write their artifacts.
    Train {
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(clap::Args)]
struct PatientArgs {
    #[arg(long, default_value_t = 50)]
    age: u32,
    #[arg(long, default_value_t = 70.0)]
    weight: f64,
    #[arg(long, default_value_t = 170.0)]
    height: f64,
    #[arg(long, value_enum, default_value_t = SexArg::Unspecified)]
    sex: SexArg,
    /// eGFR in mL/min/1.73m².
    #[arg(long)]
    kidney: Option<f64>,
    #[arg(long, value_enum)]
    liver: Option<LiverArg>,
    #[arg(long, value_delimiter = ',')]
    allergies: Vec<String>,
    #[arg(long, value_delimiter = ',')]
    medications: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SexArg {
    Male,
    Female,
    Unspecified,
}

#[derive(Clone, Copy, ValueEnum)]
enum LiverArg {
    Normal,
    Mild,
    Moderate,
    Severe,
}

impl PatientArgs {
    fn profile(&self) -> PatientProfile {
        let gender = match self.sex {
            SexArg::Male => Gender::Male,
            SexArg::Female => Gender::Female,
            SexArg::Unspecified => Gender::Unspecified,
        };
        let mut patient = PatientProfile::new(self.age, self.weight, self.height, gender);
        patient.kidney_function = self.kidney;
        patient.liver_function = self.liver.map(|liver| match liver {
            LiverArg::Normal => LiverFunction::Normal,
            LiverArg::Mild => LiverFunction::Mild,
            LiverArg::Moderate => LiverFunction::Moderate,
            LiverArg::Severe => LiverFunction::Severe,
        });
        patient.allergies = self.allergies.clone();
        patient.current_medications = self.medications.clone();
        patient
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Backfills the window with synthetic samples ending now.
fn warm_up(engine: &ClinicalEngine, feed: &mut SyntheticFeed, interval: Duration) -> Result<VitalsSample> {
    let now = Utc::now();
    for i in (0..WARM_UP_SAMPLES).rev() {
        engine.append_vitals(feed.next_sample(now - interval * i as i32))?;
    }
    Ok(engine.latest_vitals()?)
}

async fn simulate(
    engine: Arc<ClinicalEngine>,
    mut feed: SyntheticFeed,
    ticks: u64,
    interval: StdDuration,
) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<VitalsSample>(32);

    let producer = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        for _ in 0..ticks {
            ticker.tick().await;
            if tx.send(feed.next_sample(Utc::now())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            sample = rx.recv() => {
                let Some(sample) = sample else { break };
                match engine.append_vitals(sample) {
                    Ok(events) => {
                        for event in events {
                            println!("{}", serde_json::to_string(&event)?);
                        }
                    }
                    Err(err) => warn!(error = %err, "sample dropped"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }
    producer.abort();

    print_json(&engine.stats())?;
    if let Ok(summary) = engine.patient_summary() {
        print_json(&summary)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config: EngineConfig = config::load_config().context("Failed to load configuration")?;
    let feed_interval = Duration::milliseconds(config.feed.interval_ms as i64);
    let mut feed = SyntheticFeed::new(config.feed.seed);
    let engine = Arc::new(ClinicalEngine::new(config));

    match cli.command {
        Commands::Simulate { ticks, interval_ms } => {
            let interval = interval_ms.unwrap_or(engine.config().feed.interval_ms);
            simulate(engine, feed, ticks, StdDuration::from_millis(interval.max(1))).await?;
        }
        Commands::Forecast {
            vitals_type,
            minutes,
        } => {
            initialize(&engine).await?;
            warm_up(&engine, &mut feed, feed_interval)?;
            let assessment = engine.forecast(&vitals_type, minutes.map(Duration::minutes))?;
            print_json(&assessment)?;
        }
        Commands::Sepsis {
            patient,
            wbc,
            lactate,
        } => {
            initialize(&engine).await?;
            warm_up(&engine, &mut feed, feed_interval)?;
            let labs = LabValues { wbc, lactate };
            let assessment = engine.assess_sepsis_latest(&patient.profile(), Some(&labs))?;
            print_json(&assessment)?;
        }
        Commands::Dosage {
            drug,
            patient,
            indication,
        } => {
            let latest = warm_up(&engine, &mut feed, feed_interval)?;
            let recommendation =
                engine.calculate_dosage(&drug, &patient.profile(), &indication, &latest)?;
            print_json(&recommendation)?;
        }
        Commands::Train { seed } => {
            let trainer = engine.clone();
            tokio::task::spawn_blocking(move || trainer.retrain(seed))
                .await
                .context("training task panicked")??;
            print_json(&engine.stats())?;
        }
    }

    Ok(())
}

/// Training is CPU-bound; keep it off the async workers.
async fn initialize(engine: &Arc<ClinicalEngine>) -> Result<()> {
    let engine = engine.clone();
    tokio::task::spawn_blocking(move || engine.initialize_models())
        .await
        .context("model initialization panicked")??;
    Ok(())
}
