use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Local, Utc};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_event_bus::{EventPublisher, FileEventPublisher};
use shared_logging::LogLevel;
use usvisa_pipeline::{
    entity::config::VisaPredictorConfig,
    sample::synthetic_visa_frame,
    storage::LocalBucketStore,
    telemetry::new_run_id,
    PipelineConfig, PipelineError, PipelineOutcome, PipelineTelemetry, TrainPipeline,
    VisaClassifier, VisaData,
};

#[derive(Parser, Debug)]
#[command(name = "usvisa", version, about = "US visa approval training pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the full training pipeline once.
    Train(TrainArgs),
    /// Lists the most recent runs.
    Runs {
        /// Number of entries to display.
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value = "logs/runs/index.jsonl")]
        manifest: PathBuf,
    },
    /// Shows the manifest entry of a run.
    Status {
        run_id: String,
        #[arg(long, default_value = "logs/runs/index.jsonl")]
        manifest: PathBuf,
    },
    /// Scores one application with the published model.
    Predict(PredictArgs),
    /// Writes a synthetic dataset CSV.
    Sample {
        #[arg(long, default_value_t = 1000)]
        rows: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value = "data/usvisa.csv")]
        out: PathBuf,
    },
}

#[derive(Args, Debug)]
struct TrainArgs {
    #[arg(long, default_value = "usvisa/config/pipeline.toml")]
    config: PathBuf,
    /// Overrides the configured log directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,
    #[arg(long, default_value = "logs/runs/index.jsonl")]
    manifest: PathBuf,
    #[arg(long)]
    event_log: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PredictArgs {
    #[arg(long, default_value = "usvisa/config/pipeline.toml")]
    config: PathBuf,
    #[arg(long)]
    continent: String,
    #[arg(long)]
    education_of_employee: String,
    #[arg(long)]
    has_job_experience: String,
    #[arg(long)]
    requires_job_training: String,
    #[arg(long)]
    no_of_employees: f64,
    #[arg(long)]
    region_of_employment: String,
    #[arg(long)]
    prevailing_wage: f64,
    #[arg(long)]
    unit_of_wage: String,
    #[arg(long)]
    full_time_position: String,
    #[arg(long)]
    company_age: f64,
}

impl From<PredictArgs> for VisaData {
    fn from(args: PredictArgs) -> Self {
        Self {
            continent: args.continent,
            education_of_employee: args.education_of_employee,
            has_job_experience: args.has_job_experience,
            requires_job_training: args.requires_job_training,
            no_of_employees: args.no_of_employees,
            region_of_employment: args.region_of_employment,
            prevailing_wage: args.prevailing_wage,
            unit_of_wage: args.unit_of_wage,
            full_time_position: args.full_time_position,
            company_age: args.company_age,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct RunManifestEntry {
    run_id: String,
    submitted_at: DateTime<Utc>,
    config: PathBuf,
    log_path: PathBuf,
    status: String,
    #[serde(default)]
    artifact_dir: Option<PathBuf>,
    #[serde(default)]
    f1_score: Option<f64>,
    #[serde(default)]
    changed_accuracy: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

impl RunManifestEntry {
    fn new(config: PathBuf, log_path: PathBuf) -> Self {
        Self {
            run_id: new_run_id(),
            submitted_at: Utc::now(),
            config,
            log_path,
            status: "pending".into(),
            artifact_dir: None,
            f1_score: None,
            changed_accuracy: None,
            error: None,
        }
    }

    fn record_outcome(&mut self, outcome: &PipelineOutcome) {
        self.status = if outcome.model_pusher.is_some() {
            "published"
        } else {
            "rejected"
        }
        .into();
        self.artifact_dir = Some(outcome.artifact_dir.clone());
        self.f1_score = Some(outcome.model_trainer.metric_artifact.f1_score);
        self.changed_accuracy = Some(outcome.model_evaluation.changed_accuracy);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Train(args) => handle_train(&args),
        Commands::Runs { limit, manifest } => {
            let entries = read_manifest(&manifest)?;
            for entry in entries.into_iter().rev().take(limit) {
                println!(
                    "{} | {} | {} | f1={}",
                    entry.run_id,
                    entry.status,
                    entry.submitted_at,
                    entry
                        .f1_score
                        .map_or_else(|| "-".to_string(), |f1| format!("{f1:.4}"))
                );
            }
            Ok(())
        }
        Commands::Status { run_id, manifest } => {
            let entries = read_manifest(&manifest)?;
            if let Some(entry) = entries.into_iter().find(|e| e.run_id == run_id) {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                println!("run {run_id} not found");
            }
            Ok(())
        }
        Commands::Predict(args) => handle_predict(args),
        Commands::Sample { rows, seed, out } => {
            synthetic_visa_frame(rows, seed)?
                .write_csv(&out)
                .with_context(|| format!("writing {}", out.display()))?;
            println!("wrote {rows} rows to {}", out.display());
            Ok(())
        }
    }
}

fn handle_train(args: &TrainArgs) -> Result<()> {
    anyhow::ensure!(
        args.config.exists(),
        "config file {} not found",
        args.config.display()
    );
    let settings = PipelineConfig::load(&args.config)?;
    let log_dir = args.log_dir.clone().unwrap_or_else(|| settings.log_dir.clone());
    let log_path = compute_log_path(&log_dir)?;
    let mut entry = RunManifestEntry::new(args.config.clone(), log_path.clone());
    entry.status = "queued".into();
    append_manifest(&args.manifest, &entry)?;

    let mut builder = PipelineTelemetry::builder("usvisa")
        .run_id(entry.run_id.clone())
        .log_path(&log_path);
    if let Some(path) = &args.event_log {
        let publisher: Arc<dyn EventPublisher> = Arc::new(FileEventPublisher::new(path)?);
        builder = builder.event_publisher(publisher);
    }
    let telemetry = builder.build()?;
    telemetry.record(
        LogLevel::Info,
        None,
        "run queued",
        json!({ "config": entry.config, "log_path": entry.log_path }),
    );

    let store = Arc::new(LocalBucketStore::new(&settings.model_store.root));
    let pipeline = TrainPipeline::new(settings, store, telemetry.clone());
    update_entry(&args.manifest, &entry.run_id, |e| e.status = "running".into())?;
    match pipeline.run_pipeline() {
        Ok(outcome) => {
            entry.record_outcome(&outcome);
            update_entry(&args.manifest, &entry.run_id, |e| e.record_outcome(&outcome))?;
            telemetry.record(
                LogLevel::Info,
                None,
                "run finished",
                json!({ "status": entry.status, "artifact_dir": outcome.artifact_dir }),
            );
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Err(err) => {
            let message = err.to_string();
            update_entry(&args.manifest, &entry.run_id, |e| {
                e.status = "failed".into();
                e.error = Some(message.clone());
            })?;
            telemetry.record(
                LogLevel::Error,
                err.failed_stage(),
                "run failed",
                json!({ "error": PipelineErrorChain(&err).to_string() }),
            );
            Err(err.into())
        }
    }
}

/// Renders the full source chain of a pipeline error in one line.
struct PipelineErrorChain<'a>(&'a PipelineError);

impl std::fmt::Display for PipelineErrorChain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = std::error::Error::source(self.0);
        while let Some(cause) = source {
            write!(f, ": {cause}")?;
            source = cause.source();
        }
        Ok(())
    }
}

fn handle_predict(args: PredictArgs) -> Result<()> {
    let settings = PipelineConfig::load(&args.config)?;
    let config = VisaPredictorConfig::new(&settings);
    let store = Arc::new(LocalBucketStore::new(&settings.model_store.root));
    let classifier = VisaClassifier::new(&config, store);
    let data = VisaData::from(args);
    let statuses = classifier.predict(&data.to_frame()?)?;
    let result: Vec<Value> = statuses
        .iter()
        .map(|status| json!({ "case_status": status.as_str() }))
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "input": data.as_map(), "prediction": result }))?
    );
    Ok(())
}

fn append_manifest(path: &Path, entry: &RunManifestEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening manifest {}", path.display()))?;
    serde_json::to_writer(&mut file, entry)?;
    file.write_all(b"\n")?;
    Ok(())
}

fn read_manifest(path: &Path) -> Result<Vec<RunManifestEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: RunManifestEntry = serde_json::from_str(&line)?;
        entries.push(entry);
    }
    Ok(entries)
}

fn compute_log_path(base: &Path) -> Result<PathBuf> {
    let now = Local::now();
    let dir = base
        .join(format!("{:04}", now.year()))
        .join(format!("{:02}", now.month()))
        .join(format!("{:02}", now.day()));
    fs::create_dir_all(&dir)?;
    Ok(dir.join(format!(
        "run-{}.log.jsonl",
        Utc::now().format("%Y%m%d-%H%M%S")
    )))
}

fn update_entry(
    path: &Path,
    run_id: &str,
    mut apply: impl FnMut(&mut RunManifestEntry),
) -> Result<()> {
    let mut entries = read_manifest(path)?;
    let mut changed = false;
    for entry in &mut entries {
        if entry.run_id == run_id {
            apply(entry);
            changed = true;
        }
    }
    if !changed {
        return Ok(());
    }
    let mut file = File::create(path)?;
    for entry in entries {
        serde_json::to_writer(&mut file, &entry)?;
        file.write_all(b"\n")?;
    }
    Ok(())
}
