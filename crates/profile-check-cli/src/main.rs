mod settings;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use profile_check_core::{
    report::{render_assessment, render_record, render_result, OutputFormat},
    AssessmentOutcome, AssessmentRequest, Assessor, BuiltinCatalog, CatalogRepository, DenseModel,
    FileCatalogRepository, ReasonCatalog, ReasonCode, SnapshotProfileSource, SuspicionClassifier,
};
use settings::{Overrides, Settings};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "profile-check",
    author,
    version,
    about = "Fake-account suspicion classifier CLI"
)]
struct Cli {
    /// Settings file (TOML, YAML or JSON)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Dense model definition (JSON)
    #[arg(long, value_name = "FILE", global = true)]
    model: Option<PathBuf>,

    /// Directory containing `<username>.json` profile snapshots
    #[arg(long = "profiles-dir", value_name = "DIR", global = true)]
    profiles_dir: Option<PathBuf>,

    /// Reason catalog overrides (JSON5)
    #[arg(long, value_name = "FILE", global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Clone)]
struct ReportArgs {
    /// Reason code selected by the reporter (repeatable)
    #[arg(long = "reason", value_name = "CODE")]
    reasons: Vec<String>,

    /// Free-text reason; replaces the catalog behavior message
    #[arg(long)]
    other: Option<String>,

    /// Emit JSON instead of human-readable text
    #[arg(long)]
    json: bool,
}

impl ReportArgs {
    fn reason_codes(&self) -> Vec<ReasonCode> {
        self.reasons
            .iter()
            .map(|code| ReasonCode::from(code.as_str()))
            .collect()
    }

    fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a report given a model probability
    Classify {
        /// Fake-account probability produced by the model
        #[arg(long, allow_negative_numbers = true)]
        probability: f32,

        #[command(flatten)]
        report: ReportArgs,
    },
    /// Look up a profile snapshot, run the model and classify the report
    Assess {
        username: String,

        #[command(flatten)]
        report: ReportArgs,

        /// Print the storage record instead of the full report
        #[arg(long, conflicts_with = "json")]
        record: bool,
    },
    /// List the active reason catalog
    ListReasons {
        /// Emit reasons as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Settings::load(
        cli.config.as_deref(),
        Overrides {
            model_path: cli.model.clone(),
            profiles_dir: cli.profiles_dir.clone(),
            catalog_path: cli.catalog.clone(),
        },
    )?;
    debug!(?settings, "settings loaded");

    match cli.command.unwrap_or(Commands::ListReasons { json: false }) {
        Commands::Classify {
            probability,
            report,
        } => classify(&settings, probability, &report).await?,
        Commands::Assess {
            username,
            report,
            record,
        } => assess(&settings, &username, &report, record).await?,
        Commands::ListReasons { json } => list_reasons(&settings, json).await?,
    }
    Ok(())
}

async fn load_catalog(settings: &Settings) -> Result<ReasonCatalog> {
    match &settings.catalog_path {
        Some(path) => {
            let repo = FileCatalogRepository::new(path);
            repo.load_catalog()
                .await
                .with_context(|| format!("failed to load reason catalog from {}", path.display()))
        }
        None => BuiltinCatalog.load_catalog().await,
    }
}

async fn build_classifier(settings: &Settings) -> Result<SuspicionClassifier> {
    let catalog = load_catalog(settings).await?;
    Ok(SuspicionClassifier::with_config(
        catalog,
        settings.classifier_config(),
    ))
}

async fn classify(settings: &Settings, probability: f32, report: &ReportArgs) -> Result<()> {
    let classifier = build_classifier(settings).await?;
    let result = classifier.classify(
        probability,
        &report.reason_codes(),
        report.other.as_deref(),
    );
    print!("{}", render_result(&result, report.format())?);
    if report.json {
        println!();
    }
    Ok(())
}

async fn assess(
    settings: &Settings,
    username: &str,
    report: &ReportArgs,
    record: bool,
) -> Result<()> {
    let classifier = build_classifier(settings).await?;
    let model = load_model(&settings.model_path)?;
    let assessor = Assessor::new(
        Arc::new(SnapshotProfileSource::new(&settings.profiles_dir)),
        Arc::new(model),
        classifier,
    );

    let mut request = AssessmentRequest::new(username).with_reasons(report.reason_codes());
    request.other = report.other.clone();

    match assessor.assess(&request).await? {
        AssessmentOutcome::Assessed(assessment) => {
            if record {
                println!("{}", render_record(&assessment.record())?);
            } else {
                print!("{}", render_assessment(&assessment, report.format())?);
                if report.json {
                    println!();
                }
            }
        }
        AssessmentOutcome::ProfileNotFound { username } => {
            if report.json || record {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&AssessmentOutcome::ProfileNotFound {
                        username
                    })?
                );
            } else {
                println!("Profile not found.");
            }
        }
    }
    Ok(())
}

fn load_model(path: &Path) -> Result<DenseModel> {
    DenseModel::load(path).with_context(|| format!("failed to load model from {}", path.display()))
}

async fn list_reasons(settings: &Settings, json: bool) -> Result<()> {
    let catalog = load_catalog(settings).await?;
    let entries = catalog.entries();
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let source = settings
        .catalog_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "built-in catalog".to_string());
    println!("{} reason(s) loaded from {}", entries.len(), source);
    for entry in entries {
        let kind = if entry.reason.is_custom() {
            "custom"
        } else {
            "form"
        };
        println!(
            "- {reason:<16} [{kind:6}] {level:<22} :: {message}",
            reason = entry.reason.as_str(),
            kind = kind,
            level = entry.suspicion_level.as_str(),
            message = entry.behavior_message
        );
    }
    Ok(())
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
