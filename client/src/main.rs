use std::path::PathBuf;
use std::process::ExitCode;

use cassava_client::history::FileMedium;
use cassava_client::{
    AnalysisEntry, AnalysisError, BatchEntry, ClientConfig, HistoryStore, Orchestrator,
    RemoteClient, SeededFallback, SingleEntry, SlotOutcome,
};
use clap::{Parser, Subcommand};
use shared::{PredictionResult, PredictionSource};

/// Cassava leaf disease analysis against a remote inference service,
/// with an offline fallback when the service cannot be reached.
#[derive(Parser, Debug)]
#[command(name = "cassava-client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether the inference service answers
    Health,

    /// Analyse one image, or several as a batch
    Analyze {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },

    /// Show past analyses, newest first
    History {
        /// Print the raw JSON records
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Delete all past analyses
    Clear,
}

type App = Orchestrator<RemoteClient, SeededFallback, FileMedium>;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let client = match RemoteClient::new(&config) {
        Ok(client) => client,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Commands::Health = cli.command {
        return match client.health().await {
            Ok(body) => {
                println!("Service at {} is up: {}", client.base_url(), body);
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!("Service at {} is unavailable: {}", client.base_url(), e);
                ExitCode::FAILURE
            }
        };
    }

    let history = HistoryStore::new(FileMedium::new(&config.history_dir));
    let app: App = Orchestrator::new(client, SeededFallback::new(config.fallback_seed), history);

    match cli.command {
        Commands::Health => ExitCode::SUCCESS,
        Commands::Analyze { images } => analyze(&app, images).await,
        Commands::History { json } => show_history(&app, json).await,
        Commands::Clear => match app.history().clear().await {
            Ok(()) => {
                println!("History cleared.");
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!("{e}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn analyze(app: &App, images: Vec<PathBuf>) -> ExitCode {
    if let [image] = images.as_slice() {
        match app.analyze_one(image).await {
            Ok(analysis) => {
                print_single(&analysis.entry);
                if let Some(e) = analysis.storage_error {
                    println!("Warning: result not saved to history ({e})");
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                print_analysis_error(&e);
                ExitCode::FAILURE
            }
        }
    } else {
        match app.analyze_many(&images).await {
            Ok(analysis) => {
                print_batch(&analysis.entry);
                if let Some(e) = analysis.storage_error {
                    println!("Warning: results not saved to history ({e})");
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                print_analysis_error(&e);
                ExitCode::FAILURE
            }
        }
    }
}

async fn show_history(app: &App, json: bool) -> ExitCode {
    let entries = match app.history().list_all().await {
        Ok(entries) => entries,
        Err(e) => {
            println!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if json {
        match serde_json::to_string_pretty(&entries) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                log::error!("Cannot encode history: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    if entries.is_empty() {
        println!("No analyses yet.");
    }
    for entry in &entries {
        match entry {
            AnalysisEntry::Single(single) => println!(
                "{}  {}  {}",
                single.created_at.format("%Y-%m-%d %H:%M"),
                single.image_ref.display(),
                describe(&single.result)
            ),
            AnalysisEntry::Batch(batch) => println!(
                "{}  batch of {}  {}/{} successful{}",
                batch.created_at.format("%Y-%m-%d %H:%M"),
                batch.total(),
                batch.successful(),
                batch.total(),
                if batch.used_remote() { "" } else { " (offline)" }
            ),
        }
    }
    ExitCode::SUCCESS
}

fn describe(result: &PredictionResult) -> String {
    let mut text = format!("{} ({:.1}%)", result.label(), result.confidence());
    if result.source() == PredictionSource::Fallback {
        text.push_str(" [offline estimate]");
    }
    text
}

fn print_single(entry: &SingleEntry) {
    let info = entry.result.label().info();
    println!("{}: {}", entry.image_ref.display(), describe(&entry.result));
    println!("  Severity: {:?}", info.severity);
    println!("  {}", info.description);
    println!("  Treatment: {}", info.treatment);
    if !entry.result.source().is_remote() {
        println!("Offline mode: this result was estimated locally and is less reliable.");
    }
}

fn print_batch(entry: &BatchEntry) {
    println!("{}/{} images analysed", entry.successful(), entry.total());
    for (image, outcome) in entry.image_refs.iter().zip(&entry.results) {
        match outcome {
            SlotOutcome::Prediction(result) => println!("  {}: {}", image.display(), describe(result)),
            SlotOutcome::Anomaly { reason } => println!("  {}: rejected ({})", image.display(), reason),
            SlotOutcome::Failed { error } => println!("  {}: failed ({})", image.display(), error),
        }
    }
    if !entry.used_remote() {
        println!("Offline mode: results were estimated locally and are less reliable.");
    }
}

fn print_analysis_error(error: &AnalysisError) {
    match error {
        AnalysisError::AnomalyRejected { reason } => {
            println!("Image rejected: {reason}");
            println!("Please try with a clearer image.");
        }
        AnalysisError::LowConfidence { confidence, .. } => {
            println!("Prediction confidence too low ({confidence:.1}%).");
            if error.is_degraded() {
                println!("The service could not be reached, so only an offline estimate was possible.");
            }
            println!("Please try with a clearer image.");
        }
        AnalysisError::EmptyBatch => println!("{error}"),
    }
}
