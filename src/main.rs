//! deepscan CLI
//!
//! Offline side of the AI-image detector: train a model, re-evaluate an
//! artifact on a test split, or score a single image.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use deepscan::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use deepscan::dataset::{loader::load_split, Split};
use deepscan::inference::Predictor;
use deepscan::model::{ModelArtifact, DEFAULT_MODEL_PATH};
use deepscan::training::{evaluate_test_split, run_training, TrainingConfig};
use deepscan::utils::logging::{init_logging, LogConfig};

/// AI-generated image detector
#[derive(Parser, Debug)]
#[command(name = "deepscan")]
#[command(version)]
#[command(about = "Train and run an EfficientNet-B0 AI-image detector with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fine-tune the detector on a train/val/test dataset
    Train(TrainArgs),

    /// Evaluate a trained model on a dataset's test split
    Evaluate {
        /// Model artifact base path
        #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,

        /// Dataset root containing test/{real,fake}
        #[arg(short, long, default_value = "./split_dataset")]
        data_dir: PathBuf,

        /// Where to write test_predictions.json
        #[arg(short, long, default_value = "output")]
        report_dir: PathBuf,
    },

    /// Score a single image file
    Predict {
        /// Model artifact base path
        #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,

        /// Image to classify
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// TOML configuration file (all fields optional)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Dataset root containing train/, val/ and test/
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    #[arg(short, long)]
    epochs: Option<usize>,

    #[arg(short, long)]
    batch_size: Option<usize>,

    #[arg(short, long)]
    learning_rate: Option<f64>,

    /// Final artifact base path
    #[arg(short, long)]
    model_path: Option<PathBuf>,

    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Burn record with pretrained EfficientNet-B0 backbone weights
    #[arg(long)]
    pretrained_backbone: Option<PathBuf>,

    /// Continue training from an existing artifact
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Decode all training/validation images into memory first
    #[arg(long, default_value = "false")]
    cache_images: bool,

    #[arg(long)]
    seed: Option<u64>,
}

impl TrainArgs {
    fn into_config(self) -> Result<TrainingConfig> {
        let mut config = match &self.config {
            Some(path) => TrainingConfig::from_file(path)
                .with_context(|| format!("Failed to load config {:?}", path))?,
            None => TrainingConfig::default(),
        };

        if let Some(v) = self.data_dir {
            config.data.root = v;
        }
        if let Some(v) = self.epochs {
            config.training.epochs = v;
        }
        if let Some(v) = self.batch_size {
            config.training.batch_size = v;
        }
        if let Some(v) = self.learning_rate {
            config.training.learning_rate = v;
        }
        if let Some(v) = self.model_path {
            config.output.model_path = v;
        }
        if let Some(v) = self.checkpoint_dir {
            config.output.checkpoint_dir = v;
        }
        if let Some(v) = self.report_dir {
            config.output.report_dir = v;
        }
        if let Some(v) = self.pretrained_backbone {
            config.model.pretrained_backbone = Some(v);
        }
        if let Some(v) = self.resume {
            config.output.resume = Some(v);
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if self.cache_images {
            config.data.cache_images = true;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogConfig::from_verbosity(cli.verbose)).map_err(anyhow::Error::msg)?;
    info!("Backend: {}", backend_name());

    match cli.command {
        Commands::Train(args) => {
            let config = args.into_config()?;
            let summary = run_training::<TrainingBackend>(&config).context("Training failed")?;
            info!(
                "Finished after {} epochs (best epoch {}, val_loss {:.4}, test accuracy {:.2}%)",
                summary.epochs_run,
                summary.best_epoch,
                summary.best_val_loss,
                summary.test_accuracy * 100.0
            );
        }

        Commands::Evaluate {
            model,
            data_dir,
            report_dir,
        } => {
            let predictor = Predictor::<DefaultBackend>::from_artifact(&ModelArtifact::new(&model), default_device())
                .with_context(|| format!("Failed to load model {:?}", model))?;
            let samples = load_split(&data_dir, Split::Test)?;
            let report = evaluate_test_split(&predictor, &samples)?;
            report.print();

            let out = report_dir.join("test_predictions.json");
            report.save_json(&out)?;
            println!("  Report written to {:?}", out);
        }

        Commands::Predict { model, input } => {
            let predictor = Predictor::<DefaultBackend>::from_artifact(&ModelArtifact::new(&model), default_device())
                .with_context(|| format!("Failed to load model {:?}", model))?;
            let verdict = predictor
                .predict_file(&input)
                .with_context(|| format!("Failed to score {:?}", input))?;

            let label = if verdict.ai_generated {
                "AI-generated".red().bold()
            } else {
                "Real".green().bold()
            };
            println!("{} ({:.2}% confidence)", label, verdict.confidence);
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }
    }

    Ok(())
}
