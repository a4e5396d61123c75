//! Cascade inference CLI
//!
//! Predicts a mask / gender / age label for every image listed in the
//! evaluation info CSV and writes the table back out with a label column.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use maskcascade::config::Config;
use maskcascade::engine::{openvino_bank, ModelPool, Preprocessor, RoutingPolicy};
use maskcascade::service::InferenceService;
use maskcascade::storage::InfoTable;

#[derive(Parser, Debug)]
#[command(name = "maskcascade", version, about = "Cascaded mask / gender / age inference")]
struct Cli {
    /// TOML config file; built-in defaults are used when it does not exist
    #[arg(long, default_value = Config::default_path())]
    config: PathBuf,

    /// Evaluation data directory
    #[arg(long, env = "SM_CHANNEL_EVAL")]
    data_dir: Option<PathBuf>,

    /// Image folder inside the data directory
    #[arg(long)]
    data_folder: Option<String>,

    /// Info CSV inside the data directory
    #[arg(long)]
    info_file: Option<String>,

    /// Directory holding one sub-directory per cascade model
    #[arg(long, env = "SM_CHANNEL_MODEL")]
    model_dir: Option<PathBuf>,

    #[arg(long, env = "SM_OUTPUT_DATA_DIR")]
    output_dir: Option<PathBuf>,

    /// Output CSV name inside the output directory
    #[arg(long)]
    file_name: Option<String>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    num_workers: Option<usize>,

    /// OpenVINO device, e.g. CPU, GPU or AUTO
    #[arg(long)]
    device: Option<String>,

    /// Load every model, report status and exit
    #[arg(long)]
    check: bool,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(v) = self.data_dir {
            config.data.data_dir = v;
        }
        if let Some(v) = self.data_folder {
            config.data.data_folder = v;
        }
        if let Some(v) = self.info_file {
            config.data.info_file = v;
        }
        if let Some(v) = self.model_dir {
            config.models.model_dir = v;
        }
        if let Some(v) = self.output_dir {
            config.output.output_dir = v;
        }
        if let Some(v) = self.file_name {
            config.output.file_name = v;
        }
        if let Some(v) = self.batch_size {
            config.inference.batch_size = v;
        }
        if let Some(v) = self.num_workers {
            config.inference.num_workers = v;
        }
        if let Some(v) = self.device {
            config.inference.device = v;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.as_str()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let check_only = cli.check;

    info!("Starting maskcascade v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_or_default(&cli.config)?;
    cli.apply(&mut config);
    config.validate()?;

    info!("Configuration loaded:");
    info!("  Device: {}", config.inference.device);
    info!("  Model dir: {}", config.models.model_dir.display());
    info!("  Data dir: {}", config.data.data_dir.display());
    info!("  Batch size: {}", config.inference.batch_size);
    info!("  Workers: {}", config.inference.num_workers);

    let pool = Arc::new(ModelPool::new(&config.inference, &config.models)?);
    pool.preload()?;
    let input_size = (config.preprocess.input_width, config.preprocess.input_height);
    let policy = RoutingPolicy::new(openvino_bank(pool.clone(), input_size)?);

    if check_only {
        for (slot, loaded) in pool.get_status() {
            info!("  {:<24} {}", slot.to_string(), if loaded { "loaded" } else { "not loaded" });
        }
        info!("All models loaded on {}", pool.device());
        return Ok(());
    }

    let info_path = config.info_path();
    let mut table = InfoTable::read(&info_path, &config.data.id_column)
        .with_context(|| format!("failed to read {}", info_path.display()))?;

    std::fs::create_dir_all(&config.output.output_dir).with_context(|| {
        format!(
            "failed to create output directory {}",
            config.output.output_dir.display()
        )
    })?;

    let service = InferenceService::new(
        Preprocessor::new(&config.preprocess),
        policy,
        &config.inference,
    );
    let summary = service
        .run_table(&mut table, &config.image_root(), &config.output.label_column)
        .await?;

    let output_path = config.output_path();
    table
        .write(&output_path)
        .with_context(|| format!("failed to write {}", output_path.display()))?;

    info!(
        "Wrote {} predictions to {} ({} failed)",
        summary.succeeded,
        output_path.display(),
        summary.failed
    );
    info!("Label distribution: {:?}", summary.label_counts);
    info!("Inference Done!");
    Ok(())
}
