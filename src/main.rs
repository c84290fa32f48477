use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::{rngs::StdRng, SeedableRng};
use tracing_subscriber::EnvFilter;

use scenegen::{
    batch::{batch_process, BatchInputs, BatchParams},
    io::ensure_exists,
    ClientCfg, EnhancementLevel, GenerationClient,
};

#[derive(Parser)]
#[command(name = "scenegen", version, about = "Insert objects and text into scenes with a generative image model")]
struct Cli {
    /// YAML config file
    #[arg(long, global = true, env = "SCENEGEN_CONFIG")]
    config: Option<PathBuf>,
    /// Model provider: gemini | mock
    #[arg(long, global = true, env = "SCENEGEN_PROVIDER")]
    provider: Option<String>,
    #[arg(long, global = true, env = "SCENEGEN_MODEL")]
    model: Option<String>,
    /// API key (falls back to GEMINI_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Insert an object into a scene
    InsertObject {
        primary_image: PathBuf,
        object_image: PathBuf,
        output_path: PathBuf,
        /// Object type (auto-detected if not given)
        #[arg(long)]
        object_type: Option<String>,
        /// basic | realistic | photorealistic
        #[arg(long, default_value = "realistic")]
        enhancement: String,
    },
    /// Insert text into a scene
    InsertText {
        primary_image: PathBuf,
        text: String,
        output_path: PathBuf,
        /// Target area (shirt, sign, banner, ...)
        #[arg(long, default_value = "shirt")]
        target_area: String,
        /// Text style (casual, formal, artistic, sporty, vintage)
        #[arg(long)]
        style: Option<String>,
    },
    /// Randomized object/text insertion over a folder of scenes
    BatchProcess {
        input_dir: PathBuf,
        output_dir: PathBuf,
        #[arg(long)]
        objects_dir: Option<PathBuf>,
        /// One text per line
        #[arg(long)]
        texts_file: Option<PathBuf>,
        #[arg(long, default_value_t = 3)]
        num_variations: u32,
        /// Max simultaneous model calls
        #[arg(long)]
        concurrency: Option<usize>,
        #[arg(long)]
        rate_per_min: Option<u32>,
        /// Seed for reproducible choices
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Suggest insertion opportunities for a scene
    AnalyzeScene { image_path: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn build_client(cfg: &ClientCfg, api_key: Option<String>) -> Result<GenerationClient> {
    let provider = cfg.build_provider(api_key)?;
    let client = GenerationClient::new(provider);
    tracing::info!(provider = client.provider_name(), model = %cfg.model, "client ready");
    Ok(client)
}

async fn run(cli: Cli) -> Result<()> {
    let Cli { config, provider, model, api_key, command } = cli;

    let mut cfg = match &config {
        Some(path) => ClientCfg::load(path)
            .await
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ClientCfg::default(),
    };
    if let Some(p) = provider { cfg.provider = p; }
    if let Some(m) = model { cfg.model = m; }

    match command {
        Command::InsertObject { primary_image, object_image, output_path, object_type, enhancement } => {
            tracing::info!("Starting object insertion");
            ensure_exists(&primary_image).await?;
            ensure_exists(&object_image).await?;
            let level = match enhancement.parse::<EnhancementLevel>() {
                Ok(l) => l,
                Err(e) => {
                    tracing::warn!("{e}, using {}", EnhancementLevel::default());
                    EnhancementLevel::default()
                }
            };

            let client = build_client(&cfg, api_key)?;
            let out = client
                .insert_object(&primary_image, &object_image, &output_path, object_type.as_deref(), level)
                .await
                .context("Object insertion failed")?;
            tracing::info!("Object insertion completed. Saved to {}", out.display());
        }
        Command::InsertText { primary_image, text, output_path, target_area, style } => {
            tracing::info!("Starting text insertion: '{text}' on {target_area}");
            ensure_exists(&primary_image).await?;

            let client = build_client(&cfg, api_key)?;
            let out = client
                .insert_text(&primary_image, &text, &output_path, &target_area, style.as_deref())
                .await
                .context("Text insertion failed")?;
            tracing::info!("Text insertion completed. Saved to {}", out.display());
        }
        Command::BatchProcess {
            input_dir,
            output_dir,
            objects_dir,
            texts_file,
            num_variations,
            concurrency,
            rate_per_min,
            seed,
        } => {
            tracing::info!("Starting batch processing: {} -> {}", input_dir.display(), output_dir.display());
            tokio::fs::create_dir_all(&output_dir)
                .await
                .with_context(|| format!("cannot create {}", output_dir.display()))?;

            let client = build_client(&cfg, api_key)?;
            let params = BatchParams {
                concurrency: concurrency.unwrap_or(cfg.batch.concurrency).max(1),
                rate_per_min: rate_per_min.unwrap_or(cfg.batch.rate_per_min),
            };
            let mut rng = match seed.or(cfg.batch.seed) {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_os_rng(),
            };
            let inputs = BatchInputs { input_dir, output_dir, objects_dir, texts_file, num_variations };
            let results = batch_process(&client, &inputs, params, &mut rng)
                .await
                .context("Batch processing failed")?;
            tracing::info!("Batch processing completed. Generated {} images", results.len());
        }
        Command::AnalyzeScene { image_path } => {
            tracing::info!("Analyzing scene: {}", image_path.display());
            ensure_exists(&image_path).await?;

            let client = build_client(&cfg, api_key)?;
            let analysis = client.analyze_scene(&image_path).await.context("Scene analysis failed")?;

            let rule = "=".repeat(50);
            println!("\n{rule}\nSCENE ANALYSIS RESULTS\n{rule}");
            println!("{analysis}");
        }
    }
    Ok(())
}
