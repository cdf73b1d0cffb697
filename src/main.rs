use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use lca_agents_rs::lca::config::AnalysisConfig;
use lca_agents_rs::lca::service::AnalysisService;
use lca_agents_rs::lca::types::ProcessesListRequest;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the combined product analysis
    Analyze {
        /// Product to analyse
        #[arg(short, long)]
        product: String,

        /// Manufacturer of the product
        #[arg(short, long)]
        supplier: Option<String>,
    },
    /// Build the production processes list only
    Processes {
        #[arg(short, long)]
        product: String,

        #[arg(short, long)]
        supplier: Option<String>,

        /// Known component information
        #[arg(long)]
        component: Option<String>,

        /// Known technology information
        #[arg(long)]
        technology: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => AnalysisConfig::from_env()?,
    };

    let service = AnalysisService::from_config(&config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling run");
            on_interrupt.cancel();
        }
    });

    let started = Instant::now();
    let output = match args.command {
        Commands::Analyze { product, supplier } => {
            let analysis = service
                .analyze_product(&product, supplier.as_deref(), &cancel)
                .await?;
            serde_json::to_string_pretty(&analysis)?
        }
        Commands::Processes {
            product,
            supplier,
            component,
            technology,
        } => {
            let request = ProcessesListRequest {
                product_name: product,
                supplier,
                product_component: component,
                technology_information: technology,
            };
            let response = service.build_processes_list(&request, &cancel).await?;
            serde_json::to_string_pretty(&response)?
        }
    };

    log::info!("Finished in {:.2}s", started.elapsed().as_secs_f64());
    println!("{}", output);
    Ok(())
}
