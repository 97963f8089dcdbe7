use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use riskservice_core::config::{pie_data_dir_from_env_value, ENV_PIE_DATA_DIR};
use riskservice_core::{
    FilePieStore, PatientSummary, PieId, PieStore, RiskService, ServiceConfig,
    TrajectorySynthesizer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "riskservice")]
#[command(about = "Risk service CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one refresh with the environment configuration and print the outcomes
    Refresh,
    /// Print a synthetic record history as JSON
    Synthesize {
        /// Patient age in years
        #[arg(long)]
        age: i64,
        /// Number of recorded conditions
        #[arg(long, default_value_t = 0)]
        conditions: u32,
        /// Number of recorded medications
        #[arg(long, default_value_t = 0)]
        medications: u32,
        /// Seed for a reproducible history
        #[arg(long)]
        seed: Option<u64>,
        /// Study id and MRN of the generated records
        #[arg(long, default_value = "synthetic")]
        id: String,
        /// Stop before this date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        until: Option<NaiveDate>,
    },
    /// Print a stored pie from the pie data directory
    Pie {
        /// Pie id (32 lowercase hex characters)
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("riskservice_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Refresh => {
            let config = ServiceConfig::from_env()?;
            let service = RiskService::from_config(&config)?;
            let outcomes = service.coordinator().refresh().await?;
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
        }
        Commands::Synthesize {
            age,
            conditions,
            medications,
            seed,
            id,
            until,
        } => {
            let summary = PatientSummary {
                id,
                age,
                condition_count: conditions,
                medication_count: medications,
            };
            let mut synthesizer = match seed {
                Some(seed) => TrajectorySynthesizer::seeded(seed),
                None => TrajectorySynthesizer::from_entropy(),
            };
            let records = match until {
                Some(until) => synthesizer.synthesize_until(&summary, until),
                None => synthesizer.synthesize(&summary),
            };
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Commands::Pie { id } => {
            let id = PieId::parse(&id)?;
            let store = FilePieStore::new(pie_data_dir_from_env_value(
                std::env::var(ENV_PIE_DATA_DIR).ok(),
            ));
            let pie = store
                .get(id)
                .await?
                .with_context(|| format!("no pie {id} under {}", store.data_dir().display()))?;
            println!("{}", serde_json::to_string_pretty(&pie)?);
        }
    }

    Ok(())
}
