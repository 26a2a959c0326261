use anyhow::Result;
use clap::{Parser, Subcommand};

use railwatch::config::Config;
use railwatch::fleet::workshop::Workshop;
use railwatch::fleet::{NewAnomaly, Severity, Urgency};

#[derive(Parser)]
#[command(
    name = "railwatch",
    about = "Depot maintenance tracking and fleet health scoring for rail rolling stock",
    version,
    long_about = None
)]
struct Cli {
    /// Database path (overrides the config file)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (JSON API server)
    Serve {
        /// Bind address (overrides the config file)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Create the database and seed catalog + demo fleet data
    Seed,

    /// Dry-run a criticality computation (nothing is recorded)
    Score {
        /// Train id
        #[arg(long)]
        train: String,

        /// Component name (unknown names score against the baseline ceiling)
        #[arg(long)]
        component: String,

        /// Reported severity: Urgent, Moyen, or Faible
        #[arg(long, default_value = "Moyen")]
        severity: String,

        /// Whether the fault took the train out of service
        #[arg(long)]
        immobilized: bool,
    },

    /// Report an anomaly from the shop-floor terminal
    Report {
        #[arg(long)]
        train: String,

        #[arg(long)]
        component: String,

        #[arg(long, default_value = "Moyen")]
        severity: String,

        #[arg(long, default_value = "mecanique")]
        category: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long)]
        immobilized: bool,

        /// Reporting technician
        #[arg(long, default_value = "cli")]
        technician: String,
    },

    /// Mark an anomaly resolved and refresh its train's health
    Resolve {
        /// Anomaly id
        #[arg(long)]
        id: i64,
    },

    /// Recompute health for one train, or the whole fleet
    Recalc {
        /// Train id (omit for all trains)
        #[arg(long)]
        train: Option<String>,
    },
}

fn open_pool(cfg: &Config) -> Result<railwatch::storage::Pool> {
    if let Some(parent) = std::path::Path::new(&cfg.storage.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    railwatch::storage::open_pool(&cfg.storage.db_path)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut cfg = Config::load_or_default();
    if let Some(db) = cli.db {
        cfg.storage.db_path = db;
    }

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            tracing::info!(bind = %cfg.server.bind, "Starting railwatch daemon");
            railwatch::serve(cfg).await?;
        }
        Commands::Seed => {
            let pool = open_pool(&cfg)?;
            drop(pool); // open_pool migrates and seeds
            println!("Database ready at {}", cfg.storage.db_path);
        }
        Commands::Score {
            train,
            component,
            severity,
            immobilized,
        } => {
            let pool = open_pool(&cfg)?;
            let workshop = Workshop::new(pool, cfg.scoring.clone());
            let tier = Severity::from_label(&severity);
            let score = workshop
                .calculator()
                .compute(&train, &component, tier, immobilized)?;
            let urgency = Urgency::from_score(score);

            println!("\n=== Railwatch Criticality (dry run) ===");
            println!("Train:       {}", train);
            println!("Component:   {}", component);
            println!("Severity:    {}", tier.as_str());
            println!("Immobilized: {}", immobilized);
            println!("Score:       {}/100", score);
            println!("Urgency:     {}", urgency.as_str());
            println!("=======================================\n");
        }
        Commands::Report {
            train,
            component,
            severity,
            category,
            description,
            immobilized,
            technician,
        } => {
            let pool = open_pool(&cfg)?;
            let workshop = Workshop::new(pool, cfg.scoring.clone());
            let (anomaly, health) = workshop.report_anomaly(NewAnomaly {
                train_id: train,
                technician,
                category,
                component,
                description,
                immobilization: immobilized,
                severity,
            })?;
            println!(
                "Anomaly #{} recorded: criticality {} ({}), train {} health now {}%",
                anomaly.id,
                anomaly.calculated_criticality,
                anomaly.urgency.as_str(),
                anomaly.train_id,
                health
            );
        }
        Commands::Resolve { id } => {
            let pool = open_pool(&cfg)?;
            let workshop = Workshop::new(pool, cfg.scoring.clone());
            let health = workshop.resolve_anomaly(id)?;
            println!("Anomaly #{} resolved, train health recomputed = {}%", id, health);
        }
        Commands::Recalc { train } => {
            let pool = open_pool(&cfg)?;
            let workshop = Workshop::new(pool, cfg.scoring.clone());
            match train {
                Some(id) => {
                    let health = workshop.aggregator().recompute(&id)?;
                    println!("{} : {}%", id, health);
                }
                None => {
                    for (id, health) in workshop.aggregator().recompute_all()? {
                        println!("{} : {}%", id, health);
                    }
                }
            }
        }
    }

    Ok(())
}
