//! dealer-sync CLI: operator interface to the reconciliation engine.

use dealer_sync::config::secrets::redacted_url;
use dealer_sync::config::{Config, Settings};
use dealer_sync::db::{Db, PgmqNotifier};
use dealer_sync::engine::Engine;
use dealer_sync::input;
use dealer_sync::ports::DealerLookup;
use dealer_sync::telemetry::{TelemetryConfig, init_telemetry};
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "dealer-sync", about = "Link dealers to products and stage them for integration")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process dealer/product input and write the result report
    Run {
        /// Dealer codes, one per line (legacy mode: every dealer × every product)
        #[arg(long, default_value = "dealers.txt")]
        dealers: PathBuf,
        /// Product barcodes, one per line (legacy mode)
        #[arg(long, default_value = "products.txt")]
        products: PathBuf,
        /// Delimited file with dealer and product columns; only listed pairs are processed
        #[arg(long)]
        pairs: Option<PathBuf>,
        /// Where to write the JSON report
        #[arg(long, short, default_value = "result.json")]
        output: PathBuf,
        /// Concurrent workers (default: 2 × CPUs, at least 4)
        #[arg(long, short)]
        workers: Option<usize>,
        /// Link records per bulk insert
        #[arg(long)]
        batch_size: Option<usize>,
        /// TOML settings file
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// Check which dealer codes exist in the store
    Check {
        /// Dealer codes, one per line
        #[arg(long, default_value = "dealers.txt")]
        dealers: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "dealer-sync".to_string(),
        default_filter: config.log_level.clone(),
    })?;

    match cli.command {
        Command::Run {
            dealers,
            products,
            pairs,
            output,
            workers,
            batch_size,
            settings,
        } => {
            let run = RunArgs {
                dealers,
                products,
                pairs,
                output,
                workers,
                batch_size,
                settings,
            };
            cmd_run(&config, run).await
        }
        Command::Check { dealers } => cmd_check(&config, dealers).await,
    }
}

struct RunArgs {
    dealers: PathBuf,
    products: PathBuf,
    pairs: Option<PathBuf>,
    output: PathBuf,
    workers: Option<usize>,
    batch_size: Option<usize>,
    settings: Option<PathBuf>,
}

async fn connect(config: &Config) -> anyhow::Result<Db> {
    info!(url = %redacted_url(&config.database_url), "connecting to database");
    let db = Db::connect(
        config.database_url.expose_secret(),
        config.db_max_connections,
        config.db_schema.as_deref(),
    )
    .await?;
    Ok(db)
}

async fn cmd_run(config: &Config, args: RunArgs) -> anyhow::Result<()> {
    let settings = match args.settings {
        Some(ref path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let mut engine_config = settings.engine_config()?;
    if let Some(workers) = args.workers.filter(|w| *w > 0) {
        engine_config.workers = workers;
    }
    if let Some(batch_size) = args.batch_size.filter(|b| *b > 0) {
        engine_config.batch_size = batch_size;
    }

    let run_input = match args.pairs {
        Some(ref path) => {
            info!(file = %path.display(), "reading dealer/product pairs");
            input::read_pairs(path)?
        }
        None => {
            info!(
                dealers = %args.dealers.display(),
                products = %args.products.display(),
                "reading dealer and product lists"
            );
            input::read_cross(&args.dealers, &args.products)?
        }
    };

    if run_input.is_explicit() {
        let combinations: usize = run_input.pairs.values().map(Vec::len).sum();
        info!(dealers = run_input.pairs.len(), combinations, "input loaded");
    } else {
        if run_input.dealer_keys.is_empty() {
            anyhow::bail!("dealer list {} is empty", args.dealers.display());
        }
        if run_input.product_keys.is_empty() {
            anyhow::bail!("product list {} is empty", args.products.display());
        }
        info!(
            dealers = run_input.dealer_keys.len(),
            products = run_input.product_keys.len(),
            combinations = run_input.dealer_keys.len() * run_input.product_keys.len(),
            "input loaded"
        );
    }

    let db = Arc::new(connect(config).await?);
    db.migrate().await?;
    let store = Arc::new(db.store());
    let notifier = PgmqNotifier::connect(Arc::clone(&db), &config.notify_queue).await;

    let engine = Engine::new(store, notifier, engine_config);
    let outcome = engine.run(run_input).await?;
    let report = &outcome.report;
    let stats = &outcome.stats;

    info!(
        success = report.success.len(),
        failure = report.failure.len(),
        dropped_dealers = stats.dropped_dealers,
        dropped_items = stats.dropped_items,
        success_rate = %format!("{:.2}%", report.success_rate(stats.work_items)),
        "processing complete"
    );

    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(&args.output, json).await?;
    info!(file = %args.output.display(), "report written");
    Ok(())
}

async fn cmd_check(config: &Config, dealers: PathBuf) -> anyhow::Result<()> {
    let keys = input::read_lines(&dealers)?;
    let db = connect(config).await?;
    let store = db.store();

    let mut missing = Vec::new();
    for key in &keys {
        match store.resolve_dealer(key).await? {
            Some(dealer) => println!("{:<20}  found (id {})", key, dealer.id),
            None => {
                println!("{key:<20}  NOT FOUND");
                missing.push(key.as_str());
            }
        }
    }

    println!("{}", "-".repeat(60));
    println!(
        "{} dealer code(s): {} found, {} missing",
        keys.len(),
        keys.len() - missing.len(),
        missing.len()
    );
    if !missing.is_empty() {
        println!("missing: {}", missing.join(", "));
    }
    Ok(())
}
